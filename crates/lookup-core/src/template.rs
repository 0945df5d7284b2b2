//! Serializable element trees
//!
//! Used to load documents from JSON fixtures:
//!
//! ```json
//! { "tag": "html", "children": [
//!     { "tag": "div", "id": "main", "class": "card", "children": [] }
//! ] }
//! ```

use crate::document::Document;
use crate::element::Element;
use crate::error::Result;
use crate::types::{CLASS_ATTRIBUTE, ID_ATTRIBUTE, NAME_ATTRIBUTE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeTemplate {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeTemplate>,
}

impl NodeTemplate {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_child(mut self, child: NodeTemplate) -> Self {
        self.children.push(child);
        self
    }

    /// Total number of nodes described, including `self`
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(NodeTemplate::node_count).sum::<usize>()
    }

    /// Build a detached element for this template
    pub fn instantiate(&self, document: &Document) -> Result<Element> {
        let element = document.create_element(&self.tag);
        self.apply_attributes(document, &element);
        for child in &self.children {
            let child_el = child.instantiate(document)?;
            document.append_child(&element, &child_el)?;
        }
        Ok(element)
    }

    fn apply_attributes(&self, document: &Document, element: &Element) {
        if let Some(id) = &self.id {
            document.set_attribute(element, ID_ATTRIBUTE, id);
        }
        if let Some(class) = &self.class {
            document.set_attribute(element, CLASS_ATTRIBUTE, class);
        }
        if let Some(name) = &self.name {
            document.set_attribute(element, NAME_ATTRIBUTE, name);
        }
        for (key, value) in &self.attributes {
            document.set_attribute(element, key, value);
        }
    }
}

impl Document {
    /// Document whose root is described by `template`
    pub fn from_template(template: &NodeTemplate) -> Result<Self> {
        let document = Document::with_root(&template.tag, true);
        let root = document.root();
        template.apply_attributes(&document, &root);
        for child in &template.children {
            let child_el = child.instantiate(&document)?;
            document.append_child(&root, &child_el)?;
        }
        Ok(document)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let template: NodeTemplate = serde_json::from_str(json)?;
        Self::from_template(&template)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let doc = Document::from_json(
            r#"{
                "tag": "html",
                "children": [
                    { "tag": "div", "id": "main", "class": "card", "children": [
                        { "tag": "input", "name": "email", "attributes": { "type": "text" } }
                    ] },
                    { "tag": "div", "class": "card" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(doc.all_elements().len(), 4);
        let main = doc.get_element_by_id("main").unwrap();
        assert_eq!(main.class_list(), vec!["card"]);
        let input = doc.elements_by_name("email").unwrap().first().unwrap();
        assert_eq!(input.attribute("type").as_deref(), Some("text"));
        assert!(input.parent().unwrap().ptr_eq(&main));
    }

    #[test]
    fn test_builder_counts_nodes() {
        let template = NodeTemplate::new("html").with_child(
            NodeTemplate::new("ul")
                .with_id("list")
                .with_child(NodeTemplate::new("li").with_class("item"))
                .with_child(NodeTemplate::new("li").with_class("item").with_name("last")),
        );
        assert_eq!(template.node_count(), 4);
        let doc = Document::from_template(&template).unwrap();
        assert_eq!(doc.elements_by_class("item").unwrap().len(), 2);
    }

    #[test]
    fn test_bad_json() {
        assert!(Document::from_json("{ \"children\": [] }").is_err());
    }
}
