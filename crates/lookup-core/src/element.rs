//! Element handles
//!
//! An [`Element`] is a cheap-to-clone shared handle. Parents own their
//! children; children refer back to their parent weakly, so a subtree removed
//! from the document is reclaimed as soon as nothing else holds it.

use crate::types::{class_tokens, ElementId, CLASS_ATTRIBUTE, ID_ATTRIBUTE, NAME_ATTRIBUTE};
use parking_lot::RwLock;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

struct ElementNode {
    uid: ElementId,
    tag: String,
    state: RwLock<ElementState>,
}

#[derive(Default)]
struct ElementState {
    attributes: Vec<(String, String)>,
    parent: Option<Weak<ElementNode>>,
    children: Vec<Element>,
}

/// Shared handle to a node of a live document
#[derive(Clone)]
pub struct Element {
    node: Arc<ElementNode>,
}

/// Non-owning reference to an [`Element`]
#[derive(Clone)]
pub struct WeakElement {
    uid: ElementId,
    node: Weak<ElementNode>,
}

impl Element {
    pub(crate) fn new(tag: &str) -> Self {
        Self {
            node: Arc::new(ElementNode {
                uid: ElementId::next(),
                tag: tag.to_ascii_lowercase(),
                state: RwLock::new(ElementState::default()),
            }),
        }
    }

    /// Process-unique identity of this element
    pub fn uid(&self) -> ElementId {
        self.node.uid
    }

    /// Lowercased tag name
    pub fn tag_name(&self) -> &str {
        &self.node.tag
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.node
            .state
            .read()
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.node
            .state
            .read()
            .attributes
            .iter()
            .any(|(n, _)| n == name)
    }

    /// All attributes in insertion order
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.node.state.read().attributes.clone()
    }

    /// Value of the `id` attribute
    pub fn id(&self) -> Option<String> {
        self.attribute(ID_ATTRIBUTE)
    }

    /// Value of the `name` attribute
    pub fn name(&self) -> Option<String> {
        self.attribute(NAME_ATTRIBUTE)
    }

    pub fn class_list(&self) -> Vec<String> {
        self.attribute(CLASS_ATTRIBUTE)
            .map(|v| class_tokens(&v).map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, token: &str) -> bool {
        let state = self.node.state.read();
        state
            .attributes
            .iter()
            .find(|(n, _)| n == CLASS_ATTRIBUTE)
            .map(|(_, v)| class_tokens(v).any(|t| t == token))
            .unwrap_or(false)
    }

    pub fn parent(&self) -> Option<Element> {
        self.node
            .state
            .read()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|node| Element { node })
    }

    pub fn children(&self) -> Vec<Element> {
        self.node.state.read().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.node.state.read().children.len()
    }

    /// Descendants in document order, excluding `self`
    pub fn descendants(&self) -> Vec<Element> {
        let mut out = Vec::new();
        let mut stack: Vec<Element> = self.children().into_iter().rev().collect();
        while let Some(el) = stack.pop() {
            stack.extend(el.children().into_iter().rev());
            out.push(el);
        }
        out
    }

    /// `self` followed by its descendants in document order
    pub fn subtree(&self) -> Vec<Element> {
        let mut out = vec![self.clone()];
        out.extend(self.descendants());
        out
    }

    /// Topmost ancestor reachable through live parent links
    pub fn top(&self) -> Element {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Whether `self` is `other` or one of its ancestors
    pub fn is_inclusive_ancestor_of(&self, other: &Element) -> bool {
        let mut current = Some(other.clone());
        while let Some(el) = current {
            if el.ptr_eq(self) {
                return true;
            }
            current = el.parent();
        }
        false
    }

    pub fn ptr_eq(&self, other: &Element) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    pub fn downgrade(&self) -> WeakElement {
        WeakElement {
            uid: self.node.uid,
            node: Arc::downgrade(&self.node),
        }
    }

    pub(crate) fn set_attribute_raw(&self, name: &str, value: &str) -> Option<String> {
        let mut state = self.node.state.write();
        match state.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => Some(std::mem::replace(v, value.to_string())),
            None => {
                state.attributes.push((name.to_string(), value.to_string()));
                None
            }
        }
    }

    pub(crate) fn remove_attribute_raw(&self, name: &str) -> Option<String> {
        let mut state = self.node.state.write();
        let pos = state.attributes.iter().position(|(n, _)| n == name)?;
        Some(state.attributes.remove(pos).1)
    }

    /// Insert `child` before `reference`, or append when `reference` is `None`
    /// or not a child of `self`. The caller has already detached `child`.
    pub(crate) fn insert_child_raw(&self, child: &Element, reference: Option<&Element>) {
        {
            let mut state = self.node.state.write();
            let pos = reference
                .and_then(|r| state.children.iter().position(|c| c.ptr_eq(r)))
                .unwrap_or(state.children.len());
            state.children.insert(pos, child.clone());
        }
        child.node.state.write().parent = Some(Arc::downgrade(&self.node));
    }

    /// Unlink `self` from its parent, returning the former parent
    pub(crate) fn detach_raw(&self) -> Option<Element> {
        let parent = self.parent()?;
        parent
            .node
            .state
            .write()
            .children
            .retain(|c| !c.ptr_eq(self));
        self.node.state.write().parent = None;
        Some(parent)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.uid.hash(state);
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag_name())?;
        if let Some(id) = self.id() {
            write!(f, "#{}", id)?;
        }
        for class in self.class_list() {
            write!(f, ".{}", class)?;
        }
        write!(f, " {}>", self.uid())
    }
}

impl WeakElement {
    pub fn uid(&self) -> ElementId {
        self.uid
    }

    pub fn upgrade(&self) -> Option<Element> {
        self.node.upgrade().map(|node| Element { node })
    }

    /// Whether the element has been reclaimed
    pub fn is_dead(&self) -> bool {
        self.node.strong_count() == 0
    }
}

impl fmt::Debug for WeakElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakElement")
            .field("uid", &self.uid)
            .field("alive", &!self.is_dead())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(tag: &str) -> Element {
        Element::new(tag)
    }

    #[test]
    fn test_attributes_and_classes() {
        let e = el("DIV");
        assert_eq!(e.tag_name(), "div");
        assert_eq!(e.set_attribute_raw("class", "a b"), None);
        assert_eq!(e.set_attribute_raw("class", "b c"), Some("a b".to_string()));
        assert!(e.has_class("c"));
        assert!(!e.has_class("a"));
        assert_eq!(e.class_list(), vec!["b", "c"]);
        assert_eq!(e.remove_attribute_raw("class"), Some("b c".to_string()));
        assert!(e.class_list().is_empty());
    }

    #[test]
    fn test_tree_links() {
        let root = el("html");
        let a = el("div");
        let b = el("span");
        root.insert_child_raw(&a, None);
        a.insert_child_raw(&b, None);

        assert!(b.parent().unwrap().ptr_eq(&a));
        assert!(b.top().ptr_eq(&root));
        assert!(root.is_inclusive_ancestor_of(&b));
        assert!(!b.is_inclusive_ancestor_of(&root));
        assert_eq!(root.descendants(), vec![a.clone(), b.clone()]);

        let former = a.detach_raw().unwrap();
        assert!(former.ptr_eq(&root));
        assert!(a.parent().is_none());
        assert_eq!(root.child_count(), 0);
        // Detached subtree stays intact
        assert!(b.top().ptr_eq(&a));
    }

    #[test]
    fn test_insert_before() {
        let root = el("ul");
        let first = el("li");
        let second = el("li");
        root.insert_child_raw(&second, None);
        root.insert_child_raw(&first, Some(&second));
        assert_eq!(root.children(), vec![first, second]);
    }

    #[test]
    fn test_weak_handle_does_not_keep_alive() {
        let e = el("p");
        let weak = e.downgrade();
        assert!(weak.upgrade().is_some());
        drop(e);
        assert!(weak.is_dead());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_detached_child_is_reclaimed_with_parent() {
        let root = el("div");
        let child = el("span");
        root.insert_child_raw(&child, None);
        let weak_child = child.downgrade();
        drop(child);
        assert!(!weak_child.is_dead());
        drop(root);
        assert!(weak_child.is_dead());
    }
}
