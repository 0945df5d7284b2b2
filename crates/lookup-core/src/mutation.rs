//! Mutation notifications
//!
//! Documents push batches of [`MutationRecord`]s to every subscriber whose
//! [`ObserveOptions`] admit them. A subscription is detached by dropping its
//! [`MutationStream`].

use crate::element::Element;
use crate::types::{CLASS_ATTRIBUTE, ID_ATTRIBUTE, NAME_ATTRIBUTE};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// A single change to the tree
#[derive(Debug, Clone)]
pub enum MutationRecord {
    /// Children were added to and/or removed from `target`
    ChildList {
        target: Element,
        added: Vec<Element>,
        removed: Vec<Element>,
    },
    /// An attribute of `target` changed
    Attributes {
        target: Element,
        name: String,
        old_value: Option<String>,
        new_value: Option<String>,
    },
}

impl MutationRecord {
    pub fn target(&self) -> &Element {
        match self {
            MutationRecord::ChildList { target, .. } => target,
            MutationRecord::Attributes { target, .. } => target,
        }
    }

    /// Whether the record adds or removes nodes
    pub fn is_structural(&self) -> bool {
        matches!(self, MutationRecord::ChildList { .. })
    }
}

/// Notifications delivered together
pub type MutationBatch = Vec<MutationRecord>;

/// Filter applied to a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Report added/removed children
    pub child_list: bool,
    /// Report changes anywhere below the observed root, not only on it
    pub subtree: bool,
    /// Report attribute changes for these names only; `None` means none
    pub attribute_filter: Option<Vec<String>>,
    /// Keep the previous attribute value in records
    pub attribute_old_value: bool,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            child_list: true,
            subtree: false,
            attribute_filter: None,
            attribute_old_value: false,
        }
    }
}

impl ObserveOptions {
    /// Subtree-wide child list changes plus `id`, `class` and `name`
    /// attribute changes with their previous values
    pub fn lookup_attributes() -> Self {
        Self {
            child_list: true,
            subtree: true,
            attribute_filter: Some(vec![
                ID_ATTRIBUTE.to_string(),
                CLASS_ATTRIBUTE.to_string(),
                NAME_ATTRIBUTE.to_string(),
            ]),
            attribute_old_value: true,
        }
    }

    pub fn with_subtree(mut self, subtree: bool) -> Self {
        self.subtree = subtree;
        self
    }

    pub fn with_attribute_filter<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_filter = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_attribute_old_value(mut self, keep: bool) -> Self {
        self.attribute_old_value = keep;
        self
    }

    /// Filter and shape `record` for a subscriber observing `root`
    pub(crate) fn admit(&self, record: &MutationRecord, root: &Element) -> Option<MutationRecord> {
        let in_scope = if self.subtree {
            root.is_inclusive_ancestor_of(record.target())
        } else {
            record.target().ptr_eq(root)
        };
        if !in_scope {
            return None;
        }

        match record {
            MutationRecord::ChildList { .. } => self.child_list.then(|| record.clone()),
            MutationRecord::Attributes {
                target,
                name,
                old_value,
                new_value,
            } => {
                let allowed = self
                    .attribute_filter
                    .as_ref()
                    .map(|names| names.iter().any(|n| n == name))
                    .unwrap_or(false);
                if !allowed {
                    return None;
                }
                Some(MutationRecord::Attributes {
                    target: target.clone(),
                    name: name.clone(),
                    old_value: if self.attribute_old_value {
                        old_value.clone()
                    } else {
                        None
                    },
                    new_value: new_value.clone(),
                })
            }
        }
    }
}

/// Receiving end of a subscription
#[derive(Debug)]
pub struct MutationStream {
    receiver: mpsc::UnboundedReceiver<MutationBatch>,
}

impl MutationStream {
    pub(crate) fn channel() -> (mpsc::UnboundedSender<MutationBatch>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { receiver: rx })
    }

    /// Next batch, or `None` once the document is gone
    pub async fn recv(&mut self) -> Option<MutationBatch> {
        self.receiver.recv().await
    }

    /// Poll for the next batch, for consumers that keep the stream behind a lock
    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<MutationBatch>> {
        self.receiver.poll_recv(cx)
    }

    /// Next batch if one is already queued
    pub fn try_recv(&mut self) -> Option<MutationBatch> {
        self.receiver.try_recv().ok()
    }

    /// Drain every queued batch into one
    pub fn take_records(&mut self) -> MutationBatch {
        let mut records = Vec::new();
        while let Ok(batch) = self.receiver.try_recv() {
            records.extend(batch);
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr_record(target: &Element, name: &str) -> MutationRecord {
        MutationRecord::Attributes {
            target: target.clone(),
            name: name.to_string(),
            old_value: Some("old".to_string()),
            new_value: Some("new".to_string()),
        }
    }

    #[test]
    fn test_attribute_filter() {
        let root = Element::new("html");
        let options = ObserveOptions::lookup_attributes();

        assert!(options.admit(&attr_record(&root, "class"), &root).is_some());
        assert!(options.admit(&attr_record(&root, "style"), &root).is_none());
    }

    #[test]
    fn test_old_value_stripped_unless_requested() {
        let root = Element::new("html");
        let options = ObserveOptions::default().with_attribute_filter(["id"]);

        match options.admit(&attr_record(&root, "id"), &root) {
            Some(MutationRecord::Attributes { old_value, new_value, .. }) => {
                assert_eq!(old_value, None);
                assert_eq!(new_value.as_deref(), Some("new"));
            }
            other => panic!("Expected attribute record, got {:?}", other),
        }
    }

    #[test]
    fn test_subtree_scope() {
        let root = Element::new("html");
        let child = Element::new("div");
        root.insert_child_raw(&child, None);
        let stray = Element::new("div");

        let record = attr_record(&child, "id");
        let shallow = ObserveOptions::default().with_attribute_filter(["id"]);
        assert!(shallow.admit(&record, &root).is_none());
        assert!(shallow.clone().with_subtree(true).admit(&record, &root).is_some());
        assert!(ObserveOptions::lookup_attributes()
            .admit(&attr_record(&stray, "id"), &root)
            .is_none());
    }

    #[tokio::test]
    async fn test_stream_take_records() {
        let (tx, mut stream) = MutationStream::channel();
        let root = Element::new("html");
        tx.send(vec![attr_record(&root, "id")]).unwrap();
        tx.send(vec![attr_record(&root, "class"), attr_record(&root, "name")])
            .unwrap();
        assert_eq!(stream.take_records().len(), 3);
        assert!(stream.try_recv().is_none());
        drop(tx);
        assert!(stream.recv().await.is_none());
    }
}
