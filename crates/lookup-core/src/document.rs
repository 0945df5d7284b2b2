//! Live document
//!
//! The document owns the root element, applies mutations and publishes a
//! [`MutationRecord`] for each of them to every subscriber whose options
//! admit it. Records are filtered at the moment the change happens, so a
//! subscriber never sees changes made to subtrees that were detached at the
//! time.

use crate::collection::LiveCollection;
use crate::element::Element;
use crate::error::{LookupError, Result};
use crate::mutation::{MutationBatch, MutationRecord, MutationStream, ObserveOptions};
use crate::selector::Selector;
use crate::types::{class_tokens, QueryKind, CLASS_ATTRIBUTE};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

struct Subscriber {
    options: ObserveOptions,
    sender: mpsc::UnboundedSender<MutationBatch>,
    pending: Vec<MutationRecord>,
}

#[derive(Default)]
struct Subscribers {
    list: Vec<Subscriber>,
    batch_depth: usize,
}

struct DocumentInner {
    root: Element,
    version: AtomicU64,
    subscribers: Mutex<Subscribers>,
    ready: watch::Sender<bool>,
}

/// Shared handle to a mutable element tree
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

impl Document {
    /// Empty document with an `html` root, ready for subscriptions
    pub fn new() -> Self {
        Self::with_root("html", true)
    }

    /// Document whose mutation subscriptions fail until [`Document::mark_ready`]
    pub fn pending() -> Self {
        Self::with_root("html", false)
    }

    pub fn with_root(tag: &str, ready: bool) -> Self {
        let (ready_tx, _) = watch::channel(ready);
        Self {
            inner: Arc::new(DocumentInner {
                root: Element::new(tag),
                version: AtomicU64::new(0),
                subscribers: Mutex::new(Subscribers::default()),
                ready: ready_tx,
            }),
        }
    }

    pub fn root(&self) -> Element {
        self.inner.root.clone()
    }

    /// Counter bumped by every mutation
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready.borrow()
    }

    /// Allow subscriptions and wake anyone waiting in [`Document::wait_ready`]
    pub fn mark_ready(&self) {
        self.inner.ready.send_replace(true);
        tracing::debug!("Document marked ready");
    }

    pub async fn wait_ready(&self) {
        let mut rx = self.inner.ready.subscribe();
        // The sender lives as long as `self`, so this only fails on teardown
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Whether `element` is currently part of this document
    pub fn contains(&self, element: &Element) -> bool {
        self.inner.root.is_inclusive_ancestor_of(element)
    }

    /// Every attached element in document order
    pub fn all_elements(&self) -> Vec<Element> {
        self.inner.root.subtree()
    }

    /// New detached element
    pub fn create_element(&self, tag: &str) -> Element {
        Element::new(tag)
    }

    pub fn append_child(&self, parent: &Element, child: &Element) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` under `parent` before `reference` (append when `None`),
    /// moving it out of its current parent first
    pub fn insert_before(
        &self,
        parent: &Element,
        child: &Element,
        reference: Option<&Element>,
    ) -> Result<()> {
        if child.ptr_eq(&self.inner.root) {
            return Err(LookupError::Hierarchy(
                "the document root cannot be re-parented".to_string(),
            ));
        }
        if child.is_inclusive_ancestor_of(parent) {
            return Err(LookupError::Hierarchy(format!(
                "{:?} cannot be inserted into its own subtree",
                child
            )));
        }
        if let Some(reference) = reference {
            let is_child = reference.parent().map(|p| p.ptr_eq(parent)).unwrap_or(false);
            if !is_child {
                return Err(LookupError::NodeNotFound(format!(
                    "{:?} is not a child of {:?}",
                    reference, parent
                )));
            }
            if reference.ptr_eq(child) {
                return Ok(());
            }
        }

        if let Some(former) = child.detach_raw() {
            self.emit(MutationRecord::ChildList {
                target: former,
                added: Vec::new(),
                removed: vec![child.clone()],
            });
        }
        parent.insert_child_raw(child, reference);
        self.emit(MutationRecord::ChildList {
            target: parent.clone(),
            added: vec![child.clone()],
            removed: Vec::new(),
        });
        Ok(())
    }

    /// Detach `element` from its parent. Detaching an orphan is a no-op.
    pub fn remove(&self, element: &Element) -> Result<()> {
        if element.ptr_eq(&self.inner.root) {
            return Err(LookupError::Hierarchy(
                "the document root cannot be removed".to_string(),
            ));
        }
        if let Some(former) = element.detach_raw() {
            self.emit(MutationRecord::ChildList {
                target: former,
                added: Vec::new(),
                removed: vec![element.clone()],
            });
        }
        Ok(())
    }

    pub fn set_attribute(&self, element: &Element, name: &str, value: &str) {
        let old_value = element.set_attribute_raw(name, value);
        self.emit(MutationRecord::Attributes {
            target: element.clone(),
            name: name.to_string(),
            old_value,
            new_value: Some(value.to_string()),
        });
    }

    pub fn remove_attribute(&self, element: &Element, name: &str) -> Option<String> {
        let old_value = element.remove_attribute_raw(name)?;
        self.emit(MutationRecord::Attributes {
            target: element.clone(),
            name: name.to_string(),
            old_value: Some(old_value.clone()),
            new_value: None,
        });
        Some(old_value)
    }

    /// Add a class token unless already present
    pub fn add_class(&self, element: &Element, token: &str) {
        if element.has_class(token) {
            return;
        }
        let mut classes = element.class_list();
        classes.push(token.to_string());
        self.set_attribute(element, CLASS_ATTRIBUTE, &classes.join(" "));
    }

    /// Remove every occurrence of a class token
    pub fn remove_class(&self, element: &Element, token: &str) {
        if !element.has_class(token) {
            return;
        }
        let value = element.attribute(CLASS_ATTRIBUTE).unwrap_or_default();
        let remaining: Vec<&str> = class_tokens(&value).filter(|t| *t != token).collect();
        self.set_attribute(element, CLASS_ATTRIBUTE, &remaining.join(" "));
    }

    /// Run `f` and deliver the records it produces as one batch per subscriber
    pub fn batch<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        self.inner.subscribers.lock().batch_depth += 1;
        let result = f(self);
        let mut subs = self.inner.subscribers.lock();
        subs.batch_depth -= 1;
        if subs.batch_depth == 0 {
            subs.list.retain_mut(|sub| {
                if sub.pending.is_empty() {
                    return !sub.sender.is_closed();
                }
                let batch = std::mem::take(&mut sub.pending);
                sub.sender.send(batch).is_ok()
            });
        }
        result
    }

    /// Register for mutation notifications under the root
    pub fn subscribe(&self, options: ObserveOptions) -> Result<MutationStream> {
        if !self.is_ready() {
            return Err(LookupError::ObserverAttachment(
                "document is not materialized yet".to_string(),
            ));
        }
        if !options.child_list && options.attribute_filter.is_none() {
            return Err(LookupError::ObserverAttachment(
                "options must observe child lists or attributes".to_string(),
            ));
        }
        let (sender, stream) = MutationStream::channel();
        self.inner.subscribers.lock().list.push(Subscriber {
            options,
            sender,
            pending: Vec::new(),
        });
        Ok(stream)
    }

    /// Live subscriptions; dropped streams are pruned first
    pub fn subscriber_count(&self) -> usize {
        let mut subs = self.inner.subscribers.lock();
        subs.list.retain(|sub| !sub.sender.is_closed());
        subs.list.len()
    }

    fn emit(&self, record: MutationRecord) {
        self.inner.version.fetch_add(1, Ordering::AcqRel);

        let mut subs = self.inner.subscribers.lock();
        let batching = subs.batch_depth > 0;
        let root = &self.inner.root;
        subs.list.retain_mut(|sub| {
            if sub.sender.is_closed() {
                return false;
            }
            let Some(admitted) = sub.options.admit(&record, root) else {
                return true;
            };
            if batching {
                sub.pending.push(admitted);
                true
            } else {
                sub.sender.send(vec![admitted]).is_ok()
            }
        });
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<Element> {
        self.all_elements()
            .into_iter()
            .find(|el| el.id().as_deref() == Some(id))
    }

    pub fn elements_by_class(&self, classes: &str) -> Result<LiveCollection> {
        LiveCollection::new(self.clone(), QueryKind::CollectionByClass, classes)
    }

    pub fn elements_by_tag(&self, tag: &str) -> Result<LiveCollection> {
        LiveCollection::new(self.clone(), QueryKind::CollectionByTag, tag)
    }

    pub fn elements_by_name(&self, name: &str) -> Result<LiveCollection> {
        LiveCollection::new(self.clone(), QueryKind::CollectionByName, name)
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>> {
        Ok(Selector::parse(selector)?.select_all(&self.inner.root))
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<Element>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.inner.root)
            .field("version", &self.version())
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(doc: &Document, tag: &str, id: &str) -> Element {
        let el = doc.create_element(tag);
        doc.set_attribute(&el, "id", id);
        doc.append_child(&doc.root(), &el).unwrap();
        el
    }

    #[test]
    fn test_lookup_by_id_and_selector() {
        let doc = Document::new();
        let a = child(&doc, "div", "a");
        let b = child(&doc, "span", "b");

        assert_eq!(doc.get_element_by_id("a"), Some(a.clone()));
        assert_eq!(doc.get_element_by_id("missing"), None);
        assert_eq!(doc.query_selector("span#b").unwrap(), Some(b));
        assert!(doc.query_selector("span[").is_err());
        assert!(doc.contains(&a));
    }

    #[test]
    fn test_hierarchy_errors() {
        let doc = Document::new();
        let a = child(&doc, "div", "a");
        let inner = doc.create_element("p");
        doc.append_child(&a, &inner).unwrap();

        assert!(matches!(
            doc.append_child(&inner, &a),
            Err(LookupError::Hierarchy(_))
        ));
        assert!(doc.remove(&doc.root()).is_err());
        let stray = doc.create_element("i");
        assert!(matches!(
            doc.insert_before(&a, &stray, Some(&stray)),
            Err(LookupError::NodeNotFound(_))
        ));
        // Removing an orphan is allowed
        assert!(doc.remove(&stray).is_ok());
    }

    #[test]
    fn test_subscription_receives_records() {
        let doc = Document::new();
        let mut stream = doc.subscribe(ObserveOptions::lookup_attributes()).unwrap();

        let a = child(&doc, "div", "a");
        doc.set_attribute(&a, "style", "color: red");
        doc.set_attribute(&a, "class", "x");

        let records = stream.take_records();
        // set id on a detached element is out of scope; append + class change are in
        assert_eq!(records.len(), 2);
        assert!(records[0].is_structural());
        match &records[1] {
            MutationRecord::Attributes { name, old_value, new_value, .. } => {
                assert_eq!(name, "class");
                assert_eq!(old_value, &None);
                assert_eq!(new_value.as_deref(), Some("x"));
            }
            other => panic!("Expected attribute record, got {:?}", other),
        }
    }

    #[test]
    fn test_batch_delivers_once() {
        let doc = Document::new();
        let mut stream = doc.subscribe(ObserveOptions::lookup_attributes()).unwrap();

        doc.batch(|d| {
            for i in 0..5 {
                child(d, "li", &format!("i{}", i));
            }
        });

        let batch = stream.try_recv().unwrap();
        assert_eq!(batch.len(), 5);
        assert!(stream.try_recv().is_none());
    }

    #[test]
    fn test_move_emits_removal_then_addition() {
        let doc = Document::new();
        let a = child(&doc, "div", "a");
        let b = child(&doc, "div", "b");
        let item = doc.create_element("li");
        doc.append_child(&a, &item).unwrap();

        let mut stream = doc.subscribe(ObserveOptions::lookup_attributes()).unwrap();
        doc.append_child(&b, &item).unwrap();

        let records = stream.take_records();
        assert_eq!(records.len(), 2);
        match &records[0] {
            MutationRecord::ChildList { target, removed, .. } => {
                assert_eq!(target, &a);
                assert_eq!(removed, &vec![item.clone()]);
            }
            other => panic!("Expected child list record, got {:?}", other),
        }
    }

    #[test]
    fn test_dropping_stream_detaches() {
        let doc = Document::new();
        let stream = doc.subscribe(ObserveOptions::lookup_attributes()).unwrap();
        assert_eq!(doc.subscriber_count(), 1);
        drop(stream);
        assert_eq!(doc.subscriber_count(), 0);
    }

    #[test]
    fn test_pending_document_rejects_subscription() {
        let doc = Document::pending();
        assert!(matches!(
            doc.subscribe(ObserveOptions::lookup_attributes()),
            Err(LookupError::ObserverAttachment(_))
        ));
        doc.mark_ready();
        assert!(doc.subscribe(ObserveOptions::lookup_attributes()).is_ok());
    }

    #[tokio::test]
    async fn test_wait_ready() {
        let doc = Document::pending();
        let waiter = {
            let doc = doc.clone();
            tokio::spawn(async move { doc.wait_ready().await })
        };
        doc.mark_ready();
        waiter.await.unwrap();
        assert!(doc.is_ready());
    }

    #[test]
    fn test_class_helpers() {
        let doc = Document::new();
        let a = child(&doc, "div", "a");
        doc.add_class(&a, "x");
        doc.add_class(&a, "y");
        doc.add_class(&a, "x");
        assert_eq!(a.class_list(), vec!["x", "y"]);
        doc.remove_class(&a, "x");
        assert_eq!(a.class_list(), vec!["y"]);
    }

    #[test]
    fn test_version_tracks_mutations() {
        let doc = Document::new();
        let before = doc.version();
        let a = child(&doc, "div", "a");
        assert_eq!(doc.version(), before + 2);
        doc.remove(&a).unwrap();
        assert_eq!(doc.version(), before + 3);
    }
}
