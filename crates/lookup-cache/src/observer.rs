//! Change observation
//!
//! [`AffectedIdentifiers::classify`] turns raw mutation records into the
//! identifiers they may have affected. [`ChangeObserver`] owns the task that
//! drains the host subscription and hands each batch to the cache.

use ahash::AHashSet;
use lookup_core::{
    class_tokens, Element, LookupError, MutationRecord, MutationStream, ObserveOptions, TreeHost,
    CLASS_ATTRIBUTE, ID_ATTRIBUTE, NAME_ATTRIBUTE,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Poll;
use tokio::task::JoinHandle;

/// Identifiers touched by the records of one debounce window
#[derive(Debug, Default, Clone)]
pub struct AffectedIdentifiers {
    pub ids: AHashSet<String>,
    pub classes: AHashSet<String>,
    pub tags: AHashSet<String>,
    pub names: AHashSet<String>,
    /// Set when any record added or removed nodes
    pub structural: bool,
    /// Records folded into this set
    pub records: usize,
}

impl AffectedIdentifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(records: &[MutationRecord]) -> Self {
        let mut affected = Self::new();
        for record in records {
            affected.add_record(record);
        }
        affected
    }

    pub fn add_record(&mut self, record: &MutationRecord) {
        self.records += 1;
        match record {
            MutationRecord::ChildList { added, removed, .. } => {
                self.structural = true;
                for element in added.iter().chain(removed) {
                    self.add_subtree(element);
                }
            }
            MutationRecord::Attributes {
                name,
                old_value,
                new_value,
                ..
            } => {
                for value in [old_value, new_value].into_iter().flatten() {
                    self.add_attribute_value(name, value);
                }
            }
        }
    }

    /// Every identifier carried by `root` and its descendants
    pub fn add_subtree(&mut self, root: &Element) {
        for element in root.subtree() {
            self.tags.insert(element.tag_name().to_string());
            for (name, value) in element.attributes() {
                self.add_attribute_value(&name, &value);
            }
        }
    }

    fn add_attribute_value(&mut self, name: &str, value: &str) {
        match name {
            ID_ATTRIBUTE => {
                self.ids.insert(value.to_string());
            }
            CLASS_ATTRIBUTE => {
                self.classes.extend(class_tokens(value).map(str::to_string));
            }
            NAME_ATTRIBUTE => {
                self.names.insert(value.to_string());
            }
            _ => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.structural
            && self.ids.is_empty()
            && self.classes.is_empty()
            && self.tags.is_empty()
            && self.names.is_empty()
    }

    /// Every token of every set
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.ids
            .iter()
            .chain(self.classes.iter())
            .chain(self.tags.iter())
            .chain(self.names.iter())
            .map(String::as_str)
    }
}

/// Receives notification batches drained from the host subscription
pub(crate) trait MutationSink: Send + Sync + 'static {
    fn deliver(&self, batch: Vec<MutationRecord>);
}

/// Owner of the subscription-draining task
#[derive(Debug, Default)]
pub struct ChangeObserver {
    task: Mutex<Option<JoinHandle<()>>>,
    attached: Arc<AtomicBool>,
    /// The live subscription, shared with the draining task
    stream: Arc<Mutex<Option<MutationStream>>>,
}

impl ChangeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a subscription is currently delivering notifications
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Subscribe right away when the host allows it, otherwise wait for the
    /// host to become ready and retry once. Needs a tokio runtime.
    pub(crate) fn attach<S>(
        &self,
        runtime: &tokio::runtime::Handle,
        host: Arc<dyn TreeHost>,
        sink: std::sync::Weak<S>,
    ) where
        S: MutationSink,
    {
        let mut task = self.task.lock();
        if task.as_ref().map(|t| !t.is_finished()).unwrap_or(false) {
            return;
        }

        let options = ObserveOptions::lookup_attributes();
        let attached = Arc::clone(&self.attached);
        let slot = Arc::clone(&self.stream);
        let first_error = match host.subscribe(options.clone()) {
            Ok(stream) => {
                *self.stream.lock() = Some(stream);
                attached.store(true, Ordering::Release);
                tracing::info!("Change observer attached");
                None
            }
            Err(err) => Some(err),
        };

        *task = Some(runtime.spawn(async move {
            if let Some(err) = first_error {
                match retry_after_ready(host.as_ref(), options, err).await {
                    Some(stream) => {
                        *slot.lock() = Some(stream);
                        attached.store(true, Ordering::Release);
                        tracing::info!("Change observer attached after host became ready");
                    }
                    None => return,
                }
            }
            drain(&slot, sink).await;
            slot.lock().take();
            attached.store(false, Ordering::Release);
        }));
    }

    /// Stop delivering notifications. Dropping the stream ends the subscription.
    pub fn detach(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            tracing::debug!("Change observer detached");
        }
        self.stream.lock().take();
        self.attached.store(false, Ordering::Release);
    }

    /// Records already sent by the host but not yet handed to the sink
    pub(crate) fn take_queued(&self) -> Vec<MutationRecord> {
        self.stream
            .lock()
            .as_mut()
            .map(MutationStream::take_records)
            .unwrap_or_default()
    }
}

async fn retry_after_ready(
    host: &dyn TreeHost,
    options: ObserveOptions,
    err: LookupError,
) -> Option<MutationStream> {
    tracing::warn!(
        "Change observer could not attach ({}); relying on sweeps until the host is ready",
        err
    );
    host.ready().await;
    match host.subscribe(options) {
        Ok(stream) => Some(stream),
        Err(err) => {
            tracing::warn!(
                "Change observer retry failed ({}); invalidation falls back to sweeps",
                err
            );
            None
        }
    }
}

async fn drain<S: MutationSink>(slot: &Mutex<Option<MutationStream>>, sink: std::sync::Weak<S>) {
    // The lock is only held while polling so `take_queued` can drain in between
    let next = || {
        std::future::poll_fn(|cx| match slot.lock().as_mut() {
            Some(stream) => stream.poll_recv(cx),
            None => Poll::Ready(None),
        })
    };
    while let Some(batch) = next().await {
        let Some(sink) = sink.upgrade() else {
            break;
        };
        sink.deliver(batch);
    }
}
