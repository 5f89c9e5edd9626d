#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use colloquy_core::{
    Activity, Adapter, AdapterError, AdapterResult, ConversationReference, DeliveryReceipt,
    IncomingMessage,
};
use colloquy_dialog::{
    DialogEngine, DialogOptions, DialogSession, DialogSet, MemoryStorage, Storage, StorageError,
    StorageResult,
};
use parking_lot::Mutex;

/// Adapter recording every delivered activity.
#[derive(Default)]
pub struct RecordingAdapter {
    sent: Mutex<Vec<Activity>>,
    fail_on: Mutex<Option<String>>,
}

impl RecordingAdapter {
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|a| a.text_or_empty().to_string())
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    /// Makes delivery of `text` fail.
    pub fn fail_on(&self, text: &str) {
        *self.fail_on.lock() = Some(text.to_string());
    }
}

#[async_trait]
impl Adapter for RecordingAdapter {
    fn name(&self) -> &str {
        "test"
    }

    async fn send(
        &self,
        activity: &Activity,
        _reference: &ConversationReference,
    ) -> AdapterResult<DeliveryReceipt> {
        let rejected = self.fail_on.lock().clone();
        if rejected.is_some() && rejected == activity.text {
            return Err(AdapterError::delivery("test", "rejected"));
        }
        let mut sent = self.sent.lock();
        sent.push(activity.clone());
        Ok(DeliveryReceipt::new("test").with_id(sent.len().to_string()))
    }
}

/// Memory storage counting writes.
#[derive(Default)]
pub struct CountingStorage {
    inner: MemoryStorage,
    saves: AtomicUsize,
    deletes: AtomicUsize,
    fail_saves: AtomicBool,
}

impl CountingStorage {
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl Storage for CountingStorage {
    async fn load(&self, key: &str) -> StorageResult<Option<DialogSession>> {
        self.inner.load(key).await
    }

    async fn save(&self, key: &str, session: &DialogSession) -> StorageResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::backend("disk full"));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(key, session).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }
}

pub struct Harness {
    pub engine: DialogEngine,
    pub adapter: Arc<RecordingAdapter>,
    pub storage: Arc<CountingStorage>,
}

pub fn harness(dialogs: DialogSet) -> Harness {
    harness_with(dialogs, DialogOptions::default())
}

pub fn harness_with(dialogs: DialogSet, options: DialogOptions) -> Harness {
    let adapter = Arc::new(RecordingAdapter::default());
    let storage = Arc::new(CountingStorage::default());
    let engine = DialogEngine::new(dialogs, adapter.clone(), storage.clone()).with_options(options);
    Harness {
        engine,
        adapter,
        storage,
    }
}

pub fn reference() -> ConversationReference {
    ConversationReference::new("test", "room-1", "ann")
}

pub fn reply(text: &str) -> IncomingMessage {
    IncomingMessage::text(reference(), text)
}
