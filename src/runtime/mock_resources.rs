//! In-memory resource managers for exercising the engine without a cloud.
//!
//! The store mimics the account/container/object hierarchy the harness
//! normally drives through real resource managers. Creation helpers gate on
//! the run mode, so exploratory passes stay side-effect free, and register
//! every created resource with the run's ledger.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::{AccountHandle, Asserter, ResourceHandle, Variation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Container,
    Object,
}

#[derive(Debug, Clone)]
struct Entry {
    kind: EntryKind,
    body: Vec<u8>,
}

/// Shared in-memory backing store, keyed by canonical `/`-joined paths.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    entries: Arc<Mutex<BTreeMap<String, Entry>>>,
}

impl MockStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn account(&self, name: &str) -> MockAccount {
        MockAccount {
            store: self.clone(),
            name: name.to_string(),
        }
    }

    pub fn contains(&self, canon: &str) -> bool {
        self.lock().contains_key(canon)
    }

    pub fn paths(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn insert(&self, canon: &str, kind: EntryKind, body: Vec<u8>) {
        self.lock().insert(canon.to_string(), Entry { kind, body });
    }

    fn remove_subtree(&self, canon: &str) {
        let prefix = format!("{canon}/");
        self.lock()
            .retain(|path, _| path != canon && !path.starts_with(&prefix));
    }
}

#[derive(Debug, Clone)]
pub struct MockAccount {
    store: MockStore,
    name: String,
}

impl MockAccount {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn container(&self, name: &str) -> MockContainer {
        MockContainer {
            store: self.store.clone(),
            account: self.name.clone(),
            name: name.to_string(),
            deletable: true,
        }
    }
}

impl AccountHandle for MockAccount {
    fn account_name(&self) -> String {
        self.name.clone()
    }

    fn delete_account(&self, a: &mut dyn Asserter) {
        self.store.remove_subtree(&self.name);
        a.log(&format!("deleted account {}", self.name));
    }
}

#[derive(Debug, Clone)]
pub struct MockContainer {
    store: MockStore,
    account: String,
    name: String,
    deletable: bool,
}

impl MockContainer {
    /// A container whose handle exposes no delete operation, like a local
    /// filesystem root the harness must not remove.
    pub fn without_delete(mut self) -> Self {
        self.deletable = false;
        self
    }

    pub fn create(&self, v: &mut Variation) {
        if v.is_exploratory() {
            return;
        }
        self.store.insert(&self.canon(), EntryKind::Container, Vec::new());
        v.track_resource(Arc::new(self.clone()));
    }

    pub fn exists(&self) -> bool {
        self.store.contains(&self.canon())
    }

    pub fn object(&self, name: &str) -> MockObject {
        MockObject {
            store: self.store.clone(),
            container: self.canon(),
            name: name.to_string(),
        }
    }

    pub fn objects(&self) -> Vec<(String, Vec<u8>)> {
        let prefix = format!("{}/", self.canon());
        self.store
            .lock()
            .iter()
            .filter(|(path, entry)| entry.kind == EntryKind::Object && path.starts_with(&prefix))
            .map(|(path, entry)| (path[prefix.len()..].to_string(), entry.body.clone()))
            .collect()
    }
}

impl ResourceHandle for MockContainer {
    fn canon(&self) -> String {
        format!("{}/{}", self.account, self.name)
    }

    fn supports_delete(&self) -> bool {
        self.deletable
    }

    fn delete(&self, a: &mut dyn Asserter) {
        let canon = self.canon();
        self.store.remove_subtree(&canon);
        a.log(&format!("deleted container {canon}"));
    }
}

#[derive(Debug, Clone)]
pub struct MockObject {
    store: MockStore,
    container: String,
    name: String,
}

impl MockObject {
    pub fn create(&self, v: &mut Variation, body: &[u8]) {
        if v.is_exploratory() {
            return;
        }
        self.store.insert(&self.canon(), EntryKind::Object, body.to_vec());
        v.track_resource(Arc::new(self.clone()));
    }

    /// Direct write, bypassing run-mode gating and tracking. Stands in for
    /// side effects performed by the external copy tool itself.
    pub fn put(&self, body: &[u8]) {
        self.store.insert(&self.canon(), EntryKind::Object, body.to_vec());
    }

    pub fn exists(&self) -> bool {
        self.store.contains(&self.canon())
    }

    pub fn body(&self) -> Option<Vec<u8>> {
        self.store.lock().get(&self.canon()).map(|e| e.body.clone())
    }
}

impl ResourceHandle for MockObject {
    fn canon(&self) -> String {
        format!("{}/{}", self.container, self.name)
    }

    fn supports_delete(&self) -> bool {
        true
    }

    fn delete(&self, a: &mut dyn Asserter) {
        let canon = self.canon();
        self.store.lock().remove(&canon);
        a.log(&format!("deleted object {canon}"));
    }
}
