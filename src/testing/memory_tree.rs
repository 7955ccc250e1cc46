use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::drive::{FolderRef, ItemKind, NameMatch, RemoteError, RemoteOperation, RemoteTree};

#[derive(Debug, Clone)]
struct Node {
    parent: String,
    item: FolderRef,
    content: Bytes,
}

#[derive(Debug, Default)]
struct Faults {
    find_under: HashSet<String>,
    list_under: HashSet<String>,
    fetch: HashSet<String>,
    fetch_delay: Duration,
    list_delay: Duration,
}

/// In-memory folder tree. Children are listed in insertion order, so tests
/// can check that callers sort for display.
#[derive(Debug)]
pub struct MemoryTree {
    root_id: String,
    name_match: NameMatch,
    nodes: Mutex<Vec<Node>>,
    faults: Mutex<Faults>,
    find_calls: AtomicUsize,
    list_calls: AtomicUsize,
    fetched: Mutex<Vec<String>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryTree {
    pub fn new(root_id: impl Into<String>, name_match: NameMatch) -> Self {
        Self {
            root_id: root_id.into(),
            name_match,
            nodes: Mutex::new(Vec::new()),
            faults: Mutex::new(Faults::default()),
            find_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Adds a folder and returns its id.
    pub fn add_folder(&self, parent: &str, id: &str, name: &str) -> String {
        locked(&self.nodes).push(Node {
            parent: parent.to_string(),
            item: FolderRef::folder(id, name),
            content: Bytes::new(),
        });
        id.to_string()
    }

    pub fn add_file(&self, parent: &str, id: &str, name: &str, content: impl Into<Bytes>) -> String {
        locked(&self.nodes).push(Node {
            parent: parent.to_string(),
            item: FolderRef::file(id, name),
            content: content.into(),
        });
        id.to_string()
    }

    /// Adds `count` files named `file00`, `file01`, ... under `parent`.
    pub fn add_files(&self, parent: &str, prefix: &str, count: usize) {
        for i in 0..count {
            self.add_file(parent, &format!("{}-{}", prefix, i), &format!("file{:02}", i), Bytes::new());
        }
    }

    pub fn remove(&self, id: &str) {
        locked(&self.nodes).retain(|node| node.item.id != id);
    }

    pub fn fail_find_under(&self, parent: &str) {
        locked(&self.faults).find_under.insert(parent.to_string());
    }

    pub fn fail_list_under(&self, parent: &str) {
        locked(&self.faults).list_under.insert(parent.to_string());
    }

    pub fn fail_fetch(&self, file_id: &str) {
        locked(&self.faults).fetch.insert(file_id.to_string());
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        locked(&self.faults).fetch_delay = delay;
    }

    pub fn set_list_delay(&self, delay: Duration) {
        locked(&self.faults).list_delay = delay;
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Remote calls of any kind made so far, fetches included.
    pub fn total_calls(&self) -> usize {
        self.find_calls() + self.list_calls() + locked(&self.fetched).len()
    }

    pub fn fetched_ids(&self) -> Vec<String> {
        locked(&self.fetched).clone()
    }

    fn children(&self, parent_id: &str, kind: ItemKind) -> Vec<FolderRef> {
        locked(&self.nodes)
            .iter()
            .filter(|node| node.parent == parent_id && node.item.kind == kind)
            .map(|node| node.item.clone())
            .collect()
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl RemoteTree for MemoryTree {
    async fn find_child(&self, parent_id: &str, name: &str, kind: ItemKind) -> Result<Option<FolderRef>, RemoteError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let (fail, delay) = {
            let faults = locked(&self.faults);
            (faults.find_under.contains(parent_id), faults.list_delay)
        };
        pause(delay).await;
        if fail {
            return Err(RemoteError::new(RemoteOperation::FindChild, parent_id, "injected failure"));
        }

        Ok(self
            .children(parent_id, kind)
            .into_iter()
            .find(|item| self.name_match.matches(&item.name, name)))
    }

    async fn list_children(&self, parent_id: &str, kind: ItemKind) -> Result<Vec<FolderRef>, RemoteError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let (fail, delay) = {
            let faults = locked(&self.faults);
            (faults.list_under.contains(parent_id), faults.list_delay)
        };
        pause(delay).await;
        if fail {
            return Err(RemoteError::new(RemoteOperation::ListChildren, parent_id, "injected failure"));
        }

        Ok(self.children(parent_id, kind))
    }

    async fn fetch_content(&self, file_id: &str) -> Result<Bytes, RemoteError> {
        locked(&self.fetched).push(file_id.to_string());
        let (fail, delay) = {
            let faults = locked(&self.faults);
            (faults.fetch.contains(file_id), faults.fetch_delay)
        };
        pause(delay).await;
        if fail {
            return Err(RemoteError::new(RemoteOperation::FetchContent, file_id, "injected failure"));
        }

        locked(&self.nodes)
            .iter()
            .find(|node| node.item.id == file_id && node.item.kind == ItemKind::File)
            .map(|node| node.content.clone())
            .ok_or_else(|| RemoteError::new(RemoteOperation::FetchContent, file_id, "HTTP 404 Not Found"))
    }

    fn name_match(&self) -> NameMatch {
        self.name_match
    }
}
