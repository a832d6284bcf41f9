//! In-memory storage backend
//!
//! Derives virtual directories from `/` in blob names the same way the blob
//! service does, and records every call so traversals can be asserted on.

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::backend::{BackendError, ContainerStream, ItemStream, StorageBackend};
use crate::item::{BlobItem, Container, DELIMITER, Directory, ListScope, ListedItem, UnknownItem};
use crate::tier::AccessTier;

#[derive(Debug, Clone)]
enum EntryKind {
    Block(AccessTier),
    Other(String),
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    kind: EntryKind,
}

#[derive(Debug, Default)]
struct MemoryContainer {
    name: String,
    entries: Vec<Entry>,
}

#[derive(Debug, Default)]
struct State {
    containers: Vec<MemoryContainer>,
    listed: Vec<ListScope>,
    tier_changes: Vec<(String, AccessTier)>,
    failing_containers: Option<BackendError>,
    failing_scopes: HashMap<ListScope, BackendError>,
    failing_blobs: HashSet<String>,
}

impl State {
    fn container_mut(&mut self, name: &str) -> &mut MemoryContainer {
        let index = match self.containers.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                self.containers.push(MemoryContainer {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                self.containers.len() - 1
            }
        };
        &mut self.containers[index]
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(self, name: &str) -> Self {
        self.lock().container_mut(name);
        self
    }

    /// Add a block blob; the container is created on first use.
    pub fn with_blob(self, container: &str, name: &str, tier: AccessTier) -> Self {
        self.push_entry(container, name, EntryKind::Block(tier))
    }

    /// Add a blob the walker does not handle, listed with `kind` as its type.
    pub fn with_unknown(self, container: &str, name: &str, kind: &str) -> Self {
        self.push_entry(container, name, EntryKind::Other(kind.to_string()))
    }

    /// Make listing `scope` fail.
    pub fn fail_listing(self, scope: ListScope) -> Self {
        let source = BackendError::Service {
            status: 500,
            code: "InternalError".to_string(),
            message: format!("injected listing failure for {}", scope.display_path()),
        };
        self.fail_listing_with(scope, source)
    }

    /// Make listing `scope` fail with `source`.
    pub fn fail_listing_with(self, scope: ListScope, source: BackendError) -> Self {
        self.lock().failing_scopes.insert(scope, source);
        self
    }

    /// Make listing the account's containers fail with `source`.
    pub fn fail_container_listing(self, source: BackendError) -> Self {
        self.lock().failing_containers = Some(source);
        self
    }

    /// Make changing the tier of `container/name` fail.
    pub fn fail_tier_change(self, container: &str, name: &str) -> Self {
        self.lock()
            .failing_blobs
            .insert(format!("{container}/{name}"));
        self
    }

    /// Every scope listed so far, in call order.
    pub fn listed_scopes(&self) -> Vec<ListScope> {
        self.lock().listed.clone()
    }

    /// Every successful tier change so far as `(container/name, tier)`.
    pub fn tier_changes(&self) -> Vec<(String, AccessTier)> {
        self.lock().tier_changes.clone()
    }

    pub fn tier_of(&self, container: &str, name: &str) -> Option<AccessTier> {
        let state = self.lock();
        state
            .containers
            .iter()
            .find(|c| c.name == container)?
            .entries
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| match e.kind {
                EntryKind::Block(tier) => Some(tier),
                EntryKind::Other(_) => None,
            })
    }

    fn push_entry(self, container: &str, name: &str, kind: EntryKind) -> Self {
        self.lock().container_mut(container).entries.push(Entry {
            name: name.to_string(),
            kind,
        });
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self, scope: &ListScope) -> Result<Vec<ListedItem>, BackendError> {
        let mut state = self.lock();
        state.listed.push(scope.clone());

        if let Some(source) = state.failing_scopes.get(scope) {
            return Err(source.clone());
        }

        let container = state
            .containers
            .iter()
            .find(|c| c.name == scope.container)
            .ok_or_else(|| BackendError::Service {
                status: 404,
                code: "ContainerNotFound".to_string(),
                message: format!("container {} does not exist", scope.container),
            })?;

        let prefix = scope.prefix.as_deref().unwrap_or_default();
        let mut seen_directories = HashSet::new();
        let mut items = Vec::new();

        for entry in &container.entries {
            let Some(rest) = entry.name.strip_prefix(prefix) else {
                continue;
            };
            if let Some(index) = rest.find(DELIMITER) {
                let directory = format!("{prefix}{}", &rest[..=index]);
                if seen_directories.insert(directory.clone()) {
                    items.push(ListedItem::Directory(Directory {
                        container: container.name.clone(),
                        display_path: format!("/{}/{}", container.name, directory),
                        prefix: directory,
                    }));
                }
                continue;
            }

            items.push(match &entry.kind {
                EntryKind::Block(tier) => ListedItem::Blob(BlobItem {
                    container: container.name.clone(),
                    name: entry.name.clone(),
                    tier: *tier,
                }),
                EntryKind::Other(kind) => ListedItem::Unknown(UnknownItem {
                    kind: kind.clone(),
                    uri: format!("memory://{}/{}", container.name, entry.name),
                }),
            });
        }

        Ok(items)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn list_containers(&self) -> ContainerStream<'_> {
        let state = self.lock();
        if let Some(source) = state.failing_containers.clone() {
            return stream::iter(std::iter::once(Err::<Container, _>(source))).boxed();
        }
        let names: Vec<String> = state.containers.iter().map(|c| c.name.clone()).collect();
        drop(state);
        stream::iter(names.into_iter().map(|name| Ok(Container::new(name)))).boxed()
    }

    fn list_items(&self, scope: &ListScope) -> ItemStream<'_> {
        match self.snapshot(scope) {
            Ok(items) => stream::iter(items.into_iter().map(Ok)).boxed(),
            Err(err) => stream::iter(std::iter::once(Err::<ListedItem, _>(err))).boxed(),
        }
    }

    async fn set_tier(&self, blob: &BlobItem, tier: AccessTier) -> Result<(), BackendError> {
        let mut state = self.lock();
        let path = format!("{}/{}", blob.container, blob.name);
        if state.failing_blobs.contains(&path) {
            return Err(BackendError::Service {
                status: 500,
                code: "InternalError".to_string(),
                message: format!("injected tier change failure for {path}"),
            });
        }

        let entry = state
            .containers
            .iter_mut()
            .find(|c| c.name == blob.container)
            .and_then(|c| c.entries.iter_mut().find(|e| e.name == blob.name))
            .ok_or_else(|| BackendError::Service {
                status: 404,
                code: "BlobNotFound".to_string(),
                message: format!("blob {path} does not exist"),
            })?;
        entry.kind = EntryKind::Block(tier);
        state.tier_changes.push((path, tier));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;

    #[tokio::test]
    async fn test_directories_are_derived_once_in_order() {
        let backend = MemoryBackend::new()
            .with_blob("media", "b/1.jpg", AccessTier::Hot)
            .with_blob("media", "top.jpg", AccessTier::Hot)
            .with_blob("media", "b/2.jpg", AccessTier::Hot)
            .with_blob("media", "a/deep/3.jpg", AccessTier::Hot);

        let items: Vec<ListedItem> = backend
            .list_items(&ListScope::container("media"))
            .try_collect()
            .await
            .unwrap();

        let names: Vec<String> = items
            .iter()
            .map(|item| match item {
                ListedItem::Directory(d) => d.prefix.clone(),
                ListedItem::Blob(b) => b.name.clone(),
                ListedItem::Unknown(u) => u.uri.clone(),
            })
            .collect();
        assert_eq!(names, vec!["b/", "top.jpg", "a/"]);
    }

    #[tokio::test]
    async fn test_nested_listing_uses_full_prefix() {
        let backend = MemoryBackend::new().with_blob("media", "a/deep/3.jpg", AccessTier::Hot);

        let items: Vec<ListedItem> = backend
            .list_items(&ListScope::directory("media", "a/"))
            .try_collect()
            .await
            .unwrap();
        match &items[..] {
            [ListedItem::Directory(d)] => {
                assert_eq!(d.prefix, "a/deep/");
                assert_eq!(d.display_path, "/media/a/deep/");
                assert_eq!(d.name(), "deep");
            }
            other => panic!("unexpected listing: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_set_tier_updates_state() {
        let backend = MemoryBackend::new().with_blob("media", "a.jpg", AccessTier::Hot);
        let blob = BlobItem {
            container: "media".to_string(),
            name: "a.jpg".to_string(),
            tier: AccessTier::Hot,
        };

        backend.set_tier(&blob, AccessTier::Cool).await.unwrap();

        assert_eq!(backend.tier_of("media", "a.jpg"), Some(AccessTier::Cool));
        assert_eq!(
            backend.tier_changes(),
            vec![("media/a.jpg".to_string(), AccessTier::Cool)]
        );
    }

    #[tokio::test]
    async fn test_missing_container_fails_listing() {
        let backend = MemoryBackend::new();
        let result: Result<Vec<ListedItem>, _> = backend
            .list_items(&ListScope::container("nope"))
            .try_collect()
            .await;
        assert!(matches!(
            result,
            Err(BackendError::Service { status: 404, .. })
        ));
    }
}
