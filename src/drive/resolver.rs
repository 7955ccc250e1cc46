//! Walks a path of folder names from a root folder id.

use moka::future::Cache;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::{FolderRef, ItemKind, NameMatch, RemoteError, RemoteTree};

const CACHE_CAPACITY: u64 = 10_000;

/// Where a path walk stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionFailure {
    pub failed_at_index: usize,
    pub segments: Vec<String>,
}

impl ResolutionFailure {
    /// Name of the segment that had no match.
    pub fn failed_segment(&self) -> &str {
        self.segments
            .get(self.failed_at_index)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "folder '{}' not found (segment {} of {})",
            self.failed_segment(),
            self.failed_at_index + 1,
            self.segments.len()
        )
    }
}

#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("{0}")]
    NotFound(ResolutionFailure),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Resolves `[year, branch, subject, ...]` style paths to folders.
///
/// Each segment is one `find_child` call; the walk stops at the first miss
/// and never looks at later segments. Successful `(parent, name)` lookups may
/// be cached for a bounded time. Misses are never cached, so a folder created
/// on Drive becomes visible on the next attempt.
#[derive(Clone)]
pub struct PathResolver {
    tree: Arc<dyn RemoteTree>,
    name_match: NameMatch,
    cache: Option<Cache<(String, String), FolderRef>>,
}

impl PathResolver {
    pub fn new(tree: Arc<dyn RemoteTree>, cache_ttl: Option<Duration>) -> Self {
        let name_match = tree.name_match();
        let cache = cache_ttl.map(|ttl| Cache::builder().max_capacity(CACHE_CAPACITY).time_to_live(ttl).build());
        Self { tree, name_match, cache }
    }

    /// A resolver without a cache; every call goes to the remote tree.
    pub fn uncached(tree: Arc<dyn RemoteTree>) -> Self {
        Self::new(tree, None)
    }

    pub fn tree(&self) -> &Arc<dyn RemoteTree> {
        &self.tree
    }

    pub async fn resolve<S: AsRef<str>>(&self, root_id: &str, segments: &[S]) -> Result<FolderRef, ResolveError> {
        let mut current = FolderRef::folder(root_id, "");

        for (index, segment) in segments.iter().enumerate() {
            let name = segment.as_ref();
            match self.find_folder(&current.id, name).await? {
                Some(next) => current = next,
                None => {
                    let failure = ResolutionFailure {
                        failed_at_index: index,
                        segments: segments.iter().map(|s| s.as_ref().to_string()).collect(),
                    };
                    log::debug!("Path resolution under {} stopped: {}", root_id, failure);
                    return Err(ResolveError::NotFound(failure));
                }
            }
        }

        Ok(current)
    }

    /// Resolves one child folder, consulting the cache first.
    pub async fn find_folder(&self, parent_id: &str, name: &str) -> Result<Option<FolderRef>, RemoteError> {
        let key = (parent_id.to_string(), self.name_match.normalize(name));

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key).await {
                return Ok(Some(hit));
            }
        }

        let found = self.tree.find_child(parent_id, name, ItemKind::Folder).await?;

        if let (Some(cache), Some(folder)) = (&self.cache, &found) {
            cache.insert(key, folder.clone()).await;
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryTree;

    fn sample_tree() -> Arc<MemoryTree> {
        let tree = MemoryTree::new("root", NameMatch::CaseInsensitive);
        let year = tree.add_folder("root", "y2", "2nd_Year");
        let branch = tree.add_folder(&year, "cse", "CSE");
        tree.add_folder(&branch, "dsa", "DSA");
        Arc::new(tree)
    }

    #[tokio::test]
    async fn test_resolve_full_path() {
        let tree = sample_tree();
        let resolver = PathResolver::uncached(tree.clone());

        let folder = resolver.resolve("root", &["2nd_Year", "cse", "DSA"]).await.unwrap();
        assert_eq!(folder.id, "dsa");
        assert_eq!(folder.name, "DSA");
    }

    #[tokio::test]
    async fn test_empty_path_returns_root() {
        let tree = sample_tree();
        let resolver = PathResolver::uncached(tree.clone());

        let folder = resolver.resolve::<&str>("root", &[]).await.unwrap();
        assert_eq!(folder.id, "root");
        assert_eq!(tree.find_calls(), 0);
    }

    #[tokio::test]
    async fn test_fails_fast_at_missing_segment() {
        let tree = sample_tree();
        let resolver = PathResolver::uncached(tree.clone());

        let err = resolver
            .resolve("root", &["2nd_Year", "ECE", "DSA", "Notes"])
            .await
            .unwrap_err();
        match err {
            ResolveError::NotFound(failure) => {
                assert_eq!(failure.failed_at_index, 1);
                assert_eq!(failure.failed_segment(), "ECE");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // One call for the year, one for the missing branch, none after
        assert_eq!(tree.find_calls(), 2);
    }

    #[tokio::test]
    async fn test_cache_hits_skip_remote_and_misses_are_not_cached() {
        let tree = sample_tree();
        let resolver = PathResolver::new(tree.clone(), Some(Duration::from_secs(60)));

        resolver.resolve("root", &["2nd_Year", "CSE"]).await.unwrap();
        resolver.resolve("root", &["2nd_year", "CSE"]).await.unwrap();
        assert_eq!(tree.find_calls(), 2);

        assert!(resolver.resolve("root", &["3rd_Year"]).await.is_err());
        tree.add_folder("root", "y3", "3rd_Year");
        assert_eq!(resolver.resolve("root", &["3rd_Year"]).await.unwrap().id, "y3");
    }

    #[tokio::test]
    async fn test_cache_key_follows_tree_name_policy() {
        let tree = Arc::new(MemoryTree::new("root", NameMatch::Exact));
        tree.add_folder("root", "y2", "2nd_Year");
        let resolver = PathResolver::new(tree.clone(), Some(Duration::from_secs(60)));

        assert_eq!(resolver.resolve("root", &["2nd_Year"]).await.unwrap().id, "y2");
        // The cached "2nd_Year" must not answer for another spelling under exact matching
        assert!(resolver.resolve("root", &["2nd_year"]).await.is_err());
        assert_eq!(tree.find_calls(), 2);
    }

    #[tokio::test]
    async fn test_remote_error_propagates() {
        let tree = sample_tree();
        tree.fail_find_under("y2");
        let resolver = PathResolver::uncached(tree.clone());

        let err = resolver.resolve("root", &["2nd_Year", "CSE"]).await.unwrap_err();
        assert!(matches!(err, ResolveError::Remote(_)));
    }
}
