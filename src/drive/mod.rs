//! Remote folder tree access (Google Drive).
//!
//! The `RemoteTree` trait is the seam between the browse engine and the
//! storage backend: list children of a folder, find a child by name, fetch a
//! file's bytes. `DriveClient` implements it over the Drive v3 REST API;
//! `PathResolver` walks name paths on top of any implementation.

pub mod auth;
pub mod client;
pub mod resolver;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use auth::{AccessTokenSource, AuthError, ServiceAccountAuth, ServiceAccountKey, StaticToken};
pub use client::DriveClient;
pub use resolver::{PathResolver, ResolutionFailure, ResolveError};

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Whether a tree node is a folder or a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Folder,
    File,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Folder => write!(f, "folder"),
            ItemKind::File => write!(f, "file"),
        }
    }
}

/// A node in the remote tree. Folders and files share this shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderRef {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
}

impl FolderRef {
    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ItemKind::Folder,
        }
    }

    pub fn file(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ItemKind::File,
        }
    }
}

/// How folder and file names are compared during lookups.
///
/// One policy applies process-wide; it is chosen in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameMatch {
    Exact,
    #[default]
    CaseInsensitive,
}

impl NameMatch {
    pub fn matches(self, candidate: &str, wanted: &str) -> bool {
        match self {
            NameMatch::Exact => candidate == wanted,
            NameMatch::CaseInsensitive => candidate.to_lowercase() == wanted.to_lowercase(),
        }
    }

    /// Canonical form of a name under this policy, used as a cache key.
    pub fn normalize(self, name: &str) -> String {
        match self {
            NameMatch::Exact => name.to_string(),
            NameMatch::CaseInsensitive => name.to_lowercase(),
        }
    }
}

impl fmt::Display for NameMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameMatch::Exact => write!(f, "exact"),
            NameMatch::CaseInsensitive => write!(f, "case_insensitive"),
        }
    }
}

impl FromStr for NameMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" | "case_sensitive" => Ok(NameMatch::Exact),
            "case_insensitive" | "insensitive" | "ignore_case" => Ok(NameMatch::CaseInsensitive),
            other => Err(format!("unknown name match policy: {}", other)),
        }
    }
}

/// Which remote call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    Authenticate,
    FindChild,
    ListChildren,
    FetchContent,
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteOperation::Authenticate => "authenticate",
            RemoteOperation::FindChild => "find_child",
            RemoteOperation::ListChildren => "list_children",
            RemoteOperation::FetchContent => "fetch_content",
        };
        f.write_str(name)
    }
}

/// Transport or API failure talking to the remote tree.
///
/// `target` names what was being looked at (parent id, name, file id) and
/// never contains credentials.
#[derive(Debug, Clone, Error)]
#[error("Drive {operation} failed ({target}): {cause}")]
pub struct RemoteError {
    pub operation: RemoteOperation,
    pub target: String,
    pub cause: String,
}

impl RemoteError {
    pub fn new(operation: RemoteOperation, target: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self {
            operation,
            target: target.into(),
            cause: cause.to_string(),
        }
    }
}

/// Read-only access to a hierarchical remote tree addressed by opaque ids.
///
/// Implementations are shared process-wide and must be safe to call
/// concurrently for different users.
#[async_trait]
pub trait RemoteTree: Send + Sync {
    /// First child of `parent_id` of the given kind whose name matches.
    ///
    /// When several children share the name, which one is returned is not
    /// guaranteed.
    async fn find_child(&self, parent_id: &str, name: &str, kind: ItemKind) -> Result<Option<FolderRef>, RemoteError>;

    /// All direct children of the given kind, across every result page.
    async fn list_children(&self, parent_id: &str, kind: ItemKind) -> Result<Vec<FolderRef>, RemoteError>;

    /// Full content of a file, buffered in memory.
    async fn fetch_content(&self, file_id: &str) -> Result<Bytes, RemoteError>;

    /// How `find_child` compares names. Caches keyed by name must agree with it.
    fn name_match(&self) -> NameMatch;
}

/// Sorts items for display: by name, case-sensitive, ascending.
pub fn sort_for_display(items: &mut [FolderRef]) {
    items.sort_by(|a, b| a.name.cmp(&b.name));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_match_policies() {
        assert!(NameMatch::Exact.matches("CSE", "CSE"));
        assert!(!NameMatch::Exact.matches("cse", "CSE"));
        assert!(NameMatch::CaseInsensitive.matches("cse", "CSE"));
        assert!(!NameMatch::CaseInsensitive.matches("CSE ", "CSE"));
    }

    #[test]
    fn test_name_match_from_str() {
        assert_eq!("exact".parse::<NameMatch>(), Ok(NameMatch::Exact));
        assert_eq!("Case_Insensitive".parse::<NameMatch>(), Ok(NameMatch::CaseInsensitive));
        assert!("fuzzy".parse::<NameMatch>().is_err());
    }

    #[test]
    fn test_sort_for_display_is_case_sensitive() {
        let mut items = vec![
            FolderRef::folder("1", "maths"),
            FolderRef::folder("2", "DSA"),
            FolderRef::folder("3", "Chemistry"),
        ];
        sort_for_display(&mut items);
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Chemistry", "DSA", "maths"]);
    }
}
