//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use campusdrive::browse::{BrowseController, ChatRef, DownloadPipeline, Profile, UserBrowseSession};
use campusdrive::drive::{NameMatch, PathResolver};
use campusdrive::testing::{MemoryTree, RecordingSurface};

pub const CHAT: ChatRef = ChatRef(4242);
pub const USER_ID: i64 = 4242;
pub const NOTICE_DELAY: Duration = Duration::from_secs(7);

/// Root → `2nd_Year` → `CSE` → `DSA` → `Notes` → `unit1.pdf` (`F123`),
/// plus an `OS` subject with no Notes folder.
pub fn course_tree() -> Arc<MemoryTree> {
    let tree = MemoryTree::new("root", NameMatch::CaseInsensitive);
    tree.add_folder("root", "y2", "2nd_Year");
    tree.add_folder("y2", "cse", "CSE");
    tree.add_folder("cse", "dsa", "DSA");
    tree.add_folder("dsa", "dsa-notes", "Notes");
    tree.add_file("dsa-notes", "F123", "unit1.pdf", b"%PDF-1.4 unit one".to_vec());
    tree.add_folder("cse", "os", "OS");
    Arc::new(tree)
}

pub fn student(year: &str, branch: &str) -> Profile {
    Profile {
        year: Some(year.to_string()),
        branch: Some(branch.to_string()),
        name: Some("Asha".to_string()),
    }
}

pub fn session() -> Arc<UserBrowseSession> {
    Arc::new(UserBrowseSession::with_profile(USER_ID, student("2nd Year", "CSE")))
}

/// Controller wired to the in-memory tree and a recording surface.
pub struct Harness {
    pub tree: Arc<MemoryTree>,
    pub surface: Arc<RecordingSurface>,
    pub controller: Arc<BrowseController>,
}

impl Harness {
    pub fn new(tree: Arc<MemoryTree>) -> Self {
        let surface = Arc::new(RecordingSurface::new());
        let resolver = PathResolver::uncached(tree.clone());
        let pipeline = DownloadPipeline::new(tree.clone(), surface.clone(), NOTICE_DELAY);
        let controller = Arc::new(BrowseController::new(resolver, surface.clone(), "root", pipeline));
        Self {
            tree,
            surface,
            controller,
        }
    }

    /// Labels and payloads of the most recent menu.
    pub fn last_menu_labels(&self) -> Vec<String> {
        self.surface
            .last_menu()
            .map(|(_, buttons)| buttons.into_iter().map(|b| b.label).collect())
            .unwrap_or_default()
    }
}
