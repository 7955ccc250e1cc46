//! Interactive file browsing: subject menu → file menu → download.
//!
//! The controller turns the remote tree into chained inline menus. Buttons
//! carry short opaque tokens; what a token means lives in the user's
//! session, and each new menu replaces the previous menu of its kind.

pub mod download;
pub mod flow;
pub mod messages;
pub mod session;
pub mod surface;
pub mod tokens;

use std::fmt;

pub use download::{DelayedNotice, DownloadJob, DownloadOutcome, DownloadPipeline, PointsLedger};
pub use flow::{BrowseController, ButtonOutcome};
pub use session::{
    Audience, BrowseState, BusyGuard, Conversation, Profile, SessionStore, StudentProfile, UserBrowseSession,
};
pub use surface::{ChatRef, ChatSurface, MenuButton, MessageRef};
pub use tokens::{MenuEntry, MenuToken, TokenKind, TokenTable};

/// What the user is browsing for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrowseKind {
    Notes,
    Assignments,
}

impl BrowseKind {
    /// Name of the subfolder holding this kind under a subject folder.
    pub fn folder_name(self) -> &'static str {
        match self {
            BrowseKind::Notes => "Notes",
            BrowseKind::Assignments => "Assignments",
        }
    }

    /// Lowercase plural used in user-facing text.
    pub fn label(self) -> &'static str {
        match self {
            BrowseKind::Notes => "notes",
            BrowseKind::Assignments => "assignments",
        }
    }

    /// Points awarded for one delivered file.
    pub fn points(self) -> i64 {
        match self {
            BrowseKind::Notes => 1,
            BrowseKind::Assignments => 2,
        }
    }
}

impl fmt::Display for BrowseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
