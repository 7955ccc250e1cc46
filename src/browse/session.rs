//! Per-user browse state.

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use super::tokens::{MenuEntry, MenuToken, TokenKind, TokenTable};
use super::BrowseKind;

/// Onboarding selections. Any field may still be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub year: Option<String>,
    pub branch: Option<String>,
    pub name: Option<String>,
}

/// A profile with every field present and non-blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentProfile {
    pub year: String,
    pub branch: String,
    pub name: String,
}

/// Drive folder name for the year: "2nd Year" lives in "2nd_Year".
pub fn year_folder_name(year: &str) -> String {
    year.replace(' ', "_")
}

fn filled(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

impl Profile {
    pub fn complete(&self) -> Option<StudentProfile> {
        Some(StudentProfile {
            year: filled(&self.year)?,
            branch: filled(&self.branch)?,
            name: filled(&self.name)?,
        })
    }
}

/// Where the user is in the browse flow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BrowseState {
    #[default]
    Idle,
    AwaitingSubjectChoice {
        kind: BrowseKind,
    },
    AwaitingFileChoice {
        kind: BrowseKind,
        subject: String,
    },
}

/// Multi-message conversations driven by plain text replies.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Conversation {
    #[default]
    None,
    AwaitingYear,
    AwaitingBranch {
        year: String,
        branches: Vec<String>,
    },
    AwaitingName {
        year: String,
        branch: String,
    },
    AwaitingNoticeFile,
    /// /stats: year whose branches should be counted
    StatsYear,
    /// /broadcast: year to target, then a branch of it if `by_branch`
    BroadcastYear {
        by_branch: bool,
    },
    BroadcastBranch {
        year: String,
        branches: Vec<String>,
    },
    BroadcastMessage {
        audience: Audience,
    },
    /// /getnotes, /getassignments: any year and branch, owners only
    OwnerBrowseYear {
        kind: BrowseKind,
    },
    OwnerBrowseBranch {
        kind: BrowseKind,
        year: String,
        branches: Vec<String>,
    },
}

impl Conversation {
    /// Whether the conversation shows a reply keyboard that should be removed when it ends.
    pub fn uses_reply_keyboard(&self) -> bool {
        !matches!(
            self,
            Conversation::None | Conversation::AwaitingNoticeFile | Conversation::BroadcastMessage { .. }
        )
    }
}

/// Recipients of a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    All,
    Year(String),
    Branch { year: String, branch: String },
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Audience::All => f.write_str("all users"),
            Audience::Year(year) => write!(f, "{}", year),
            Audience::Branch { year, branch } => write!(f, "{} {}", year, branch),
        }
    }
}

#[derive(Debug, Default)]
struct SessionData {
    profile: Profile,
    tokens: TokenTable,
    state: BrowseState,
    conversation: Conversation,
}

/// Ephemeral state for one user. Never shared across users.
#[derive(Debug)]
pub struct UserBrowseSession {
    user_id: i64,
    busy: AtomicBool,
    last_seen: Mutex<Instant>,
    data: Mutex<SessionData>,
}

/// Holds a session's busy flag; dropping it clears the flag.
#[must_use = "the busy flag is released as soon as the guard is dropped"]
pub struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl UserBrowseSession {
    pub fn new(user_id: i64) -> Self {
        Self::with_profile(user_id, Profile::default())
    }

    pub fn with_profile(user_id: i64, profile: Profile) -> Self {
        Self {
            user_id,
            busy: AtomicBool::new(false),
            last_seen: Mutex::new(Instant::now()),
            data: Mutex::new(SessionData {
                profile,
                ..SessionData::default()
            }),
        }
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    // Never held across an await; a poisoned lock still holds usable data
    fn data(&self) -> MutexGuard<'_, SessionData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the busy flag without waiting. `None` if another operation holds it.
    pub fn try_begin(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard { flag: &self.busy })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_seen.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn profile(&self) -> Profile {
        self.data().profile.clone()
    }

    pub fn set_profile(&self, profile: Profile) {
        self.data().profile = profile;
    }

    pub fn student_profile(&self) -> Option<StudentProfile> {
        self.data().profile.complete()
    }

    /// Installs a new menu generation and returns its tokens.
    pub fn put_menu(&self, kind: TokenKind, entries: Vec<MenuEntry>) -> Vec<MenuToken> {
        self.data().tokens.put(kind, entries)
    }

    /// Invalidates every menu rendered so far.
    pub fn clear_menus(&self) {
        self.data().tokens.clear();
    }

    pub fn lookup(&self, token: &MenuToken) -> Option<MenuEntry> {
        self.data().tokens.get(token).cloned()
    }

    pub fn state(&self) -> BrowseState {
        self.data().state.clone()
    }

    pub fn set_state(&self, state: BrowseState) {
        self.data().state = state;
    }

    pub fn conversation(&self) -> Conversation {
        self.data().conversation.clone()
    }

    pub fn set_conversation(&self, conversation: Conversation) {
        self.data().conversation = conversation;
    }

    /// Forgets profile, menus and any conversation in progress.
    pub fn reset(&self) {
        let mut data = self.data();
        *data = SessionData::default();
    }
}

/// All live sessions, keyed by Telegram user id.
///
/// Entries are only dropped by [`SessionStore::evict_idle`], never while a
/// handler still holds them, so one user can never have two sessions with
/// separate busy flags.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<i64, Arc<UserBrowseSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: i64) -> Option<Arc<UserBrowseSession>> {
        self.sessions.get(&user_id).map(|entry| {
            entry.value().touch();
            Arc::clone(entry.value())
        })
    }

    pub fn get_or_create(&self, user_id: i64) -> Arc<UserBrowseSession> {
        self.get_or_insert_with(user_id, Profile::default)
    }

    /// Returns the existing session, or creates one seeded with `profile()`.
    pub fn get_or_insert_with(&self, user_id: i64, profile: impl FnOnce() -> Profile) -> Arc<UserBrowseSession> {
        let entry = self
            .sessions
            .entry(user_id)
            .or_insert_with(|| Arc::new(UserBrowseSession::with_profile(user_id, profile())));
        entry.value().touch();
        Arc::clone(entry.value())
    }

    /// Clears the user's session in place.
    ///
    /// The entry and its busy flag survive, so an operation still in flight
    /// keeps excluding new ones.
    pub fn reset(&self, user_id: i64) {
        if let Some(entry) = self.sessions.get(&user_id) {
            entry.value().reset();
        }
    }

    /// Drops sessions idle for at least `idle` that nobody is using.
    ///
    /// Returns how many were dropped.
    pub fn evict_idle(&self, idle: Duration) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| {
            Arc::strong_count(session) > 1 || session.is_busy() || session.idle_for(now) < idle
        });
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_profile() -> Profile {
        Profile {
            year: Some("2nd Year".into()),
            branch: Some("CSE".into()),
            name: Some("Asha".into()),
        }
    }

    #[test]
    fn test_profile_complete_requires_every_field() {
        assert!(full_profile().complete().is_some());

        let mut blank_name = full_profile();
        blank_name.name = Some("   ".into());
        assert!(blank_name.complete().is_none());

        let mut no_branch = full_profile();
        no_branch.branch = None;
        assert!(no_branch.complete().is_none());
    }

    #[test]
    fn test_year_folder() {
        let profile = full_profile().complete().unwrap();
        assert_eq!(year_folder_name(&profile.year), "2nd_Year");
    }

    #[test]
    fn test_busy_guard_is_exclusive_and_released_on_drop() {
        let session = UserBrowseSession::new(1);
        {
            let _guard = session.try_begin().unwrap();
            assert!(session.is_busy());
            assert!(session.try_begin().is_none());
        }
        assert!(!session.is_busy());
        assert!(session.try_begin().is_some());
    }

    #[test]
    fn test_busy_guard_released_on_error_path() {
        fn failing(session: &UserBrowseSession) -> Result<(), &'static str> {
            let _guard = session.try_begin().ok_or("busy")?;
            Err("remote failed")
        }

        let session = UserBrowseSession::new(1);
        assert!(failing(&session).is_err());
        assert!(!session.is_busy());
    }

    #[test]
    fn test_reset_clears_everything() {
        let session = UserBrowseSession::with_profile(3, full_profile());
        session.set_conversation(Conversation::AwaitingYear);
        session.set_state(BrowseState::AwaitingSubjectChoice { kind: BrowseKind::Notes });

        session.reset();
        assert_eq!(session.profile(), Profile::default());
        assert_eq!(session.conversation(), Conversation::None);
        assert_eq!(session.state(), BrowseState::Idle);
    }

    #[test]
    fn test_store_keeps_users_apart() {
        let store = SessionStore::new();
        let a = store.get_or_insert_with(1, full_profile);
        let b = store.get_or_create(2);

        let _guard = a.try_begin().unwrap();
        assert!(!b.is_busy());
        assert!(b.student_profile().is_none());
        assert!(Arc::ptr_eq(&a, &store.get_or_create(1)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_store_reset_keeps_busy_session() {
        let store = SessionStore::new();
        let session = store.get_or_insert_with(1, full_profile);
        let _guard = session.try_begin().unwrap();

        store.reset(1);

        let again = store.get_or_create(1);
        assert!(Arc::ptr_eq(&session, &again));
        assert!(again.student_profile().is_none());
        assert!(again.try_begin().is_none(), "reset must not hand out a second busy flag");
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_spares_sessions_in_use() {
        let store = SessionStore::new();
        store.get_or_create(1);
        // Still held by a handler, e.g. a download in flight
        let held = store.get_or_create(2);
        let _guard = held.try_begin().unwrap();

        tokio::time::advance(Duration::from_secs(120)).await;
        store.get_or_create(3);

        assert_eq!(store.evict_idle(Duration::from_secs(60)), 1);
        assert!(store.get(1).is_none());
        assert!(Arc::ptr_eq(&held, &store.get(2).unwrap()));
        assert!(store.get(3).is_some());
    }

    #[test]
    fn test_conversation_reply_keyboards() {
        assert!(Conversation::AwaitingYear.uses_reply_keyboard());
        assert!(Conversation::StatsYear.uses_reply_keyboard());
        assert!(!Conversation::AwaitingNoticeFile.uses_reply_keyboard());
        assert!(!Conversation::BroadcastMessage { audience: Audience::All }.uses_reply_keyboard());
    }
}
