//! The browse state machine.
//!
//! ```text
//! Idle ──/notes, /assignments──▶ AwaitingSubjectChoice ──subject──▶ AwaitingFileChoice ──file──▶ download ──▶ Idle
//! ```
//!
//! Every entry point first takes the session's busy flag. A second request
//! while one is in flight gets a "please wait" reply and touches nothing.

use std::sync::Arc;

use super::download::{DownloadJob, DownloadPipeline};
use super::messages;
use super::session::{year_folder_name, BrowseState, UserBrowseSession};
use super::surface::{ChatRef, ChatSurface, MenuButton, MessageRef};
use super::tokens::{MenuEntry, MenuToken, TokenKind};
use super::BrowseKind;
use crate::core::AppResult;
use crate::drive::{sort_for_display, FolderRef, ItemKind, PathResolver, RemoteError, RemoteTree, ResolveError};

/// Whether a button press belonged to the browse flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonOutcome {
    Handled,
    NotMine,
}

pub struct BrowseController {
    resolver: PathResolver,
    surface: Arc<dyn ChatSurface>,
    root_id: String,
    pipeline: DownloadPipeline,
}

/// How a menu will be shown: as a new message or by editing the pressed one.
enum Render {
    Send(ChatRef),
    Edit(MessageRef),
}

impl BrowseController {
    pub fn new(
        resolver: PathResolver,
        surface: Arc<dyn ChatSurface>,
        root_id: impl Into<String>,
        pipeline: DownloadPipeline,
    ) -> Self {
        Self {
            resolver,
            surface,
            root_id: root_id.into(),
            pipeline,
        }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    fn tree(&self) -> &Arc<dyn RemoteTree> {
        self.resolver.tree()
    }

    /// Shows the subject menu for the user's branch.
    ///
    /// Expects a completed profile; without one the user is sent to /start.
    pub async fn start_browse(&self, session: &UserBrowseSession, chat: ChatRef, kind: BrowseKind) -> AppResult<()> {
        let Some(_busy) = session.try_begin() else {
            self.surface.send_text(chat, messages::PLEASE_WAIT).await?;
            return Ok(());
        };

        let Some(profile) = session.student_profile() else {
            self.surface.send_text(chat, messages::SETUP_REQUIRED).await?;
            return Ok(());
        };

        self.show_subjects(session, chat, kind, &profile.year, &profile.branch).await
    }

    /// Shows the subject menu of any year and branch, ignoring the session's profile.
    ///
    /// Owners use this to look at branches other than their own.
    pub async fn start_browse_in(
        &self,
        session: &UserBrowseSession,
        chat: ChatRef,
        kind: BrowseKind,
        year: &str,
        branch: &str,
    ) -> AppResult<()> {
        let Some(_busy) = session.try_begin() else {
            self.surface.send_text(chat, messages::PLEASE_WAIT).await?;
            return Ok(());
        };

        self.show_subjects(session, chat, kind, year, branch).await
    }

    // Caller holds the busy flag
    async fn show_subjects(
        &self,
        session: &UserBrowseSession,
        chat: ChatRef,
        kind: BrowseKind,
        year: &str,
        branch: &str,
    ) -> AppResult<()> {
        // A new browse supersedes the subject and file menus still on screen
        session.clear_menus();
        session.set_state(BrowseState::Idle);
        log::info!("User {} browsing {} for {}/{}", session.user_id(), kind, year, branch);

        let subjects = match self.list_subjects(year, branch).await {
            Ok(subjects) => subjects,
            Err(ResolveError::NotFound(failure)) => {
                let text = if failure.failed_at_index == 0 {
                    messages::year_folder_missing(year)
                } else {
                    messages::branch_folder_missing(branch)
                };
                self.surface.send_text(chat, &text).await?;
                return Ok(());
            }
            Err(ResolveError::Remote(e)) => {
                log::warn!("Listing subjects for user {} failed: {}", session.user_id(), e);
                self.surface.send_text(chat, messages::DRIVE_UNAVAILABLE).await?;
                return Ok(());
            }
        };

        if subjects.is_empty() {
            self.surface.send_text(chat, messages::NO_SUBJECTS).await?;
            return Ok(());
        }

        let entries = subjects
            .into_iter()
            .map(|folder| MenuEntry::Subject { folder, kind })
            .collect();
        self.render_menu(session, Render::Send(chat), TokenKind::Subject, entries, &messages::choose_subject(kind))
            .await?;
        session.set_state(BrowseState::AwaitingSubjectChoice { kind });
        Ok(())
    }

    /// Handles an inline button press on `message`.
    ///
    /// Payloads that are not menu tokens are left for other features.
    pub async fn handle_button_press(
        &self,
        session: &UserBrowseSession,
        message: MessageRef,
        payload: &str,
    ) -> AppResult<ButtonOutcome> {
        let Some(token) = MenuToken::parse(payload) else {
            return Ok(ButtonOutcome::NotMine);
        };

        let Some(_busy) = session.try_begin() else {
            self.surface.send_text(message.chat, messages::PLEASE_WAIT).await?;
            return Ok(ButtonOutcome::Handled);
        };

        match session.lookup(&token) {
            None => {
                log::debug!("User {} pressed stale token {}", session.user_id(), token);
                session.set_state(BrowseState::Idle);
                self.surface.edit_text(message, messages::MENU_EXPIRED).await?;
            }
            Some(MenuEntry::Subject { folder, kind }) => {
                self.open_subject(session, message, folder, kind).await?;
            }
            Some(MenuEntry::File { file, kind, .. }) => {
                session.set_state(BrowseState::Idle);
                let job = DownloadJob {
                    file_id: file.id,
                    file_name: file.name,
                    kind,
                    user_id: session.user_id(),
                    chat: message.chat,
                };
                self.pipeline.download(job, message).await;
            }
        }

        Ok(ButtonOutcome::Handled)
    }

    async fn list_subjects(&self, year: &str, branch: &str) -> Result<Vec<FolderRef>, ResolveError> {
        let segments = [year_folder_name(year), branch.to_string()];
        let branch = self.resolver.resolve(&self.root_id, &segments).await?;
        let mut subjects = self.tree().list_children(&branch.id, ItemKind::Folder).await?;
        sort_for_display(&mut subjects);
        Ok(subjects)
    }

    async fn list_subject_files(&self, subject: &FolderRef, kind: BrowseKind) -> Result<Option<Vec<FolderRef>>, RemoteError> {
        let Some(target) = self.resolver.find_folder(&subject.id, kind.folder_name()).await? else {
            return Ok(None);
        };
        let mut files = self.tree().list_children(&target.id, ItemKind::File).await?;
        sort_for_display(&mut files);
        Ok(Some(files))
    }

    async fn open_subject(
        &self,
        session: &UserBrowseSession,
        message: MessageRef,
        subject: FolderRef,
        kind: BrowseKind,
    ) -> AppResult<()> {
        session.set_state(BrowseState::Idle);

        let files = match self.list_subject_files(&subject, kind).await {
            Ok(Some(files)) => files,
            Ok(None) => {
                self.surface
                    .edit_text(message, &messages::kind_folder_missing(kind, &subject.name))
                    .await?;
                return Ok(());
            }
            Err(e) => {
                log::warn!("Listing {} of '{}' failed: {}", kind, subject.name, e);
                self.surface.edit_text(message, messages::DRIVE_UNAVAILABLE).await?;
                return Ok(());
            }
        };

        if files.is_empty() {
            self.surface.edit_text(message, &messages::no_files(kind, &subject.name)).await?;
            return Ok(());
        }

        let entries = files
            .into_iter()
            .map(|file| MenuEntry::File {
                file,
                subject: subject.name.clone(),
                kind,
            })
            .collect();
        self.render_menu(session, Render::Edit(message), TokenKind::File, entries, &messages::choose_file(&subject.name))
            .await?;
        session.set_state(BrowseState::AwaitingFileChoice {
            kind,
            subject: subject.name,
        });
        Ok(())
    }

    async fn render_menu(
        &self,
        session: &UserBrowseSession,
        render: Render,
        token_kind: TokenKind,
        entries: Vec<MenuEntry>,
        text: &str,
    ) -> AppResult<()> {
        let labels: Vec<String> = entries.iter().map(|entry| entry.label().to_string()).collect();
        let tokens = session.put_menu(token_kind, entries);
        let buttons: Vec<MenuButton> = labels
            .into_iter()
            .zip(tokens)
            .map(|(label, token)| MenuButton::new(label, token.encode()))
            .collect();

        match render {
            Render::Send(chat) => {
                self.surface.send_menu(chat, text, &buttons).await?;
            }
            Render::Edit(message) => self.surface.edit_menu(message, text, &buttons).await?,
        }
        Ok(())
    }
}
