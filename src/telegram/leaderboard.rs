//! Points leaderboard
//!
//! A user's score is shown against the most points their branch allows: one
//! per Notes file and two per Assignments file, over every subject. Branch
//! totals are cached for a while since counting walks the whole branch.

use moka::future::Cache;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode};

use crate::browse::session::year_folder_name;
use crate::browse::BrowseKind;
use crate::core::config;
use crate::core::utils::{escape_markdown_v2, format_score};
use crate::core::AppResult;
use crate::drive::{ItemKind, PathResolver, RemoteError, ResolveError};
use crate::storage::db::{self, run_blocking, User};
use crate::telegram::handlers::HandlerDeps;
use crate::telegram::Bot;

pub const CALLBACK_PREFIX: &str = "lb:";
pub const REFRESH_CALLBACK: &str = "lb:refresh";

const RANKS: [&str; 10] = ["🥇", "🥈", "🥉", "4.", "5.", "6.", "7.", "8.", "9.", "10."];

/// File counts under a branch folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BranchTotals {
    pub notes: usize,
    pub assignments: usize,
}

impl BranchTotals {
    pub fn max_points(&self) -> i64 {
        self.notes as i64 * BrowseKind::Notes.points() + self.assignments as i64 * BrowseKind::Assignments.points()
    }
}

pub struct Leaderboard {
    resolver: PathResolver,
    root_id: String,
    totals: Cache<(String, String), BranchTotals>,
}

impl Leaderboard {
    pub fn new(resolver: PathResolver, root_id: impl Into<String>, totals_ttl: Duration) -> Self {
        Self {
            resolver,
            root_id: root_id.into(),
            totals: Cache::builder().max_capacity(256).time_to_live(totals_ttl).build(),
        }
    }

    async fn count_kind(&self, subject_id: &str, kind: BrowseKind) -> Result<usize, RemoteError> {
        match self.resolver.find_folder(subject_id, kind.folder_name()).await? {
            Some(folder) => Ok(self
                .resolver
                .tree()
                .list_children(&folder.id, ItemKind::File)
                .await?
                .len()),
            None => Ok(0),
        }
    }

    /// Counts Notes and Assignments files over every subject of a branch.
    pub async fn branch_totals(&self, year: &str, branch: &str) -> Result<BranchTotals, ResolveError> {
        let key = (year.to_string(), branch.to_string());
        if let Some(hit) = self.totals.get(&key).await {
            return Ok(hit);
        }

        let branch_folder = self
            .resolver
            .resolve(&self.root_id, &[year_folder_name(year), branch.to_string()])
            .await?;
        let subjects = self
            .resolver
            .tree()
            .list_children(&branch_folder.id, ItemKind::Folder)
            .await?;

        let mut totals = BranchTotals::default();
        for subject in &subjects {
            totals.notes += self.count_kind(&subject.id, BrowseKind::Notes).await?;
            totals.assignments += self.count_kind(&subject.id, BrowseKind::Assignments).await?;
        }

        self.totals.insert(key, totals).await;
        Ok(totals)
    }

    /// Maximum points for the user's branch, or 0 when it cannot be determined.
    async fn max_points_for(&self, user: &User) -> i64 {
        let (Some(year), Some(branch)) = (user.year.as_deref(), user.branch.as_deref()) else {
            return 0;
        };
        match self.branch_totals(year, branch).await {
            Ok(totals) => totals.max_points(),
            Err(e) => {
                log::warn!("Could not count files for {}/{}: {}", year, branch, e);
                0
            }
        }
    }

    /// Leaderboard text in MarkdownV2.
    pub async fn render(&self, users: &[User]) -> String {
        if users.is_empty() {
            return escape_markdown_v2("The leaderboard is empty. Start downloading files to get points!");
        }

        let mut text = String::from("🏆 *Top 10 Study Champions*\n_\\(Score based on your branch's total files\\)_\n\n");
        for (rank, user) in RANKS.iter().zip(users) {
            let max_points = self.max_points_for(user).await;
            text.push_str(&format!(
                "{} *{}* \\- {}\n",
                escape_markdown_v2(rank),
                escape_markdown_v2(user.display_name()),
                escape_markdown_v2(&format_score(user.points, max_points))
            ));
        }
        text
    }
}

fn refresh_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback("🔄 Refresh", REFRESH_CALLBACK)]])
}

async fn current_text(deps: &HandlerDeps) -> AppResult<String> {
    let users = run_blocking(&deps.db_pool, |conn| db::top_users(conn, config::leaderboard::TOP_N)).await?;
    Ok(deps.leaderboard.render(&users).await)
}

/// /leaderboard
pub async fn handle_leaderboard_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let text = current_text(deps).await?;
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::MarkdownV2)
        .reply_markup(refresh_keyboard())
        .await?;
    Ok(())
}

/// Handles `lb:*` buttons by re-rendering the message in place.
pub async fn handle_leaderboard_callback(bot: &Bot, chat_id: ChatId, message_id: MessageId, deps: &HandlerDeps) -> AppResult<()> {
    let text = current_text(deps).await?;
    let edited = bot
        .edit_message_text(chat_id, message_id, text)
        .parse_mode(ParseMode::MarkdownV2)
        .reply_markup(refresh_keyboard())
        .await;

    // Telegram rejects edits that change nothing
    if let Err(e) = edited {
        if !e.to_string().contains("message is not modified") {
            return Err(e.into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::NameMatch;
    use crate::testing::MemoryTree;
    use std::sync::Arc;

    fn tree() -> Arc<MemoryTree> {
        let tree = MemoryTree::new("root", NameMatch::CaseInsensitive);
        tree.add_folder("root", "y2", "2nd_Year");
        tree.add_folder("y2", "cse", "CSE");
        tree.add_folder("cse", "dsa", "DSA");
        tree.add_folder("dsa", "dsa-notes", "Notes");
        tree.add_files("dsa-notes", "n", 3);
        tree.add_folder("dsa", "dsa-asg", "Assignments");
        tree.add_files("dsa-asg", "a", 2);
        tree.add_folder("cse", "os", "OS");
        tree.add_folder("os", "os-notes", "Notes");
        tree.add_files("os-notes", "o", 1);
        Arc::new(tree)
    }

    fn board(tree: Arc<MemoryTree>) -> Leaderboard {
        let resolver = PathResolver::uncached(tree);
        Leaderboard::new(resolver, "root", Duration::from_secs(600))
    }

    fn user(id: i64, name: &str, points: i64, branch: Option<&str>) -> User {
        User {
            telegram_id: id,
            username: None,
            name: Some(name.into()),
            year: Some("2nd Year".into()),
            branch: branch.map(str::to_string),
            points,
        }
    }

    #[tokio::test]
    async fn test_branch_totals_weighted_by_kind() {
        let board = board(tree());
        let totals = board.branch_totals("2nd Year", "CSE").await.unwrap();
        assert_eq!(totals, BranchTotals { notes: 4, assignments: 2 });
        assert_eq!(totals.max_points(), 8);
    }

    #[tokio::test]
    async fn test_branch_totals_are_cached() {
        let tree = tree();
        let board = board(tree.clone());
        board.branch_totals("2nd Year", "CSE").await.unwrap();
        let calls = tree.total_calls();
        board.branch_totals("2nd Year", "CSE").await.unwrap();
        assert_eq!(tree.total_calls(), calls);
    }

    #[tokio::test]
    async fn test_render_scores_and_escapes() {
        let board = board(tree());
        let text = board
            .render(&[user(1, "Asha", 4, Some("CSE")), user(2, "R.K.", 3, None)])
            .await;

        assert!(text.contains("🥇 *Asha* \\- 4/8 points \\(50%\\)"));
        assert!(text.contains("🥈 *R\\.K\\.* \\- 3 points"));
    }

    #[tokio::test]
    async fn test_render_empty() {
        let board = board(tree());
        assert_eq!(
            board.render(&[]).await,
            "The leaderboard is empty\\. Start downloading files to get points\\!"
        );
    }
}
