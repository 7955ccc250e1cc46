use async_trait::async_trait;
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Result};
use std::sync::Arc;

use crate::browse::{Audience, PointsLedger, Profile};
use crate::core::{AppError, AppResult};

/// A student as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Telegram user id
    pub telegram_id: i64,
    /// Telegram username, if the user has one
    pub username: Option<String>,
    pub name: Option<String>,
    /// Academic year as chosen during onboarding, e.g. "2nd Year"
    pub year: Option<String>,
    /// Branch folder name, e.g. "CSE"
    pub branch: Option<String>,
    /// Points earned by downloading files
    pub points: i64,
}

impl User {
    pub fn profile(&self) -> Profile {
        Profile {
            year: self.year.clone(),
            branch: self.branch.clone(),
            name: self.name.clone(),
        }
    }

    /// Name to show on the leaderboard.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("A User")
    }
}

/// The notice most recently posted by an owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Telegram file id of the document, reusable for re-sending
    pub file_id: String,
    pub file_name: String,
    pub posted_by: i64,
    /// RFC 3339 timestamp
    pub posted_at: String,
}

impl Notice {
    /// Posting time formatted like "05 Mar 2025, 02:30 PM" (UTC).
    pub fn posted_at_display(&self) -> String {
        DateTime::parse_from_rfc3339(&self.posted_at)
            .map(|dt| dt.with_timezone(&Utc).format("%d %b %Y, %I:%M %p").to_string())
            .unwrap_or_else(|_| self.posted_at.clone())
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    telegram_id INTEGER PRIMARY KEY,
    username TEXT,
    name TEXT,
    year TEXT,
    branch TEXT,
    points INTEGER NOT NULL DEFAULT 0,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_users_points ON users(points DESC);
CREATE TABLE IF NOT EXISTS notices (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    file_id TEXT NOT NULL,
    file_name TEXT NOT NULL,
    posted_by INTEGER NOT NULL,
    posted_at TEXT NOT NULL
);
";

/// Create a new database connection pool
///
/// Initializes a pool with up to 10 connections and creates the schema if it
/// does not exist yet.
///
/// # Example
///
/// ```no_run
/// use campusdrive::storage::db;
///
/// let pool = db::create_pool("campusdrive.sqlite")?;
/// # Ok::<(), r2d2::Error>(())
/// ```
pub fn create_pool(database_path: &str) -> std::result::Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    let pool = Pool::builder().max_size(10).build(manager)?;

    let conn = pool.get()?;
    if let Err(e) = ensure_schema(&conn) {
        log::error!("Failed to create database schema: {}", e);
    }

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection goes back to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> std::result::Result<DbConnection, r2d2::Error> {
    pool.get()
}

fn ensure_schema(conn: &rusqlite::Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
}

/// Records that a user exists (for broadcasts) without touching the profile.
pub fn ensure_user(conn: &DbConnection, telegram_id: i64, username: Option<&str>) -> Result<()> {
    conn.execute(
        "INSERT INTO users (telegram_id, username) VALUES (?1, ?2)
         ON CONFLICT(telegram_id) DO UPDATE SET username = COALESCE(excluded.username, users.username)",
        params![telegram_id, username],
    )?;
    Ok(())
}

/// Stores a completed onboarding profile, creating the user if needed.
pub fn upsert_profile(conn: &DbConnection, telegram_id: i64, year: &str, branch: &str, name: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO users (telegram_id, name, year, branch) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(telegram_id) DO UPDATE SET
             name = excluded.name,
             year = excluded.year,
             branch = excluded.branch,
             updated_at = CURRENT_TIMESTAMP",
        params![telegram_id, name, year, branch],
    )?;
    Ok(())
}

fn user_from_row(row: &rusqlite::Row<'_>) -> Result<User> {
    Ok(User {
        telegram_id: row.get(0)?,
        username: row.get(1)?,
        name: row.get(2)?,
        year: row.get(3)?,
        branch: row.get(4)?,
        points: row.get(5)?,
    })
}

/// Returns `Ok(None)` if the user has never interacted with the bot.
pub fn get_user(conn: &DbConnection, telegram_id: i64) -> Result<Option<User>> {
    conn.query_row(
        "SELECT telegram_id, username, name, year, branch, points FROM users WHERE telegram_id = ?1",
        params![telegram_id],
        user_from_row,
    )
    .optional()
}

/// Forgets year, branch and name. Points are kept.
pub fn clear_profile(conn: &DbConnection, telegram_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE users SET name = NULL, year = NULL, branch = NULL, updated_at = CURRENT_TIMESTAMP
         WHERE telegram_id = ?1",
        params![telegram_id],
    )?;
    Ok(())
}

pub fn add_points(conn: &DbConnection, telegram_id: i64, points: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO users (telegram_id, points) VALUES (?1, ?2)
         ON CONFLICT(telegram_id) DO UPDATE SET
             points = users.points + excluded.points,
             updated_at = CURRENT_TIMESTAMP",
        params![telegram_id, points],
    )?;
    Ok(())
}

/// Users with at least one point, best first. Ties go to whoever got there first.
pub fn top_users(conn: &DbConnection, limit: usize) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(
        "SELECT telegram_id, username, name, year, branch, points FROM users
         WHERE points > 0
         ORDER BY points DESC, updated_at ASC, telegram_id ASC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], user_from_row)?;

    let mut users = Vec::new();
    for row in rows {
        users.push(row?);
    }
    Ok(users)
}

pub fn all_user_ids(conn: &DbConnection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT telegram_id FROM users ORDER BY telegram_id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    let ids = rows.collect::<Result<Vec<i64>>>()?;
    Ok(ids)
}

pub fn count_users(conn: &DbConnection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
}

fn grouped_counts(stmt: &mut rusqlite::Statement<'_>, params: impl rusqlite::Params) -> Result<Vec<(String, i64)>> {
    let rows = stmt.query_map(params, |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

/// Users with a year set, per year.
pub fn count_by_year(conn: &DbConnection) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT year, COUNT(*) FROM users WHERE year IS NOT NULL GROUP BY year ORDER BY year",
    )?;
    grouped_counts(&mut stmt, [])
}

/// Users of one year, per branch. Also the list of branches anyone in that year chose.
pub fn count_by_branch(conn: &DbConnection, year: &str) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT branch, COUNT(*) FROM users
         WHERE year = ?1 AND branch IS NOT NULL
         GROUP BY branch ORDER BY branch",
    )?;
    grouped_counts(&mut stmt, params![year])
}

/// Telegram ids a broadcast to `audience` goes to.
pub fn user_ids_in(conn: &DbConnection, audience: &Audience) -> Result<Vec<i64>> {
    let (sql, year, branch) = match audience {
        Audience::All => return all_user_ids(conn),
        Audience::Year(year) => ("SELECT telegram_id FROM users WHERE year = ?1 ORDER BY telegram_id", year, None),
        Audience::Branch { year, branch } => (
            "SELECT telegram_id FROM users WHERE year = ?1 AND branch = ?2 ORDER BY telegram_id",
            year,
            Some(branch),
        ),
    };

    let mut stmt = conn.prepare(sql)?;
    let rows: Result<Vec<i64>> = match branch {
        Some(branch) => stmt.query_map(params![year, branch], |row| row.get(0))?.collect(),
        None => stmt.query_map(params![year], |row| row.get(0))?.collect(),
    };
    rows
}

/// Replaces the current notice.
pub fn save_notice(conn: &DbConnection, notice: &Notice) -> Result<()> {
    conn.execute(
        "INSERT INTO notices (id, file_id, file_name, posted_by, posted_at) VALUES (1, ?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
             file_id = excluded.file_id,
             file_name = excluded.file_name,
             posted_by = excluded.posted_by,
             posted_at = excluded.posted_at",
        params![notice.file_id, notice.file_name, notice.posted_by, notice.posted_at],
    )?;
    Ok(())
}

pub fn latest_notice(conn: &DbConnection) -> Result<Option<Notice>> {
    conn.query_row(
        "SELECT file_id, file_name, posted_by, posted_at FROM notices WHERE id = 1",
        [],
        |row| {
            Ok(Notice {
                file_id: row.get(0)?,
                file_name: row.get(1)?,
                posted_by: row.get(2)?,
                posted_at: row.get(3)?,
            })
        },
    )
    .optional()
}

/// Runs a blocking database closure on the blocking thread pool.
pub async fn run_blocking<T, F>(pool: &Arc<DbPool>, f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&DbConnection) -> Result<T> + Send + 'static,
{
    let pool = Arc::clone(pool);
    tokio::task::spawn_blocking(move || -> AppResult<T> {
        let conn = get_connection(&pool)?;
        f(&conn).map_err(AppError::from)
    })
    .await?
}

/// Points ledger backed by the `users.points` column.
#[derive(Clone)]
pub struct SqlitePointsLedger {
    pool: Arc<DbPool>,
}

impl SqlitePointsLedger {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PointsLedger for SqlitePointsLedger {
    async fn award(&self, user_id: i64, points: i64) -> AppResult<()> {
        run_blocking(&self.pool, move |conn| add_points(conn, user_id, points)).await
    }
}
