use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

use crate::drive::NameMatch;

/// Reads an environment variable, treating blank values as unset.
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Bot token
/// Read from BOT_TOKEN, TELOXIDE_TOKEN or TELEGRAM_BOT_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    non_empty_var("BOT_TOKEN")
        .or_else(|| non_empty_var("TELOXIDE_TOKEN"))
        .or_else(|| non_empty_var("TELEGRAM_BOT_TOKEN"))
        .unwrap_or_default()
});

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: campusdrive.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| non_empty_var("DATABASE_PATH").unwrap_or_else(|| "campusdrive.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: campusdrive.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| non_empty_var("LOG_FILE_PATH").unwrap_or_else(|| "campusdrive.log".to_string()));

/// Webhook URL for Telegram updates
/// Read from WEBHOOK_URL environment variable
pub static WEBHOOK_URL: Lazy<Option<String>> = Lazy::new(|| non_empty_var("WEBHOOK_URL"));

/// Local port the webhook listener binds to
/// Read from WEBHOOK_PORT (or PORT, as set by most PaaS hosts)
pub static WEBHOOK_PORT: Lazy<u16> = Lazy::new(|| {
    non_empty_var("WEBHOOK_PORT")
        .or_else(|| non_empty_var("PORT"))
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080)
});

/// Google Drive configuration
pub mod drive {
    use super::{non_empty_var, Duration, Lazy, NameMatch};

    /// Id of the folder every browse path starts from
    /// Read from GOOGLE_DRIVE_ROOT_FOLDER_ID environment variable
    pub static ROOT_FOLDER_ID: Lazy<String> =
        Lazy::new(|| non_empty_var("GOOGLE_DRIVE_ROOT_FOLDER_ID").unwrap_or_default());

    /// Service account credentials: either a path to the key file or the raw JSON
    /// Read from SERVICE_ACCOUNT_JSON environment variable
    pub static SERVICE_ACCOUNT: Lazy<Option<String>> = Lazy::new(|| non_empty_var("SERVICE_ACCOUNT_JSON"));

    /// Base URL of the Drive API (overridable for local testing)
    pub static API_URL: Lazy<String> =
        Lazy::new(|| non_empty_var("DRIVE_API_URL").unwrap_or_else(|| "https://www.googleapis.com".to_string()));

    /// Folder name matching policy: "exact" or "case_insensitive"
    /// Default: case_insensitive
    pub static NAME_MATCH: Lazy<NameMatch> = Lazy::new(|| {
        non_empty_var("DRIVE_NAME_MATCH")
            .and_then(|v| v.parse().ok())
            .unwrap_or(NameMatch::CaseInsensitive)
    });

    /// Page size for list requests (Drive caps it at 1000)
    pub static PAGE_SIZE: Lazy<u32> = Lazy::new(|| {
        non_empty_var("DRIVE_PAGE_SIZE")
            .and_then(|v| v.parse().ok())
            .unwrap_or(100)
            .clamp(1, 1000)
    });

    /// TTL of the (parent, name) resolution cache in seconds; 0 disables it
    pub static RESOLVE_CACHE_TTL_SECS: Lazy<u64> = Lazy::new(|| {
        non_empty_var("DRIVE_RESOLVE_CACHE_TTL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(300)
    });

    /// Request timeout for Drive calls (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 120;

    pub fn request_timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }

    pub fn resolve_cache_ttl() -> Option<Duration> {
        match *RESOLVE_CACHE_TTL_SECS {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Browse flow configuration
pub mod browse {
    use super::{non_empty_var, Duration, Lazy};

    /// Seconds a fetch may run before the user gets a "still working" message
    /// Read from SLOW_FETCH_NOTICE_SECS environment variable
    /// Default: 7
    pub static SLOW_FETCH_NOTICE_SECS: Lazy<u64> = Lazy::new(|| {
        non_empty_var("SLOW_FETCH_NOTICE_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(7)
    });

    /// Minimum seconds between two /notes or /assignments commands of one user
    /// Read from BROWSE_COOLDOWN_SECS environment variable
    /// Default: 3
    pub static COOLDOWN_SECS: Lazy<u64> = Lazy::new(|| {
        non_empty_var("BROWSE_COOLDOWN_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(3)
    });

    /// Seconds without activity after which a user's session is dropped
    /// Read from SESSION_IDLE_SECS environment variable
    /// Default: 3600
    pub static SESSION_IDLE_SECS: Lazy<u64> = Lazy::new(|| {
        non_empty_var("SESSION_IDLE_SECS")
            .and_then(|v| v.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(3600)
    });

    /// How often idle sessions are swept
    pub const SESSION_SWEEP_INTERVAL_SECS: u64 = 300;

    pub fn slow_fetch_notice() -> Duration {
        Duration::from_secs(*SLOW_FETCH_NOTICE_SECS)
    }

    pub fn session_idle() -> Duration {
        Duration::from_secs(*SESSION_IDLE_SECS)
    }

    pub fn session_sweep_interval() -> Duration {
        Duration::from_secs(SESSION_SWEEP_INTERVAL_SECS)
    }

    pub fn cooldown() -> Duration {
        Duration::from_secs(*COOLDOWN_SECS)
    }
}

/// Leaderboard configuration
pub mod leaderboard {
    use super::Duration;

    /// Number of users shown
    pub const TOP_N: usize = 10;

    /// How long per-branch file totals stay cached (in seconds)
    pub const BRANCH_TOTALS_TTL_SECS: u64 = 600;

    pub fn branch_totals_ttl() -> Duration {
        Duration::from_secs(BRANCH_TOTALS_TTL_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Telegram HTTP requests (in seconds)
    /// Generous because documents are uploaded through the same client
    pub const REQUEST_TIMEOUT_SECS: u64 = 300;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Owner configuration
pub mod admin {
    use super::{non_empty_var, Lazy};

    pub(crate) fn parse_owner_ids(raw: &str) -> Vec<i64> {
        raw.split([',', ' ', '\n', '\t'])
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect()
    }

    /// Owner user IDs (comma-separated)
    /// Read from OWNER_IDS environment variable
    pub static OWNER_IDS: Lazy<Vec<i64>> = Lazy::new(|| {
        non_empty_var("OWNER_IDS")
            .map(|raw| parse_owner_ids(&raw))
            .unwrap_or_default()
    });

    pub fn is_owner(user_id: i64) -> bool {
        OWNER_IDS.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::admin::parse_owner_ids;

    #[test]
    fn test_parse_owner_ids_mixed_separators() {
        assert_eq!(parse_owner_ids("1, 2\n3\t4"), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_owner_ids_skips_garbage() {
        assert_eq!(parse_owner_ids("abc,,42,-7"), vec![42, -7]);
        assert!(parse_owner_ids("").is_empty());
    }
}
