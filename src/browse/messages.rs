//! User-facing texts of the browse flow.

use super::BrowseKind;

pub const PLEASE_WAIT: &str = "⏳ Please wait, I'm processing your previous request.";
pub const SETUP_REQUIRED: &str = "Please run /start first to set up your profile.";
pub const DRIVE_UNAVAILABLE: &str = "Could not connect to Google Drive right now. Please try again in a moment.";
pub const NO_SUBJECTS: &str = "No subjects found for your branch.";
pub const MENU_EXPIRED: &str = "This menu has expired. Please run /notes or /assignments again.";
pub const SLOW_FETCH: &str = "This is taking a moment, please wait...";

pub fn year_folder_missing(year: &str) -> String {
    format!("Could not find the folder for '{}' on Drive.", year)
}

pub fn branch_folder_missing(branch: &str) -> String {
    format!("Could not find the '{}' branch folder on Drive.", branch)
}

pub fn choose_subject(kind: BrowseKind) -> String {
    format!("Please select a subject to get {}:", kind.label())
}

pub fn kind_folder_missing(kind: BrowseKind, subject: &str) -> String {
    format!("The '{}' folder for '{}' doesn't exist.", kind.folder_name(), subject)
}

pub fn no_files(kind: BrowseKind, subject: &str) -> String {
    format!("No {} found for '{}'.", kind.label(), subject)
}

pub fn choose_file(subject: &str) -> String {
    format!("Select a file from '{}':", subject)
}

pub fn preparing(file_name: &str) -> String {
    format!("⬇️ Preparing to download '{}'...", file_name)
}

pub fn download_failed(file_name: &str) -> String {
    format!("❌ Sorry, failed to download '{}'.", file_name)
}
