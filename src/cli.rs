use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "campusdrive")]
#[command(author, version, about = "Telegram bot for browsing course notes and assignments on Google Drive", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot in normal mode
    Run {
        /// Use webhook mode instead of long polling
        #[arg(long)]
        webhook: bool,
    },

    /// Resolve a folder path under the root folder and list what it contains
    Resolve {
        /// Folder names from the root, e.g. `2nd_Year CSE DSA Notes`
        #[arg(required = true)]
        segments: Vec<String>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolve_segments() {
        let cli = Cli::try_parse_from(["campusdrive", "resolve", "2nd_Year", "CSE"]).unwrap();
        match cli.command {
            Some(Commands::Resolve { segments }) => assert_eq!(segments, vec!["2nd_Year", "CSE"]),
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn test_no_subcommand_defaults_to_none() {
        let cli = Cli::try_parse_from(["campusdrive"]).unwrap();
        assert!(cli.command.is_none());
    }
}
