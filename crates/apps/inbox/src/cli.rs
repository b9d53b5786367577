//! Command-line surface

use crate::expansion::BucketPath;
use clap::{Parser, Subcommand, ValueEnum};
use mail::{ReadFilter, StarredFilter, Urgency, UrgencyFilter};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "inbox", version, about = "Browse, search and sync an analyzed mailbox")]
pub struct Cli {
    /// Serve emails from a JSON fixture instead of the server
    #[arg(long, global = true, value_name = "PATH")]
    pub fixture: Option<PathBuf>,

    /// Client config file (defaults to ~/.config/mailsift/client.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Server API base URL, overriding config and environment
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the filtered inbox as a year / month / day tree
    List {
        /// Urgency filter: all, high, medium, low (or 全/高/中/低)
        #[arg(long, default_value = "all")]
        urgency: UrgencyFilter,

        /// Read filter: all, unread, read
        #[arg(long, default_value = "all")]
        read: ReadFilter,

        /// Starred filter: all, starred
        #[arg(long, default_value = "all")]
        starred: StarredFilter,

        /// How far to expand the tree
        #[arg(long, value_enum, default_value_t = Depth::Day)]
        depth: Depth,

        /// Flip one node (YYYY, YYYY-MM or YYYY-MM-DD) after expanding
        #[arg(long, value_name = "NODE")]
        toggle: Vec<BucketPath>,

        /// Flip all children of a node together
        #[arg(long, value_name = "NODE")]
        toggle_children: Vec<BucketPath>,

        /// Search term to highlight in summaries
        #[arg(long)]
        highlight: Option<String>,
    },

    /// Open an email and mark it read
    Show {
        id: String,

        /// Search term to highlight in the body and analysis
        #[arg(long)]
        highlight: Option<String>,
    },

    /// Toggle the starred flag
    Star { id: String },

    /// Toggle the read flag
    Read { id: String },

    /// Set the urgency level, or step it when no level is given
    Urgency {
        id: String,

        /// high, medium, low (or 高/中/低)
        level: Option<Urgency>,
    },

    /// Search the mailbox; `/from:`, `/subject:`, `/body:`, `/analysis:` and `/starred` narrow the scope
    Search {
        query: String,

        /// Skip the input debounce
        #[arg(long)]
        now: bool,
    },

    /// Run a mail sync and stream its progress
    Sync,

    /// Show or change server settings
    Settings {
        /// Update a setting, e.g. `--set FETCH_DAYS_AGO=7`
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        set: Vec<(String, String)>,
    },

    /// List the server's mailboxes
    Mailboxes,
}

/// Tree expansion depth for `list`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Depth {
    /// Years only
    Year,
    /// Years and months
    Month,
    /// Everything, down to the emails
    Day,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in {s:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_list_parses_filters() {
        let cli = Cli::parse_from(["inbox", "list", "--urgency", "高", "--read", "unread", "--depth", "month"]);
        match cli.command {
            Commands::List {
                urgency, read, starred, depth, ..
            } => {
                assert_eq!(urgency, UrgencyFilter::Only(Urgency::High));
                assert_eq!(read, ReadFilter::Unread);
                assert_eq!(starred, StarredFilter::All);
                assert_eq!(depth, Depth::Month);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_list_toggles() {
        let cli = Cli::parse_from(["inbox", "list", "--toggle", "2025-01", "--toggle-children", "2024"]);
        match cli.command {
            Commands::List {
                toggle, toggle_children, ..
            } => {
                assert_eq!(toggle, vec![BucketPath::Month(2025, 1)]);
                assert_eq!(toggle_children, vec![BucketPath::Year(2024)]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_fixture_after_subcommand() {
        let cli = Cli::parse_from(["inbox", "sync", "--fixture", "mail.json"]);
        assert_eq!(cli.fixture, Some(PathBuf::from("mail.json")));
        assert!(matches!(cli.command, Commands::Sync));
    }

    #[test]
    fn test_settings_key_value() {
        let cli = Cli::parse_from(["inbox", "settings", "--set", "FETCH_DAYS_AGO=7", "--set", "MAILBOX=a=b"]);
        match cli.command {
            Commands::Settings { set } => assert_eq!(
                set,
                vec![
                    ("FETCH_DAYS_AGO".to_string(), "7".to_string()),
                    ("MAILBOX".to_string(), "a=b".to_string()),
                ]
            ),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_bad_filter() {
        assert!(Cli::try_parse_from(["inbox", "list", "--read", "maybe"]).is_err());
        assert!(parse_key_value("=x").is_err());
        assert!(parse_key_value("novalue").is_err());
    }

    #[test]
    fn test_urgency_level_is_optional() {
        let cli = Cli::parse_from(["inbox", "urgency", "42"]);
        assert!(matches!(cli.command, Commands::Urgency { level: None, .. }));

        let cli = Cli::parse_from(["inbox", "urgency", "42", "low"]);
        assert!(matches!(cli.command, Commands::Urgency { level: Some(Urgency::Low), .. }));
    }
}
