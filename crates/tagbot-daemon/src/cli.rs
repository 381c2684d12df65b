//! CLI argument parsing for the tagbot binary.
//!
//! CLI flags override every other configuration source.

use clap::{Parser, Subcommand, ValueEnum};

use tagbot_types::BackendKind;

/// Tagbot
///
/// Tag media with free-form tags and emoji, then find it again.
#[derive(Parser, Debug)]
#[command(name = "tagbot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/tagbot/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override the search backend
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendArg>,

    /// Override the Elasticsearch URL
    #[arg(long, global = true)]
    pub elastic_url: Option<String>,

    /// Override the embedded index directory
    #[arg(long, global = true)]
    pub embedded_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    Elastic,
    Embedded,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Elastic => BackendKind::Elastic,
            BackendArg::Embedded => BackendKind::Embedded,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision access, migrate the main index and reset the transfer index
    Init,

    /// Show index state and schema hashes
    Status,

    /// Show how a query or tag edit is parsed
    Parse {
        /// Parse as a tag edit instead of a search query
        #[arg(long, conflicts_with = "last")]
        tags: bool,

        /// Re-parse the owner's last search query
        #[arg(long, requires = "owner")]
        last: bool,

        #[arg(long)]
        owner: Option<i64>,

        #[arg(required_unless_present = "last", conflicts_with = "last", num_args = 1..)]
        text: Vec<String>,
    },

    /// Search an owner's media
    Search {
        #[arg(long)]
        owner: i64,

        /// Page number
        #[arg(long, default_value = "0")]
        offset: usize,

        text: Vec<String>,
    },

    /// Apply a tag edit to a media item
    Tag {
        #[arg(long)]
        owner: i64,

        /// JSON file describing the replied-to media
        #[arg(long)]
        media: String,

        /// JSON file with known sticker packs
        #[arg(long)]
        packs: Option<String>,

        /// Replace tags and emoji instead of adding and removing
        #[arg(long)]
        replace: bool,

        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Show the tags of a media item
    Show {
        #[arg(long)]
        owner: i64,

        id: i64,
    },

    /// Delete an owner's document for a media item
    Delete {
        #[arg(long)]
        owner: i64,

        id: i64,
    },

    /// Record that a search result was chosen
    Select {
        #[arg(long)]
        owner: i64,

        id: i64,
    },
}

impl Commands {
    /// Whether the command reads or writes the main index.
    pub fn needs_index(&self) -> bool {
        matches!(
            self,
            Commands::Search { .. }
                | Commands::Tag { .. }
                | Commands::Show { .. }
                | Commands::Delete { .. }
                | Commands::Select { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_init() {
        let cli = Cli::parse_from(["tagbot", "init"]);
        assert!(matches!(cli.command, Commands::Init));
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["tagbot", "--config", "/path/to/config.toml", "status"]);
        assert_eq!(cli.config, Some("/path/to/config.toml".to_string()));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_cli_backend_override() {
        let cli = Cli::parse_from(["tagbot", "status", "--backend", "embedded"]);
        assert_eq!(cli.backend, Some(BackendArg::Embedded));
        assert_eq!(BackendKind::from(BackendArg::Embedded), BackendKind::Embedded);
    }

    #[test]
    fn test_cli_search() {
        let cli = Cli::parse_from([
            "tagbot", "search", "--owner", "5", "--offset", "2", "type:gif", "cat",
        ]);
        match cli.command {
            Commands::Search {
                owner,
                offset,
                text,
            } => {
                assert_eq!(owner, 5);
                assert_eq!(offset, 2);
                assert_eq!(text, vec!["type:gif", "cat"]);
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_search_without_text() {
        let cli = Cli::parse_from(["tagbot", "search", "--owner", "5"]);
        match cli.command {
            Commands::Search { text, offset, .. } => {
                assert!(text.is_empty());
                assert_eq!(offset, 0);
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_tag() {
        let cli = Cli::parse_from([
            "tagbot", "tag", "--owner", "1", "--media", "m.json", "--replace", "--", "cat", "-dog",
        ]);
        match cli.command {
            Commands::Tag {
                media,
                packs,
                replace,
                text,
                ..
            } => {
                assert_eq!(media, "m.json");
                assert_eq!(packs, None);
                assert!(replace);
                assert_eq!(text, vec!["cat", "-dog"]);
            }
            _ => panic!("Expected Tag command"),
        }
    }

    #[test]
    fn test_cli_parse_requires_text() {
        assert!(Cli::try_parse_from(["tagbot", "parse"]).is_err());
    }

    #[test]
    fn test_cli_parse_last() {
        let cli = Cli::parse_from(["tagbot", "parse", "--last", "--owner", "3"]);
        match cli.command {
            Commands::Parse {
                last, owner, text, ..
            } => {
                assert!(last);
                assert_eq!(owner, Some(3));
                assert!(text.is_empty());
            }
            _ => panic!("Expected Parse command"),
        }

        assert!(Cli::try_parse_from(["tagbot", "parse", "--last"]).is_err());
        assert!(Cli::try_parse_from(["tagbot", "parse", "--last", "--owner", "3", "cat"]).is_err());
    }

    #[test]
    fn test_data_commands_need_index() {
        let search = Cli::parse_from(["tagbot", "search", "--owner", "1"]);
        assert!(search.command.needs_index());
        let show = Cli::parse_from(["tagbot", "show", "--owner", "1", "5"]);
        assert!(show.command.needs_index());

        for args in [
            vec!["tagbot", "init"],
            vec!["tagbot", "status"],
            vec!["tagbot", "parse", "cat"],
        ] {
            assert!(!Cli::parse_from(args).command.needs_index());
        }
    }
}
