//! Tagbot
//!
//! Operator entry point for the tagging core: index initialization and
//! direct access to parsing, searching and tagging.
//!
//! # Usage
//!
//! ```bash
//! tagbot init
//! tagbot status
//! tagbot parse 'type:gif cat !dog'
//! tagbot parse --last --owner 1
//! tagbot search --owner 1 type:photo cute
//! tagbot tag --owner 1 --media media.json cat -blurry
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/tagbot/config.toml)
//! 3. Environment variables (TAGBOT_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use tagbot_daemon::{init_logging, load_settings, open_backend, App, Cli, Overrides};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = Overrides {
        backend: cli.backend.map(Into::into),
        elastic_url: cli.elastic_url.clone(),
        embedded_path: cli.embedded_path.clone(),
        log_level: cli.log_level.clone(),
    };
    let settings = load_settings(cli.config.as_deref(), &overrides)?;
    init_logging(&settings)?;

    let backend = open_backend(&settings)?;
    let app = App::new(settings, backend)?;
    let output = app.run(cli.command).await?;
    println!("{}", output);

    Ok(())
}
