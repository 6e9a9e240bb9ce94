//! Command-line argument definitions for the modelshot CLI.
//!
//! Global flags select the configuration file, the store snapshot and the
//! logging verbosity; each [`Command`] maps to one service operation.

use clap::{Parser, Subcommand};

/// Command-line arguments for the modelshot tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to the store snapshot, overriding `[store].path`
    #[arg(long, global = true)]
    pub store: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse and validate a content model payload
    CheckModel {
        /// Path to the model JSON
        path: String,
    },

    /// Parse a layout payload and print it normalized
    CheckLayout {
        /// Path to the layout JSON
        path: String,
    },

    /// Create a content model
    Create {
        #[arg(long)]
        token: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// Path to the model JSON
        #[arg(long)]
        model: String,
        /// Path to the layout JSON
        #[arg(long)]
        layout: String,
        /// PUBLIC, UNLISTED or PRIVATE
        #[arg(long)]
        visibility: Option<String>,
    },

    /// Update a content model you own
    Update {
        #[arg(long)]
        token: String,
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        visibility: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        layout: Option<String>,
    },

    /// Delete a content model you own
    Delete {
        #[arg(long)]
        token: String,
        #[arg(long)]
        id: String,
    },

    /// Show a content model by slug
    Show {
        slug: String,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        preview_secret: Option<String>,
    },

    /// List content models
    List {
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        count: Option<u32>,
        #[arg(long)]
        search: Option<String>,
        /// Only models of this user
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        visibility: Option<String>,
    },

    /// Render the images of a content model in the foreground
    Screenshot {
        slug: String,
        #[arg(long)]
        skip_meta: bool,
        #[arg(long)]
        skip_diagrams: bool,
    },

    /// Regenerate the images of the most recently created models
    Backfill {
        /// Defaults to `[maintenance].backfill_limit`
        #[arg(long)]
        limit: Option<usize>,
    },
}

impl Command {
    /// True for commands that write to the store or the asset store.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Create { .. }
                | Self::Update { .. }
                | Self::Delete { .. }
                | Self::Screenshot { .. }
                | Self::Backfill { .. }
        )
    }
}
