use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Base URL of the shuro service (overrides configuration)
    #[arg(long)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List translation projects
    Projects {
        /// Keep refreshing the list
        #[arg(short, long)]
        watch: bool,

        /// Number of refreshes before exiting in watch mode
        #[arg(long, default_value = "40")]
        updates: usize,
    },

    /// Create a translation project from a video URL
    Create {
        /// URL of the source video
        #[arg(short, long)]
        source: String,

        /// Target languages for translation (comma-separated)
        #[arg(short, long, default_value = "ja")]
        target_langs: String,

        /// Source language hint (detected when omitted)
        #[arg(short, long)]
        language: Option<String>,

        /// Display name of the project
        #[arg(short, long)]
        name: Option<String>,

        /// Follow the pipeline until it finishes
        #[arg(short, long)]
        follow: bool,
    },

    /// Follow a project's pipeline until it completes or fails
    Follow {
        /// Project id
        id: String,
    },

    /// Restart the pipeline of a failed project
    Retry {
        /// Project id
        id: String,

        /// Follow the pipeline until it finishes
        #[arg(short, long)]
        follow: bool,
    },

    /// Delete a project
    Delete {
        /// Project id
        id: String,
    },

    /// Show the subtitle preview of a project
    Preview {
        /// Project id
        id: String,

        /// Maximum number of segments to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show or edit subtitles of a project
    Subtitles {
        /// Project id
        id: String,

        /// Subtitle language
        #[arg(short, long)]
        lang: String,

        /// Replace the subtitles with segments from a JSON file
        #[arg(long)]
        update: Option<PathBuf>,
    },

    /// List exports of a project
    Exports {
        /// Project id
        id: String,
    },

    /// Request a new export of a project
    Export {
        /// Project id
        id: String,

        /// Export format (srt, vtt, ass, video)
        #[arg(short, long, default_value = "srt")]
        format: String,

        /// Subtitle language to export
        #[arg(short, long)]
        lang: Option<String>,
    },

    /// Show recently viewed projects
    History,
}

/// Split a comma-separated language list
pub fn parse_languages(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
