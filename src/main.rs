//! Shuro Client - Polling client for the shuro subtitle translation service
//!
//! Entry point of the command-line client: lists and creates translation
//! projects, follows their pipeline, and shows previews, subtitles and
//! exports.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use shuro_client::api::{ExportFormat, ExportRequest, NewProject, Project, ProjectStatus, ShuroApi, SubtitleSegment};
use shuro_client::cli::{parse_languages, Args, Commands};
use shuro_client::config::Config;
use shuro_client::error::ClientError;
use shuro_client::history::{FileJobHistory, JobHistory};
use shuro_client::monitor::ProjectMonitor;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;
    info!("Starting Shuro client");

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };
    config.apply_env();
    if let Some(url) = &args.api_url {
        config.api.base_url = url.clone();
    }
    config.validate()?;
    info!("Using shuro service at {}", config.api.base_url);

    let api = Arc::new(ShuroApi::new(&config.api)?);
    let history: Arc<dyn JobHistory> = Arc::new(FileJobHistory::from_config(&config.history));
    let monitor = ProjectMonitor::new(api.clone(), history.clone(), &config.polling);

    // Ctrl-C cancels whatever is in flight
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    match args.command {
        Commands::Projects { watch, updates } => {
            if watch {
                let watching = monitor.watch_list(updates, |state| {
                    if let Some(error) = &state.error {
                        println!("Refresh failed: {}", error);
                    }
                    if let Some(projects) = &state.data {
                        print_projects(projects);
                    }
                });
                tokio::select! {
                    result = watching => result?,
                    _ = cancel.cancelled() => info!("Stopped watching projects"),
                }
            } else {
                let projects = api.list_projects(&cancel).await?;
                print_projects(&projects);
            }
        }
        Commands::Create { source, target_langs, language, name, follow } => {
            let project = NewProject {
                source_url: source,
                name,
                source_language: language,
                target_languages: parse_languages(&target_langs),
            };
            let created = api.create_project(&project, &cancel).await?;
            println!("Created project {} ({})", created.id, created.status);
            record_history(history.as_ref(), &created.id);

            if follow {
                follow_project(&monitor, &created.id, &cancel).await?;
            }
        }
        Commands::Follow { id } => {
            follow_project(&monitor, &id, &cancel).await?;
        }
        Commands::Retry { id, follow } => {
            let project = api.retry_project(&id, &cancel).await?;
            println!("Restarted project {} ({})", project.id, project.status);

            if follow {
                follow_project(&monitor, &id, &cancel).await?;
            }
        }
        Commands::Delete { id } => {
            api.delete_project(&id, &cancel).await?;
            println!("Deleted project {}", id);
        }
        Commands::Preview { id, limit } => {
            record_history(history.as_ref(), &id);
            let preview = api.get_preview(&id, &cancel).await?;

            println!("\nPreview of {}", preview.project_id);
            if let Some(url) = &preview.video_url {
                println!("Video: {}", url);
            }
            if !preview.languages.is_empty() {
                println!("Languages: {}", preview.languages.join(", "));
            }
            print_segments(&preview.segments, limit);
        }
        Commands::Subtitles { id, lang, update } => {
            let segments = match update {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)?;
                    let segments: Vec<SubtitleSegment> = serde_json::from_str(&content)?;
                    info!("Uploading {} segments from {}", segments.len(), path.display());
                    api.update_subtitles(&id, &lang, &segments, &cancel).await?
                }
                None => api.get_subtitles(&id, &lang, &cancel).await?,
            };
            print_segments(&segments, usize::MAX);
        }
        Commands::Exports { id } => {
            let exports = api.list_exports(&id, &cancel).await?;
            if exports.is_empty() {
                println!("No exports found.");
            } else {
                println!("\n{:<38} {:<8} {:<10} {:<8} {:<50}", "Id", "Format", "Language", "Ready", "Download");
                println!("{}", "-".repeat(116));
                for export in exports {
                    println!(
                        "{:<38} {:<8} {:<10} {:<8} {:<50}",
                        export.id,
                        export.format,
                        export.language.as_deref().unwrap_or("-"),
                        if export.ready { "yes" } else { "no" },
                        export.download_url.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Commands::Export { id, format, lang } => {
            let request = ExportRequest {
                format: format.parse::<ExportFormat>()?,
                language: lang,
            };
            let export = api.create_export(&id, &request, &cancel).await?;
            println!("Requested {} export {} for project {}", export.format, export.id, id);
        }
        Commands::History => {
            let ids = history.get()?;
            if ids.is_empty() {
                println!("No recently viewed projects.");
            }
            for id in ids {
                match api.get_project(&id, &cancel).await {
                    Ok(project) => println!("{:<38} {:<12} {}", project.id, project.status, project.display_name()),
                    Err(e) => println!("{:<38} {:<12} {}", id, "?", e),
                }
            }
        }
    }

    info!("Shuro client finished");
    Ok(())
}

async fn follow_project(monitor: &ProjectMonitor, id: &str, cancel: &CancellationToken) -> Result<()> {
    let project = tokio::select! {
        result = monitor.follow(id) => result?,
        _ = cancel.cancelled() => {
            warn!("Interrupted while following {}", id);
            return Err(ClientError::Cancelled.into());
        }
    };

    match project.status {
        ProjectStatus::Completed => {
            println!("Project {} completed", project.display_name());
            Ok(())
        }
        status => Err(anyhow::anyhow!(
            "Project {} ended with status {}: {}",
            project.display_name(),
            status,
            project.error.as_deref().unwrap_or("no details")
        )),
    }
}

fn record_history(history: &dyn JobHistory, id: &str) {
    if let Err(e) = history.add(id) {
        warn!("Failed to record {} in job history: {}", id, e);
    }
}

fn print_projects(projects: &[Project]) {
    if projects.is_empty() {
        println!("No projects found.");
        return;
    }

    println!("\n{:<38} {:<12} {:<9} {:<15} {:<30}", "Id", "Status", "Progress", "Updated", "Name");
    println!("{}", "-".repeat(108));

    let now = chrono::Utc::now();
    for project in projects {
        let updated = project
            .updated_at
            .or(project.created_at)
            .map(|at| format!("{} ago", format_duration((now - at).num_seconds().max(0) as u64)))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<38} {:<12} {:<9} {:<15} {:<30}",
            project.id,
            project.status,
            format!("{}%", project.percent()),
            updated,
            project.display_name()
        );
    }
}

fn print_segments(segments: &[SubtitleSegment], limit: usize) {
    if segments.is_empty() {
        println!("No subtitles available.");
        return;
    }

    for segment in segments.iter().take(limit) {
        println!(
            "\n{} [{} -> {}]\n{}",
            segment.index,
            format_timestamp(segment.start),
            format_timestamp(segment.end),
            segment.text.trim()
        );
        if let Some(translation) = &segment.translation {
            println!("{}", translation.trim());
        }
    }

    if segments.len() > limit {
        println!("\n... {} more segments", segments.len() - limit);
    }
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".shuro").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "shuro-client.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Console output stays terse; tables and progress bars go to stdout
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("shuro-client.log").display());

    Ok(())
}

/// Format duration in seconds to human readable string
fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86_400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86_400, (seconds % 86_400) / 3600)
    }
}

/// Format seconds as HH:MM:SS.mmm
fn format_timestamp(seconds: f64) -> String {
    let total_milliseconds = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00:00.000");
        assert_eq!(format_timestamp(65.123), "00:01:05.123");
        assert_eq!(format_timestamp(3661.5), "01:01:01.500");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(7_260), "2h 1m");
        assert_eq!(format_duration(90_000), "1d 1h");
    }
}
