use std::sync::Arc;
use std::time::Duration;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{Project, ShuroApi};
use crate::config::PollingConfig;
use crate::error::{Result, ClientError};
use crate::history::JobHistory;
use crate::polling::{PollingOptions, PollingResource, ResourceState};

/// Follows projects on the shuro service through polling resources
pub struct ProjectMonitor {
    api: Arc<ShuroApi>,
    history: Arc<dyn JobHistory>,
    job_interval: Duration,
    list_interval: Duration,
    show_progress: bool,
}

impl ProjectMonitor {
    pub fn new(api: Arc<ShuroApi>, history: Arc<dyn JobHistory>, polling: &PollingConfig) -> Self {
        Self {
            api,
            history,
            job_interval: polling.job_interval(),
            list_interval: polling.list_interval(),
            show_progress: true,
        }
    }

    /// Disable the terminal progress bar (non-interactive output, tests)
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Polling resource for one project, stopping at a terminal status
    pub fn project_resource(&self, id: &str, options: PollingOptions<Project>) -> PollingResource<Project> {
        let api = self.api.clone();
        let id = id.to_string();
        let fetcher = move |cancel: CancellationToken| {
            let api = api.clone();
            let id = id.clone();
            async move { api.get_project(&id, &cancel).await }
        };

        PollingResource::spawn(
            fetcher,
            options.stop_when(|project: &Project| project.status.is_terminal()),
        )
    }

    /// Polling resource for the project list
    pub fn list_resource(&self, options: PollingOptions<Vec<Project>>) -> PollingResource<Vec<Project>> {
        let api = self.api.clone();
        let fetcher = move |cancel: CancellationToken| {
            let api = api.clone();
            async move { api.list_projects(&cancel).await }
        };

        PollingResource::spawn(fetcher, options)
    }

    /// Poll a project until its pipeline reaches a terminal status
    pub async fn follow(&self, id: &str) -> Result<Project> {
        info!("Following project {}", id);
        if let Err(e) = self.history.add(id) {
            warn!("Failed to record {} in job history: {}", id, e);
        }

        let bar = self.progress_bar();
        let on_success = {
            let bar = bar.clone();
            move |project: &Project| {
                bar.set_position(project.percent());
                let stage = project
                    .current_stage
                    .map(|stage| stage.to_string())
                    .unwrap_or_else(|| project.status.to_string());
                bar.set_message(stage);
            }
        };
        let on_error = {
            let bar = bar.clone();
            move |e: &ClientError| {
                if e.is_retryable() {
                    bar.set_message(format!("service busy, polling again: {}", e));
                } else {
                    bar.set_message(format!("polling again after error: {}", e));
                }
            }
        };

        let resource = self.project_resource(
            id,
            PollingOptions::new(self.job_interval)
                .on_success(on_success)
                .on_error(on_error),
        );

        let state = resource.wait_for(|state| state.is_stopped()).await;
        resource.teardown().await;

        let project = state?
            .data
            .ok_or_else(|| ClientError::InvalidResponse(format!("no data for project {}", id)))?;

        bar.finish_with_message(project.status.to_string());
        info!("Project {} finished with status {}", id, project.status);
        Ok(project)
    }

    /// Refresh the project list, invoking `on_update` once for every settled
    /// refresh, successful or not. Returns after `updates` successful refreshes.
    pub async fn watch_list<F>(&self, updates: usize, mut on_update: F) -> Result<()>
    where
        F: FnMut(&ResourceState<Vec<Project>>),
    {
        let (settled_tx, mut settled_rx) = mpsc::unbounded_channel();
        let resource = self.list_resource(
            PollingOptions::new(self.list_interval).on_settled(move |state: &ResourceState<Vec<Project>>| {
                let _ = settled_tx.send(state.clone());
            }),
        );

        let mut delivered = 0;
        while delivered < updates {
            let Some(state) = settled_rx.recv().await else {
                return Err(ClientError::Cancelled);
            };
            if state.error.is_none() {
                delivered += 1;
            }
            on_update(&state);
        }

        resource.teardown().await;
        Ok(())
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.enable_steady_tick(Duration::from_millis(200));
        bar
    }
}
