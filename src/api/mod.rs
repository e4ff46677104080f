// Typed endpoints of the shuro service
//
// Every call goes through HttpTransport and validates the decoded body
// before handing it to the caller.

pub mod models;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use models::*;
use crate::config::ApiConfig;
use crate::error::{Result, ClientError};
use crate::transport::{HttpTransport, RequestOptions};

/// Client for the shuro project API
#[derive(Debug, Clone)]
pub struct ShuroApi {
    transport: HttpTransport,
}

impl ShuroApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Ok(Self::with_transport(HttpTransport::new(config)?))
    }

    pub fn with_transport(transport: HttpTransport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    async fn fetch<T>(&self, path: &str, options: RequestOptions, cancel: &CancellationToken) -> Result<T>
    where
        T: DeserializeOwned + Validate,
    {
        let value: T = self.transport.request(path, options, cancel).await?;
        value.validate()?;
        Ok(value)
    }

    pub async fn list_projects(&self, cancel: &CancellationToken) -> Result<Vec<Project>> {
        self.fetch("projects", RequestOptions::get(), cancel).await
    }

    pub async fn get_project(&self, id: &str, cancel: &CancellationToken) -> Result<Project> {
        self.fetch(&project_path(id, "")?, RequestOptions::get(), cancel).await
    }

    pub async fn create_project(&self, project: &NewProject, cancel: &CancellationToken) -> Result<Project> {
        if project.target_languages.is_empty() {
            return Err(ClientError::Config("at least one target language is required".to_string()));
        }
        debug!("Creating project for {}", project.source_url);
        self.fetch("projects", RequestOptions::post(project)?, cancel).await
    }

    /// Re-run the pipeline of a failed project
    pub async fn retry_project(&self, id: &str, cancel: &CancellationToken) -> Result<Project> {
        let options = RequestOptions::new(reqwest::Method::POST);
        self.fetch(&project_path(id, "retry")?, options, cancel).await
    }

    pub async fn delete_project(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        self.transport
            .request::<serde_json::Value>(&project_path(id, "")?, RequestOptions::delete(), cancel)
            .await?;
        Ok(())
    }

    pub async fn get_preview(&self, id: &str, cancel: &CancellationToken) -> Result<Preview> {
        self.fetch(&project_path(id, "preview")?, RequestOptions::get(), cancel).await
    }

    pub async fn get_subtitles(
        &self,
        id: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SubtitleSegment>> {
        let options = RequestOptions::get().with_query("lang", language);
        self.fetch(&project_path(id, "subtitles")?, options, cancel).await
    }

    pub async fn update_subtitles(
        &self,
        id: &str,
        language: &str,
        segments: &[SubtitleSegment],
        cancel: &CancellationToken,
    ) -> Result<Vec<SubtitleSegment>> {
        segments.iter().try_for_each(Validate::validate)?;
        let body = SubtitleUpdate {
            segments: segments.to_vec(),
        };
        let options = RequestOptions::put(&body)?.with_query("lang", language);
        self.fetch(&project_path(id, "subtitles")?, options, cancel).await
    }

    pub async fn list_exports(&self, id: &str, cancel: &CancellationToken) -> Result<Vec<ExportItem>> {
        self.fetch(&project_path(id, "exports")?, RequestOptions::get(), cancel).await
    }

    pub async fn create_export(
        &self,
        id: &str,
        request: &ExportRequest,
        cancel: &CancellationToken,
    ) -> Result<ExportItem> {
        self.fetch(&project_path(id, "exports")?, RequestOptions::post(request)?, cancel).await
    }
}

/// `projects/{id}` or `projects/{id}/{suffix}`
fn project_path(id: &str, suffix: &str) -> Result<String> {
    let id = id.trim();
    if id.is_empty() || id.contains(['/', '?', '#']) {
        return Err(ClientError::InvalidUrl(format!("invalid project id '{}'", id)));
    }
    if suffix.is_empty() {
        Ok(format!("projects/{}", id))
    } else {
        Ok(format!("projects/{}/{}", id, suffix))
    }
}
