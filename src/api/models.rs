use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::{Result, ClientError};

/// Schema checks applied to decoded responses before they reach consumers
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<()> {
        self.iter().try_for_each(Validate::validate)
    }
}

fn invalid(message: impl Into<String>) -> ClientError {
    ClientError::InvalidResponse(message.into())
}

/// Decode an explicit `null` the same way as a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
    /// Status added on the server after this client was built
    #[serde(other)]
    Unknown,
}

impl ProjectStatus {
    /// No further pipeline progress will happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage reported for a running project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    AudioExtraction,
    Vad,
    Transcription,
    Correction,
    Translation,
    Rendering,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AudioExtraction => "audio extraction",
            Self::Vad => "voice activity detection",
            Self::Transcription => "transcription",
            Self::Correction => "correction",
            Self::Translation => "translation",
            Self::Rendering => "rendering",
            Self::Unknown => "unknown stage",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub status: ProjectStatus,
    /// Overall progress in percent
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub current_stage: Option<PipelineStage>,
    #[serde(default)]
    pub source_language: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub target_languages: Vec<String>,
    /// Failure reason for failed projects
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Progress clamped to 0..=100, treating completed projects as 100
    pub fn percent(&self) -> u64 {
        if self.status == ProjectStatus::Completed {
            return 100;
        }
        self.progress.unwrap_or(0.0).clamp(0.0, 100.0).round() as u64
    }
}

impl Validate for Project {
    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(invalid("project without id"));
        }
        if let Some(progress) = self.progress {
            if !progress.is_finite() {
                return Err(invalid(format!("project {} has non-finite progress", self.id)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Left to detection when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
    pub target_languages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleSegment {
    pub index: u32,
    /// Seconds from the start of the video
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default)]
    pub translation: Option<String>,
}

impl Validate for SubtitleSegment {
    fn validate(&self) -> Result<()> {
        if !(self.start.is_finite() && self.end.is_finite()) || self.start < 0.0 {
            return Err(invalid(format!("segment {} has invalid timestamps", self.index)));
        }
        if self.end < self.start {
            return Err(invalid(format!(
                "segment {} ends before it starts ({} < {})",
                self.index, self.end, self.start
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preview {
    pub project_id: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub languages: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub segments: Vec<SubtitleSegment>,
}

impl Validate for Preview {
    fn validate(&self) -> Result<()> {
        self.segments.validate()
    }
}

/// Body of a subtitle update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleUpdate {
    pub segments: Vec<SubtitleSegment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Srt,
    Vtt,
    Ass,
    /// Video with subtitles embedded
    Video,
    #[serde(other)]
    Unknown,
}

impl std::str::FromStr for ExportFormat {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "srt" => Ok(Self::Srt),
            "vtt" => Ok(Self::Vtt),
            "ass" => Ok(Self::Ass),
            "video" | "mp4" => Ok(Self::Video),
            _ => Err(ClientError::Config(format!(
                "Invalid export format '{}'. Valid formats: srt, vtt, ass, video",
                s
            ))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Srt => "srt",
            Self::Vtt => "vtt",
            Self::Ass => "ass",
            Self::Video => "video",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub format: ExportFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportItem {
    pub id: String,
    pub format: ExportFormat,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ready: bool,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Validate for ExportItem {
    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(invalid("export without id"));
        }
        if self.ready && self.download_url.is_none() {
            return Err(invalid(format!("export {} is ready but has no download URL", self.id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::assert_ok;

    #[test]
    fn test_project_with_sparse_fields() {
        let project: Project = serde_json::from_value(json!({
            "id": "p-1",
            "status": "processing",
            "progress": 42.4,
            "current_stage": "translation",
            "created_at": "2024-05-01T12:00:00Z",
            "error": null
        }))
        .unwrap();

        assert_eq!(project.status, ProjectStatus::Processing);
        assert_eq!(project.current_stage, Some(PipelineStage::Translation));
        assert_eq!(project.display_name(), "p-1");
        assert_eq!(project.percent(), 42);
        assert!(project.target_languages.is_empty());
        assert!(project.validate().is_ok());
    }

    #[test]
    fn test_null_collections_decode_as_empty() {
        let project: Project = assert_ok!(serde_json::from_value(json!({
            "id": "p-4",
            "status": "processing",
            "target_languages": null
        })));
        assert!(project.target_languages.is_empty());

        let preview: Preview = assert_ok!(serde_json::from_value(json!({
            "project_id": "p-4",
            "video_url": null,
            "languages": null,
            "segments": null
        })));
        assert!(preview.languages.is_empty());
        assert!(preview.segments.is_empty());
        assert_ok!(preview.validate());

        let export: ExportItem = assert_ok!(serde_json::from_value(json!({
            "id": "e-2",
            "format": "vtt",
            "ready": null
        })));
        assert!(!export.ready);
    }

    #[test]
    fn test_unknown_status_and_stage_are_tolerated() {
        let project: Project = serde_json::from_value(json!({
            "id": "p-2",
            "status": "archiving",
            "current_stage": "diarization"
        }))
        .unwrap();
        assert_eq!(project.status, ProjectStatus::Unknown);
        assert_eq!(project.current_stage, Some(PipelineStage::Unknown));
        assert!(!project.status.is_terminal());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ProjectStatus::Completed.is_terminal());
        assert!(ProjectStatus::Failed.is_terminal());
        assert!(ProjectStatus::Cancelled.is_terminal());
        assert!(!ProjectStatus::Processing.is_terminal());
        assert!(!ProjectStatus::Queued.is_terminal());
    }

    #[test]
    fn test_completed_project_reports_full_progress() {
        let project: Project = serde_json::from_value(json!({
            "id": "p-3",
            "status": "completed",
            "progress": 97.0
        }))
        .unwrap();
        assert_eq!(project.percent(), 100);
    }

    #[test]
    fn test_empty_id_is_rejected() {
        let project: Project = serde_json::from_value(json!({"id": " ", "status": "pending"})).unwrap();
        assert!(matches!(project.validate(), Err(ClientError::InvalidResponse(_))));
    }

    #[test]
    fn test_segment_validation() {
        let segment = SubtitleSegment {
            index: 3,
            start: 5.0,
            end: 4.0,
            text: "hello".to_string(),
            translation: None,
        };
        assert!(segment.validate().is_err());

        let preview = Preview {
            project_id: "p-1".to_string(),
            video_url: None,
            languages: vec!["ja".to_string()],
            segments: vec![SubtitleSegment { end: 6.0, ..segment }],
        };
        assert!(preview.validate().is_ok());
    }

    #[test]
    fn test_ready_export_needs_url() {
        let export: ExportItem = serde_json::from_value(json!({
            "id": "e-1",
            "format": "srt",
            "ready": true
        }))
        .unwrap();
        assert!(export.validate().is_err());
    }

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("SRT".parse::<ExportFormat>().unwrap(), ExportFormat::Srt);
        assert_eq!("mp4".parse::<ExportFormat>().unwrap(), ExportFormat::Video);
        assert!("gif".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_new_project_omits_empty_options() {
        let body = serde_json::to_value(NewProject {
            source_url: "https://example.com/video.mp4".to_string(),
            name: None,
            source_language: None,
            target_languages: vec!["ja".to_string(), "ko".to_string()],
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"source_url": "https://example.com/video.mp4", "target_languages": ["ja", "ko"]})
        );
    }
}
