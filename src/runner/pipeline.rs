use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::pandoc::PandocExporter;
use super::{JobError, JobRunner};
use crate::config::Config;
use crate::task::{JobOutput, Language, TaskInput};
use crate::utils::http::download_audio;

/// The external transcription + summarization pipeline. Opaque to the rest
/// of the service; it may retry internally, we only see the final outcome.
#[async_trait]
pub trait ContentPipeline: Send + Sync + 'static {
    async fn generate(&self, audio: &Path, lang: Language) -> Result<Document, JobError>;
}

/// What the pipeline produces for one audio source.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub title: String,
    pub summary: String,
    pub markdown: String,
}

/// HTTP client for the hosted pipeline endpoint.
pub struct ApiContentPipeline {
    client: reqwest::Client,
    base_url: String,
    transcription_api_key: String,
    llm_api_key: String,
}

impl ApiContentPipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.pipeline_url.trim_end_matches('/').to_string(),
            transcription_api_key: config.transcription_api_key.clone(),
            llm_api_key: config.llm_api_key.clone(),
        }
    }
}

#[async_trait]
impl ContentPipeline for ApiContentPipeline {
    async fn generate(&self, audio: &Path, lang: Language) -> Result<Document, JobError> {
        let bytes = tokio::fs::read(audio)
            .await
            .map_err(|e| JobError::Fatal(format!("failed to read audio file: {}", e)))?;

        let url = format!("{}/v1/generate?lang={}", self.base_url, lang);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.transcription_api_key)
            .header("X-Llm-Api-Key", &self.llm_api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| JobError::Transient(format!("pipeline request failed: {}", e)))?;

        let status = response.status();
        match status {
            s if s.is_success() => response
                .json::<Document>()
                .await
                .map_err(|e| JobError::Fatal(format!("malformed pipeline response: {}", e))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(JobError::AuthRequired(
                "the content pipeline rejected the configured credentials".to_string(),
            )),
            s if s.is_server_error() => {
                Err(JobError::Transient(format!("pipeline unavailable ({})", s)))
            }
            s => {
                let detail = response.text().await.unwrap_or_default();
                Err(JobError::Fatal(format!(
                    "pipeline rejected the request ({}): {}",
                    s, detail
                )))
            }
        }
    }
}

/// The concrete job runner: resolve the input audio, run the content
/// pipeline, export documents.
pub struct PipelineRunner {
    client: reqwest::Client,
    content: Arc<dyn ContentPipeline>,
    exporter: PandocExporter,
    data_dir: PathBuf,
}

impl PipelineRunner {
    pub fn new(
        content: Arc<dyn ContentPipeline>,
        exporter: PandocExporter,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            content,
            exporter,
            data_dir: data_dir.into(),
        }
    }

    async fn resolve_input(&self, input: &TaskInput) -> Result<PathBuf, JobError> {
        match input {
            TaskInput::Url { url } => download_audio(&self.client, url, &self.data_dir)
                .await
                .map_err(|e| JobError::Transient(format!("failed to fetch source audio: {}", e))),
            TaskInput::Upload { file_name } => {
                let path = self.data_dir.join(file_name);
                tokio::fs::metadata(&path).await.map_err(|_| {
                    JobError::Fatal(format!("uploaded file {} is no longer available", file_name))
                })?;
                Ok(path)
            }
        }
    }
}

#[async_trait]
impl JobRunner for PipelineRunner {
    async fn run(&self, input: &TaskInput, lang: Language) -> Result<JobOutput, JobError> {
        let audio = self.resolve_input(input).await?;
        info!("Running conversion for {:?}", audio);

        let document = self.content.generate(&audio, lang).await?;

        let out_dir = self.data_dir.join(format!("job-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|e| JobError::Fatal(format!("failed to create output directory: {}", e)))?;

        let artifacts = self
            .exporter
            .export(&document.title, &document.markdown, &out_dir)
            .await?;

        Ok(JobOutput {
            title: document.title,
            summary: document.summary,
            artifacts,
        })
    }
}
