// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! HTTP client for the analysis service and its image store

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::images::ImagePayload;
use crate::report::{AnalysisResult, Rule, Rulebook};
use crate::{AuditError, Result};

/// Message used when the service fails without saying why
pub const GENERIC_FAILURE: &str = "Failed to generate report";

/// Persona fields sent along with the screenshots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonaBrief {
    pub name: String,
    pub background: String,
}

/// One screenshot in an analysis request
#[derive(Debug, Clone)]
pub struct SubmittedImage {
    pub name: String,
    pub payload: ImagePayload,
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub images: Vec<SubmittedImage>,
    pub persona: PersonaBrief,
}

/// Successful analysis body
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisResponse {
    pub report_id: String,
    pub report_filename: String,
    #[serde(default)]
    pub analysis_results: Vec<AnalysisResult>,
    #[serde(default)]
    pub total_screenshots: Option<u32>,
    #[serde(default)]
    pub total_violations: Option<u32>,
    #[serde(default)]
    pub total_issues: Option<u32>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Deserialize)]
struct SaveImageResponse {
    success: bool,
    #[serde(rename = "filePath")]
    file_path: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

/// Stores one image remotely and returns the path it was stored under
#[async_trait]
pub trait ImagePersister: Send + Sync {
    async fn persist(&self, name: &str, payload: &ImagePayload) -> Result<String>;
}

/// Runs the inclusivity analysis
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse>;

    /// Where a finished report can be downloaded from
    fn report_url(&self, report_id: &str) -> String;
}

/// Rule metadata used only for display
#[async_trait]
pub trait RuleSource: Send + Sync {
    async fn rules(&self) -> Result<Vec<Rule>>;
}

/// Fetch rule names, treating any failure as "no metadata"
pub async fn load_rulebook(source: &dyn RuleSource) -> Rulebook {
    match source.rules().await {
        Ok(rules) => Rulebook::new(rules),
        Err(e) => {
            warn!("Rule metadata unavailable, showing rule ids: {}", e);
            Rulebook::default()
        }
    }
}

/// reqwest-backed implementation of every collaborator
pub struct HttpCollaborator {
    client: Client,
    base_url: String,
}

impl HttpCollaborator {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        // Normalize URL
        let base_url = config.base_url.trim_end_matches('/').to_string();

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the service answers at all
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/rules", self.base_url);

        self.client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                AuditError::ServiceUnavailable(format!(
                    "Cannot connect to {}: {}",
                    self.base_url, e
                ))
            })?;

        Ok(())
    }

    fn image_part(name: &str, payload: &ImagePayload) -> Result<Part> {
        Ok(Part::bytes(payload.bytes.to_vec())
            .file_name(name.to_string())
            .mime_str(&payload.media_type)?)
    }
}

#[async_trait]
impl ImagePersister for HttpCollaborator {
    async fn persist(&self, name: &str, payload: &ImagePayload) -> Result<String> {
        let url = format!("{}/api/save-image", self.base_url);
        let failure = |message: String| AuditError::PersistenceFailure {
            name: name.to_string(),
            message,
        };

        let form = Form::new()
            .part("image", Self::image_part(name, payload)?)
            .text("fileName", name.to_string());

        debug!("Saving image {} ({} bytes)", name, payload.len());

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| failure(e.to_string()))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| failure(e.to_string()))?;
        let parsed: Option<SaveImageResponse> = serde_json::from_slice(&body).ok();

        match parsed {
            Some(SaveImageResponse { success: true, file_path: Some(path), .. }) if status.is_success() => Ok(path),
            Some(reply) => Err(failure(
                reply
                    .error
                    .or(reply.message)
                    .unwrap_or_else(|| format!("service returned status {}", status)),
            )),
            None => Err(failure(format!("service returned status {}", status))),
        }
    }
}

#[async_trait]
impl AnalysisService for HttpCollaborator {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse> {
        let url = format!("{}/api/analyze", self.base_url);

        let mut form = Form::new();
        for image in &request.images {
            form = form.part("images", Self::image_part(&image.name, &image.payload)?);
        }
        form = form.text("persona", serde_json::to_string(&request.persona)?);

        debug!(
            "Submitting {} images for persona {}",
            request.images.len(),
            request.persona.name
        );

        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| GENERIC_FAILURE.to_string());
            return Err(AuditError::SubmissionFailure(message));
        }

        serde_json::from_slice(&body).map_err(|e| {
            warn!("Malformed analysis response: {}", e);
            AuditError::SubmissionFailure(GENERIC_FAILURE.to_string())
        })
    }

    fn report_url(&self, report_id: &str) -> String {
        format!("{}/api/reports/{}", self.base_url, report_id)
    }
}

#[async_trait]
impl RuleSource for HttpCollaborator {
    async fn rules(&self) -> Result<Vec<Rule>> {
        let url = format!("{}/api/rules", self.base_url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AuditError::SubmissionFailure(format!(
                "Rules endpoint returned status {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unavailable;

    #[async_trait]
    impl RuleSource for Unavailable {
        async fn rules(&self) -> Result<Vec<Rule>> {
            Err(AuditError::SubmissionFailure("down".to_string()))
        }
    }

    #[test]
    fn test_report_url_is_keyed_by_id() {
        let client = HttpCollaborator::new(&ServiceConfig {
            base_url: "http://localhost:5000/".to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");
        assert_eq!(client.report_url("abc"), "http://localhost:5000/api/reports/abc");
    }

    #[test]
    fn test_persona_brief_wire_shape() {
        let brief = PersonaBrief {
            name: "Abi".to_string(),
            background: "Likes sudoku".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&brief).unwrap(),
            serde_json::json!({"name": "Abi", "background": "Likes sudoku"})
        );
    }

    #[test]
    fn test_response_defaults() {
        let response: AnalysisResponse =
            serde_json::from_str(r#"{"report_id": "x", "report_filename": "x.pdf"}"#).unwrap();
        assert!(response.analysis_results.is_empty());
        assert!(response.total_issues.is_none());
    }

    #[tokio::test]
    async fn test_rulebook_degrades_to_empty() {
        let rules = load_rulebook(&Unavailable).await;
        assert!(rules.is_empty());
        assert_eq!(rules.display_name("R3"), "Rule R3");
    }
}
