// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for persona-audit

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Analysis service connection
    #[serde(default)]
    pub service: ServiceConfig,

    /// Upload validation rules
    #[serde(default)]
    pub upload: UploadConfig,

    /// Persona catalog source
    #[serde(default)]
    pub personas: PersonaConfig,

    /// Session snapshot settings
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PersonaConfig {
    /// JSON catalog to load instead of the built-in personas
    #[serde(default)]
    pub catalog_path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

// Default value functions
fn default_base_url() -> String { "http://localhost:5000".to_string() }
fn default_timeout() -> u64 { 600 }
fn default_max_file_bytes() -> u64 { 5 * 1024 * 1024 }
fn default_snapshot_path() -> String { "persona_audit_session.json".to_string() }

fn default_allowed_types() -> Vec<String> {
    vec!["image/jpeg", "image/png", "image/svg+xml", "image/gif"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            allowed_types: default_allowed_types(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::AuditError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the session engine cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if !self.service.base_url.starts_with("http://") && !self.service.base_url.starts_with("https://") {
            return Err(crate::AuditError::Config(format!(
                "service.base_url must be an http(s) URL, got {}",
                self.service.base_url
            )));
        }
        if self.upload.allowed_types.is_empty() {
            return Err(crate::AuditError::Config(
                "upload.allowed_types must not be empty".to_string(),
            ));
        }
        if self.upload.max_file_bytes == 0 {
            return Err(crate::AuditError::Config(
                "upload.max_file_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.service.base_url, "http://localhost:5000");
        assert_eq!(config.upload.max_file_bytes, 5 * 1024 * 1024);
        assert_eq!(config.upload.allowed_types.len(), 4);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"service": {"base_url": "https://audit.example"}}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.service.base_url, "https://audit.example");
        assert_eq!(config.service.timeout_secs, 600);
        assert!(config.personas.catalog_path.is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.session.snapshot_path = "elsewhere.json".to_string();
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.session.snapshot_path, "elsewhere.json");
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"service": {"base_url": "localhost:5000"}}"#).unwrap();

        assert!(matches!(AppConfig::load(&path), Err(crate::AuditError::Config(_))));
    }
}
