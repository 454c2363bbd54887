// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Inclusivity report model and the session's report slot

pub mod render;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{AuditError, Result};

/// Bug severity as labelled by the analysis model. Labels are matched
/// case-insensitively; anything else is `Unrated`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    High,
    Medium,
    Low,
    #[default]
    Unrated,
}

impl Severity {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Unrated,
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value.as_str().map(Severity::from_label).unwrap_or_default())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Categories {
    Text(String),
    List(Vec<String>),
}

/// Categories arrive either as one string or as a list of names
fn categories_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(match Option::<Categories>::deserialize(deserializer)? {
        Some(Categories::Text(text)) => text,
        Some(Categories::List(names)) => names.join(", "),
        None => String::new(),
    })
}

/// A single issue found on a screenshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bug {
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, deserialize_with = "categories_text")]
    pub categories: String,
    #[serde(default)]
    pub recommendation: String,
}

/// A violated rule and the bugs that violate it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub rule_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet: Option<String>,
    #[serde(default)]
    pub bugs: Vec<Bug>,
}

/// Findings for one analyzed screenshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub screenshot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_base64: Option<String>,
    #[serde(default)]
    pub violations: Vec<Violation>,
}

/// Violations of one rule merged across the result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleGroup {
    pub rule_id: String,
    pub facet: Option<String>,
    pub bugs: Vec<Bug>,
}

impl AnalysisResult {
    /// Merge violations sharing a rule id, in first-seen order
    pub fn grouped_violations(&self) -> Vec<RuleGroup> {
        let mut groups: Vec<RuleGroup> = Vec::new();
        for violation in &self.violations {
            match groups.iter_mut().find(|g| g.rule_id == violation.rule_id) {
                Some(group) => group.bugs.extend(violation.bugs.iter().cloned()),
                None => groups.push(RuleGroup {
                    rule_id: violation.rule_id.clone(),
                    facet: violation.facet.clone(),
                    bugs: violation.bugs.clone(),
                }),
            }
        }
        groups
    }

    pub fn issue_count(&self) -> usize {
        self.violations.iter().map(|v| v.bugs.len()).sum()
    }

    /// Human readable title: "checkoutPage2.png" -> "Checkout Page 2"
    pub fn display_name(&self) -> String {
        let raw = self.screenshot_name.as_deref().unwrap_or(&self.screenshot);
        let raw = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
        let stem = match raw.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => raw,
        };

        let mut words: Vec<String> = Vec::new();
        let mut word = String::new();
        let mut prev: Option<char> = None;
        for c in stem.chars() {
            if !c.is_alphanumeric() {
                if !word.is_empty() {
                    words.push(std::mem::take(&mut word));
                }
                prev = None;
                continue;
            }
            let boundary = match prev {
                Some(p) => {
                    (p.is_lowercase() && c.is_uppercase())
                        || (p.is_ascii_digit() != c.is_ascii_digit())
                }
                None => false,
            };
            if boundary && !word.is_empty() {
                words.push(std::mem::take(&mut word));
            }
            word.push(c);
            prev = Some(c);
        }
        if !word.is_empty() {
            words.push(word);
        }

        words
            .iter()
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Decode the inline screenshot, if the service sent one
    pub fn screenshot_bytes(&self) -> Option<Result<Vec<u8>>> {
        self.screenshot_base64.as_ref().map(|data| {
            general_purpose::STANDARD
                .decode(data)
                .map_err(|e| AuditError::SubmissionFailure(format!("Invalid inline screenshot: {}", e)))
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unrated: usize,
}

/// A generated inclusivity report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub filename: String,
    pub url: String,
    pub created_at: DateTime<Local>,
    pub results: Vec<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_screenshots: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_violations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_issues: Option<u32>,
}

impl Report {
    /// Screenshot count, preferring the service's figure
    pub fn screenshot_count(&self) -> usize {
        self.total_screenshots.map(|n| n as usize).unwrap_or(self.results.len())
    }

    pub fn violation_count(&self) -> usize {
        self.total_violations
            .map(|n| n as usize)
            .unwrap_or_else(|| self.results.iter().map(|r| r.violations.len()).sum())
    }

    pub fn issue_count(&self) -> usize {
        self.total_issues
            .map(|n| n as usize)
            .unwrap_or_else(|| self.results.iter().map(|r| r.issue_count()).sum())
    }

    pub fn severity_counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        let bugs = self.results.iter().flat_map(|r| &r.violations).flat_map(|v| &v.bugs);
        for bug in bugs {
            match bug.severity {
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Unrated => counts.unrated += 1,
            }
        }
        counts
    }
}

/// Rule metadata row as served by the rules endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "Rule ID")]
    pub rule_id: String,
    #[serde(rename = "Rule Name")]
    pub rule_name: String,
    #[serde(rename = "Facet", default)]
    pub facet: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Optional rule names; lookups fall back to the bare rule id
#[derive(Debug, Clone, Default)]
pub struct Rulebook {
    rules: Vec<Rule>,
}

impl Rulebook {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn get(&self, rule_id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.rule_id == rule_id)
    }

    pub fn display_name(&self, rule_id: &str) -> String {
        match self.get(rule_id) {
            Some(rule) => rule.rule_name.clone(),
            None => format!("Rule {}", rule_id),
        }
    }

    pub fn facet_for(&self, group: &RuleGroup) -> Option<String> {
        self.get(&group.rule_id)
            .map(|r| r.facet.clone())
            .filter(|f| !f.is_empty())
            .or_else(|| group.facet.clone())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Holds the current report, the loading flag and the last error
#[derive(Debug, Default)]
pub struct ReportSession {
    report: Option<Report>,
    loading: bool,
    error: Option<String>,
}

impl ReportSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_report(&mut self, report: Report) {
        self.report = Some(report);
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    /// Drop report and error. The loading flag belongs to the pipeline.
    pub fn clear(&mut self) {
        self.report = None;
        self.error = None;
    }

    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
