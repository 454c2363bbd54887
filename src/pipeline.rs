// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Analysis run: persist pending images, submit, publish the report
//!
//! A run moves `Idle -> Persisting -> Submitting -> Succeeded | Failed`.
//! Each [`Session`] owns exactly one pipeline and starts runs through
//! [`Session::analyze`], so only one run may be active per session; a second
//! start while one is persisting or submitting is rejected with
//! [`AuditError::AlreadyRunning`]. A run works on the images present when it
//! starts: they are persisted one at a time in collection order and the same
//! set is submitted. Images added mid-run wait for the next run. The indices
//! completed so far are published on a watch channel for progress display.

use chrono::Local;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::client::{AnalysisRequest, AnalysisResponse, AnalysisService, ImagePersister, PersonaBrief, SubmittedImage, GENERIC_FAILURE};
use crate::images::CandidateImage;
use crate::report::Report;
use crate::session::{lock, Session};
use crate::{AuditError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PipelineState {
    #[default]
    Idle,
    Persisting,
    Submitting,
    Succeeded,
    Failed,
}

impl PipelineState {
    pub fn is_running(self) -> bool {
        matches!(self, Self::Persisting | Self::Submitting)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Snapshot of a run for progress display
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    pub state: PipelineState,
    /// Indices (into the pending list) persisted so far, in order
    pub completed: Vec<usize>,
    /// Images that needed persisting when the run started
    pub total: usize,
}

impl Progress {
    /// "i of N" for the persisting phase
    pub fn persisted(&self) -> (usize, usize) {
        (self.completed.len(), self.total)
    }
}

pub struct AnalysisPipeline {
    state: Mutex<PipelineState>,
    progress: watch::Sender<Progress>,
}

impl AnalysisPipeline {
    pub(crate) fn new() -> Self {
        let (progress, _) = watch::channel(Progress::default());
        Self {
            state: Mutex::new(PipelineState::Idle),
            progress,
        }
    }

    pub fn state(&self) -> PipelineState {
        *lock(&self.state)
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> Progress {
        self.progress.borrow().clone()
    }

    /// Return a finished run to Idle and drop its error message. The last
    /// report, if any, stays in the report session.
    pub(crate) fn reset(&self, session: &Session) -> Result<()> {
        let mut state = lock(&self.state);
        if state.is_running() {
            return Err(AuditError::AlreadyRunning);
        }
        *state = PipelineState::Idle;
        drop(state);
        self.progress.send_modify(|p| *p = Progress::default());
        session.reports().set_error(None);
        Ok(())
    }

    /// Run the analysis for the session's images and selected persona
    pub(crate) async fn run(
        &self,
        session: &Session,
        persister: &dyn ImagePersister,
        service: &dyn AnalysisService,
    ) -> Result<Report> {
        let persona = self.claim(session)?;
        let batch: HashSet<String> = session.images().list().iter().map(|i| i.id.clone()).collect();

        {
            let mut reports = session.reports();
            reports.set_loading(true);
            reports.set_error(None);
        }
        info!("Starting analysis for persona {}", persona.name);

        let outcome = match self.persist_pending(session, &batch, persister).await {
            Ok(()) => self.submit(session, &batch, &persona, service).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(report) => {
                info!(
                    "Report {} ready: {} screenshots, {} issues",
                    report.id,
                    report.screenshot_count(),
                    report.issue_count()
                );
                {
                    let mut reports = session.reports();
                    reports.set_report(report.clone());
                    reports.set_loading(false);
                }
                self.transition(PipelineState::Succeeded);
                Ok(report)
            }
            Err(e) => {
                error!("Analysis failed: {}", e);
                {
                    let mut reports = session.reports();
                    reports.set_error(Some(e.to_string()));
                    reports.set_loading(false);
                }
                self.transition(PipelineState::Failed);
                Err(e)
            }
        }
    }

    /// Check preconditions and move to Persisting in one step
    fn claim(&self, session: &Session) -> Result<PersonaBrief> {
        let mut state = lock(&self.state);
        if state.is_running() {
            warn!("Rejected analysis start: run already {:?}", *state);
            return Err(AuditError::AlreadyRunning);
        }

        let persona = session.personas().current().map(|p| PersonaBrief {
            name: p.name.clone(),
            background: p.background.clone(),
        });
        let has_images = !session.images().is_empty();

        let problem = match (&persona, has_images) {
            (None, _) => Some("No persona selected"),
            (Some(_), false) => Some("No images to analyze"),
            _ => None,
        };
        if let Some(message) = problem {
            drop(state);
            session.reports().set_error(Some(message.to_string()));
            return Err(AuditError::Precondition(message.to_string()));
        }

        *state = PipelineState::Persisting;
        drop(state);
        self.progress.send_modify(|p| {
            *p = Progress {
                state: PipelineState::Persisting,
                ..Progress::default()
            }
        });
        // persona is Some here
        persona.ok_or_else(|| AuditError::Precondition("No persona selected".to_string()))
    }

    async fn persist_pending(
        &self,
        session: &Session,
        batch: &HashSet<String>,
        persister: &dyn ImagePersister,
    ) -> Result<()> {
        let pending: Vec<CandidateImage> = session
            .images()
            .pending()
            .into_iter()
            .filter(|i| batch.contains(&i.id))
            .collect();
        self.progress.send_modify(|p| p.total = pending.len());
        debug!("{} of {} images need saving", pending.len(), batch.len());

        for (idx, image) in pending.iter().enumerate() {
            let still_present = session.images().get(&image.id).is_some();
            if !still_present {
                debug!("Image {} removed during run, skipping", image.name);
                continue;
            }
            let payload = image.payload.as_ref().ok_or_else(|| AuditError::PersistenceFailure {
                name: image.name.clone(),
                message: "original file is no longer available; upload it again".to_string(),
            })?;

            let remote_path = persister.persist(&image.name, payload).await?;
            session.images().mark_persisted(&image.id, &remote_path);

            self.progress.send_modify(|p| p.completed.push(idx));
            info!("Saved image {}/{}: {}", idx + 1, pending.len(), image.name);
        }
        Ok(())
    }

    async fn submit(
        &self,
        session: &Session,
        batch: &HashSet<String>,
        persona: &PersonaBrief,
        service: &dyn AnalysisService,
    ) -> Result<Report> {
        self.transition(PipelineState::Submitting);

        let images: Vec<SubmittedImage> = session
            .images()
            .list()
            .iter()
            .filter(|image| {
                let in_batch = batch.contains(&image.id);
                if !in_batch {
                    debug!("Image {} added during run, leaving it for the next run", image.name);
                }
                in_batch
            })
            .filter_map(|image| match &image.payload {
                Some(payload) => Some(SubmittedImage {
                    name: image.name.clone(),
                    payload: payload.clone(),
                }),
                None => {
                    warn!("Image {} has no file data and will not be submitted", image.name);
                    None
                }
            })
            .collect();
        if images.is_empty() {
            return Err(AuditError::SubmissionFailure(
                "No image data available to submit; upload the screenshots again".to_string(),
            ));
        }

        let request = AnalysisRequest {
            images,
            persona: persona.clone(),
        };
        let response = service.analyze(&request).await?;
        build_report(response, service)
    }

    fn transition(&self, next: PipelineState) {
        *lock(&self.state) = next;
        self.progress.send_modify(|p| p.state = next);
    }
}

fn build_report(response: AnalysisResponse, service: &dyn AnalysisService) -> Result<Report> {
    if response.report_id.trim().is_empty() {
        return Err(AuditError::SubmissionFailure(GENERIC_FAILURE.to_string()));
    }
    Ok(Report {
        url: service.report_url(&response.report_id),
        id: response.report_id,
        filename: response.report_filename,
        created_at: Local::now(),
        results: response.analysis_results,
        total_screenshots: response.total_screenshots,
        total_violations: response.total_violations,
        total_issues: response.total_issues,
    })
}
