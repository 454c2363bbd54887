// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Session-scoped state shared by the guard and the analysis pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::client::{AnalysisService, ImagePersister};
use crate::guard::{self, Decision, SessionView, Step};
use crate::images::{ImageCollection, ImageRecord};
use crate::personas::{Persona, PersonaSelection};
use crate::pipeline::AnalysisPipeline;
use crate::report::{Report, ReportSession};
use crate::{AppConfig, Result};

/// Lock a store. Store mutations are never left half-done, so a poisoned
/// lock still holds consistent data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything one user accumulates between upload and report viewing
pub struct Session {
    images: Mutex<ImageCollection>,
    personas: Mutex<PersonaSelection>,
    reports: Mutex<ReportSession>,
    pipeline: AnalysisPipeline,
}

/// On-disk form of a session. Image bytes are not kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub saved_at: DateTime<Utc>,
    pub images: Vec<ImageRecord>,
    pub selected_persona: Option<Persona>,
    pub report: Option<Report>,
}

impl Session {
    /// Create a session with the persona catalog loaded
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut personas = PersonaSelection::new();
        match &config.personas.catalog_path {
            Some(path) => personas.load_from(Path::new(path))?,
            None => personas.load(),
        }

        Ok(Self {
            images: Mutex::new(ImageCollection::new(config.upload.clone())),
            personas: Mutex::new(personas),
            reports: Mutex::new(ReportSession::new()),
            pipeline: AnalysisPipeline::new(),
        })
    }

    pub fn images(&self) -> MutexGuard<'_, ImageCollection> {
        lock(&self.images)
    }

    pub fn personas(&self) -> MutexGuard<'_, PersonaSelection> {
        lock(&self.personas)
    }

    pub fn reports(&self) -> MutexGuard<'_, ReportSession> {
        lock(&self.reports)
    }

    pub fn pipeline(&self) -> &AnalysisPipeline {
        &self.pipeline
    }

    /// Current guard inputs, read fresh from the stores
    pub fn view(&self) -> SessionView {
        let image_count = self.images().len();
        let persona_selected = self.personas().current().is_some();
        let (report_present, generating) = {
            let reports = self.reports();
            (reports.report().is_some(), reports.loading())
        };
        SessionView {
            image_count,
            persona_selected,
            report_present,
            generating,
        }
    }

    /// Evaluate the guard for entering `step`
    pub fn enter(&self, step: Step) -> Decision {
        let decision = guard::evaluate(step, &self.view());
        if let Decision::Redirect(to) = decision {
            debug!("Entry to {} redirected to {}", step, to);
        }
        decision
    }

    /// Run the analysis pipeline owned by this session
    pub async fn analyze(&self, persister: &dyn ImagePersister, service: &dyn AnalysisService) -> Result<Report> {
        self.pipeline.run(self, persister, service).await
    }

    /// Return a finished analysis run to Idle. Rejected while one is active.
    pub fn reset_analysis(&self) -> Result<()> {
        self.pipeline.reset(self)
    }

    /// Drop images and the report. The persona catalog and selection stay.
    pub fn clear(&self) {
        self.images().clear();
        self.reports().clear();
        info!("Session cleared");
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            saved_at: Utc::now(),
            images: self.images().records(),
            selected_persona: self.personas().current().cloned(),
            report: self.reports().report().cloned(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, content)?;
        debug!("Session saved to {:?}", path);
        Ok(())
    }

    /// Apply a snapshot. Restored images have no file data and must be
    /// re-uploaded before they can be persisted or submitted.
    pub fn restore(&self, snapshot: SessionSnapshot) {
        self.images().restore(snapshot.images);

        {
            let mut personas = self.personas();
            match &snapshot.selected_persona {
                Some(persona) => {
                    personas.select(&persona.id);
                    personas.edit_background(&persona.id, &persona.background);
                }
                None => personas.deselect(),
            }
        }

        let mut reports = self.reports();
        reports.clear();
        if let Some(report) = snapshot.report {
            reports.set_report(report);
        }
    }

    /// Load a saved session; a missing file leaves the session untouched
    pub fn load(&self, path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        let content = std::fs::read_to_string(path)?;
        let snapshot: SessionSnapshot = serde_json::from_str(&content)?;
        info!("Restoring session saved at {}", snapshot.saved_at);
        self.restore(snapshot);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::ImagePayload;
    use crate::report::tests::sample_report;

    fn session() -> Session {
        Session::new(&AppConfig::default()).unwrap()
    }

    #[test]
    fn test_guard_reads_fresh_state() {
        let session = session();
        assert_eq!(session.enter(Step::Preview), Decision::Redirect(Step::Upload));

        let image = session
            .images()
            .add(ImagePayload::new("a.png", "image/png", vec![1]))
            .unwrap();
        assert!(session.enter(Step::Preview).is_allowed());
        assert_eq!(session.enter(Step::Review), Decision::Redirect(Step::SelectPersona));

        session.personas().select("2");
        assert!(session.enter(Step::Review).is_allowed());

        session.images().remove(&image.id);
        assert_eq!(session.enter(Step::Review), Decision::Redirect(Step::Upload));
    }

    #[test]
    fn test_results_open_while_generating() {
        let session = session();
        session.images().add(ImagePayload::new("a.png", "image/png", vec![1])).unwrap();
        session.personas().select("1");
        assert!(!session.enter(Step::Results).is_allowed());

        session.reports().set_loading(true);
        assert!(session.enter(Step::Results).is_allowed());
    }

    #[test]
    fn test_clear_keeps_persona() {
        let session = session();
        session.images().add(ImagePayload::new("a.png", "image/png", vec![1])).unwrap();
        session.personas().select("1");
        session.reports().set_report(sample_report());

        session.clear();
        let view = session.view();
        assert_eq!(view.image_count, 0);
        assert!(!view.report_present);
        assert!(view.persona_selected);
        assert_eq!(session.images().live_previews(), 0);
    }

    #[test]
    fn test_save_and_load_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let original = session();
        let image = original
            .images()
            .add(ImagePayload::new("a.png", "image/png", vec![1]))
            .unwrap();
        original.images().mark_persisted(&image.id, "uploads/a.png");
        original.personas().select("1");
        original.personas().edit_background("1", "Abi is a nurse.");
        original.reports().set_report(sample_report());
        original.save(&path).unwrap();

        let restored = session();
        assert!(restored.load(&path).unwrap());

        let images = restored.images();
        assert_eq!(images.len(), 1);
        assert_eq!(images.list()[0].remote_path.as_deref(), Some("uploads/a.png"));
        assert!(images.list()[0].payload.is_none());
        drop(images);

        assert_eq!(restored.personas().current().unwrap().background, "Abi is a nurse.");
        assert_eq!(restored.personas().all()[0].background, "Abi is a nurse.");
        assert_eq!(restored.reports().report().unwrap().id, "r-1");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!session().load(&dir.path().join("none.json")).unwrap());
    }
}
