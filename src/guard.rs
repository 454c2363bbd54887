// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Step reachability for the review workflow
//!
//! Guards are evaluated against a fresh [`SessionView`] each time a step is
//! entered. A failed guard is not an error: the caller gets a redirect and
//! navigates there instead.

use serde::Serialize;
use std::fmt;

/// Workflow steps in presentation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    Home,
    PersonaInfo,
    Upload,
    Preview,
    SelectPersona,
    PersonaDetails,
    Review,
    Results,
}

impl Step {
    pub const ALL: [Step; 8] = [
        Step::Home,
        Step::PersonaInfo,
        Step::Upload,
        Step::Preview,
        Step::SelectPersona,
        Step::PersonaDetails,
        Step::Review,
        Step::Results,
    ];

    /// Route path used by the presentation layer
    pub fn path(self) -> &'static str {
        match self {
            Step::Home => "/",
            Step::PersonaInfo => "/persona-info",
            Step::Upload => "/upload",
            Step::Preview => "/preview",
            Step::SelectPersona => "/select-persona",
            Step::PersonaDetails => "/persona-details",
            Step::Review => "/review",
            Step::Results => "/results",
        }
    }

    /// Inverse of [`Step::path`]; unknown paths land on Home
    pub fn from_path(path: &str) -> Step {
        Step::ALL
            .into_iter()
            .find(|s| s.path() == path)
            .unwrap_or(Step::Home)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// The facts guards depend on, read from the session stores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionView {
    pub image_count: usize,
    pub persona_selected: bool,
    pub report_present: bool,
    pub generating: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Redirect(Step),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

pub fn evaluate(step: Step, view: &SessionView) -> Decision {
    let has_images = view.image_count > 0;
    match step {
        Step::Home | Step::PersonaInfo | Step::Upload => Decision::Allow,
        Step::Preview | Step::SelectPersona if !has_images => Decision::Redirect(Step::Upload),
        Step::Preview | Step::SelectPersona => Decision::Allow,
        Step::PersonaDetails | Step::Review => {
            if !view.persona_selected {
                Decision::Redirect(Step::SelectPersona)
            } else if !has_images {
                Decision::Redirect(Step::Upload)
            } else {
                Decision::Allow
            }
        }
        // A cleared session must not show a stale report
        Step::Results if !view.persona_selected => Decision::Redirect(Step::SelectPersona),
        Step::Results if !has_images => Decision::Redirect(Step::Upload),
        Step::Results if view.report_present || view.generating => Decision::Allow,
        Step::Results => Decision::Redirect(Step::PersonaDetails),
    }
}

/// Follow redirects until a step admits entry
pub fn resolve(step: Step, view: &SessionView) -> Step {
    let mut current = step;
    // Redirect chains only ever move toward Upload, which always allows
    for _ in 0..Step::ALL.len() {
        match evaluate(current, view) {
            Decision::Allow => return current,
            Decision::Redirect(next) => current = next,
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(images: usize, persona: bool) -> SessionView {
        SessionView {
            image_count: images,
            persona_selected: persona,
            ..SessionView::default()
        }
    }

    #[test]
    fn test_open_steps_always_allowed() {
        for step in [Step::Home, Step::PersonaInfo, Step::Upload] {
            assert_eq!(evaluate(step, &SessionView::default()), Decision::Allow);
        }
    }

    #[test]
    fn test_no_images_blocks_later_steps() {
        for persona in [false, true] {
            let v = view(0, persona);
            for step in [Step::Preview, Step::SelectPersona, Step::PersonaDetails, Step::Review, Step::Results] {
                assert!(!evaluate(step, &v).is_allowed(), "{step} allowed with no images");
            }
            // even a finished report does not open Results
            let with_report = SessionView { report_present: true, ..v };
            assert!(!evaluate(Step::Results, &with_report).is_allowed());
        }
        assert_eq!(evaluate(Step::Review, &view(0, true)), Decision::Redirect(Step::Upload));
    }

    #[test]
    fn test_no_persona_blocks_details_review_results() {
        let v = view(3, false);
        assert_eq!(evaluate(Step::PersonaDetails, &v), Decision::Redirect(Step::SelectPersona));
        assert_eq!(evaluate(Step::Review, &v), Decision::Redirect(Step::SelectPersona));
        assert_eq!(evaluate(Step::Results, &v), Decision::Redirect(Step::SelectPersona));
        let with_report = SessionView { report_present: true, ..v };
        assert_eq!(evaluate(Step::Results, &with_report), Decision::Redirect(Step::SelectPersona));
        assert!(evaluate(Step::SelectPersona, &v).is_allowed());
    }

    #[test]
    fn test_results_needs_report_or_generation() {
        let mut v = view(1, true);
        assert_eq!(evaluate(Step::Results, &v), Decision::Redirect(Step::PersonaDetails));
        v.generating = true;
        assert!(evaluate(Step::Results, &v).is_allowed());
        v.generating = false;
        v.report_present = true;
        assert!(evaluate(Step::Results, &v).is_allowed());
    }

    #[test]
    fn test_resolve_follows_chain() {
        assert_eq!(resolve(Step::Results, &view(0, false)), Step::Upload);
        assert_eq!(resolve(Step::Results, &view(2, false)), Step::SelectPersona);
        assert_eq!(resolve(Step::Results, &view(2, true)), Step::PersonaDetails);
        assert_eq!(resolve(Step::Review, &view(2, true)), Step::Review);
    }

    #[test]
    fn test_paths_round_trip() {
        for step in Step::ALL {
            assert_eq!(Step::from_path(step.path()), step);
        }
        assert_eq!(Step::from_path("/nowhere"), Step::Home);
    }
}
