// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Persona catalog and the session's current persona

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::{AuditError, Result};

/// One named group of a persona's traits (motivations, risk attitude, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionFacet {
    pub title: String,
    #[serde(default)]
    pub highlights: Vec<String>,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub background: String,
    #[serde(default)]
    pub facets: Vec<DescriptionFacet>,
    #[serde(default)]
    pub has_disability: bool,
}

/// Catalog plus current selection. The selection is a copy of a catalog
/// entry and is kept in step with it by `edit_background`.
#[derive(Default)]
pub struct PersonaSelection {
    catalog: Vec<Persona>,
    selected: Option<Persona>,
}

impl PersonaSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the catalog from the built-in personas
    pub fn load(&mut self) {
        self.replace_catalog(builtin_personas());
    }

    /// Populate the catalog from a JSON file holding an array of personas
    pub fn load_from(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        let personas: Vec<Persona> = serde_json::from_str(&content)
            .map_err(|e| AuditError::Config(format!("Invalid persona catalog {:?}: {}", path, e)))?;
        if personas.is_empty() {
            return Err(AuditError::Config(format!("Persona catalog {:?} is empty", path)));
        }
        self.replace_catalog(personas);
        Ok(())
    }

    fn replace_catalog(&mut self, personas: Vec<Persona>) {
        info!("Loaded {} personas", personas.len());
        self.catalog = personas;
        // Re-resolve so the selection reflects the fresh catalog entry
        if let Some(id) = self.selected.as_ref().map(|p| p.id.clone()) {
            self.select(&id);
        }
    }

    /// Select by id; unknown ids clear the selection
    pub fn select(&mut self, id: &str) {
        self.selected = self.catalog.iter().find(|p| p.id == id).cloned();
        if self.selected.is_none() {
            warn!("No persona with id {}", id);
        }
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    /// Select by display name, case-insensitively
    pub fn select_by_name(&mut self, name: &str) -> bool {
        match self.catalog.iter().find(|p| p.name.eq_ignore_ascii_case(name)) {
            Some(persona) => {
                self.selected = Some(persona.clone());
                true
            }
            None => false,
        }
    }

    pub fn edit_background(&mut self, id: &str, text: &str) {
        if let Some(persona) = self.catalog.iter_mut().find(|p| p.id == id) {
            persona.background = text.to_string();
        }
        if let Some(selected) = self.selected.as_mut().filter(|p| p.id == id) {
            selected.background = text.to_string();
        }
    }

    pub fn current(&self) -> Option<&Persona> {
        self.selected.as_ref()
    }

    pub fn all(&self) -> &[Persona] {
        &self.catalog
    }
}

fn facet(title: &str, highlights: &[&str], details: &str) -> DescriptionFacet {
    DescriptionFacet {
        title: title.to_string(),
        highlights: highlights.iter().map(|h| h.to_string()).collect(),
        details: details.to_string(),
    }
}

/// Reference personas shipped with the tool
pub fn builtin_personas() -> Vec<Persona> {
    vec![
        Persona {
            id: "1".to_string(),
            name: "Abi".to_string(),
            avatar: "/assets/personas/abi.svg".to_string(),
            background: "Abi is literate, but not tech-savvy. She is now trying to make her way into \
                         the digital world out of necessity. In her spare time, Abi likes to spend time \
                         in the puzzle section of the newspaper, especially sudoku puzzles and \
                         crosswords."
                .to_string(),
            facets: vec![
                facet(
                    "Motivations",
                    &[
                        "to accomplish their tasks.",
                        "already familiar and comfortable with, to keep their focus on the tasks they care about",
                    ],
                    "Abi uses technologies to accomplish their tasks. They learn new technologies \
                     if and when they need to, but prefers to use methods they are already familiar \
                     and comfortable with, to keep their focus on the tasks they care about.",
                ),
                facet(
                    "Computer Self-Efficacy",
                    &[
                        "lower self confidence than their peers about doing unfamiliar computing tasks",
                        "blame themselves for these problems",
                    ],
                    "Abi has lower self confidence than their peers about doing unfamiliar \
                     computing tasks. If problems arise with their technology, they often blame \
                     themselves for these problems. This affects whether and how they will \
                     persevere with a task if technology problems have arisen.",
                ),
                facet(
                    "Attitude toward Risk",
                    &[
                        "rarely have spare time",
                        "risk averse about using unfamiliar technologies that might need them to spend extra time on,",
                    ],
                    "Abi's life is a little complicated and they rarely have spare time. They are \
                     risk averse about using unfamiliar technologies that might need them to spend \
                     extra time on, even if the new features might be relevant. They instead \
                     performs tasks using familiar features, because they're more predictable about \
                     what they will get from them and how much time they will take.",
                ),
                facet(
                    "Information Processing Style",
                    &[
                        "gather information comprehensively to try to form a complete understanding of the problem before trying to solve it.",
                    ],
                    "Abi tends towards a comprehensive information processing style when they need \
                     to gather more information. So, instead of acting upon the first option that \
                     seems promising, they gather information comprehensively to try to form a \
                     complete understanding of the problem before trying to solve it. Thus, their \
                     style is 'burst-y'; first they read a lot, then they act on it in a batch of \
                     activity.",
                ),
                facet(
                    "Learning: by Process vs. by Tinkering",
                    &[
                        "process-oriented learning",
                        "They don't particularly like learning by tinkering with software",
                    ],
                    "When learning new technology, Abi leans toward process-oriented learning, \
                     e.g., tutorials, step-by-step processes, wizards, online how-to videos, etc. \
                     They don't particularly like learning by tinkering with software (i.e., just \
                     trying out new features or commands to see what they do), but when they do \
                     tinker, it has positive effects on their understanding of the software.",
                ),
            ],
            has_disability: false,
        },
        Persona {
            id: "2".to_string(),
            name: "Tim".to_string(),
            avatar: "/assets/personas/tim.svg".to_string(),
            background: "Tim is a technology enthusiast who keeps up with the latest tech trends. He is \
                         confident in learning new applications through exploration and doesn't mind \
                         taking risks. He works in IT and is an early adopter of new technologies."
                .to_string(),
            facets: vec![
                facet(
                    "Motivations",
                    &[
                        "likes learning all the available functionality on all of their devices",
                    ],
                    "Tim likes learning all the available functionality on all of their devices and \
                     computer systems they use, even when it may not be necessary to help them \
                     achieve their tasks. They sometimes find themselves exploring functions of one \
                     of their gadgets for so long that they lose sight of what they wanted to do \
                     with it to begin with.",
                ),
                facet(
                    "Computer Self-Efficacy",
                    &[
                        "high confidence in their abilities with technology",
                        "If they can't fix the problem, they blame it on the software vendor.",
                    ],
                    "Tim have high confidence in their abilities with technology, and thinks \
                     they're better than the average person at learning about new features. If they \
                     can't fix the problem, they blame it on the software vendor. It's not their \
                     fault if they can't get it to work.",
                ),
                facet(
                    "Attitude toward Risk",
                    &[
                        "doesn't mind taking risks using features of technology",
                    ],
                    "Tim doesn't mind taking risks using features of technology that haven't been \
                     proven to work. When they are presented with challenges because they have \
                     tried a new way that doesn't work, it doesn't change their attitude toward \
                     technology.",
                ),
                facet(
                    "Information Processing Style",
                    &[
                        "delve into the first promising option",
                        "if it doesn't work out they back out",
                        "another option to try",
                    ],
                    "Tim leans towards a selective information processing style or 'depth first' \
                     approach. That is, they usually delve into the first promising option, pursue \
                     it, and if it doesn't work out they back out and gather a bit more information \
                     until they see another option to try. Thus, their style is very incremental.",
                ),
                facet(
                    "Learning by Process vs. by Tinkering",
                    &[
                        "like tinkering and exploring",
                    ],
                    "Whenever Tim uses new technology, they try to construct their own \
                     understanding of how the software works internally. They like tinkering and \
                     exploring the menu items and functions of the software in order to build that \
                     understanding. Sometimes they play with features too much, losing focus on \
                     what they set out to do originally, but this helps them gain better \
                     understanding of the software.",
                ),
            ],
            has_disability: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded() -> PersonaSelection {
        let mut personas = PersonaSelection::new();
        personas.load();
        personas
    }

    #[test]
    fn test_load_builtins() {
        let personas = loaded();
        let names: Vec<_> = personas.all().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Abi", "Tim"]);
        assert!(personas.current().is_none());
        assert!(personas.all().iter().all(|p| p.facets.len() == 5));
    }

    #[test]
    fn test_builtin_highlights_quote_details() {
        let personas = builtin_personas();
        for facet in personas.iter().flat_map(|p| &p.facets) {
            assert!(!facet.highlights.is_empty());
            for highlight in &facet.highlights {
                assert!(facet.details.contains(highlight.as_str()), "{}: {}", facet.title, highlight);
            }
        }
        assert_eq!(personas[1].facets[3].highlights.len(), 3);
        assert!(personas[0].facets[4].details.ends_with("positive effects on their understanding of the software."));
    }

    #[test]
    fn test_select_unknown_clears() {
        let mut personas = loaded();
        personas.select("2");
        assert_eq!(personas.current().unwrap().name, "Tim");
        personas.select("99");
        assert!(personas.current().is_none());
    }

    #[test]
    fn test_edit_background_of_selected_updates_both() {
        let mut personas = loaded();
        personas.select("1");
        personas.edit_background("1", "Abi runs a bakery.");

        assert_eq!(personas.current().unwrap().background, "Abi runs a bakery.");
        assert_eq!(personas.all()[0].background, "Abi runs a bakery.");
        assert_eq!(personas.current(), Some(&personas.all()[0]));
    }

    #[test]
    fn test_edit_background_of_other_leaves_selection() {
        let mut personas = loaded();
        personas.select("1");
        let before = personas.current().cloned();
        personas.edit_background("2", "Tim is retired.");

        assert_eq!(personas.current().cloned(), before);
        assert_eq!(personas.all()[1].background, "Tim is retired.");
    }

    #[test]
    fn test_reload_drops_edits_but_keeps_selection() {
        let mut personas = loaded();
        personas.select("2");
        personas.edit_background("2", "edited");
        personas.load();

        assert_eq!(personas.all().len(), 2);
        let current = personas.current().unwrap();
        assert_eq!(current.id, "2");
        assert_ne!(current.background, "edited");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("personas.json");
        let catalog = serde_json::json!([{
            "id": "p",
            "name": "Pat",
            "avatar": "/pat.svg",
            "background": "Pat uses a screen reader.",
            "has_disability": true
        }]);
        std::fs::write(&path, catalog.to_string()).unwrap();

        let mut personas = PersonaSelection::new();
        personas.load_from(&path).unwrap();
        assert!(personas.select_by_name("pat"));
        let current = personas.current().unwrap();
        assert!(current.has_disability);
        assert!(current.facets.is_empty());
    }

    #[test]
    fn test_load_from_rejects_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("personas.json");
        std::fs::write(&path, "[]").unwrap();

        let mut personas = loaded();
        assert!(personas.load_from(&path).is_err());
        assert_eq!(personas.all().len(), 2);
    }
}
