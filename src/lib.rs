// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! persona-audit: persona-driven inclusivity review of UI screenshots
//!
//! The session engine behind the review workflow: uploaded screenshots,
//! the selected persona, the generated report, the guards that gate each
//! workflow step, and the pipeline that hands everything to the remote
//! analysis service.

pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod images;
pub mod personas;
pub mod pipeline;
pub mod report;
pub mod session;

pub use config::AppConfig;
pub use error::{AuditError, Result};
pub use session::Session;
