#![forbid(unsafe_code)]

//! Roster data model for class dispatching (headless).
//!
//! Design goals:
//! - fixed, explicit records for candidates, leaders and the placement audit trail
//! - deterministic outputs (same input order, same report)
//! - recoverable findings as [`Diagnostics`], unrecoverable ones as [`Error`]

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ids;
pub mod model;
pub mod ranking;
pub mod step;

pub use config::{AverageFormula, DispatchConfig};
pub use diagnostics::{Diagnostic, Diagnostics, Level};
pub use error::{Error, Result};
pub use ids::IdAllocator;
pub use model::{
    AssignedMember, Candidate, CandidateRecord, ContinuingRole, DispatchInput, Gender,
    LeaderRecord, LeaderSlot, PreviousPlacement, Questionnaire, UpgradeSurvey,
};
pub use step::AssignmentStep;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
