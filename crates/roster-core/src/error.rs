use crate::model::Gender;

pub type Result<T> = std::result::Result<T, Error>;

/// Conditions the dispatcher cannot continue past.
///
/// Everything recoverable (duplicate placements, unresolved introducers, referral loops, ...)
/// is reported as a [`crate::Diagnostic`] instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("referral chain root {root} in class {class_name} has no introducer record")]
    MissingIntroducer { root: u64, class_name: String },

    #[error(
        "balancing for {class_name} ({gender}) did not settle after {iterations} iterations"
    )]
    BalancingDiverged {
        class_name: String,
        gender: Gender,
        iterations: usize,
    },

    #[error("no group {group_id} in class {class_name}")]
    MissingGroup { group_id: u32, class_name: String },

    #[error("duplicate leader for {class_name} ({gender}) group {group_id}")]
    DuplicateLeader {
        class_name: String,
        gender: Gender,
        group_id: u32,
    },

    #[error("Invalid dispatch config: {message}")]
    InvalidConfig { message: String },

    #[error("Invalid classmate pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}
