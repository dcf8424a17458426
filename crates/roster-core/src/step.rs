use serde::{Deserialize, Serialize};
use std::fmt;

/// The pipeline stage that produced a placement.
///
/// Variants are declared in pipeline order, so `Ord` sorts placements by how early they were
/// decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStep {
    /// Leader-continuity placement into the candidate's own group.
    SeniorContinuing,
    /// Returning student following the previous senior into the new class.
    UpgradeFollowing,
    /// Placed with (or cascaded behind) an introducer.
    IntroducerFollowing,
    /// Placed with a peer named in the questionnaire remark.
    ClassmateFollowing,
    AutoAssignment,
}

impl AssignmentStep {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStep::SeniorContinuing => "SENIOR_CONTINUING",
            AssignmentStep::UpgradeFollowing => "UPGRADE_FOLLOWING",
            AssignmentStep::IntroducerFollowing => "INTRODUCER_FOLLOWING",
            AssignmentStep::ClassmateFollowing => "CLASSMATE_FOLLOWING",
            AssignmentStep::AutoAssignment => "AUTO_ASSIGNMENT",
        }
    }
}

impl fmt::Display for AssignmentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
