//! Plain in-memory records exchanged with the dispatcher.
//!
//! Every entity has a fixed field list. Source-specific column names never reach this module;
//! adapters map their columns onto these structs before calling into the engine.

use crate::step::AssignmentStep;
use roster_graph::Follower;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "male", alias = "m", alias = "M", alias = "Male", alias = "男")]
    Male,
    #[serde(rename = "female", alias = "f", alias = "F", alias = "Female", alias = "女")]
    Female,
}

impl Gender {
    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "男",
            Gender::Female => "女",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a returning student sat last period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousPlacement {
    pub class_name: String,
    pub group_id: u32,
    #[serde(default)]
    pub senior_name: Option<String>,
    #[serde(default)]
    pub deacon: Option<String>,
}

/// New-intake questionnaire answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Questionnaire {
    pub desired_class: String,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub introducer: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
}

/// Returning-student upgrade survey. Classes are in order of preference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeSurvey {
    #[serde(default)]
    pub declared_classes: Vec<String>,
}

/// A leadership role the candidate keeps serving in this period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuingRole {
    pub class_name: String,
    pub group_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: u64,
    pub full_name: String,
    pub gender: Gender,
    #[serde(default)]
    pub previous: Option<PreviousPlacement>,
    #[serde(default)]
    pub questionnaire: Option<Questionnaire>,
    #[serde(default)]
    pub upgrade: Option<UpgradeSurvey>,
    #[serde(default)]
    pub continuing_role: Option<ContinuingRole>,
}

impl Candidate {
    pub fn new(id: u64, full_name: impl Into<String>, gender: Gender) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            gender,
            previous: None,
            questionnaire: None,
            upgrade: None,
            continuing_role: None,
        }
    }

    pub fn with_previous(
        mut self,
        class_name: impl Into<String>,
        group_id: u32,
        senior_name: Option<&str>,
    ) -> Self {
        self.previous = Some(PreviousPlacement {
            class_name: class_name.into(),
            group_id,
            senior_name: senior_name.map(str::to_string),
            deacon: None,
        });
        self
    }

    pub fn with_questionnaire(
        mut self,
        desired_class: impl Into<String>,
        introducer: Option<&str>,
        remark: Option<&str>,
    ) -> Self {
        self.questionnaire = Some(Questionnaire {
            desired_class: desired_class.into(),
            gender: None,
            introducer: introducer.map(str::to_string),
            remark: remark.map(str::to_string),
        });
        self
    }

    pub fn with_upgrade<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.upgrade = Some(UpgradeSurvey {
            declared_classes: classes.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn with_continuing_role(mut self, class_name: impl Into<String>, group_id: u32) -> Self {
        self.continuing_role = Some(ContinuingRole {
            class_name: class_name.into(),
            group_id,
        });
        self
    }

    pub fn previous_senior(&self) -> Option<&str> {
        self.previous
            .as_ref()
            .and_then(|p| p.senior_name.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// A known class member is someone with a record from the previous period.
    pub fn is_member(&self) -> bool {
        self.previous.is_some()
    }

    pub fn introducer_name(&self) -> Option<&str> {
        self.questionnaire
            .as_ref()
            .and_then(|q| q.introducer.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn remark(&self) -> Option<&str> {
        self.questionnaire
            .as_ref()
            .and_then(|q| q.remark.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

impl Follower for Candidate {
    fn follower_id(&self) -> u64 {
        self.id
    }
}

/// Candidate as supplied by a source adapter. Newcomers may arrive without an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(default)]
    pub id: Option<u64>,
    pub full_name: String,
    pub gender: Gender,
    #[serde(default)]
    pub previous: Option<PreviousPlacement>,
    #[serde(default)]
    pub questionnaire: Option<Questionnaire>,
    #[serde(default)]
    pub upgrade: Option<UpgradeSurvey>,
    #[serde(default)]
    pub continuing_role: Option<ContinuingRole>,
}

impl CandidateRecord {
    pub fn into_candidate(self, id: u64) -> Candidate {
        Candidate {
            id,
            full_name: self.full_name,
            gender: self.gender,
            previous: self.previous,
            questionnaire: self.questionnaire,
            upgrade: self.upgrade,
            continuing_role: self.continuing_role,
        }
    }
}

impl From<Candidate> for CandidateRecord {
    fn from(c: Candidate) -> Self {
        Self {
            id: Some(c.id),
            full_name: c.full_name,
            gender: c.gender,
            previous: c.previous,
            questionnaire: c.questionnaire,
            upgrade: c.upgrade,
            continuing_role: c.continuing_role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderRecord {
    pub class_name: String,
    pub group_id: u32,
    pub gender: Gender,
    pub full_name: String,
    #[serde(default)]
    pub dharma_name: Option<String>,
    #[serde(default)]
    pub deacon: Option<String>,
}

impl LeaderRecord {
    pub fn new(class_name: impl Into<String>, group_id: u32, gender: Gender, name: &str) -> Self {
        Self {
            class_name: class_name.into(),
            group_id,
            gender,
            full_name: name.to_string(),
            dharma_name: None,
            deacon: None,
        }
    }

    /// Matches either the lay name or the dharma name.
    pub fn answers_to(&self, name: &str) -> bool {
        let name = name.trim();
        self.full_name == name || self.dharma_name.as_deref() == Some(name)
    }
}

/// One line of the audit trail: who landed in a group and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedMember {
    pub candidate: Candidate,
    #[serde(default)]
    pub deacon: Option<String>,
    pub reason: String,
    pub step: AssignmentStep,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderSlot {
    pub leader: LeaderRecord,
    #[serde(default)]
    pub members: Vec<AssignedMember>,
}

impl LeaderSlot {
    pub fn new(leader: LeaderRecord) -> Self {
        Self {
            leader,
            members: Vec::new(),
        }
    }

    pub fn group_id(&self) -> u32 {
        self.leader.group_id
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.members.iter().any(|m| m.candidate.id == id)
    }
}

/// Everything one dispatch run consumes: the fixed leader roster and the candidate population.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchInput {
    #[serde(default)]
    pub leaders: Vec<LeaderRecord>,
    #[serde(default)]
    pub candidates: Vec<CandidateRecord>,
}
