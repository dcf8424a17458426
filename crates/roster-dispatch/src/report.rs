use crate::bucket::ClassGenderBucket;
use roster_core::ranking::{class_name_ranking, member_ordering};
use roster_core::{AssignedMember, AssignmentStep, Diagnostic, Gender, LeaderSlot};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupReport {
    pub group_id: u32,
    pub leader: String,
    #[serde(default)]
    pub dharma_name: Option<String>,
    #[serde(default)]
    pub deacon: Option<String>,
    /// Placement order; this is the audit trail.
    pub members: Vec<AssignedMember>,
}

impl GroupReport {
    fn from_slot(slot: &LeaderSlot) -> Self {
        Self {
            group_id: slot.leader.group_id,
            leader: slot.leader.full_name.clone(),
            dharma_name: slot.leader.dharma_name.clone(),
            deacon: slot.leader.deacon.clone(),
            members: slot.members.clone(),
        }
    }

    /// Members in display order (seniors first, then by previous class).
    pub fn roster_order(&self) -> Vec<&AssignedMember> {
        let mut out: Vec<&AssignedMember> = self.members.iter().collect();
        out.sort_by(|a, b| member_ordering(a, b));
        out
    }

    pub fn contains(&self, id: u64) -> bool {
        self.members.iter().any(|m| m.candidate.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassReport {
    pub class_name: String,
    pub gender: Gender,
    pub groups: Vec<GroupReport>,
}

impl ClassReport {
    pub(crate) fn from_bucket(bucket: &ClassGenderBucket) -> Self {
        Self {
            class_name: bucket.key().class_name.clone(),
            gender: bucket.key().gender,
            groups: bucket.slots().iter().map(GroupReport::from_slot).collect(),
        }
    }

    pub fn group(&self, group_id: u32) -> Option<&GroupReport> {
        self.groups.iter().find(|g| g.group_id == group_id)
    }

    pub fn member_counts(&self) -> Vec<usize> {
        self.groups.iter().map(|g| g.members.len()).collect()
    }
}

/// Everything a run produces for the report layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub classes: Vec<ClassReport>,
    pub diagnostics: Vec<Diagnostic>,
}

impl DispatchReport {
    pub(crate) fn sort_classes(&mut self) {
        self.classes.sort_by(|a, b| {
            class_name_ranking(&a.class_name, &b.class_name, false).then(a.gender.cmp(&b.gender))
        });
    }

    pub fn class(&self, class_name: &str, gender: Gender) -> Option<&ClassReport> {
        self.classes
            .iter()
            .find(|c| c.class_name == class_name && c.gender == gender)
    }

    /// Class and group a candidate ended up in.
    pub fn placement_of(&self, id: u64) -> Option<(&ClassReport, &GroupReport)> {
        self.classes.iter().find_map(|c| {
            c.groups
                .iter()
                .find(|g| g.contains(id))
                .map(|g| (c, g))
        })
    }

    pub fn placed_count(&self) -> usize {
        self.classes
            .iter()
            .flat_map(|c| c.groups.iter())
            .map(|g| g.members.len())
            .sum()
    }

    pub fn count_by_step(&self, step: AssignmentStep) -> usize {
        self.classes
            .iter()
            .flat_map(|c| c.groups.iter())
            .flat_map(|g| g.members.iter())
            .filter(|m| m.step == step)
            .count()
    }
}
