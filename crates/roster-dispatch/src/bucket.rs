//! One balancing unit per (class, gender).
//!
//! The bucket owns the fixed leader slots of its class, the referral graph among candidates who
//! want the class, the chains parked behind their roots, and the pending batches that
//! [`ClassGenderBucket::perform_auto_assignment`] later distributes.

use crate::pending::{PendingEntry, TriggerWaitingEntry};
use crate::willingness::Willingness;
use indexmap::IndexMap;
use roster_core::{
    AssignedMember, AssignmentStep, Candidate, Diagnostics, Error, Gender, LeaderRecord,
    LeaderSlot, Result,
};
use roster_graph::{AddFollow, FollowGraph, alg};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;

mod balance;

pub use balance::difference_assignment;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub class_name: String,
    pub gender: Gender,
}

impl BucketKey {
    pub fn new(class_name: impl Into<String>, gender: Gender) -> Self {
        Self {
            class_name: class_name.into(),
            gender,
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.class_name, self.gender)
    }
}

/// Options for a single [`ClassGenderBucket::add_member_to`] call.
#[derive(Debug, Clone)]
pub struct Placement {
    pub reason: String,
    pub step: AssignmentStep,
    pub deacon: Option<String>,
    /// Duplicate attempts are expected (cascades); log them at trace level only.
    pub internal: bool,
    /// Refuse candidates that are part of a referral relation.
    pub non_follower_only: bool,
}

impl Placement {
    pub fn new(reason: impl Into<String>, step: AssignmentStep) -> Self {
        Self {
            reason: reason.into(),
            step,
            deacon: None,
            internal: false,
            non_follower_only: false,
        }
    }

    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    pub fn non_follower_only(mut self) -> Self {
        self.non_follower_only = true;
        self
    }

    pub fn deacon(mut self, deacon: Option<String>) -> Self {
        self.deacon = deacon.filter(|d| !d.trim().is_empty());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ClassGenderBucket {
    key: BucketKey,
    slots: Vec<LeaderSlot>,
    willingness: Willingness,
    follows: FollowGraph<Candidate>,
    /// Followees seen while registering edges; every chain root must be here.
    introducers: IndexMap<u64, Candidate>,
    /// Step each follower is tagged with when its chain cascades.
    follow_steps: FxHashMap<u64, AssignmentStep>,
    followers: FxHashSet<u64>,
    trigger_waiting: IndexMap<u64, TriggerWaitingEntry>,
    pending: Vec<PendingEntry>,
    already_assigned: IndexMap<u64, u32>,
    /// Candidates already holding a slot in another bucket.
    placed_elsewhere: FxHashSet<u64>,
    total: usize,
    pending_group_seq: usize,
}

impl ClassGenderBucket {
    pub fn new(key: BucketKey) -> Self {
        Self {
            key,
            slots: Vec::new(),
            willingness: Willingness::new(),
            follows: FollowGraph::new(),
            introducers: IndexMap::new(),
            follow_steps: FxHashMap::default(),
            followers: FxHashSet::default(),
            trigger_waiting: IndexMap::new(),
            pending: Vec::new(),
            already_assigned: IndexMap::new(),
            placed_elsewhere: FxHashSet::default(),
            total: 0,
            pending_group_seq: 0,
        }
    }

    pub fn key(&self) -> &BucketKey {
        &self.key
    }

    /// Adds a leader slot at roster load. Group ids are unique within a bucket.
    pub fn add_leader(&mut self, leader: LeaderRecord) -> Result<()> {
        if self.slot_index(leader.group_id).is_some() {
            return Err(Error::DuplicateLeader {
                class_name: self.key.class_name.clone(),
                gender: self.key.gender,
                group_id: leader.group_id,
            });
        }
        self.slots.push(LeaderSlot::new(leader));
        Ok(())
    }

    pub fn slots(&self) -> &[LeaderSlot] {
        &self.slots
    }

    pub fn slot(&self, group_id: u32) -> Option<&LeaderSlot> {
        self.slot_index(group_id).map(|i| &self.slots[i])
    }

    fn slot_index(&self, group_id: u32) -> Option<usize> {
        self.slots.iter().position(|s| s.group_id() == group_id)
    }

    /// The slot led by someone answering to `name` (lay or dharma name).
    pub fn slot_led_by(&self, name: &str) -> Option<&LeaderSlot> {
        self.slots.iter().find(|s| s.leader.answers_to(name))
    }

    pub fn willingness_mut(&mut self) -> &mut Willingness {
        &mut self.willingness
    }

    pub fn have_willingness(&self, id: u64) -> bool {
        self.willingness.have_willingness(id)
    }

    pub fn pending(&self) -> &[PendingEntry] {
        &self.pending
    }

    pub fn is_pending(&self, id: u64) -> bool {
        self.pending.iter().any(|p| p.contains(id))
    }

    pub fn add_pending(&mut self, entry: PendingEntry) {
        if entry.is_empty() {
            return;
        }
        self.pending.push(entry);
    }

    pub fn trigger_waiting(&self) -> impl Iterator<Item = &TriggerWaitingEntry> {
        self.trigger_waiting.values()
    }

    pub fn is_follower(&self, id: u64) -> bool {
        self.followers.contains(&id)
    }

    pub fn is_assigned(&self, id: u64) -> bool {
        self.already_assigned.contains_key(&id)
    }

    pub fn assigned_count(&self) -> usize {
        self.total
    }

    pub fn assigned_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.already_assigned.keys().copied()
    }

    /// Records that `id` holds a slot in another bucket; later placements here are refused.
    pub fn mark_placed_elsewhere(&mut self, id: u64) {
        self.placed_elsewhere.insert(id);
    }

    /// Slot holding an already placed candidate.
    ///
    /// A recorded assignment whose slot cannot be found means the bucket's bookkeeping is
    /// corrupt, which is fatal.
    pub fn leader_of(&self, id: u64) -> Result<Option<&LeaderSlot>> {
        let Some(&group_id) = self.already_assigned.get(&id) else {
            return Ok(None);
        };
        self.slot(group_id)
            .map(Some)
            .ok_or_else(|| Error::MissingGroup {
                group_id,
                class_name: self.key.class_name.clone(),
            })
    }

    /// Registers `follower` as following `followee`.
    pub fn register_follow(
        &mut self,
        followee: &Candidate,
        follower: &Candidate,
        step: AssignmentStep,
    ) -> AddFollow {
        let added = self.follows.add_follow(followee.id, follower.clone());
        if added == AddFollow::Added {
            self.introducers
                .entry(followee.id)
                .or_insert_with(|| followee.clone());
            self.followers.insert(follower.id);
            self.follow_steps.insert(follower.id, step);
        }
        added
    }

    /// The member-add primitive. Returns whether the candidate was placed.
    pub fn add_member_to(
        &mut self,
        group_id: u32,
        candidate: &Candidate,
        placement: Placement,
        diag: &mut Diagnostics,
    ) -> Result<bool> {
        if placement.non_follower_only && self.followers.contains(&candidate.id) {
            diag.error(format!(
                "{}: {}({}) 已在介紹關係中，不依「{}」入組",
                self.key, candidate.full_name, candidate.id, placement.reason
            ));
            return Ok(false);
        }

        if let Some(&existing) = self.already_assigned.get(&candidate.id) {
            if placement.internal {
                tracing::trace!(
                    bucket = %self.key,
                    id = candidate.id,
                    existing,
                    "skipping repeated placement"
                );
            } else {
                diag.warning(format!(
                    "{}: {}({}) 重複分組，已在第{}組",
                    self.key, candidate.full_name, candidate.id, existing
                ));
            }
            return Ok(false);
        }

        if self.placed_elsewhere.contains(&candidate.id) {
            diag.warning(format!(
                "{}: {}({}) 已分配在其他班級，不再依「{}」入組",
                self.key, candidate.full_name, candidate.id, placement.reason
            ));
            return Ok(false);
        }

        let idx = self.slot_index(group_id).ok_or_else(|| Error::MissingGroup {
            group_id,
            class_name: self.key.class_name.clone(),
        })?;

        tracing::debug!(
            bucket = %self.key,
            group_id,
            id = candidate.id,
            step = %placement.step,
            reason = %placement.reason,
            "placed"
        );
        self.slots[idx].members.push(AssignedMember {
            candidate: candidate.clone(),
            deacon: placement.deacon,
            reason: placement.reason,
            step: placement.step,
        });
        self.already_assigned.insert(candidate.id, group_id);
        self.total += 1;

        if let Some(entry) = self.trigger_waiting.shift_remove(&candidate.id) {
            let reason = format!("隨介紹人 {} 入組", candidate.full_name);
            for member in &entry.members {
                let step = self.cascade_step(member.id);
                self.add_member_to(
                    group_id,
                    member,
                    Placement::new(reason.clone(), step).internal(),
                    diag,
                )?;
            }
        }

        Ok(true)
    }

    /// Resolves the referral graph and force-places continuing leaders.
    ///
    /// Loops become atomic pending batches; chains are parked behind their root and land with
    /// it when the root is placed.
    pub fn perform_follower_loop_first(&mut self, diag: &mut Diagnostics) -> Result<()> {
        let resolution = alg::resolve(&mut self.follows);

        for cycle in resolution.cycles {
            let n = cycle.members.len();
            let names: Vec<&str> = cycle
                .members
                .iter()
                .map(|c| c.full_name.as_str())
                .collect();
            let names = names.join("、");
            let leader = cycle.members.iter().find_map(|c| {
                self.willingness
                    .leadership_group(c.id)
                    .map(|g| (c.clone(), g))
            });
            let Some((leader, group_id)) = leader else {
                diag.warning(format!("{}: {names} 互為介紹人，{n}人併為一組待分配", self.key));
                self.pending.push(PendingEntry::new(
                    cycle.members,
                    Some(format!("{n}人互為介紹人(循環)")),
                    false,
                ));
                continue;
            };

            // Anchored by a continuing leader; the rest of the loop joins that group.
            diag.warning(format!(
                "{}: {names} 互為介紹人，併入續任幹部 {} 的第{group_id}組",
                self.key, leader.full_name
            ));
            let reason = format!("隨介紹人 {} 入組", leader.full_name);
            let mut members = cycle.members;
            members.sort_by_key(|m| self.willingness.leadership_group(m.id).is_none());
            for member in &members {
                let (target, placement) = match self.willingness.leadership_group(member.id) {
                    Some(own) => {
                        let reason = format!("續任第{own}組幹部");
                        (own, Placement::new(reason, AssignmentStep::SeniorContinuing))
                    }
                    None => {
                        let step = self.cascade_step(member.id);
                        (group_id, Placement::new(reason.clone(), step).internal())
                    }
                };
                self.add_member_to(target, member, placement, diag)?;
            }
        }

        for chain in resolution.chains {
            let root = self
                .introducers
                .get(&chain.root)
                .cloned()
                .ok_or_else(|| Error::MissingIntroducer {
                    root: chain.root,
                    class_name: self.key.class_name.clone(),
                })?;
            tracing::debug!(
                bucket = %self.key,
                root = root.id,
                size = chain.members.len(),
                "referral chain parked behind root"
            );
            self.trigger_waiting.insert(
                root.id,
                TriggerWaitingEntry {
                    root,
                    members: chain.members,
                },
            );
        }

        for (candidate, group_id) in self.willingness.leaders() {
            if self.is_assigned(candidate.id) {
                continue;
            }
            let reason = format!("續任第{group_id}組幹部");
            self.add_member_to(
                group_id,
                &candidate,
                Placement::new(reason, AssignmentStep::SeniorContinuing),
                diag,
            )?;
        }
        Ok(())
    }

    /// Turns chains whose root will never be balanced in this bucket into pending batches.
    ///
    /// A root already placed here cascades immediately instead.
    pub fn flush_orphan_triggers(&mut self, diag: &mut Diagnostics) -> Result<()> {
        let roots: Vec<u64> = self.trigger_waiting.keys().copied().collect();
        for root_id in roots {
            if self.is_pending(root_id) {
                continue;
            }
            let Some(entry) = self.trigger_waiting.shift_remove(&root_id) else {
                continue;
            };
            if let Some(group_id) = self.leader_of(root_id)?.map(LeaderSlot::group_id) {
                let reason = format!("隨介紹人 {} 入組", entry.root.full_name);
                for member in &entry.members {
                    let step = self.cascade_step(member.id);
                    self.add_member_to(
                        group_id,
                        member,
                        Placement::new(reason.clone(), step).internal(),
                        diag,
                    )?;
                }
                continue;
            }
            let n = entry.members.len();
            diag.warning(format!(
                "{}: 介紹人 {} 未分配在本班，其介紹鏈{}人另行分配",
                self.key, entry.root.full_name, n
            ));
            self.pending.push(PendingEntry::new(
                entry.members,
                Some(format!("介紹人{}未入本班，介紹鏈{n}人", entry.root.full_name)),
                false,
            ));
        }
        Ok(())
    }

    fn cascade_step(&self, id: u64) -> AssignmentStep {
        self.follow_steps
            .get(&id)
            .copied()
            .unwrap_or(AssignmentStep::IntroducerFollowing)
    }

    fn trigger_weight(&self, id: u64) -> usize {
        self.trigger_waiting.get(&id).map_or(0, TriggerWaitingEntry::len)
    }

    fn min_member_count(&self) -> usize {
        self.slots
            .iter()
            .map(LeaderSlot::member_count)
            .min()
            .unwrap_or(0)
    }

    /// First slot (roster order) with the fewest members.
    fn least_loaded(&self) -> usize {
        let min = self.min_member_count();
        self.slots
            .iter()
            .position(|s| s.member_count() == min)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(leaders: u32) -> ClassGenderBucket {
        let mut b = ClassGenderBucket::new(BucketKey::new("初級", Gender::Male));
        for g in 1..=leaders {
            b.add_leader(LeaderRecord::new("初級", g, Gender::Male, &format!("學長{g}")))
                .unwrap();
        }
        b
    }

    fn c(id: u64, name: &str) -> Candidate {
        Candidate::new(id, name, Gender::Male)
    }

    #[test]
    fn duplicate_leader_is_rejected() {
        let mut b = bucket(2);
        let err = b
            .add_leader(LeaderRecord::new("初級", 2, Gender::Male, "x"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateLeader { group_id: 2, .. }));
    }

    #[test]
    fn duplicate_placement_is_rejected_and_reported() {
        let mut b = bucket(2);
        let mut diag = Diagnostics::new();
        let a = c(1, "甲");
        let p = || Placement::new("test", AssignmentStep::AutoAssignment);
        assert!(b.add_member_to(1, &a, p(), &mut diag).unwrap());
        assert!(!b.add_member_to(2, &a, p(), &mut diag).unwrap());
        assert_eq!(diag.len(), 1);
        assert!(!b.add_member_to(2, &a, p().internal(), &mut diag).unwrap());
        assert_eq!(diag.len(), 1);
        assert_eq!(b.slot(1).unwrap().member_count(), 1);
        assert_eq!(b.slot(2).unwrap().member_count(), 0);
    }

    #[test]
    fn unknown_group_is_fatal() {
        let mut b = bucket(1);
        let mut diag = Diagnostics::new();
        let err = b
            .add_member_to(
                9,
                &c(1, "甲"),
                Placement::new("x", AssignmentStep::AutoAssignment),
                &mut diag,
            )
            .unwrap_err();
        assert!(matches!(err, Error::MissingGroup { group_id: 9, .. }));
    }

    #[test]
    fn non_follower_only_refuses_followers() {
        let mut b = bucket(1);
        let mut diag = Diagnostics::new();
        let (a, f) = (c(1, "甲"), c(2, "乙"));
        b.register_follow(&a, &f, AssignmentStep::IntroducerFollowing);
        let placed = b
            .add_member_to(
                1,
                &f,
                Placement::new("升班", AssignmentStep::UpgradeFollowing).non_follower_only(),
                &mut diag,
            )
            .unwrap();
        assert!(!placed);
        assert_eq!(diag.count(roster_core::Level::Error), 1);
    }

    #[test]
    fn root_placement_cascades_the_whole_chain() {
        let mut b = bucket(2);
        let mut diag = Diagnostics::new();
        let (a, x, y) = (c(1, "甲"), c(2, "乙"), c(3, "丙"));
        b.register_follow(&a, &x, AssignmentStep::IntroducerFollowing);
        b.register_follow(&x, &y, AssignmentStep::IntroducerFollowing);
        b.perform_follower_loop_first(&mut diag).unwrap();
        assert_eq!(b.trigger_waiting().count(), 1);

        b.add_member_to(
            2,
            &a,
            Placement::new("測試", AssignmentStep::AutoAssignment),
            &mut diag,
        )
        .unwrap();
        let slot = b.slot(2).unwrap();
        let ids: Vec<u64> = slot.members.iter().map(|m| m.candidate.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(slot.members[1].step, AssignmentStep::IntroducerFollowing);
        assert!(slot.members[2].reason.contains("甲"));
        assert_eq!(b.trigger_waiting().count(), 0);
    }

    #[test]
    fn orphan_chain_becomes_an_unbreakable_batch() {
        let mut b = bucket(1);
        let mut diag = Diagnostics::new();
        let (a, x) = (c(1, "甲"), c(2, "乙"));
        b.register_follow(&a, &x, AssignmentStep::IntroducerFollowing);
        b.perform_follower_loop_first(&mut diag).unwrap();
        b.flush_orphan_triggers(&mut diag).unwrap();
        assert_eq!(b.pending().len(), 1);
        assert!(!b.pending()[0].breakable);
        assert_eq!(b.pending()[0].members[0].id, 2);
        assert_eq!(diag.count(roster_core::Level::Warning), 1);
    }

    #[test]
    fn candidate_placed_in_another_bucket_is_refused() {
        let mut b = bucket(2);
        let mut diag = Diagnostics::new();
        let a = c(1, "甲");
        b.mark_placed_elsewhere(a.id);
        let placed = b
            .add_member_to(1, &a, Placement::new("x", AssignmentStep::AutoAssignment), &mut diag)
            .unwrap();
        assert!(!placed);
        assert_eq!(b.assigned_count(), 0);
        assert_eq!(diag.count(roster_core::Level::Warning), 1);
    }

    #[test]
    fn loop_through_a_continuing_leader_joins_that_group() {
        let mut b = bucket(2);
        let mut diag = Diagnostics::new();
        let (a, x) = (c(1, "甲"), c(2, "乙"));
        b.willingness_mut().declare_leadership(&a, 2);
        b.willingness_mut().declare(&x);
        b.register_follow(&a, &x, AssignmentStep::IntroducerFollowing);
        b.register_follow(&x, &a, AssignmentStep::IntroducerFollowing);
        b.perform_follower_loop_first(&mut diag).unwrap();

        assert!(b.pending().is_empty());
        let slot = b.slot(2).unwrap();
        let ids: Vec<u64> = slot.members.iter().map(|m| m.candidate.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(slot.members[0].step, AssignmentStep::SeniorContinuing);
        assert!(slot.members[1].reason.contains("甲"));
        assert_eq!(diag.count(roster_core::Level::Warning), 1);
    }
}
