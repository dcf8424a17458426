//! The staged dispatch run.
//!
//! Stage order matters: every stage relies on what the previous ones registered.
//!
//! 1. willingness: index declared classes and continuing leadership roles
//! 2. introducers: link questionnaire entries to their introducer
//! 3. classmates: link "put me with <name>" remarks between newcomers
//! 4. follower loops: resolve referral loops and chains, place continuing leaders
//! 5. upgrades: returning students follow their previous senior
//! 6. leader introductions: newcomers introduced by a leader join that leader
//! 7. remaining: everyone else becomes a pending batch in their home bucket
//! 8. orphan chains: chains whose root will not be balanced here become batches
//! 9. balance every bucket

use crate::bucket::{BucketKey, ClassGenderBucket, Placement};
use crate::pending::PendingEntry;
use crate::report::{ClassReport, DispatchReport};
use indexmap::IndexMap;
use regex::Regex;
use roster_core::{
    AssignmentStep, Candidate, CandidateRecord, Diagnostics, DispatchConfig, DispatchInput,
    IdAllocator, LeaderRecord, LeaderSlot, Result,
};
use roster_graph::AddFollow;
use rustc_hash::FxHashSet;

#[derive(Debug, Clone)]
struct LeaderFollow {
    candidate: usize,
    key: BucketKey,
    group_id: u32,
    leader: String,
}

/// One dispatch run. Build a fresh instance per run; nothing is shared between runs.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: DispatchConfig,
    classmate_re: Regex,
    buckets: IndexMap<BucketKey, ClassGenderBucket>,
    candidates: Vec<Candidate>,
    ids: IdAllocator,
    leader_follows: Vec<LeaderFollow>,
    /// Candidates already linked to an introducer or a classmate.
    introduced: FxHashSet<u64>,
    diagnostics: Diagnostics,
}

fn who(c: &Candidate) -> String {
    format!("{}({})", c.full_name, c.id)
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Result<Self> {
        config.validate()?;
        let classmate_re = config.classmate_regex()?;
        let ids = IdAllocator::new(config.synthetic_id_base);
        Ok(Self {
            config,
            classmate_re,
            buckets: IndexMap::new(),
            candidates: Vec::new(),
            ids,
            leader_follows: Vec::new(),
            introduced: FxHashSet::default(),
            diagnostics: Diagnostics::new(),
        })
    }

    pub fn from_input(config: DispatchConfig, input: &DispatchInput) -> Result<Self> {
        let mut dispatcher = Self::new(config)?;
        dispatcher.load_roster(&input.leaders)?;
        dispatcher.load_candidates(input.candidates.iter().cloned());
        Ok(dispatcher)
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Creates one slot per leader. Buckets keep the order in which the roster names them.
    pub fn load_roster(&mut self, leaders: &[LeaderRecord]) -> Result<()> {
        for leader in leaders {
            let key = BucketKey::new(leader.class_name.clone(), leader.gender);
            self.buckets
                .entry(key.clone())
                .or_insert_with(|| ClassGenderBucket::new(key))
                .add_leader(leader.clone())?;
        }
        tracing::info!(
            buckets = self.buckets.len(),
            leaders = leaders.len(),
            "roster loaded"
        );
        Ok(())
    }

    /// Adds candidates in input order. Missing or clashing ids get a synthetic id.
    pub fn load_candidates<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = CandidateRecord>,
    {
        let records: Vec<CandidateRecord> = records.into_iter().collect();
        let mut ids: Vec<Option<u64>> = Vec::with_capacity(records.len());
        for r in &records {
            ids.push(match r.id {
                Some(id) if self.ids.reserve(id) => Some(id),
                Some(id) => {
                    self.diagnostics.warning(format!(
                        "學號 {id} 重複({})，改配臨時編號",
                        r.full_name
                    ));
                    None
                }
                None => None,
            });
        }
        for (record, id) in records.into_iter().zip(ids) {
            let id = id.unwrap_or_else(|| self.ids.allocate());
            self.candidates.push(record.into_candidate(id));
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn bucket(&self, key: &BucketKey) -> Option<&ClassGenderBucket> {
        self.buckets.get(key)
    }

    pub fn buckets(&self) -> impl Iterator<Item = &ClassGenderBucket> {
        self.buckets.values()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn run(mut self) -> Result<DispatchReport> {
        self.prepare()?;
        self.balance()?;
        Ok(self.into_report())
    }

    /// Stages 1 through 8; everything except the final balancing.
    pub fn prepare(&mut self) -> Result<()> {
        self.index_willingness();
        self.link_introducers();
        self.link_classmates();
        self.place_follower_loops()?;
        self.sync_placements();
        self.place_upgrades()?;
        self.sync_placements();
        self.place_introducer_followers()?;
        self.sync_placements();
        self.queue_remaining();
        self.queue_orphan_chains()?;
        tracing::info!(
            candidates = self.candidates.len(),
            pending = self.buckets.values().map(|b| b.pending().len()).sum::<usize>(),
            diagnostics = self.diagnostics.len(),
            "prepared"
        );
        Ok(())
    }

    pub fn balance(&mut self) -> Result<()> {
        for i in 0..self.buckets.len() {
            self.sync_placements();
            if let Some((_, bucket)) = self.buckets.get_index_mut(i) {
                bucket.perform_auto_assignment(&self.config, &mut self.diagnostics)?;
            }
        }
        Ok(())
    }

    /// Tells every bucket which candidates already hold a slot in another bucket.
    fn sync_placements(&mut self) {
        let placed: Vec<(usize, Vec<u64>)> = self
            .buckets
            .values()
            .enumerate()
            .map(|(i, b)| (i, b.assigned_ids().collect()))
            .collect();
        for (i, bucket) in self.buckets.values_mut().enumerate() {
            for (owner, ids) in &placed {
                if *owner != i {
                    ids.iter().for_each(|&id| bucket.mark_placed_elsewhere(id));
                }
            }
        }
    }

    pub fn into_report(self) -> DispatchReport {
        let mut report = DispatchReport {
            classes: self.buckets.values().map(ClassReport::from_bucket).collect(),
            diagnostics: self.diagnostics.into_vec(),
        };
        report.sort_classes();
        report
    }

    fn index_willingness(&mut self) {
        for i in 0..self.candidates.len() {
            let c = self.candidates[i].clone();

            if let Some(role) = &c.continuing_role {
                let key = BucketKey::new(role.class_name.clone(), c.gender);
                match self.buckets.get_mut(&key) {
                    Some(b) if b.slot(role.group_id).is_some() => {
                        b.willingness_mut().declare_leadership(&c, role.group_id);
                    }
                    _ => self.diagnostics.warning(format!(
                        "{} 續任 {} 第{}組，但該班沒有此組的{}眾",
                        who(&c),
                        role.class_name,
                        role.group_id,
                        c.gender
                    )),
                }
            }

            if let Some(q) = &c.questionnaire {
                if q.gender.is_some_and(|g| g != c.gender) {
                    let message = format!("{} 問卷性別與名冊不符，以名冊為準", who(&c));
                    self.diagnostics.warning(message);
                }
                let key = BucketKey::new(q.desired_class.clone(), c.gender);
                match self.buckets.get_mut(&key) {
                    Some(b) => b.willingness_mut().declare(&c),
                    None => self
                        .diagnostics
                        .warning(format!("{} 報名的 {key} 沒有開班", who(&c))),
                }
            }

            if let Some(u) = &c.upgrade {
                let mut declared = false;
                for class_name in &u.declared_classes {
                    let key = BucketKey::new(class_name.clone(), c.gender);
                    if let Some(b) = self.buckets.get_mut(&key) {
                        b.willingness_mut().declare(&c);
                        declared = true;
                    }
                }
                if !declared && !u.declared_classes.is_empty() {
                    self.diagnostics.warning(format!(
                        "{} 升班志願 {} 皆無對應班級",
                        who(&c),
                        u.declared_classes.join("、")
                    ));
                }
            }
        }
    }

    fn link_introducers(&mut self) {
        for i in 0..self.candidates.len() {
            let c = self.candidates[i].clone();
            let (Some(q), Some(name)) = (&c.questionnaire, c.introducer_name()) else {
                continue;
            };
            let key = BucketKey::new(q.desired_class.clone(), c.gender);
            let Some(bucket) = self.buckets.get(&key) else {
                continue;
            };

            if let Some(slot) = bucket.slot_led_by(name) {
                self.leader_follows.push(LeaderFollow {
                    candidate: i,
                    key,
                    group_id: slot.group_id(),
                    leader: slot.leader.full_name.clone(),
                });
                self.introduced.insert(c.id);
                continue;
            }

            let matches: Vec<usize> = self
                .candidates
                .iter()
                .enumerate()
                .filter(|(_, x)| x.id != c.id && x.full_name == name)
                .map(|(j, _)| j)
                .collect();
            match matches.as_slice() {
                [] => {
                    let elsewhere = self.buckets.values().any(|b| b.slot_led_by(name).is_some());
                    if elsewhere {
                        self.diagnostics.warning(format!(
                            "{} 的介紹人 {name} 帶領其他班級，改為一般分配",
                            who(&c)
                        ));
                    } else {
                        self.diagnostics
                            .warning(format!("{} 的介紹人 {name} 查無此人", who(&c)));
                    }
                }
                [j] => {
                    let intro = self.candidates[*j].clone();
                    self.link_follow(&key, &intro, &c, AssignmentStep::IntroducerFollowing);
                }
                many => {
                    self.diagnostics.warning(format!(
                        "{} 的介紹人 {name} 有{}位同名，無法判定",
                        who(&c),
                        many.len()
                    ));
                }
            }
        }
    }

    fn link_classmates(&mut self) {
        for i in 0..self.candidates.len() {
            let c = self.candidates[i].clone();
            let (Some(q), Some(remark)) = (&c.questionnaire, c.remark()) else {
                continue;
            };
            let Some(peer_name) = self
                .classmate_re
                .captures(remark)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty())
            else {
                continue;
            };
            let key = BucketKey::new(q.desired_class.clone(), c.gender);
            if !self.buckets.contains_key(&key) {
                continue;
            }
            if self.introduced.contains(&c.id) {
                self.diagnostics.warning(format!(
                    "{} 已有介紹人，同組要求「{remark}」未處理",
                    who(&c)
                ));
                continue;
            }

            let peers: Vec<Candidate> = self
                .candidates
                .iter()
                .filter(|x| x.id != c.id && x.full_name == peer_name)
                .filter(|x| x.questionnaire.is_some() && !x.is_member())
                .cloned()
                .collect();
            match peers.as_slice() {
                [] => {
                    let is_member = self
                        .candidates
                        .iter()
                        .any(|x| x.full_name == peer_name && x.is_member());
                    if is_member {
                        self.diagnostics.warning(format!(
                            "{} 要求與舊生 {peer_name} 同組，請人工處理",
                            who(&c)
                        ));
                    } else {
                        self.diagnostics.warning(format!(
                            "{} 要求同組的 {peer_name} 不在問卷名單中",
                            who(&c)
                        ));
                    }
                }
                [peer] => {
                    let same_class = peer
                        .questionnaire
                        .as_ref()
                        .is_some_and(|pq| pq.desired_class == q.desired_class);
                    if peer.gender != c.gender || !same_class {
                        self.diagnostics.warning(format!(
                            "{} 要求與 {} 同組，但性別或班別不同",
                            who(&c),
                            who(peer)
                        ));
                        continue;
                    }
                    let peer = peer.clone();
                    if self.link_follow(&key, &peer, &c, AssignmentStep::ClassmateFollowing) {
                        self.diagnostics
                            .info(format!("{} 依備註與 {} 同組", who(&c), who(&peer)));
                    }
                }
                many => {
                    self.diagnostics.warning(format!(
                        "{} 要求同組的 {peer_name} 有{}位同名，無法判定",
                        who(&c),
                        many.len()
                    ));
                }
            }
        }
    }

    /// Registers `follower -> followee` in `key`'s bucket after checking the followee can
    /// actually be grouped with the follower.
    fn link_follow(
        &mut self,
        key: &BucketKey,
        followee: &Candidate,
        follower: &Candidate,
        step: AssignmentStep,
    ) -> bool {
        if let Some(role_key) = self.leadership_key(follower) {
            if &role_key != key {
                self.diagnostics.warning(format!(
                    "{} 續任 {role_key} 幹部，不隨 {} 入 {key}",
                    who(follower),
                    who(followee)
                ));
                return false;
            }
        }
        let Some(bucket) = self.buckets.get_mut(key) else {
            return false;
        };
        if followee.gender != follower.gender {
            self.diagnostics.warning(format!(
                "{} 的介紹人 {} 性別不同，改為一般分配",
                who(follower),
                who(followee)
            ));
            return false;
        }
        if !bucket.have_willingness(followee.id) {
            self.diagnostics.warning(format!(
                "{} 的介紹人 {} 未報名 {key}，改為一般分配",
                who(follower),
                who(followee)
            ));
            return false;
        }
        match bucket.register_follow(followee, follower, step) {
            AddFollow::Added => {
                self.introduced.insert(follower.id);
                true
            }
            AddFollow::SelfFollow => {
                self.diagnostics
                    .warning(format!("{} 填寫自己為介紹人", who(follower)));
                false
            }
            AddFollow::AlreadyFollowing(existing) => {
                tracing::debug!(follower = follower.id, existing, "second followee ignored");
                false
            }
        }
    }

    fn place_follower_loops(&mut self) -> Result<()> {
        for bucket in self.buckets.values_mut() {
            bucket.perform_follower_loop_first(&mut self.diagnostics)?;
        }
        Ok(())
    }

    fn place_upgrades(&mut self) -> Result<()> {
        for i in 0..self.candidates.len() {
            let c = self.candidates[i].clone();
            let (Some(u), Some(prev), Some(senior)) =
                (&c.upgrade, &c.previous, c.previous_senior())
            else {
                continue;
            };
            if self.is_placed(c.id) {
                continue;
            }
            for class_name in &u.declared_classes {
                let key = BucketKey::new(class_name.clone(), c.gender);
                let follows_elsewhere = self
                    .buckets
                    .values()
                    .any(|b| b.key() != &key && b.is_follower(c.id));
                if follows_elsewhere {
                    tracing::debug!(id = c.id, "upgrade skipped; candidate follows a referral");
                    break;
                }
                let Some(bucket) = self.buckets.get_mut(&key) else {
                    continue;
                };
                let Some(group_id) = bucket.slot_led_by(senior).map(LeaderSlot::group_id) else {
                    continue;
                };
                let placement = Placement::new(
                    format!("隨原學長 {senior} 升班"),
                    AssignmentStep::UpgradeFollowing,
                )
                .deacon(prev.deacon.clone())
                .non_follower_only();
                bucket.add_member_to(group_id, &c, placement, &mut self.diagnostics)?;
                break;
            }
        }
        Ok(())
    }

    fn place_introducer_followers(&mut self) -> Result<()> {
        for lf in std::mem::take(&mut self.leader_follows) {
            let c = self.candidates[lf.candidate].clone();
            if self.is_placed(c.id) {
                self.diagnostics.info(format!(
                    "{} 已分組，不再依介紹人 {} 分組",
                    who(&c),
                    lf.leader
                ));
                continue;
            }
            let Some(bucket) = self.buckets.get_mut(&lf.key) else {
                continue;
            };
            bucket.add_member_to(
                lf.group_id,
                &c,
                Placement::new(
                    format!("由學長 {} 介紹", lf.leader),
                    AssignmentStep::IntroducerFollowing,
                ),
                &mut self.diagnostics,
            )?;
        }
        Ok(())
    }

    fn queue_remaining(&mut self) {
        enum Queued {
            Group(usize),
            Single(BucketKey, Candidate),
        }

        let mut groups: IndexMap<(BucketKey, String, u32), Vec<Candidate>> = IndexMap::new();
        let mut order: Vec<Queued> = Vec::new();

        for i in 0..self.candidates.len() {
            let c = self.candidates[i].clone();
            if self.is_accounted(c.id) {
                continue;
            }
            let Some(key) = self.home_key(&c) else {
                self.diagnostics
                    .warning(format!("{} 沒有可分配的班級", who(&c)));
                continue;
            };
            let previous_group = match (&c.previous, &c.upgrade) {
                (Some(prev), Some(_)) => Some((prev.class_name.clone(), prev.group_id)),
                _ => None,
            };
            match previous_group {
                Some((prev_class, prev_group)) => {
                    let entry = groups.entry((key, prev_class, prev_group));
                    let idx = entry.index();
                    let members = entry.or_default();
                    if members.is_empty() {
                        order.push(Queued::Group(idx));
                    }
                    members.push(c);
                }
                None => order.push(Queued::Single(key, c)),
            }
        }

        let mut groups: Vec<Option<((BucketKey, String, u32), Vec<Candidate>)>> =
            groups.into_iter().map(Some).collect();
        for queued in order {
            let (key, entry) = match queued {
                Queued::Group(idx) => {
                    let Some(((key, prev_class, prev_group), members)) =
                        groups.get_mut(idx).and_then(Option::take)
                    else {
                        continue;
                    };
                    let n = members.len();
                    let description = format!("原{prev_class}第{prev_group}組升班({n}人)");
                    (key, PendingEntry::new(members, Some(description), true))
                }
                Queued::Single(key, c) => (key, PendingEntry::single(c)),
            };
            if let Some(bucket) = self.buckets.get_mut(&key) {
                bucket.add_pending(entry);
            }
        }
    }

    fn queue_orphan_chains(&mut self) -> Result<()> {
        for bucket in self.buckets.values_mut() {
            bucket.flush_orphan_triggers(&mut self.diagnostics)?;
        }
        Ok(())
    }

    fn is_placed(&self, id: u64) -> bool {
        self.buckets.values().any(|b| b.is_assigned(id))
    }

    /// Placed, queued, or riding behind someone else's placement.
    fn is_accounted(&self, id: u64) -> bool {
        self.buckets
            .values()
            .any(|b| b.is_assigned(id) || b.is_pending(id) || b.is_follower(id))
    }

    /// The bucket holding the candidate's continuing leadership slot, if the roster has it.
    fn leadership_key(&self, c: &Candidate) -> Option<BucketKey> {
        let role = c.continuing_role.as_ref()?;
        let key = BucketKey::new(role.class_name.clone(), c.gender);
        self.buckets
            .get(&key)
            .is_some_and(|b| b.slot(role.group_id).is_some())
            .then_some(key)
    }

    /// The bucket a candidate is balanced in when nothing else placed them.
    fn home_key(&self, c: &Candidate) -> Option<BucketKey> {
        if let Some(key) = self.leadership_key(c) {
            return Some(key);
        }
        if let Some(q) = &c.questionnaire {
            let key = BucketKey::new(q.desired_class.clone(), c.gender);
            if self.buckets.contains_key(&key) {
                return Some(key);
            }
        }
        c.upgrade.as_ref().and_then(|u| {
            u.declared_classes
                .iter()
                .map(|class_name| BucketKey::new(class_name.clone(), c.gender))
                .find(|key| self.buckets.contains_key(key))
        })
    }
}
