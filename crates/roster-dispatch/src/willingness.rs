use indexmap::IndexMap;
use roster_core::Candidate;

/// Who declared interest in one class, and who continues leading a group in it.
#[derive(Debug, Clone, Default)]
pub struct Willingness {
    declared: IndexMap<u64, Candidate>,
    leadership: IndexMap<u64, u32>,
}

impl Willingness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records interest. The first declaration wins; later ones are ignored.
    pub fn declare(&mut self, candidate: &Candidate) {
        self.declared
            .entry(candidate.id)
            .or_insert_with(|| candidate.clone());
    }

    pub fn have_willingness(&self, id: u64) -> bool {
        self.declared.contains_key(&id)
    }

    /// Marks a candidate as continuing to serve in `group_id`; implies interest in the class.
    pub fn declare_leadership(&mut self, candidate: &Candidate, group_id: u32) {
        self.declare(candidate);
        self.leadership.insert(candidate.id, group_id);
    }

    pub fn leadership_group(&self, id: u64) -> Option<u32> {
        self.leadership.get(&id).copied()
    }

    /// Continuing leaders in declaration order, with the group they keep.
    pub fn leaders(&self) -> Vec<(Candidate, u32)> {
        self.leadership
            .iter()
            .filter_map(|(id, group)| self.declared.get(id).map(|c| (c.clone(), *group)))
            .collect()
    }
}
