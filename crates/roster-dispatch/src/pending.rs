use roster_core::Candidate;

/// A batch of candidates awaiting balancing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub members: Vec<Candidate>,
    /// Used verbatim as the placement reason when present.
    pub description: Option<String>,
    /// Whether the batch may be split across leaders when it is too large.
    pub breakable: bool,
}

impl PendingEntry {
    pub fn new(members: Vec<Candidate>, description: Option<String>, breakable: bool) -> Self {
        Self {
            members,
            description,
            breakable,
        }
    }

    pub fn single(candidate: Candidate) -> Self {
        Self::new(vec![candidate], None, false)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.members.iter().any(|c| c.id == id)
    }

    /// Whether splitting can make progress.
    pub fn can_split(&self) -> bool {
        self.breakable && self.members.len() >= 2
    }

    /// Splits into two halves; the first half takes the extra member of an odd batch.
    ///
    /// Both halves carry the description prefixed with `marker` (once).
    pub fn split(self, marker: &str) -> (PendingEntry, PendingEntry) {
        let n = self.members.len();
        let description = match self.description {
            Some(d) if d.starts_with(marker) => d,
            Some(d) => format!("{marker}{d}"),
            None => format!("{marker}待分配{n}人"),
        };
        let mut first = self.members;
        let second = first.split_off(n.div_ceil(2));
        (
            PendingEntry::new(first, Some(description.clone()), self.breakable),
            PendingEntry::new(second, Some(description), self.breakable),
        )
    }
}

/// A resolved referral chain parked until its root is placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerWaitingEntry {
    pub root: Candidate,
    pub members: Vec<Candidate>,
}

impl TriggerWaitingEntry {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::Gender;

    fn batch(n: u64, description: Option<&str>) -> PendingEntry {
        let members = (1..=n)
            .map(|i| Candidate::new(i, format!("c{i}"), Gender::Female))
            .collect();
        PendingEntry::new(members, description.map(str::to_string), true)
    }

    #[test]
    fn split_gives_first_half_the_odd_member() {
        let (a, b) = batch(25, None).split("[拆]");
        assert_eq!((a.len(), b.len()), (13, 12));
        assert_eq!(a.description.as_deref(), Some("[拆]待分配25人"));
        assert_eq!(b.description, a.description);
        assert_eq!(a.members[0].id, 1);
        assert_eq!(b.members[0].id, 14);
    }

    #[test]
    fn split_does_not_stack_markers() {
        let (a, _) = batch(4, Some("原初級第3組升班")).split("[拆]");
        let (c, d) = a.split("[拆]");
        assert_eq!(c.description.as_deref(), Some("[拆]原初級第3組升班"));
        assert_eq!((c.len(), d.len()), (1, 1));
        assert!(!c.can_split());
    }
}
