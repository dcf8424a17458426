use rustc_hash::FxHashSet;

/// Hands out synthetic ids to newcomers that arrive without a student id.
///
/// Owned by one dispatch run; ids already taken by existing students are skipped.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u64,
    taken: FxHashSet<u64>,
}

impl IdAllocator {
    pub fn new(base: u64) -> Self {
        Self {
            next: base,
            taken: FxHashSet::default(),
        }
    }

    /// Marks an existing id as in use. Returns `false` if it was already reserved.
    pub fn reserve(&mut self, id: u64) -> bool {
        self.taken.insert(id)
    }

    pub fn allocate(&mut self) -> u64 {
        while self.taken.contains(&self.next) {
            self.next += 1;
        }
        let id = self.next;
        self.taken.insert(id);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_reserved_ids() {
        let mut ids = IdAllocator::new(100);
        assert!(ids.reserve(101));
        assert!(!ids.reserve(101));
        assert_eq!(ids.allocate(), 100);
        assert_eq!(ids.allocate(), 102);
        assert_eq!(ids.allocate(), 103);
    }
}
