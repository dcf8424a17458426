//! Greedy balancing of pending batches over a bucket's leader slots.

use super::{ClassGenderBucket, Placement};
use crate::pending::PendingEntry;
use roster_core::{AssignmentStep, Candidate, Diagnostics, DispatchConfig, Error, Result};

/// Exact-fit rule: can a batch of `n` land on a leader holding `m` members?
///
/// The `n == 2` arm is kept separate from the `n >= 3` arm; both accept the same window.
pub fn difference_assignment(n: i64, m: i64, left_over: i64, avg: i64) -> bool {
    let filled = n + m + left_over;
    if n >= 3 && avg <= filled && filled <= avg + 1 {
        return true;
    }
    if n == 2 && avg <= filled && filled <= avg + 1 {
        return true;
    }
    filled == avg
}

impl ClassGenderBucket {
    /// Per-leader target for this bucket: the configured capacity, or the computed average.
    pub fn average_load(&self, config: &DispatchConfig) -> usize {
        if let Some(target) = config.target_load {
            return target;
        }
        let pending: usize = self.pending.iter().map(PendingEntry::len).sum();
        let waiting: usize = self.trigger_waiting.values().map(|t| t.len()).sum();
        config
            .average
            .compute(self.total + pending, waiting, self.slots.len())
    }

    /// Members a batch brings once placed, counting chains that cascade behind a root.
    fn weight(&self, entry: &PendingEntry) -> usize {
        entry
            .members
            .iter()
            .map(|c| 1 + self.trigger_weight(c.id))
            .sum()
    }

    /// Distributes every pending batch over the leader slots.
    pub fn perform_auto_assignment(
        &mut self,
        config: &DispatchConfig,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        if self.slots.is_empty() {
            let n: usize = self.pending.iter().map(PendingEntry::len).sum();
            diag.error(format!("{}: 沒有學長可分配，{n}人未分組", self.key));
            return Ok(());
        }

        let avg = self.average_load(config) as i64;
        tracing::info!(
            bucket = %self.key,
            avg,
            leaders = self.slots.len(),
            batches = self.pending.len(),
            "balancing"
        );

        let mut pending = std::mem::take(&mut self.pending);
        let mut iterations = 0usize;
        while !pending.is_empty() {
            iterations += 1;
            if iterations > config.max_iterations {
                self.pending = pending;
                return Err(Error::BalancingDiverged {
                    class_name: self.key.class_name.clone(),
                    gender: self.key.gender,
                    iterations: config.max_iterations,
                });
            }

            // Stable: equal-sized batches keep insertion order.
            pending.sort_by_key(|e| std::cmp::Reverse(self.weight(e)));
            let max_available = avg + 1 - self.min_member_count() as i64;

            let largest = self.weight(&pending[0]) as i64;
            if largest > max_available {
                let entry = pending.remove(0);
                if entry.can_split() {
                    let (first, second) = entry.split(&config.split_marker);
                    tracing::debug!(
                        bucket = %self.key,
                        first = first.len(),
                        second = second.len(),
                        max_available,
                        "split batch"
                    );
                    pending.insert(0, second);
                    pending.insert(0, first);
                } else {
                    let idx = self.least_loaded();
                    self.assign_at(idx, entry, diag)?;
                }
                continue;
            }

            if let Some((entry_idx, slot_idx)) = self.find_exact_fit(&pending, avg) {
                let entry = pending.remove(entry_idx);
                self.assign_at(slot_idx, entry, diag)?;
                continue;
            }

            let entry = pending.remove(0);
            let idx = self.least_loaded();
            self.assign_at(idx, entry, diag)?;
        }

        tracing::info!(bucket = %self.key, iterations, "balanced");
        Ok(())
    }

    /// First batch (in current order) with a leader (in roster order) it fits exactly.
    fn find_exact_fit(&self, pending: &[PendingEntry], avg: i64) -> Option<(usize, usize)> {
        pending.iter().enumerate().find_map(|(entry_idx, entry)| {
            let n = self.weight(entry) as i64;
            self.slots
                .iter()
                .position(|s| difference_assignment(n, s.member_count() as i64, 0, avg))
                .map(|slot_idx| (entry_idx, slot_idx))
        })
    }

    fn assign_at(
        &mut self,
        slot_idx: usize,
        entry: PendingEntry,
        diag: &mut Diagnostics,
    ) -> Result<()> {
        self.pending_group_seq += 1;
        let seq = self.pending_group_seq;
        let group_id = self.slots[slot_idx].group_id();
        let n = entry.len();
        for candidate in &entry.members {
            let reason = match &entry.description {
                Some(d) => d.clone(),
                None => auto_reason(seq, n, candidate),
            };
            self.add_member_to(
                group_id,
                candidate,
                Placement::new(reason, AssignmentStep::AutoAssignment),
                diag,
            )?;
        }
        Ok(())
    }
}

fn auto_reason(seq: usize, n: usize, candidate: &Candidate) -> String {
    match candidate.previous_senior() {
        Some(senior) => format!("自動分組 #{seq} ({n}人), 原學長 {senior}"),
        None => format!("自動分組 #{seq} ({n}人)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_fit_window() {
        // avg 10: batches of two or more may land anywhere in [10, 11].
        assert!(difference_assignment(3, 7, 0, 10));
        assert!(difference_assignment(3, 8, 0, 10));
        assert!(!difference_assignment(3, 9, 0, 10));
        assert!(difference_assignment(2, 9, 0, 10));
        assert!(difference_assignment(2, 8, 0, 10));
        assert!(!difference_assignment(2, 7, 0, 10));
        // Single members only fill up to exactly avg.
        assert!(difference_assignment(1, 9, 0, 10));
        assert!(!difference_assignment(1, 10, 0, 10));
        // left_over counts toward the fill.
        assert!(difference_assignment(1, 8, 1, 10));
    }

    #[test]
    fn two_member_arm_matches_general_arm() {
        for avg in 0..6 {
            for m in 0..8 {
                let general = avg <= 2 + m && 2 + m <= avg + 1;
                assert_eq!(difference_assignment(2, m, 0, avg), general || 2 + m == avg);
            }
        }
    }
}
