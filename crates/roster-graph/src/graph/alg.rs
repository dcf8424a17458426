//! Cycle stripping and chain collapsing over a [`FollowGraph`].

use super::{Follower, FollowGraph};
use rustc_hash::FxBuildHasher;

type HashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;

/// A referral loop, removed as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCycle<T> {
    /// Ids on the loop, starting at the node that closed it.
    pub path: Vec<u64>,
    /// Everyone popped out of the graph: the loop plus anyone hanging below it.
    pub members: Vec<T>,
}

/// An acyclic chain headed by a root that follows nobody.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChain<T> {
    pub root: u64,
    /// Downstream followers in depth-first order; the root is not included.
    pub members: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<T> {
    pub cycles: Vec<ResolvedCycle<T>>,
    pub chains: Vec<ResolvedChain<T>>,
}

impl<T> Default for Resolution<T> {
    fn default() -> Self {
        Self {
            cycles: Vec::new(),
            chains: Vec::new(),
        }
    }
}

/// Depth-first walk from every followee, in insertion order.
///
/// Returns the path from the first repeated node onward, or `None` when the graph is a forest.
pub fn find_cycle<T: Follower>(g: &FollowGraph<T>) -> Option<Vec<u64>> {
    struct Walk<'a, T: Follower> {
        g: &'a FollowGraph<T>,
        path: Vec<u64>,
        on_path: HashSet<u64>,
        done: HashSet<u64>,
    }

    impl<T: Follower> Walk<'_, T> {
        fn visit(&mut self, v: u64) -> Option<Vec<u64>> {
            let g = self.g;
            self.path.push(v);
            self.on_path.insert(v);
            for f in g.followers(v) {
                let w = f.follower_id();
                if self.on_path.contains(&w) {
                    let start = self.path.iter().position(|&p| p == w).unwrap_or(0);
                    return Some(self.path[start..].to_vec());
                }
                if self.done.contains(&w) || !g.has_followers(w) {
                    continue;
                }
                if let Some(cycle) = self.visit(w) {
                    return Some(cycle);
                }
            }
            self.path.pop();
            self.on_path.remove(&v);
            self.done.insert(v);
            None
        }
    }

    let mut walk = Walk {
        g,
        path: Vec::new(),
        on_path: HashSet::default(),
        done: HashSet::default(),
    };
    for v in g.followees() {
        if walk.done.contains(&v) {
            continue;
        }
        if let Some(cycle) = walk.visit(v) {
            return Some(cycle);
        }
    }
    None
}

/// Walks upward to the node that follows nobody.
///
/// Must only be called on a cycle-free graph; a loop is cut at the first repeated node.
pub fn find_chain_root<T: Follower>(g: &FollowGraph<T>, id: u64) -> u64 {
    let mut seen: HashSet<u64> = HashSet::default();
    let mut cur = id;
    seen.insert(cur);
    while let Some(up) = g.followee_of(cur) {
        if !seen.insert(up) {
            break;
        }
        cur = up;
    }
    cur
}

/// Collects the whole downstream chain below `id`, depth first.
pub fn find_chain_followers<T: Follower>(g: &FollowGraph<T>, id: u64) -> Vec<T> {
    fn collect<T: Follower>(
        g: &FollowGraph<T>,
        v: u64,
        seen: &mut HashSet<u64>,
        out: &mut Vec<T>,
    ) {
        for f in g.followers(v) {
            let w = f.follower_id();
            if !seen.insert(w) {
                continue;
            }
            out.push(f.clone());
            collect(g, w, seen, out);
        }
    }

    let mut seen: HashSet<u64> = HashSet::default();
    seen.insert(id);
    let mut out: Vec<T> = Vec::new();
    collect(g, id, &mut seen, &mut out);
    out
}

/// Strips every cycle, then collapses what is left into chains until the graph is empty.
pub fn resolve<T: Follower>(g: &mut FollowGraph<T>) -> Resolution<T> {
    let mut out = Resolution::default();

    while let Some(path) = find_cycle(g) {
        let members = g.remove_followers(path[0]);
        out.cycles.push(ResolvedCycle { path, members });
    }

    while let Some(first) = g.first_followee() {
        let root = find_chain_root(g, first);
        let members = find_chain_followers(g, root);
        let removed = g.remove_followers(root);
        debug_assert_eq!(removed.len(), members.len());
        out.chains.push(ResolvedChain { root, members });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_root_walks_to_the_top() {
        let mut g: FollowGraph<u64> = FollowGraph::new();
        g.add_follow(1, 2);
        g.add_follow(2, 3);
        g.add_follow(3, 4);
        assert_eq!(find_chain_root(&g, 4), 1);
        assert_eq!(find_chain_root(&g, 1), 1);
        assert_eq!(find_chain_followers(&g, 2), vec![3, 4]);
    }

    #[test]
    fn cycle_path_starts_at_repeated_node() {
        let mut g: FollowGraph<u64> = FollowGraph::new();
        // 9 -> 1 -> 2 -> 3 -> 1
        g.add_follow(9, 1);
        g.add_follow(1, 2);
        g.add_follow(2, 3);
        g.add_follow(3, 1);
        // 1 already follows 9, so 3 -> 1 was ignored; no loop.
        assert_eq!(find_cycle(&g), None);

        let mut g: FollowGraph<u64> = FollowGraph::new();
        g.add_follow(1, 2);
        g.add_follow(2, 3);
        g.add_follow(3, 1);
        g.add_follow(5, 9);
        assert_eq!(find_cycle(&g), Some(vec![1, 2, 3]));
    }
}
