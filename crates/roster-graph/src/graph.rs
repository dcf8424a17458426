//! Followee → follower container.
//!
//! Every follower names at most one followee, so the structure is a functional graph read
//! backwards: once cycles are stripped it is a forest whose roots follow nobody. Followees are
//! kept in insertion order, which is what makes cycle and chain resolution reproducible.

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use std::collections::VecDeque;

pub mod alg;

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;

/// Anything that can sit in a follower list.
pub trait Follower: Clone {
    fn follower_id(&self) -> u64;
}

impl Follower for u64 {
    fn follower_id(&self) -> u64 {
        *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddFollow {
    Added,
    /// The follower already follows the given followee; the new edge was ignored.
    AlreadyFollowing(u64),
    SelfFollow,
}

#[derive(Debug, Clone)]
pub struct FollowGraph<T: Follower> {
    follows: IndexMap<u64, Vec<T>, FxBuildHasher>,
    followee_of: HashMap<u64, u64>,
}

impl<T: Follower> Default for FollowGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Follower> FollowGraph<T> {
    pub fn new() -> Self {
        Self {
            follows: IndexMap::default(),
            followee_of: HashMap::default(),
        }
    }

    pub fn add_follow(&mut self, followee: u64, follower: T) -> AddFollow {
        let id = follower.follower_id();
        if id == followee {
            return AddFollow::SelfFollow;
        }
        if let Some(&existing) = self.followee_of.get(&id) {
            return AddFollow::AlreadyFollowing(existing);
        }
        self.followee_of.insert(id, followee);
        self.follows.entry(followee).or_default().push(follower);
        AddFollow::Added
    }

    pub fn is_empty(&self) -> bool {
        self.follows.is_empty()
    }

    pub fn followee_count(&self) -> usize {
        self.follows.len()
    }

    pub fn follower_count(&self) -> usize {
        self.followee_of.len()
    }

    pub fn followees(&self) -> impl Iterator<Item = u64> + '_ {
        self.follows.keys().copied()
    }

    pub fn first_followee(&self) -> Option<u64> {
        self.follows.keys().next().copied()
    }

    pub fn has_followers(&self, id: u64) -> bool {
        self.follows.contains_key(&id)
    }

    pub fn followers(&self, id: u64) -> &[T] {
        self.follows.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn followee_of(&self, id: u64) -> Option<u64> {
        self.followee_of.get(&id).copied()
    }

    pub fn is_follower(&self, id: u64) -> bool {
        self.followee_of.contains_key(&id)
    }

    /// Pops every follower transitively reachable from `id`, breadth first.
    ///
    /// Each removed follower's own follower list is removed as well. Returns the removed
    /// followers in removal order; `id` itself is included only if it follows one of them.
    pub fn remove_followers(&mut self, id: u64) -> Vec<T> {
        let mut out: Vec<T> = Vec::new();
        let mut queue: VecDeque<u64> = VecDeque::new();
        queue.push_back(id);
        while let Some(v) = queue.pop_front() {
            let Some(list) = self.follows.shift_remove(&v) else {
                continue;
            };
            for f in list {
                let fid = f.follower_id();
                self.followee_of.remove(&fid);
                queue.push_back(fid);
                out.push(f);
            }
        }
        out
    }
}
