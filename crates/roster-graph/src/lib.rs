//! Referral follow-graph used by the class dispatcher.
//!
//! A follower names one followee (their introducer, or a peer they asked to be grouped with).
//! [`alg::resolve`] turns the graph into atomic loop groups and root-headed chains.

mod graph;

pub use graph::alg;
pub use graph::{AddFollow, FollowGraph, Follower};
