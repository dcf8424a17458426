#![forbid(unsafe_code)]

//! Group assignment for class rosters.
//!
//! Each (class, gender) pair is balanced independently in a [`ClassGenderBucket`]. The
//! [`Dispatcher`] drives all buckets through the staged run and produces a [`DispatchReport`].

pub mod bucket;
pub mod pending;
pub mod pipeline;
pub mod report;
pub mod willingness;

pub use bucket::{BucketKey, ClassGenderBucket, Placement, difference_assignment};
pub use pending::{PendingEntry, TriggerWaitingEntry};
pub use pipeline::Dispatcher;
pub use report::{ClassReport, DispatchReport, GroupReport};
pub use willingness::Willingness;
