#![forbid(unsafe_code)]

//! `roster` assigns candidates to group leaders for each class of a study period.
//!
//! Every (class, gender) pair is balanced on its own. Referral chains stay together, returning
//! students follow their previous senior when possible, and everything else is spread evenly.
//! The run is deterministic: the same input in the same order always yields the same report.
//!
//! ```no_run
//! use roster::{DispatchInput, Engine};
//!
//! let input: DispatchInput = serde_json::from_str("{}").unwrap();
//! let report = Engine::new().dispatch(&input).unwrap();
//! for class in &report.classes {
//!     println!("{}({}): {:?}", class.class_name, class.gender, class.member_counts());
//! }
//! ```

pub use roster_core::*;
pub use roster_dispatch::{
    BucketKey, ClassGenderBucket, ClassReport, DispatchReport, Dispatcher, GroupReport,
    PendingEntry,
};

#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: DispatchConfig,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Runs every stage and returns the final groups with the diagnostics collected on the way.
    pub fn dispatch(&self, input: &DispatchInput) -> Result<DispatchReport> {
        tracing::info!(
            leaders = input.leaders.len(),
            candidates = input.candidates.len(),
            "dispatch"
        );
        Dispatcher::from_input(self.config.clone(), input)?.run()
    }

    /// Loads the input without assigning anyone.
    ///
    /// Fatal roster problems surface as `Err`; id clashes and similar issues are returned as
    /// diagnostics.
    pub fn check(&self, input: &DispatchInput) -> Result<Diagnostics> {
        let dispatcher = Dispatcher::from_input(self.config.clone(), input)?;
        Ok(dispatcher.diagnostics().clone())
    }
}
