//! Snapshot model: naming, cataloguing, chain selection and retention.
//!
//! Everything here is deterministic. Time always comes in as an explicit
//! `now`, and the only I/O is listing a destination directory
//! ([`Catalog::scan`]).

mod catalog;
mod chain;
mod instant;
mod layout;
mod naming;
pub mod retention;

pub use catalog::Catalog;
pub use chain::select as select_chain;
pub use instant::{DEFAULT_DATE_FORMAT, DateFormat, Instant, Leading};
pub use layout::SnapshotLayout;
pub use naming::{NameMatch, NamingScheme};
pub use retention::{
    RetentionPlan, RetentionPlanner, RetentionPolicy, Tier, TierDecision, TierPolicy,
};
