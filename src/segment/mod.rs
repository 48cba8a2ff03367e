//! The segment assignment and history engine.
//!
//! Storage is modelled as four capability traits ([`Catalog`], [`AssignmentStore`],
//! [`Sampler`], [`HistoryReader`]) implemented by [`SqliteStore`]. The rollout and
//! history functions are generic over those traits.

pub mod assignment;
pub mod auto_assign;
pub mod catalog;
pub mod clock;
pub mod context;
pub mod history;
pub mod report;
pub mod sampler;
pub mod store;
pub mod types;
pub mod users;

pub use assignment::AssignmentStore;
pub use catalog::Catalog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::Context;
pub use history::HistoryReader;
pub use report::ReportExporter;
pub use sampler::Sampler;
pub use store::SqliteStore;
