//! Repositories built on the relational executor and the graph executor
//!
//! - Reads that need children use one joined query, never one per parent
//! - Multi-table writes run in a single transaction

mod aggregate;
pub mod matches;
pub mod opportunity;
pub mod points;
pub mod student;
pub mod user;

pub use matches::MatchesRepo;
pub use opportunity::{materialize, Materialized, OpportunityRepo, OpportunityRow};
pub use points::PointsRepo;
pub use student::{StudentInfoRow, StudentRepo, TagOpinion};
pub use user::UserRepo;
