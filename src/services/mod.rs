//! Business logic services.
//!
//! Reviewer selection, the assignment workflows, and the HTTP surface that
//! exposes them. Selection and assignment are independent of the transport.

pub mod assignment;
pub mod http_api;
pub mod http_server;
pub mod reviewer_selector;

pub use assignment::{AssignmentService, ReassignOutcome};
pub use reviewer_selector::{RandomSource, SeededRandom, ThreadRandom};
