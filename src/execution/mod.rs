//! Composite Execution Module
//!
//! Wiring and running of composite tasks.
//!
//! # Architecture
//!
//! - [`composite`]: The composite task itself (registration, wiring, execution)
//! - [`connection`]: Data-flow edges and result key arithmetic
//! - [`graph`]: Advisory cycle detection over the connection graph
//! - [`error`]: Wiring errors raised while connecting subtasks

pub mod composite;
pub mod connection;
pub mod error;
pub mod graph;

pub use composite::CompositeTask;
pub use connection::{Connection, ResultBuckets};
pub use error::WiringError;
pub use graph::find_cycle;
