//! Run Client - ships Blockflow graphs to the execution service
//!
//! Before anything is sent, [`check_runnable`] refuses graphs that cannot
//! run. Accepted graphs are serialized as `graph.v1` documents and handed
//! to an [`ExecutionService`]; [`HttpExecutionService`] is the real one.
//! [`RunClient`] exposes the latest submission as a [`RunState`] that can
//! be watched while a run is in flight.

pub mod client;
pub mod error;
pub mod guard;
pub mod service;

pub use client::{RunClient, RunState};
pub use error::{Result, RunError};
pub use guard::check_runnable;
pub use service::{ExecutionService, HttpExecutionService, RunRequest, RunResponse};
