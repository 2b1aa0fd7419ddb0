//! Core event model for evoke.
//!
//! Defines the two pieces shared by the broker and the replayer:
//! [`EventBatch`], the ordered JSON event batch the broker bakes into a
//! machine and the replayer reads back, and [`replay()`], the loop that
//! drives a [`Handler`] over a batch with per-event failure isolation.

pub mod batch;
pub mod replay;

pub use batch::{BatchError, Event, EventBatch};
pub use replay::{Handler, HandlerExecutionError, ReplayReport, replay};
