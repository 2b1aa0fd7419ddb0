//! Typed client for the Fly Machines REST API.
//!
//! Covers the slice of `https://api.machines.dev` the broker needs: create a
//! machine for a workload, inspect it, list an app's machines, delete one.
//! Requests that time out are retried, as are the transient 409/412 answers
//! the API gives while a machine is settling.

pub mod client;
pub mod error;
pub mod types;

pub use client::MachinesClient;
pub use error::{FlyError, Result};
pub use types::{
    Machine, MachineConfig, MachineFile, MachineProcess, MachineService, MachineSize, Port,
};
