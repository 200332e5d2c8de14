//! pvectl: lifecycle control for VMs and containers of a virtualization
//! cluster.
//!
//! The library holds everything but argument parsing and terminal I/O:
//! selector matching, id resolution, retry policy, lifecycle orchestration
//! and the HTTP adapter for the cluster management API.

pub mod api;
pub mod error;
pub mod model;
pub mod operation;
pub mod orchestrator;
pub mod repository;
pub mod resolver;
pub mod retry;
pub mod selector;
pub mod targets;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use model::{Node, Resource, ResourceKind, TaskStatus};
pub use operation::{ExecutionReport, Operation, OperationResult, Outcome};
pub use orchestrator::{ExecuteOptions, Orchestrator, StrategyRegistry};
pub use resolver::Resolver;
pub use retry::RetryPolicy;
pub use selector::Selector;
