//! Suntik - packet-injection controller.
//!
//! Coordinates remote packet-injection jobs across a fleet of agents from a
//! single elected controller: resolves abstract endpoint descriptors against
//! the topology graph, dispatches requests to the agent owning the source
//! node, and tracks each injection through its timed lifecycle.

pub mod builder;
pub mod config;
pub mod controller;
pub mod domain;
pub mod election;
pub mod engines;
pub mod error;
pub mod graph;
pub mod resolver;
pub mod rpc;
pub mod store;
pub mod tracker;
pub mod validate;
pub mod watcher;

pub use config::Config;
pub use controller::Controller;
pub use error::{FieldError, InjectionError};
