pub mod aggregate;
pub mod collab;
pub mod command;
pub mod config;
pub mod db;
pub mod error;
pub mod io;
pub mod locking;
pub mod orchestrator;
pub mod paths;
pub mod plans;
pub mod pool;
pub mod status;
pub mod types;

pub use error::{PlanError, ProjectError, Result};
pub use orchestrator::{Collaborators, PlanOrchestrator};
