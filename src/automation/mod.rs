// Automation module.
// Turns a declarative slot configuration into an ordered sequence of UI
// actions against the target application, tracking what it currently
// contains so repeated runs only perform the minimal diff.

pub mod config;
pub mod groups;
pub mod removal;
pub mod session;
pub mod state;
pub mod textures;
pub mod workflow;
pub mod worker;

// Re-export the main types and functions for easy access
pub use config::AutomationConfig;
pub use session::WorkflowSession;
pub use workflow::{RunOutcome, RunPhase, RunStatus, WorkflowManager};
pub use worker::{RunRequest, create_worker_channels, spawn_worker};
