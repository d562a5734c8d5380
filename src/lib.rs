pub mod automation;
pub mod cancel;
pub mod capture;
pub mod error;
pub mod input;
pub mod logging;
pub mod slots;
pub mod vision;

pub use automation::{AutomationConfig, RunOutcome, RunStatus, WorkflowManager};
pub use cancel::CancelToken;
pub use error::{AutomationError, AutomationResult};
pub use logging::Logger;
pub use slots::{Slot, SlotMode, SlotValues, TextureMap};
pub use vision::{Point, Region, Vision};
