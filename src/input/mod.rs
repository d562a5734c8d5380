// Input simulation module.
// Wraps mouse/keyboard synthesis and system clipboard access; every action
// leaves a settle delay that stays responsive to stop requests.

pub mod clipboard;
pub mod controller;

pub use clipboard::SystemClipboard;
pub use controller::InputController;
