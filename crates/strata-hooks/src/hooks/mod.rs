//! Hook system — registrations, body shapes, and completion signals.

pub mod definitions;
pub mod registry;
pub mod signal;

pub use definitions::{HookBody, HookKind, HookMode, HookOptions, Phase};
pub use registry::{HookRegistration, HookRegistry};
pub use signal::Next;
