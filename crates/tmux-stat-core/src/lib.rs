//! tmux-stat-core: mapping and classification engine.
//! Turns Codex telemetry attributes into a per-pane status decision and
//! tracks which tmux pane each conversation belongs to. No IO, no async.

pub mod attributes;
pub mod classify;
pub mod error;
pub mod lifecycle;
pub mod registry;

pub use attributes::{AttributeMap, AttributeValue, RawAttribute, RawValue, extract_attributes};
pub use classify::{PaneStatus, StatusDecision, classify};
pub use error::RegistryError;
pub use lifecycle::{Lifecycle, LifecycleConfig, SweepOutcome};
pub use registry::{Binding, BindingKey, BindingState, PaneRegistry};
