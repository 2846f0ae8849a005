//! Error types for the pane registry.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("pane_id required")]
    EmptyPaneId,

    #[error("binding for pane {pane_id} is already bound to {conversation_id}")]
    AlreadyBound {
        pane_id: String,
        conversation_id: String,
    },
}
