//! Errors surfaced by the recommendation service.

use data_loader::ItemId;
use models::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Item id is unknown to the active snapshot or has no feature vector
    #[error("Item {item_id} not found")]
    NotFound { item_id: ItemId },

    /// Input records or request arguments are unusable
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A fit was requested with no usable items
    #[error("Cannot fit a model on an empty catalog")]
    EmptyCatalog,

    /// Configuration failed to load or validate
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The blocking fit task panicked or was cancelled by the runtime
    #[error("Background fit failed: {0}")]
    FitTask(String),

    /// A fit started later was published first; this fit's result was discarded
    #[error("Fit #{started} superseded by fit #{active}")]
    Superseded { started: u64, active: u64 },

    #[error(transparent)]
    Pipeline(#[from] anyhow::Error),
}

impl From<ModelError> for ServiceError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::NotFound { item_id } => ServiceError::NotFound { item_id },
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
