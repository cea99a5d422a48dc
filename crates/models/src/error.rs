//! Error types for the models crate.

use data_loader::ItemId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Item has no feature vector in the fitted content model
    #[error("Item {item_id} has no feature vector")]
    NotFound { item_id: ItemId },
}

pub type Result<T> = std::result::Result<T, ModelError>;
