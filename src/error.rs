use thiserror::Error;

use crate::store::StoreError;

/// Failures surfaced by the channel, dispatch and history services.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("requester does not own this resource")]
    Forbidden,
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}
