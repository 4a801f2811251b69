use courier_core::error::CoreError;
use courier_core::notification_status::InvalidTransition;
use courier_events::DeliveryError;

/// Failure talking to the persistent store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store is unreachable for a reason other than a query failure.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl From<InvalidTransition> for PipelineError {
    fn from(err: InvalidTransition) -> Self {
        PipelineError::Core(CoreError::InvalidTransition {
            from: err.from.to_string(),
            to: err.to.to_string(),
        })
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::Store(StoreError::Database(err))
    }
}
