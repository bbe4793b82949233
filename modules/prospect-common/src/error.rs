use thiserror::Error;

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Refresh lock conflict: another scheduled refresh is in progress")]
    RefreshInProgress,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl RefreshError {
    /// Build a fetch error from any provider failure, keeping the context chain.
    pub fn fetch(err: &anyhow::Error) -> Self {
        RefreshError::Fetch(format!("{err:#}"))
    }

    /// Build a persistence error from any store failure, keeping the context chain.
    pub fn database(err: &anyhow::Error) -> Self {
        RefreshError::Database(format!("{err:#}"))
    }
}
