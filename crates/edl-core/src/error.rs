use thiserror::Error;

pub type Result<T> = std::result::Result<T, EdlError>;

#[derive(Debug, Error)]
pub enum EdlError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to fetch indicators: {0}")]
    Fetch(String),

    #[error(
        "\"Update EDL On Demand\" is turned off. If you want to update the EDL manually please turn it on."
    )]
    OnDemandDisabled,

    #[error("Format error: {0}")]
    Format(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EdlError {
    /// True for errors caused by the caller's input rather than by the
    /// indicator store or the local machine.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EdlError::Configuration(_) | EdlError::OnDemandDisabled | EdlError::Format(_)
        )
    }
}
