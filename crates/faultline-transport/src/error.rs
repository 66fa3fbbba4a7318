use thiserror::Error;

#[derive(Error, Debug)]
pub enum HttpTransportError {
    #[error("An HTTP transport needs a DSN")]
    MissingDsn,

    #[error("Failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
