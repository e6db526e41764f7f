use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelephonyError {
    #[error("provider configuration error: {0}")]
    Config(String),

    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status} for {context}")]
    Status { status: u16, context: String },

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("unexpected provider response: {0}")]
    Response(String),
}
