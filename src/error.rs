use thiserror::Error;

// Everything the remote store or session provider can fail with. All of
// these are non-fatal: the app turns them into a notice and keeps running.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store rejected the request ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),
}
