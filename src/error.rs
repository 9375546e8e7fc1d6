//! Error taxonomy shared by every core module.
//!
//! Local recoverables (retries, markdown-unavailable fallbacks, robots
//! denial) never surface as a `CrawlError`; they are ordinary
//! [`crate::job::FromWorker`] values. This enum only covers what spec.md §7
//! calls "unrecoverable outcomes".

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("http {status} {reason}")]
    Http { status: u16, reason: String },

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("render unavailable: {0}")]
    RenderUnavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CrawlResult<T> = Result<T, CrawlError>;
