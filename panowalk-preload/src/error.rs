//! Error types for the preload pipeline

pub type PreloadResult<T> = Result<T, PreloadError>;

/// Errors from upstream fetching and assembly.
#[derive(Debug, thiserror::Error)]
pub enum PreloadError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(u16),

    /// 429/503 from upstream; retried with backoff.
    #[error("rate limited by upstream")]
    RateLimited,

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        last: Box<PreloadError>,
    },

    #[error("upstream response malformed: {0}")]
    Malformed(String),

    #[error("tile ({x}, {y}) failed to decode: {source}")]
    BadTile {
        x: u32,
        y: u32,
        #[source]
        source: image::ImageError,
    },

    #[error("tile grid incomplete: missing ({x}, {y})")]
    MissingTile { x: u32, y: u32 },

    #[error("failed to encode stitched panorama: {0}")]
    Encode(#[source] image::ImageError),

    #[error(transparent)]
    Cache(#[from] panowalk_cache::CacheError),
}

impl PreloadError {
    /// Whether a retry with backoff can plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PreloadError::RateLimited => true,
            PreloadError::Transport(_) => true,
            PreloadError::Status(code) => matches!(code, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }
}
