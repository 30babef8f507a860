use std::path::PathBuf;

/// Errors surfaced by the image codec, the API client and the tools.
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Request to the chat-completions API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Chat-completions API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Chat-completions API returned invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    #[error("Tool `{0}` used before setup")]
    NotReady(String),
}

impl VisionError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
