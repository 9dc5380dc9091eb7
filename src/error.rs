use std::path::PathBuf;

/// Errors raised while loading programs or configuration.
#[derive(Debug, thiserror::Error)]
pub enum PlaygroundError {
    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed program JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("`{block}` block is missing field `{field}`")]
    MissingField { block: String, field: &'static str },

    #[error("`{block}` block has invalid `{field}`: expected {expected}")]
    InvalidField {
        block: String,
        field: &'static str,
        expected: &'static str,
    },

    #[error("unknown event `{0}` (expected when_flag_clicked, when_key_pressed or when_sprite_clicked)")]
    UnknownEvent(String),
}

pub type Result<T> = std::result::Result<T, PlaygroundError>;
