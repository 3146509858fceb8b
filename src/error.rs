//! Hover engine error types.

use thiserror::Error;

use crate::surface::SurfaceId;

#[derive(Debug, Error)]
pub enum HoverError {
    #[error("provider '{provider}' failed: {message}")]
    ProviderFailure { provider: String, message: String },

    #[error("popup element failed to initialize: {0}")]
    Initialization(String),

    #[error("popup is bound to surface {bound}, cannot rebind to {requested}")]
    InvalidTransition {
        bound: SurfaceId,
        requested: SurfaceId,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("surface watcher is no longer running")]
    WatcherClosed,
}

pub type HoverResult<T> = Result<T, HoverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_failure_names_provider() {
        let err = HoverError::ProviderFailure {
            provider: "docs".into(),
            message: "timeout".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'docs'"));
        assert!(msg.contains("timeout"));
    }

    #[test]
    fn invalid_transition_shows_both_surfaces() {
        let err = HoverError::InvalidTransition {
            bound: SurfaceId(1),
            requested: SurfaceId(2),
        };
        assert_eq!(
            err.to_string(),
            "popup is bound to surface #1, cannot rebind to #2"
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = HoverError::from(io);
        assert!(matches!(err, HoverError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }
}
