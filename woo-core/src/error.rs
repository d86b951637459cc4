//! Error Types
//!
//! Every failure in the engine degrades a single computation or a single
//! scope. None of these errors is fatal to the runtime.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ScopeError>;

/// Errors produced by scopes, traces and the runtime.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// A scope with the same name is already registered.
    #[error("scope `{0}` is already registered")]
    DuplicateScope(String),

    /// The scope was released and can no longer trace computations.
    #[error("scope `{0}` has been released")]
    Released(String),

    /// The initial value of a scope could not be turned into a tracked node.
    ///
    /// Recorded on the scope; the root falls back to an empty object.
    #[error("scope `{scope}` has an unwrappable root: {reason}")]
    UnwrappableRoot { scope: String, reason: String },

    /// A trace was started while another one is recording on this thread.
    #[error("cannot trace `{requested}` while `{active}` is still recording")]
    NestedTrace { active: String, requested: String },

    /// A computation panicked.
    #[error("computation `{key}` failed: {message}")]
    Computation { key: String, message: String },

    /// Invalid runtime configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Encode(#[from] rmp_serde::encode::Error),

    #[error(transparent)]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Render a panic payload as a message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_render() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "panic");
    }

    #[test]
    fn errors_display() {
        let err = ScopeError::NestedTrace {
            active: "outer".into(),
            requested: "inner".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot trace `inner` while `outer` is still recording"
        );
    }
}
