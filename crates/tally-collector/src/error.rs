use thiserror::Error;

/// Errors surfaced synchronously by the collector engine.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The collector spec is malformed; no instance was created.
    #[error("invalid collector spec: {0}")]
    Validation(String),

    /// The subscription was released before the collector could confirm it.
    #[error("event source closed before the subscription was confirmed")]
    SourceClosed,
}

/// A failure raised by a consumer callback (`on_collect` / `on_end`).
///
/// The engine catches these at the call site; they never abort the transition
/// to `Ended` and never trigger a second finalization.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Message(String),

    #[error("{0}")]
    Source(Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("callback panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn msg(text: impl Into<String>) -> Self {
        HandlerError::Message(text.into())
    }

    /// Wrap any error type, e.g. a platform client error.
    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        HandlerError::Source(Box::new(err))
    }

    /// Convert a caught panic payload into a readable error.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let text = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        HandlerError::Panicked(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_readable() {
        let err = HandlerError::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "callback panicked: boom");

        let err = HandlerError::from_panic(Box::new(String::from("owned")));
        assert_eq!(err.to_string(), "callback panicked: owned");

        let err = HandlerError::from_panic(Box::new(17_u32));
        assert!(matches!(err, HandlerError::Panicked(_)));
    }

    #[test]
    fn wrapped_errors_keep_their_message() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        assert_eq!(HandlerError::other(io).to_string(), "disk gone");
    }
}
