use crate::ValidationErrors;

/// Errors raised by the mediator itself, as opposed to failures returned by handlers.
///
/// Configuration errors ([HandlerNotFound](Error::HandlerNotFound),
/// [AmbiguousHandler](Error::AmbiguousHandler), [DuplicateName](Error::DuplicateName),
/// [OutOfBandResponse](Error::OutOfBandResponse))
/// are reported when building a [Mediator](crate::Mediator). The others are reported during
/// dispatch and converted into the caller's error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A request was dispatched, or declared, but no [RequestHandler](crate::RequestHandler) is
    /// registered for it.
    #[error("Missing handler for request {0}")]
    HandlerNotFound(&'static str),
    /// More than one [RequestHandler](crate::RequestHandler) is registered for a request.
    #[error("Request {request} has {count} handlers, exactly one is expected")]
    AmbiguousHandler {
        /// The name of the request.
        request: &'static str,
        /// The number of registered handlers.
        count: usize,
    },
    /// The request failed validation. The handler was not invoked.
    #[error("Request validation failed: {0}")]
    RequestValidation(ValidationErrors),
    /// The cancellation token fired before the dispatch completed.
    #[error("Dispatch was cancelled")]
    Cancelled,
    /// A type-erased request could not be downcast to the expected type.
    #[error("Could not downcast request to type {0}")]
    RequestDowncast(&'static str),
    /// A type-erased notification could not be downcast to the expected type.
    #[error("Could not downcast notification to type {0}")]
    NotificationDowncast(&'static str),
    /// A type-erased response could not be downcast to the expected type.
    #[error("Could not downcast response to type {0}")]
    ResponseDowncast(&'static str),
    /// Two registered message types share the same name.
    #[error("Name {0} is used by more than one message type")]
    DuplicateName(&'static str),
    /// An out-of-band handler was registered for a request whose response is not `()`.
    #[error("Out-of-band handler for request {0} must not produce a response")]
    OutOfBandResponse(&'static str),
}

impl Error {
    /// Returns `true` for errors that denote a wiring mistake rather than a dispatch outcome.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::HandlerNotFound(_)
                | Error::AmbiguousHandler { .. }
                | Error::DuplicateName(_)
                | Error::OutOfBandResponse(_)
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wiring_mistakes_are_configuration_errors() {
        assert!(Error::HandlerNotFound("ping").is_configuration_error());
        assert!(Error::AmbiguousHandler {
            request: "ping",
            count: 2
        }
        .is_configuration_error());
        assert!(Error::DuplicateName("ping").is_configuration_error());
        assert!(Error::OutOfBandResponse("ping").is_configuration_error());
        assert!(!Error::Cancelled.is_configuration_error());
        assert!(!Error::RequestValidation(ValidationErrors::new()).is_configuration_error());
    }

    #[test]
    fn ambiguous_handler_message_names_the_request() {
        let error = Error::AmbiguousHandler {
            request: "add-something",
            count: 3,
        };

        assert_eq!(
            error.to_string(),
            "Request add-something has 3 handlers, exactly one is expected"
        );
    }
}
