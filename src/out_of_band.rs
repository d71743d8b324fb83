use async_trait::async_trait;

use crate::{BoxedRequest, HandlerDescriptor};

/// Executes requests outside of the caller's dispatch, for instance by pushing them to a queue.
///
/// When an executor is configured, [send](crate::Mediator::send) offers it every request whose
/// handler is flagged [out-of-band](crate::RequestHandler::out_of_band). If the executor
/// [intercepts](Self::intercepts) it, the request is [enqueued](Self::enqueue) and `send` returns
/// immediately: no processor, behavior or handler runs inline. The executor guarantees that the
/// request is eventually handled at least once, typically by a worker calling
/// [send_boxed](crate::Mediator::send_boxed).
///
/// Without an executor, out-of-band handlers are invoked inline like any other handler.
///
/// # Type arguments
///
/// * `E` - the type of errors returned if the request cannot be accepted
#[async_trait]
pub trait OutOfBandExecutor<E>: Send + Sync {
    /// Whether this executor takes over the requests of the given handler. Defaults to `true`.
    fn intercepts(&self, _handler: &HandlerDescriptor) -> bool {
        true
    }

    /// Accepts a request for deferred execution. Must return without waiting for the request to
    /// be handled.
    async fn enqueue(&self, request: BoxedRequest) -> Result<(), E>;
}
