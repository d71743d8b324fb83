use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::registry::AnyRequestHandler;
use crate::{BoxedResponse, Error, Request, RequestDescriptor, RequestRef};

/// A decorator wrapped around the handling of every [request](Request).
///
/// Behaviors are applied in registration order: the first registered behavior is the outermost
/// one. Each behavior may inspect the request, call the [next stage](Next), inspect or transform
/// the response, or return without calling the next stage.
///
/// # Type arguments
///
/// * `E` - the type of errors returned if the behavior or the inner stages fail
///
/// # Example
///
/// ```
/// use entremise::{async_trait, BoxedResponse, Next, PipelineBehavior, RequestRef};
///
/// struct Trace;
///
/// #[async_trait]
/// impl PipelineBehavior<entremise::Error> for Trace {
///     async fn handle(
///         &self,
///         request: RequestRef<'_>,
///         next: Next<'_, entremise::Error>,
///     ) -> Result<BoxedResponse, entremise::Error> {
///         log::info!("Handling {}", request.name());
///         next.run(request).await
///     }
/// }
/// ```
#[async_trait]
pub trait PipelineBehavior<E>: Send + Sync {
    /// Constrains the requests this behavior wraps. The constraint is evaluated once per request
    /// type when the [Mediator](crate::Mediator) is built. Defaults to every request.
    fn applies_to(&self, _descriptor: &RequestDescriptor) -> bool {
        true
    }

    /// Wraps the handling of a request.
    async fn handle(&self, request: RequestRef<'_>, next: Next<'_, E>) -> Result<BoxedResponse, E>;
}

/// The remaining stages of a pipeline: the inner behaviors, then the handler.
pub struct Next<'a, E> {
    behaviors: &'a [Arc<dyn PipelineBehavior<E>>],
    handler: &'a dyn AnyRequestHandler<E>,
    cancellation: &'a CancellationToken,
}

impl<'a, E> Next<'a, E> {
    pub(crate) fn new(
        behaviors: &'a [Arc<dyn PipelineBehavior<E>>],
        handler: &'a dyn AnyRequestHandler<E>,
        cancellation: &'a CancellationToken,
    ) -> Self {
        Self {
            behaviors,
            handler,
            cancellation,
        }
    }

    /// The cancellation token of the current dispatch.
    pub fn cancellation(&self) -> &'a CancellationToken {
        self.cancellation
    }
}

impl<E> Next<'_, E>
where
    E: From<Error> + Send + 'static,
{
    /// Runs the next stage. Fails with [Error::Cancelled] without running anything if the
    /// dispatch has been cancelled.
    pub async fn run(self, request: RequestRef<'_>) -> Result<BoxedResponse, E> {
        if self.cancellation.is_cancelled() {
            return Err(Error::Cancelled.into());
        }
        match self.behaviors.split_first() {
            Some((behavior, behaviors)) => {
                behavior
                    .handle(
                        request,
                        Next {
                            behaviors,
                            handler: self.handler,
                            cancellation: self.cancellation,
                        },
                    )
                    .await
            }
            None => self.handler.handle(request, self.cancellation).await,
        }
    }
}

/// Runs before the pipeline of a given [Request] type, for side effects only.
///
/// A pre-processor cannot produce a response in place of the handler. If it fails, the dispatch
/// fails with its error.
#[async_trait]
pub trait RequestPreProcessor<R, E>: Send + Sync
where
    R: Request,
{
    /// Processes a request before it is handled.
    async fn process(&self, request: &R, cancellation: &CancellationToken) -> Result<(), E>;
}

/// Runs after the pipeline of a given [Request] type returned successfully, for side effects only.
#[async_trait]
pub trait RequestPostProcessor<R, E>: Send + Sync
where
    R: Request,
{
    /// Processes a request and its response once it has been handled.
    async fn process(
        &self,
        request: &R,
        response: &R::Response,
        cancellation: &CancellationToken,
    ) -> Result<(), E>;
}
