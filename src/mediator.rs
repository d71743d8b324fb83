use std::any::TypeId;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::registry::{RequestEntry, Scope};
use crate::{
    BoxedRequest, BoxedResponse, Configuration, Error, Next, Notification, PublishPolicy,
    Registry, Request, RequestRef,
};

/// Dispatches [requests](Request) to their handler and [notifications](Notification) to all of
/// theirs.
///
/// The handling of a request goes through, in order:
///
/// 1. the [pre-processors](crate::RequestPreProcessor) of the request type
/// 2. the [pipeline behaviors](crate::PipelineBehavior), the first registered being the
///    outermost
/// 3. the [handler](crate::RequestHandler)
/// 4. the [post-processors](crate::RequestPostProcessor) of the request type, if the pipeline
///    succeeded
///
/// Every stage is skipped once the cancellation token fires, and the dispatch then fails with
/// [Error::Cancelled].
///
/// A mediator is a handle to a [Registry] and a scope of handler instances. Cloning it is cheap
/// and shares both; [scoped](Mediator::scoped) creates a new scope.
///
/// # Type arguments
///
/// * `E` - the type of errors returned by handlers, into which mediator errors are converted
pub struct Mediator<E>
where
    E: 'static,
{
    registry: Arc<Registry<E>>,
    scope: Arc<Scope<E>>,
}

impl<E> Mediator<E> {
    /// Builds a mediator from a configuration. Fails if the configuration is not valid, see
    /// [Registry].
    ///
    /// # Example
    /// ```
    /// let mediator = entremise::Mediator::<entremise::Error>::new(
    ///     entremise::Configuration::new()
    ///         .behavior(entremise::ValidationBehavior::default())
    /// );
    /// assert!(mediator.is_ok());
    /// ```
    pub fn new(configuration: Configuration<E>) -> Result<Self, Error> {
        let registry = Registry::build(configuration)?;
        let scope = Scope::new(&registry);
        Ok(Self {
            registry: Arc::new(registry),
            scope: Arc::new(scope),
        })
    }

    /// Creates a mediator sharing the same registry, with new instances of the
    /// [per-scope](crate::Lifetime::PerScope) handlers.
    pub fn scoped(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            scope: Arc::new(Scope::new(&self.registry)),
        }
    }

    /// The registry of this mediator.
    pub fn registry(&self) -> &Registry<E> {
        &self.registry
    }
}

impl<E> Mediator<E>
where
    E: From<Error> + Send + 'static,
{
    /// Sends a request to its handler and returns the response.
    ///
    /// If the handler is flagged out-of-band and the configured
    /// [executor](crate::OutOfBandExecutor) intercepts it, the request is enqueued instead and
    /// `()` is returned as soon as the executor accepted it.
    pub async fn send<R: Request>(
        &self,
        request: R,
        cancellation: &CancellationToken,
    ) -> Result<R::Response, E> {
        check_cancellation(R::NAME, cancellation)?;
        let entry = self.entry(TypeId::of::<R>(), R::NAME)?;

        if let Some(executor) = self.registry.intercepting_executor(&entry.handler) {
            log::debug!("Request {} handed to the out-of-band executor", R::NAME);
            executor.enqueue(BoxedRequest::new(request)).await?;
            return Ok(BoxedResponse::new(()).downcast()?);
        }

        let request = RequestRef::new(entry.handler.request(), &request);
        let response = self.dispatch(entry, request, cancellation).await?;
        Ok(response.downcast()?)
    }

    /// Sends a boxed request to its handler, inline, and returns the boxed response.
    ///
    /// This is how deferred workers execute the requests they received from the mediator: the
    /// out-of-band executor is never consulted.
    pub async fn send_boxed(
        &self,
        request: BoxedRequest,
        cancellation: &CancellationToken,
    ) -> Result<BoxedResponse, E> {
        check_cancellation(request.name(), cancellation)?;
        let entry = self.entry(request.descriptor().type_id(), request.name())?;
        self.dispatch(entry, request.as_request_ref(), cancellation)
            .await
    }

    fn entry(&self, type_id: TypeId, name: &'static str) -> Result<&RequestEntry<E>, Error> {
        self.registry
            .request(type_id)
            .ok_or(Error::HandlerNotFound(name))
    }

    async fn dispatch(
        &self,
        entry: &RequestEntry<E>,
        request: RequestRef<'_>,
        cancellation: &CancellationToken,
    ) -> Result<BoxedResponse, E> {
        log::debug!("Dispatching {:?} {}", request.kind(), request.name());

        for processor in &entry.pre_processors {
            check_cancellation(request.name(), cancellation)?;
            processor.process(request, cancellation).await?;
        }

        let handler = self
            .scope
            .request_handler(request.descriptor().type_id())
            .ok_or(Error::HandlerNotFound(request.name()))?;
        let response = Next::new(&entry.behaviors, handler.as_ref(), cancellation)
            .run(request)
            .await?;

        for processor in &entry.post_processors {
            check_cancellation(request.name(), cancellation)?;
            processor.process(request, &response, cancellation).await?;
        }

        log::debug!("Dispatched {:?} {}", request.kind(), request.name());
        Ok(response)
    }

    /// Publishes a notification to all its handlers, sequentially and in registration order.
    ///
    /// Publishing a notification without handlers does nothing. When a handler fails, the
    /// [publish policy](PublishPolicy) decides whether the remaining handlers run; in both cases
    /// the (first) failure is returned.
    pub async fn publish<N: Notification>(
        &self,
        notification: N,
        cancellation: &CancellationToken,
    ) -> Result<(), E> {
        check_cancellation(N::NAME, cancellation)?;

        let handlers = self.scope.notification_handlers(TypeId::of::<N>());
        if handlers.is_empty() {
            log::debug!("No handler for notification {}", N::NAME);
            return Ok(());
        }

        let policy = self.registry.publish_policy();
        let mut first_failure = None;
        for (handler_type, handler) in handlers {
            if let Err(cancelled) = check_cancellation(N::NAME, cancellation) {
                return Err(first_failure.unwrap_or_else(|| cancelled.into()));
            }
            if let Err(error) = handler.get().handle(&notification, cancellation).await {
                match policy {
                    PublishPolicy::FailFast => return Err(error),
                    PublishPolicy::ContinueOnError => {
                        log::error!("Handler {handler_type} failed on notification {}", N::NAME);
                        first_failure.get_or_insert(error);
                    }
                }
            }
        }

        match first_failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl<E> Clone for Mediator<E>
where
    E: 'static,
{
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            scope: self.scope.clone(),
        }
    }
}

fn check_cancellation(name: &'static str, cancellation: &CancellationToken) -> Result<(), Error> {
    if cancellation.is_cancelled() {
        log::warn!("Dispatch of {name} was cancelled");
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}
