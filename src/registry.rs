use async_trait::async_trait;
use std::any::{type_name, Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::{
    BoxedResponse, Configuration, Error, Lifetime, Notification, NotificationHandler,
    OutOfBandExecutor, PipelineBehavior, PublishPolicy, Request, RequestDescriptor,
    RequestHandler, RequestPostProcessor, RequestPreProcessor, RequestRef,
};

/// Static description of a registered [RequestHandler].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct HandlerDescriptor {
    request: RequestDescriptor,
    handler_type: &'static str,
    lifetime: Lifetime,
    out_of_band: bool,
}

impl HandlerDescriptor {
    pub(crate) fn new<R: Request, H>(lifetime: Lifetime, out_of_band: bool) -> Self {
        Self {
            request: RequestDescriptor::of::<R>(),
            handler_type: type_name::<H>(),
            lifetime,
            out_of_band,
        }
    }

    /// The handled request.
    pub fn request(&self) -> &RequestDescriptor {
        &self.request
    }

    /// The type name of the handler.
    pub fn handler_type(&self) -> &'static str {
        self.handler_type
    }

    /// The lifetime of the handler instances.
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Whether the handler is flagged as out-of-band.
    pub fn is_out_of_band(&self) -> bool {
        self.out_of_band
    }
}

/// The verified handlers, pipelines and processors of a [Mediator](crate::Mediator).
///
/// A registry is built once from a [Configuration] and is read-only afterward. Building it checks
/// that:
///
/// * every request that has a handler, a processor, or was [required](Configuration::require),
///   has exactly one handler
/// * every out-of-band handler handles a request whose response is `()`
/// * no two request or notification types share a name
pub struct Registry<E>
where
    E: 'static,
{
    requests: HashMap<TypeId, RequestEntry<E>>,
    notifications: HashMap<TypeId, Vec<NotificationHandlerRegistration<E>>>,
    out_of_band_executor: Option<Arc<dyn OutOfBandExecutor<E>>>,
    publish_policy: PublishPolicy,
}

pub(crate) struct RequestEntry<E>
where
    E: 'static,
{
    pub(crate) handler: HandlerDescriptor,
    source: HandlerSource<dyn AnyRequestHandler<E>>,
    pub(crate) behaviors: Vec<Arc<dyn PipelineBehavior<E>>>,
    pub(crate) pre_processors: Vec<Arc<dyn AnyPreProcessor<E>>>,
    pub(crate) post_processors: Vec<Arc<dyn AnyPostProcessor<E>>>,
}

impl<E> Registry<E> {
    pub(crate) fn build(configuration: Configuration<E>) -> Result<Self, Error> {
        let Configuration {
            request_handlers,
            notification_handlers,
            behaviors,
            pre_processors,
            post_processors,
            required_requests,
            out_of_band_executor,
            publish_policy,
        } = configuration;

        let mut registrations: HashMap<TypeId, Vec<RequestHandlerRegistration<E>>> =
            HashMap::new();
        for registration in request_handlers {
            registrations
                .entry(registration.descriptor.request.type_id())
                .or_default()
                .push(registration);
        }

        let expected_requests = required_requests
            .iter()
            .chain(pre_processors.iter().map(|(request, _)| request))
            .chain(post_processors.iter().map(|(request, _)| request))
            .collect::<Vec<_>>();
        let notification_names = notification_handlers
            .iter()
            .map(|registration| (registration.notification_name, registration.notification));
        verify(&registrations, &expected_requests, notification_names)?;

        let requests = registrations
            .into_iter()
            .filter_map(|(type_id, mut handlers)| {
                let RequestHandlerRegistration { descriptor, source } = handlers.pop()?;
                let entry = RequestEntry {
                    handler: descriptor,
                    source,
                    behaviors: behaviors
                        .iter()
                        .filter(|behavior| behavior.applies_to(&descriptor.request))
                        .cloned()
                        .collect(),
                    pre_processors: pre_processors
                        .iter()
                        .filter(|(request, _)| request.type_id() == type_id)
                        .map(|(_, processor)| processor.clone())
                        .collect(),
                    post_processors: post_processors
                        .iter()
                        .filter(|(request, _)| request.type_id() == type_id)
                        .map(|(_, processor)| processor.clone())
                        .collect(),
                };
                Some((type_id, entry))
            })
            .collect();

        let mut notifications: HashMap<TypeId, Vec<NotificationHandlerRegistration<E>>> =
            HashMap::new();
        for registration in notification_handlers {
            notifications
                .entry(registration.notification)
                .or_default()
                .push(registration);
        }

        Ok(Self {
            requests,
            notifications,
            out_of_band_executor,
            publish_policy: publish_policy.unwrap_or_default(),
        })
    }

    pub(crate) fn request(&self, type_id: TypeId) -> Option<&RequestEntry<E>> {
        self.requests.get(&type_id)
    }

    pub(crate) fn intercepting_executor(
        &self,
        handler: &HandlerDescriptor,
    ) -> Option<&dyn OutOfBandExecutor<E>> {
        if !handler.out_of_band {
            return None;
        }
        self.out_of_band_executor
            .as_deref()
            .filter(|executor| executor.intercepts(handler))
    }

    /// The handler of the request `R`, if any.
    pub fn handler<R: Request>(&self) -> Option<&HandlerDescriptor> {
        self.requests
            .get(&TypeId::of::<R>())
            .map(|entry| &entry.handler)
    }

    /// All the request handlers, ordered by request name.
    pub fn handlers(&self) -> Vec<&HandlerDescriptor> {
        let mut handlers: Vec<_> = self.requests.values().map(|entry| &entry.handler).collect();
        handlers.sort_by_key(|handler| handler.request.name());
        handlers
    }

    /// The request handlers flagged as out-of-band, ordered by request name.
    pub fn out_of_band_handlers(&self) -> Vec<&HandlerDescriptor> {
        self.handlers()
            .into_iter()
            .filter(|handler| handler.out_of_band)
            .collect()
    }

    /// The number of pipeline behaviors wrapped around the handler of the request `R`, if it has
    /// a handler.
    pub fn behavior_count<R: Request>(&self) -> Option<usize> {
        self.requests
            .get(&TypeId::of::<R>())
            .map(|entry| entry.behaviors.len())
    }

    /// The type names of the handlers of the notification `N`, in invocation order.
    pub fn notification_handlers<N: Notification>(&self) -> Vec<&'static str> {
        self.notifications
            .get(&TypeId::of::<N>())
            .map(|handlers| {
                handlers
                    .iter()
                    .map(|registration| registration.handler_type)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The failure policy of [publish](crate::Mediator::publish).
    pub fn publish_policy(&self) -> PublishPolicy {
        self.publish_policy
    }
}

fn verify<E>(
    registrations: &HashMap<TypeId, Vec<RequestHandlerRegistration<E>>>,
    expected_requests: &[&RequestDescriptor],
    notification_names: impl Iterator<Item = (&'static str, TypeId)>,
) -> Result<(), Error> {
    let mut problems = Vec::new();

    let mut names: HashMap<&'static str, HashSet<TypeId>> = HashMap::new();
    let request_names = registrations
        .values()
        .map(|handlers| &handlers[0].descriptor.request)
        .chain(expected_requests.iter().copied())
        .map(|request| (request.name(), request.type_id()));
    for (name, type_id) in request_names.chain(notification_names) {
        names.entry(name).or_default().insert(type_id);
    }
    for (name, types) in &names {
        if types.len() > 1 {
            problems.push((*name, Error::DuplicateName(*name)));
        }
    }

    let mut reported = HashSet::new();
    for &request in expected_requests {
        if !registrations.contains_key(&request.type_id()) && reported.insert(request.type_id()) {
            problems.push((request.name(), Error::HandlerNotFound(request.name())));
        }
    }

    for handlers in registrations.values() {
        let request = handlers[0].descriptor.request;
        if handlers.len() > 1 {
            problems.push((
                request.name(),
                Error::AmbiguousHandler {
                    request: request.name(),
                    count: handlers.len(),
                },
            ));
        } else if handlers[0].descriptor.out_of_band && !request.returns_unit() {
            problems.push((request.name(), Error::OutOfBandResponse(request.name())));
        }
    }

    problems.sort_by_key(|(name, _)| *name);
    for (_, problem) in &problems {
        log::error!("Invalid mediator configuration: {problem}");
    }
    match problems.into_iter().next() {
        Some((_, problem)) => Err(problem),
        None => Ok(()),
    }
}

/// The handlers resolved for one [Mediator](crate::Mediator) scope.
pub(crate) struct Scope<E>
where
    E: 'static,
{
    request_handlers: HashMap<TypeId, ResolvedHandler<dyn AnyRequestHandler<E>>>,
    notification_handlers:
        HashMap<TypeId, Vec<(&'static str, ResolvedHandler<dyn AnyNotificationHandler<E>>)>>,
}

impl<E> Scope<E> {
    pub(crate) fn new(registry: &Registry<E>) -> Self {
        Self {
            request_handlers: registry
                .requests
                .iter()
                .map(|(type_id, entry)| (*type_id, entry.source.resolve()))
                .collect(),
            notification_handlers: registry
                .notifications
                .iter()
                .map(|(type_id, handlers)| {
                    let handlers = handlers
                        .iter()
                        .map(|registration| {
                            (registration.handler_type, registration.source.resolve())
                        })
                        .collect();
                    (*type_id, handlers)
                })
                .collect(),
        }
    }

    pub(crate) fn request_handler(
        &self,
        type_id: TypeId,
    ) -> Option<Arc<dyn AnyRequestHandler<E>>> {
        self.request_handlers.get(&type_id).map(ResolvedHandler::get)
    }

    pub(crate) fn notification_handlers(
        &self,
        type_id: TypeId,
    ) -> &[(&'static str, ResolvedHandler<dyn AnyNotificationHandler<E>>)] {
        self.notification_handlers
            .get(&type_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

type Factory<H> = Arc<dyn Fn() -> Arc<H> + Send + Sync>;

/// Where the instances of a handler come from.
pub(crate) enum HandlerSource<H: ?Sized> {
    Singleton(Arc<H>),
    PerScope(Factory<H>),
    PerCall(Factory<H>),
}

impl<H: ?Sized> HandlerSource<H> {
    pub(crate) fn from_factory<F>(lifetime: Lifetime, factory: F) -> Self
    where
        F: Fn() -> Arc<H> + Send + Sync + 'static,
    {
        match lifetime {
            Lifetime::Singleton => HandlerSource::Singleton(factory()),
            Lifetime::PerScope => HandlerSource::PerScope(Arc::new(factory)),
            Lifetime::PerCall => HandlerSource::PerCall(Arc::new(factory)),
        }
    }

    fn resolve(&self) -> ResolvedHandler<H> {
        match self {
            HandlerSource::Singleton(handler) => ResolvedHandler::Ready(handler.clone()),
            HandlerSource::PerScope(factory) => ResolvedHandler::Ready(factory()),
            HandlerSource::PerCall(factory) => ResolvedHandler::PerCall(factory.clone()),
        }
    }
}

pub(crate) enum ResolvedHandler<H: ?Sized> {
    Ready(Arc<H>),
    PerCall(Factory<H>),
}

impl<H: ?Sized> ResolvedHandler<H> {
    pub(crate) fn get(&self) -> Arc<H> {
        match self {
            ResolvedHandler::Ready(handler) => handler.clone(),
            ResolvedHandler::PerCall(factory) => factory(),
        }
    }
}

pub(crate) struct RequestHandlerRegistration<E>
where
    E: 'static,
{
    pub(crate) descriptor: HandlerDescriptor,
    pub(crate) source: HandlerSource<dyn AnyRequestHandler<E>>,
}

pub(crate) struct NotificationHandlerRegistration<E>
where
    E: 'static,
{
    notification: TypeId,
    notification_name: &'static str,
    pub(crate) handler_type: &'static str,
    source: HandlerSource<dyn AnyNotificationHandler<E>>,
}

impl<E> NotificationHandlerRegistration<E> {
    pub(crate) fn new<N: Notification, H>(
        source: HandlerSource<dyn AnyNotificationHandler<E>>,
    ) -> Self {
        Self {
            notification: TypeId::of::<N>(),
            notification_name: N::NAME,
            handler_type: type_name::<H>(),
            source,
        }
    }
}

#[async_trait]
pub(crate) trait AnyRequestHandler<E>: Send + Sync {
    async fn handle(
        &self,
        request: RequestRef<'_>,
        cancellation: &CancellationToken,
    ) -> Result<BoxedResponse, E>;
}

pub(crate) struct TypedRequestHandler<R, H> {
    handler: H,
    request: PhantomData<fn(&R)>,
}

impl<R, H> TypedRequestHandler<R, H> {
    pub(crate) fn new(handler: H) -> Self {
        Self {
            handler,
            request: PhantomData,
        }
    }
}

#[async_trait]
impl<R, H, E> AnyRequestHandler<E> for TypedRequestHandler<R, H>
where
    R: Request,
    H: RequestHandler<R, E>,
    E: From<Error> + Send + 'static,
{
    async fn handle(
        &self,
        request: RequestRef<'_>,
        cancellation: &CancellationToken,
    ) -> Result<BoxedResponse, E> {
        let request = request
            .downcast_ref::<R>()
            .ok_or(Error::RequestDowncast(type_name::<R>()))?;
        let response = self.handler.handle(request, cancellation).await?;
        Ok(BoxedResponse::new(response))
    }
}

#[async_trait]
pub(crate) trait AnyNotificationHandler<E>: Send + Sync {
    async fn handle(
        &self,
        notification: &(dyn Any + Send + Sync),
        cancellation: &CancellationToken,
    ) -> Result<(), E>;
}

pub(crate) struct TypedNotificationHandler<N, H> {
    handler: H,
    notification: PhantomData<fn(&N)>,
}

impl<N, H> TypedNotificationHandler<N, H> {
    pub(crate) fn new(handler: H) -> Self {
        Self {
            handler,
            notification: PhantomData,
        }
    }
}

#[async_trait]
impl<N, H, E> AnyNotificationHandler<E> for TypedNotificationHandler<N, H>
where
    N: Notification,
    H: NotificationHandler<N, E>,
    E: From<Error> + Send + 'static,
{
    async fn handle(
        &self,
        notification: &(dyn Any + Send + Sync),
        cancellation: &CancellationToken,
    ) -> Result<(), E> {
        let notification = notification
            .downcast_ref::<N>()
            .ok_or(Error::NotificationDowncast(type_name::<N>()))?;
        self.handler.handle(notification, cancellation).await
    }
}

#[async_trait]
pub(crate) trait AnyPreProcessor<E>: Send + Sync {
    async fn process(
        &self,
        request: RequestRef<'_>,
        cancellation: &CancellationToken,
    ) -> Result<(), E>;
}

pub(crate) struct TypedPreProcessor<R, P> {
    processor: P,
    request: PhantomData<fn(&R)>,
}

impl<R, P> TypedPreProcessor<R, P> {
    pub(crate) fn new(processor: P) -> Self {
        Self {
            processor,
            request: PhantomData,
        }
    }
}

#[async_trait]
impl<R, P, E> AnyPreProcessor<E> for TypedPreProcessor<R, P>
where
    R: Request,
    P: RequestPreProcessor<R, E>,
    E: From<Error> + Send + 'static,
{
    async fn process(
        &self,
        request: RequestRef<'_>,
        cancellation: &CancellationToken,
    ) -> Result<(), E> {
        let request = request
            .downcast_ref::<R>()
            .ok_or(Error::RequestDowncast(type_name::<R>()))?;
        self.processor.process(request, cancellation).await
    }
}

#[async_trait]
pub(crate) trait AnyPostProcessor<E>: Send + Sync {
    async fn process(
        &self,
        request: RequestRef<'_>,
        response: &BoxedResponse,
        cancellation: &CancellationToken,
    ) -> Result<(), E>;
}

pub(crate) struct TypedPostProcessor<R, P> {
    processor: P,
    request: PhantomData<fn(&R)>,
}

impl<R, P> TypedPostProcessor<R, P> {
    pub(crate) fn new(processor: P) -> Self {
        Self {
            processor,
            request: PhantomData,
        }
    }
}

#[async_trait]
impl<R, P, E> AnyPostProcessor<E> for TypedPostProcessor<R, P>
where
    R: Request,
    P: RequestPostProcessor<R, E>,
    E: From<Error> + Send + 'static,
{
    async fn process(
        &self,
        request: RequestRef<'_>,
        response: &BoxedResponse,
        cancellation: &CancellationToken,
    ) -> Result<(), E> {
        let request = request
            .downcast_ref::<R>()
            .ok_or(Error::RequestDowncast(type_name::<R>()))?;
        let response = response
            .downcast_ref::<R::Response>()
            .ok_or(Error::ResponseDowncast(type_name::<R::Response>()))?;
        self.processor.process(request, response, cancellation).await
    }
}
