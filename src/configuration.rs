use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};
use std::sync::Arc;

use crate::registry::{
    AnyNotificationHandler, AnyPostProcessor, AnyPreProcessor, AnyRequestHandler, HandlerSource,
    NotificationHandlerRegistration, RequestHandlerRegistration, TypedNotificationHandler,
    TypedPostProcessor, TypedPreProcessor, TypedRequestHandler,
};
use crate::{
    Error, HandlerDescriptor, Notification, NotificationHandler, OutOfBandExecutor,
    PipelineBehavior, PublishPolicy, Request, RequestDescriptor, RequestHandler,
    RequestPostProcessor, RequestPreProcessor,
};

/// How long a handler instance lives.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lifetime {
    /// A single instance, shared by every scope.
    #[default]
    Singleton,
    /// One instance per [Mediator](crate::Mediator) scope, created when the scope is created.
    PerScope,
    /// A new instance for every dispatch.
    PerCall,
}

/// A configuration for a [Mediator](crate::Mediator).
///
/// Registration order matters: pipeline behaviors, pre-processors, post-processors and
/// notification handlers run in the order they were added.
///
/// Implements [Add] and [AddAssign] for composition of multiple configurations, for instance one
/// per [Module].
pub struct Configuration<E>
where
    E: 'static,
{
    pub(crate) request_handlers: Vec<RequestHandlerRegistration<E>>,
    pub(crate) notification_handlers: Vec<NotificationHandlerRegistration<E>>,
    pub(crate) behaviors: Vec<Arc<dyn PipelineBehavior<E>>>,
    pub(crate) pre_processors: Vec<(RequestDescriptor, Arc<dyn AnyPreProcessor<E>>)>,
    pub(crate) post_processors: Vec<(RequestDescriptor, Arc<dyn AnyPostProcessor<E>>)>,
    pub(crate) required_requests: Vec<RequestDescriptor>,
    pub(crate) out_of_band_executor: Option<Arc<dyn OutOfBandExecutor<E>>>,
    pub(crate) publish_policy: Option<PublishPolicy>,
}

impl<E> Configuration<E> {
    /// Creates a new empty [Configuration].
    pub fn new() -> Self {
        Self {
            request_handlers: Default::default(),
            notification_handlers: Default::default(),
            behaviors: Default::default(),
            pre_processors: Default::default(),
            post_processors: Default::default(),
            required_requests: Default::default(),
            out_of_band_executor: None,
            publish_policy: None,
        }
    }

    /// Adds a pipeline behavior, inside the behaviors already added. Takes ownership and returns
    /// the configuration to allow chaining.
    pub fn behavior(mut self, behavior: impl PipelineBehavior<E> + 'static) -> Self {
        self.behaviors.push(Arc::new(behavior));
        self
    }

    /// Declares that a handler must be registered for the request `R`, so that a missing handler
    /// is reported when the mediator is built rather than on first dispatch.
    pub fn require<R: Request>(mut self) -> Self {
        self.required_requests.push(RequestDescriptor::of::<R>());
        self
    }

    /// Sets the executor of out-of-band requests.
    pub fn out_of_band_executor(mut self, executor: impl OutOfBandExecutor<E> + 'static) -> Self {
        self.out_of_band_executor = Some(Arc::new(executor));
        self
    }

    /// Sets what happens when a notification handler fails. Defaults to
    /// [PublishPolicy::FailFast].
    pub fn publish_policy(mut self, policy: PublishPolicy) -> Self {
        self.publish_policy = Some(policy);
        self
    }

    /// Lets a module register its handlers.
    pub fn module(self, module: &dyn Module<E>) -> Self {
        module.configure(self)
    }

    /// Lets each module register its handlers, in order.
    pub fn modules(self, modules: &[&dyn Module<E>]) -> Self {
        modules
            .iter()
            .fold(self, |configuration, module| module.configure(configuration))
    }
}

impl<E> Configuration<E>
where
    E: From<Error> + Send + 'static,
{
    /// Adds a request handler, shared by every scope. Takes ownership and returns the
    /// configuration to allow chaining.
    pub fn request_handler<R, H>(self, handler: H) -> Self
    where
        R: Request,
        H: RequestHandler<R, E> + 'static,
    {
        let descriptor =
            HandlerDescriptor::new::<R, H>(Lifetime::Singleton, handler.out_of_band());
        let handler: Arc<dyn AnyRequestHandler<E>> =
            Arc::new(TypedRequestHandler::<R, H>::new(handler));
        self.push_request_handler(descriptor, HandlerSource::Singleton(handler))
    }

    /// Adds a request handler built by a factory, with the given lifetime.
    ///
    /// The factory is called once at registration to read the out-of-band marker of the handler.
    pub fn request_handler_factory<R, H, F>(self, lifetime: Lifetime, factory: F) -> Self
    where
        R: Request,
        H: RequestHandler<R, E> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        if lifetime == Lifetime::Singleton {
            return self.request_handler::<R, H>(factory());
        }
        let descriptor = HandlerDescriptor::new::<R, H>(lifetime, factory().out_of_band());
        let source = HandlerSource::from_factory(lifetime, move || {
            let handler: Arc<dyn AnyRequestHandler<E>> =
                Arc::new(TypedRequestHandler::<R, H>::new(factory()));
            handler
        });
        self.push_request_handler(descriptor, source)
    }

    fn push_request_handler(
        mut self,
        descriptor: HandlerDescriptor,
        source: HandlerSource<dyn AnyRequestHandler<E>>,
    ) -> Self {
        self.request_handlers
            .push(RequestHandlerRegistration { descriptor, source });
        self
    }

    /// Adds a notification handler, shared by every scope. It runs after the handlers of the same
    /// notification already added.
    pub fn notification_handler<N, H>(self, handler: H) -> Self
    where
        N: Notification,
        H: NotificationHandler<N, E> + 'static,
    {
        let handler: Arc<dyn AnyNotificationHandler<E>> =
            Arc::new(TypedNotificationHandler::<N, H>::new(handler));
        self.push_notification_handler::<N, H>(HandlerSource::Singleton(handler))
    }

    /// Adds a notification handler built by a factory, with the given lifetime.
    pub fn notification_handler_factory<N, H, F>(self, lifetime: Lifetime, factory: F) -> Self
    where
        N: Notification,
        H: NotificationHandler<N, E> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        if lifetime == Lifetime::Singleton {
            return self.notification_handler::<N, H>(factory());
        }
        let source = HandlerSource::from_factory(lifetime, move || {
            let handler: Arc<dyn AnyNotificationHandler<E>> =
                Arc::new(TypedNotificationHandler::<N, H>::new(factory()));
            handler
        });
        self.push_notification_handler::<N, H>(source)
    }

    fn push_notification_handler<N, H>(
        mut self,
        source: HandlerSource<dyn AnyNotificationHandler<E>>,
    ) -> Self
    where
        N: Notification,
    {
        self.notification_handlers
            .push(NotificationHandlerRegistration::new::<N, H>(source));
        self
    }

    /// Adds a pre-processor for the request `R`.
    pub fn pre_processor<R, P>(mut self, processor: P) -> Self
    where
        R: Request,
        P: RequestPreProcessor<R, E> + 'static,
    {
        self.pre_processors.push((
            RequestDescriptor::of::<R>(),
            Arc::new(TypedPreProcessor::<R, P>::new(processor)),
        ));
        self
    }

    /// Adds a post-processor for the request `R`.
    pub fn post_processor<R, P>(mut self, processor: P) -> Self
    where
        R: Request,
        P: RequestPostProcessor<R, E> + 'static,
    {
        self.post_processors.push((
            RequestDescriptor::of::<R>(),
            Arc::new(TypedPostProcessor::<R, P>::new(processor)),
        ));
        self
    }
}

impl<E> Default for Configuration<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Add for Configuration<E> {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl<E> AddAssign for Configuration<E> {
    fn add_assign(&mut self, rhs: Self) {
        self.request_handlers.extend(rhs.request_handlers);
        self.notification_handlers.extend(rhs.notification_handlers);
        self.behaviors.extend(rhs.behaviors);
        self.pre_processors.extend(rhs.pre_processors);
        self.post_processors.extend(rhs.post_processors);
        self.required_requests.extend(rhs.required_requests);
        if rhs.out_of_band_executor.is_some() {
            self.out_of_band_executor = rhs.out_of_band_executor;
        }
        if rhs.publish_policy.is_some() {
            self.publish_policy = rhs.publish_policy;
        }
    }
}

/// A set of handlers registered together.
///
/// Any function taking and returning a [Configuration] is a module.
///
/// # Example
///
/// ```
/// use entremise::{Configuration, Error, Module};
///
/// struct Accounts;
///
/// impl Module<Error> for Accounts {
///     fn configure(&self, configuration: Configuration<Error>) -> Configuration<Error> {
///         configuration
///     }
/// }
///
/// let configuration = Configuration::new().module(&Accounts);
/// ```
pub trait Module<E> {
    /// Registers the handlers of the module.
    fn configure(&self, configuration: Configuration<E>) -> Configuration<E>;
}

impl<E: 'static, F> Module<E> for F
where
    F: Fn(Configuration<E>) -> Configuration<E>,
{
    fn configure(&self, configuration: Configuration<E>) -> Configuration<E> {
        self(configuration)
    }
}
