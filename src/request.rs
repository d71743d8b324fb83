use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::{type_name, Any, TypeId};
use std::fmt::{Debug, Formatter};
use tokio_util::sync::CancellationToken;

use crate::{Error, ValidationErrors};

/// Distinguishes the two kinds of [requests](Request).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    /// A request that modifies the state of the system.
    Command,
    /// A request that reads the state of the system without modifying it.
    Query,
}

/// A message dispatched to exactly one [handler](RequestHandler), which produces a response.
///
/// Do not implement this trait directly: implement [Command] or [Query] through their derive
/// macros, or implement both traits by hand.
///
/// # Associated type and constants
///
/// * [Response](Self::Response) - the value produced by the handler, `()` for commands without
///   response
/// * [NAME](Self::NAME) - the unique name of the request
/// * [KIND](Self::KIND) - whether the request is a command or a query
pub trait Request: Send + Sync + 'static {
    /// The type of the value produced by the handler.
    type Response: Send + Sync + 'static;

    /// The name of the request. Must be unique: building a [Mediator](crate::Mediator) fails
    /// with [Error::DuplicateName] otherwise.
    const NAME: &'static str;

    /// The kind of the request.
    const KIND: RequestKind;

    /// Checks the structure of the request. Returns an empty [ValidationErrors] if the request is
    /// valid, which is the default.
    ///
    /// The derive macros generate this method from `#[validate(...)]` field attributes.
    fn validate(&self) -> ValidationErrors {
        ValidationErrors::new()
    }
}

/// A request to modify the system.
///
/// A corresponding [request handler](RequestHandler) must be registered.
///
/// # Example
///
/// ```
/// #[derive(Debug)]
/// pub struct AddSomething(pub i32);
///
/// impl entremise::Request for AddSomething {
///     type Response = i32;
///     const NAME: &'static str = "add-something";
///     const KIND: entremise::RequestKind = entremise::RequestKind::Command;
/// }
///
/// impl entremise::Command for AddSomething {}
/// ```
pub trait Command: Request {}

/// A request to read the state of the system. Handling a query must not have side effects.
///
/// A corresponding [request handler](RequestHandler) must be registered.
pub trait Query: Request {}

/// Static description of a [Request] type.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct RequestDescriptor {
    type_id: TypeId,
    name: &'static str,
    kind: RequestKind,
    response_type: &'static str,
    returns_unit: bool,
}

impl RequestDescriptor {
    /// Describes the request type `R`.
    pub fn of<R: Request>() -> Self {
        Self {
            type_id: TypeId::of::<R>(),
            name: R::NAME,
            kind: R::KIND,
            response_type: type_name::<R::Response>(),
            returns_unit: TypeId::of::<R::Response>() == TypeId::of::<()>(),
        }
    }

    /// The [TypeId] of the request.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The name of the request.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The kind of the request.
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// The type name of the response.
    pub fn response_type(&self) -> &'static str {
        self.response_type
    }

    /// Whether the response is `()`.
    pub fn returns_unit(&self) -> bool {
        self.returns_unit
    }
}

trait AnyRequest: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    fn validate(&self) -> ValidationErrors;
}

impl<R: Request> AnyRequest for R {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn validate(&self) -> ValidationErrors {
        Request::validate(self)
    }
}

/// A request that has been boxed to be dispatched later, typically by an
/// [out-of-band executor](crate::OutOfBandExecutor).
///
/// Can be created from any [Request].
pub struct BoxedRequest {
    descriptor: RequestDescriptor,
    request: Box<dyn AnyRequest>,
}

impl BoxedRequest {
    /// Boxes a request.
    pub fn new<R: Request>(request: R) -> Self {
        Self {
            descriptor: RequestDescriptor::of::<R>(),
            request: Box::new(request),
        }
    }

    /// Returns the descriptor of the boxed request.
    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    /// Returns the name of the boxed request.
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// Borrows the boxed request as a [RequestRef].
    pub fn as_request_ref(&self) -> RequestRef<'_> {
        RequestRef {
            descriptor: &self.descriptor,
            request: self.request.as_ref(),
        }
    }

    /// Tries to downcast the boxed request to a concrete [Request] implementation.
    pub fn downcast<R: Request>(self) -> Result<R, Error> {
        self.request
            .into_any()
            .downcast()
            .map(|request| *request)
            .map_err(|_| Error::RequestDowncast(type_name::<R>()))
    }
}

impl Debug for BoxedRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxedRequest")
            .field("name", &self.descriptor.name)
            .field("kind", &self.descriptor.kind)
            .finish()
    }
}

impl<R: Request> From<R> for BoxedRequest {
    fn from(request: R) -> Self {
        BoxedRequest::new(request)
    }
}

/// A borrowed, type-erased view of the request being dispatched.
///
/// This is what [pipeline behaviors](crate::PipelineBehavior) and
/// [validators](crate::Validator) see, since they apply to every request type.
#[derive(Clone, Copy)]
pub struct RequestRef<'a> {
    descriptor: &'a RequestDescriptor,
    request: &'a dyn AnyRequest,
}

impl<'a> RequestRef<'a> {
    pub(crate) fn new<R: Request>(descriptor: &'a RequestDescriptor, request: &'a R) -> Self {
        Self {
            descriptor,
            request,
        }
    }

    /// The descriptor of the request.
    pub fn descriptor(&self) -> &'a RequestDescriptor {
        self.descriptor
    }

    /// The name of the request.
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// The kind of the request.
    pub fn kind(&self) -> RequestKind {
        self.descriptor.kind
    }

    /// Tries to downcast to a concrete [Request] implementation.
    pub fn downcast_ref<R: Request>(&self) -> Option<&'a R> {
        self.request.as_any().downcast_ref()
    }

    /// Runs the validation rules declared by the request type.
    pub fn validate(&self) -> ValidationErrors {
        self.request.validate()
    }
}

impl Debug for RequestRef<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRef")
            .field("name", &self.descriptor.name)
            .field("kind", &self.descriptor.kind)
            .finish()
    }
}

/// A response that has been boxed to travel through the [pipeline](crate::PipelineBehavior).
pub struct BoxedResponse(Box<dyn Any + Send + Sync>);

impl BoxedResponse {
    /// Boxes a response.
    pub fn new<T: Send + Sync + 'static>(response: T) -> Self {
        Self(Box::new(response))
    }

    /// Returns `true` if the boxed value is a `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.0.is::<T>()
    }

    /// Borrows the boxed value as a `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Mutably borrows the boxed value as a `T`, to transform it in place.
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.0.downcast_mut()
    }

    /// Tries to unbox the value as a `T`.
    pub fn downcast<T: 'static>(self) -> Result<T, Error> {
        self.0
            .downcast()
            .map(|response| *response)
            .map_err(|_| Error::ResponseDowncast(type_name::<T>()))
    }
}

impl Debug for BoxedResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("BoxedResponse")
    }
}

/// Handles a [Request] and produces its response.
///
/// Exactly one handler must be registered for each request type.
///
/// # Type arguments
///
/// * `R` - the handled request
/// * `E` - the type of errors returned if the handler fails
#[async_trait]
pub trait RequestHandler<R, E>: Send + Sync
where
    R: Request,
{
    /// Whether the request may be executed by a deferred worker instead of inline. Read once when
    /// the handler is registered.
    fn out_of_band(&self) -> bool {
        false
    }

    /// Handles a request. Long running handlers should observe the cancellation token.
    async fn handle(
        &self,
        request: &R,
        cancellation: &CancellationToken,
    ) -> Result<R::Response, E>;
}
