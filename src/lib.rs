//! # Entremise \ɑ̃.tʁə.miz\
//!
//! Entremise is a Rust lightweight library to dispatch messages within a process, following the
//! mediator pattern.
//!
//! ## Concepts
//!
//! Three kinds of messages are dispatched:
//!
//! * a [command](Command) asks to modify the system, and is handled by exactly one
//!   [handler](RequestHandler), which may produce a response
//! * a [query](Query) asks to read the system, and is handled by exactly one handler, which
//!   produces a response
//! * a [notification](Notification) describes something that happened, and is delivered to any
//!   number of [handlers](NotificationHandler)
//!
//! Commands and queries are both [requests](Request).
//!
//! ## Mediator
//!
//! The [Mediator] is the entry point. It is built from a [Configuration] listing the handlers
//! and is then read-only. A configuration where a request has no handler, or more than one, is
//! rejected when the mediator is built.
//!
//! [send](Mediator::send) dispatches a request through an ordered chain of
//! [pipeline behaviors](PipelineBehavior), surrounded by the
//! [pre-processors](RequestPreProcessor) and [post-processors](RequestPostProcessor) of the
//! request type. [publish](Mediator::publish) delivers a notification to all its handlers, in
//! registration order.
//!
//! Every dispatch takes a [CancellationToken]. Once it fires, the remaining stages are skipped
//! and the dispatch fails with [Error::Cancelled].
//!
//! ## Validation
//!
//! The [ValidationBehavior] rejects invalid requests with [Error::RequestValidation] before
//! their handler runs. See the [validation] module.
//!
//! ## Out-of-band handlers
//!
//! A request handler may be flagged as [out-of-band](RequestHandler::out_of_band). If an
//! [OutOfBandExecutor] is configured, it can take over the requests of those handlers to execute
//! them later, for instance from a queue.
//!
//! ## Errors
//!
//! The mediator is generic over the error type of the handlers, which must implement
//! `From<entremise::Error>`. Handler errors are returned unchanged.
//!
//! ## Features
//!
//! The `derive` feature, which is enabled by default, provides derive macros for [Command],
//! [Query] and [Notification], with field attributes for validation, as well as attribute macros
//! to easily create [request handlers](RequestHandler) and
//! [notification handlers](NotificationHandler).

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(__docs, feature(doc_auto_cfg))]

extern crate self as entremise;

mod configuration;
mod error;
mod mediator;
mod notification;
mod out_of_band;
mod pipeline;
mod registry;
mod request;
pub mod validation;

pub use configuration::{Configuration, Lifetime, Module};
pub use error::Error;
pub use mediator::Mediator;
pub use notification::{Notification, NotificationHandler, PublishPolicy};
pub use out_of_band::OutOfBandExecutor;
pub use pipeline::{Next, PipelineBehavior, RequestPostProcessor, RequestPreProcessor};
pub use registry::{HandlerDescriptor, Registry};
pub use request::{
    BoxedRequest, BoxedResponse, Command, Query, Request, RequestDescriptor, RequestHandler,
    RequestKind, RequestRef,
};
pub use validation::{ValidationBehavior, ValidationErrors, Validator};

#[cfg(feature = "derive")]
pub use entremise_macros::{notification_handler, request_handler, Command, Notification, Query};

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
