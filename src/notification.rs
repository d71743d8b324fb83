use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// A notification describes something that happened in the past.
///
/// It is delivered to every registered [notification handler](NotificationHandler), possibly
/// none. Handlers are invoked sequentially, in registration order, with the same notification
/// value.
///
/// # Associated constant
///
/// * [NAME](Self::NAME) - the unique name of the notification
///
/// # Example
///
/// ```
/// pub struct UserRegistered {
///     pub name: String,
/// }
///
/// impl entremise::Notification for UserRegistered {
///     const NAME: &'static str = "user-registered";
/// }
/// ```
pub trait Notification: Send + Sync + 'static {
    /// The name of the notification. Must be unique: building a [Mediator](crate::Mediator)
    /// fails with [Error::DuplicateName](crate::Error::DuplicateName) otherwise.
    const NAME: &'static str;
}

/// Reacts to a published [Notification].
///
/// Any number of handlers may be registered for the same notification. A handler must not rely on
/// other handlers for correctness, but it observes any state they modified through the
/// notification value.
///
/// # Type arguments
///
/// * `N` - the handled notification
/// * `E` - the type of errors returned if the handler fails
#[async_trait]
pub trait NotificationHandler<N, E>: Send + Sync
where
    N: Notification,
{
    /// Handles a notification.
    async fn handle(&self, notification: &N, cancellation: &CancellationToken) -> Result<(), E>;
}

/// What [publish](crate::Mediator::publish) does when a notification handler fails.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishPolicy {
    /// Remaining handlers are not invoked and the failure is returned.
    #[default]
    FailFast,
    /// Remaining handlers are still invoked. Every failure is logged and the first one is
    /// returned once all handlers ran. If the dispatch is cancelled after a handler failed, that
    /// failure is returned rather than [Cancelled](crate::Error::Cancelled).
    ContinueOnError,
}
