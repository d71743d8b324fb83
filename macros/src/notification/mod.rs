pub mod derive_notification;
pub mod notification_handler;
