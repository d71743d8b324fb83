use proc_macro::TokenStream;

mod notification;
mod request;
pub(crate) mod utils;
mod validation;

#[proc_macro_derive(Command, attributes(entremise, validate))]
pub fn derive_command(command: TokenStream) -> TokenStream {
    request::derive_request::derive_request(command, request::derive_request::RequestKind::Command)
}

#[proc_macro_derive(Query, attributes(entremise, validate))]
pub fn derive_query(query: TokenStream) -> TokenStream {
    request::derive_request::derive_request(query, request::derive_request::RequestKind::Query)
}

#[proc_macro_attribute]
pub fn request_handler(arguments: TokenStream, handler: TokenStream) -> TokenStream {
    request::request_handler::request_handler(arguments, handler)
}

#[proc_macro_derive(Notification, attributes(entremise))]
pub fn derive_notification(notification: TokenStream) -> TokenStream {
    notification::derive_notification::derive_notification(notification)
}

#[proc_macro_attribute]
pub fn notification_handler(arguments: TokenStream, handler: TokenStream) -> TokenStream {
    notification::notification_handler::notification_handler(arguments, handler)
}
