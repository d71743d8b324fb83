pub mod derive_request;
pub mod request_handler;
