pub(crate) mod api;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod observability;
pub mod routing;
pub mod secrets;
pub mod services;
pub mod state;
pub mod stream;
pub mod transport;

pub use client::{ChatMessage, ChatOptions, InferenceClient, Invocation};
pub use error::GatewayError;
pub use transport::{ExtraParameters, InvocationRequest, Payload};
