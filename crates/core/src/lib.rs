pub mod auth;
pub mod context;
pub mod errors;

pub use auth::{
    create_authenticator, AllowAllAuthenticator, AuthorizeResult, Authenticator, MqttQoS,
    StaticAuthenticator, SubscribeOutcome, SubscriptionRequest,
};
pub use context::Context;
pub use errors::*;
