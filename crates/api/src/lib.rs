//! Console-side HTTP plumbing: the authenticated gateway client.

pub mod gateway;

pub use gateway::{DEFAULT_GATEWAY_URL, GATEWAY_BASE_URL_VAR, GatewayClient, GatewayError};
