//! HTTP layer for the payment platform
//!
//! Transport client, token acquisition and the payment API calls.

pub mod client;
pub mod payment;
pub mod token;

pub use client::HttpClient;
pub use payment::{ApiCall, ApiResponse, PaymentApi, PaymentClient};
pub use token::{BearerToken, OAuthTokenClient, TokenSource};
