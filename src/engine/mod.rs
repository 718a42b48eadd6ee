//! Workflow engine building blocks
//!
//! Request construction, settlement waits, response validation and the
//! per-run context shared by workflow handlers.

pub mod builder;
pub mod cache;
pub mod context;
pub mod validator;
pub mod wait;

pub use builder::{RequestBuilder, TemplateShape};
pub use cache::{CacheKey, CachedExchange};
pub use context::RunContext;
