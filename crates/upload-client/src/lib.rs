//! HTTP client for the DiTing chunked upload API.
//!
//! Thin async wrapper over `reqwest`: one method per endpoint, multipart
//! request bodies, JSON responses decoded into [`diting_protocol`] types.

pub mod client;

pub use client::{Client, Error};
