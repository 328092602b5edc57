//! ws4sql backend access.
//!
//! This module provides:
//! - Wire types for the JSON transaction protocol
//! - A request builder for parameterized queries and statements
//! - The HTTP client that POSTs transactions at a database endpoint

mod client;
mod wire;

pub use client::Ws4sqlClient;
pub use wire::{
    cell_to_string, first_column, ErrorBody, ItemResult, Request, RequestBuilder, RequestItem,
    Response,
};
