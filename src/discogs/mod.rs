//! Discogs API access: rate gate, gated HTTP client, pagination walker,
//! wire types and domain types.

pub mod api_types;
pub mod client;
pub mod gate;
pub mod pages;
pub mod types;
