//! Subscription payload decoding and node descriptor parsing.
//!
//! A subscription source serves either a plain newline-separated list of
//! share links or the same list wrapped in base64. [`decode_source`] turns
//! one payload into descriptor strings; [`parse_node`] turns one descriptor
//! into a normalized [`NodeRecord`](submerge_shared::NodeRecord).

mod b64;
pub mod decoder;
pub mod node;
mod uri;
mod vmess;

pub use decoder::{DecodeError, Decoded, decode_payload, decode_source, looks_like_base64};
pub use node::{ParseError, parse_node};
