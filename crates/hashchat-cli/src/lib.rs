//! Terminal client for hashchat rooms.
//!
//! Reads lines from stdin and prints the room to stdout. See [`runtime`] for
//! the event loop.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod names;
pub mod render;
pub mod runtime;
