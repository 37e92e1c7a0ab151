#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # swarmwait-core
//!
//! Core errors, result combinators and Go-style duration handling shared by
//! the swarmwait crates.

pub mod duration;
pub mod error;
pub mod result;

pub use duration::{format_duration, parse_duration};
pub use error::Error;
pub use result::{GenericResultExt, Result};
