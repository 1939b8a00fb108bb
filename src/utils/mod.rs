//! Shared helpers: request validation and text input.

pub mod io;
pub mod validation;
