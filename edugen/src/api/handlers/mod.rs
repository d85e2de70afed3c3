//! HTTP request handlers.
//!
//! - [`content`]: learning content generation
//! - [`root`]: welcome message
//!
//! Handlers return [`crate::errors::Error`], which converts to a status code and a
//! `{"detail": ...}` JSON body.

pub mod content;
pub mod root;
