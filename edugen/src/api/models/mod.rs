//! API request and response data models.
//!
//! These define the public wire contract and are kept separate from the internal
//! [`crate::content::LearningContent`], whose image path is a local filesystem path.

pub mod content;
