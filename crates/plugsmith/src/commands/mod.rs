//! CLI command implementations

pub mod discover;
pub mod download;
pub mod fetch;
pub mod image;
pub mod latest;
pub mod package;
pub mod release;
pub mod restore;
