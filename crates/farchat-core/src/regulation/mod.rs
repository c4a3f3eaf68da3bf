//! Regulation Libraries
//!
//! Citation links into acquisition.gov and static metadata about the
//! regulation libraries FARchat answers from.

pub mod catalog;
pub mod citation;

pub use catalog::{Category, Regulation};
pub use citation::{citation_url, is_known_regulation};
