pub mod client;
pub mod types;

pub use client::*;
pub use types::{Content, Part};
