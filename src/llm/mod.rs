pub mod classifier;
pub mod client;
pub mod prompts;
pub mod types;

pub use classifier::*;
pub use client::*;
pub use types::*;
