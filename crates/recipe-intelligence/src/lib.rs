//! Contract-enforcing client for the upstream generative recipe model.
//!
//! Turns free-text queries and photographs into structured recipe and
//! ingredient data, treating the upstream response as untrusted text that
//! must decode strictly into the expected shape or fail loudly.

pub mod client;
pub mod error;
pub mod model;
pub mod retry;

mod prompt;
