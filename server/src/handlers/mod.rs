//! Pull and push endpoint logic.

mod pull;
mod push;

pub use pull::*;
pub use push::*;
