//! Core types for Livia.

pub mod message;
pub mod stream;
pub mod transcript;

pub use message::*;
pub use stream::*;
pub use transcript::*;
