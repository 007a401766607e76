//! Livia — streaming chat session client for the Livia astronomy assistant.
//!
//! Manages one bounded conversation with an OpenAI-compatible chat-completion
//! endpoint: history trimmed to a character budget, buffered and streaming
//! replies, a lazily fetched bearer credential shared by concurrent callers,
//! and a transcript in which failed exchanges can be retried.
//!
//! # Quick Start
//!
//! ```no_run
//! use futures::StreamExt;
//! use livia::prelude::*;
//!
//! # async fn example() -> livia::error::Result<()> {
//! let config = ChatConfig::load(None)?;
//! let session = ChatSession::from_config(&config)?;
//!
//! let mut stream = session.send_streaming("Why is Mars red?").await?;
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credential;
pub mod error;
pub mod history;
pub mod prelude;
pub mod provider;
pub mod session;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;
