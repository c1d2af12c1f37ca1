//! Tok is a terminal client for a retrieval-augmented chat backend.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation state: the message store, reply stream
//!   ingestion, session loading, model switching, and document uploads, all
//!   coordinated by [`core::controller::ChatController`].
//! - [`api`] defines the backend payloads and the [`api::Backend`] trait with
//!   its HTTP implementation.
//! - [`cli`] parses arguments and runs the interactive chat loop and the
//!   one-shot subcommands.
//! - [`utils`] holds URL helpers and logging setup.
//!
//! The binary (`src/main.rs`) routes straight into [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
