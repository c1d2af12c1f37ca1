pub mod activity;
pub mod chat_stream;
pub mod config;
pub mod controller;
pub mod decoder;
pub mod error;
pub mod message;
pub mod models;
pub mod session;
pub mod session_pointer;
pub mod settings;
pub mod store;
pub mod upload;
