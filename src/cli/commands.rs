//! Slash commands understood by the interactive chat loop.

use std::path::PathBuf;

use crate::api::MetadataPair;
use crate::core::upload::parse_metadata_pair;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    New,
    History,
    Open(String),
    Models,
    Model(String),
    Embed(String),
    Rag,
    Upload {
        paths: Vec<PathBuf>,
        metadata: Vec<MetadataPair>,
    },
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  /new                         Start a new chat
  /history                     List stored sessions
  /open <number|handle>        Load a stored session
  /models                      List chat and embedding models
  /model <name>                Switch the chat model (pulled if missing)
  /embed <name>                Switch the embedding model
  /rag                         Toggle answering from uploaded documents
  /upload <path>... [k=v]...   Add documents to the index
  /help                        Show this help
  /quit                        Exit";

/// `Ok(None)` means the line is not a command and should be sent as a query.
pub fn parse(line: &str) -> Result<Option<SlashCommand>, String> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(None);
    };
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    let required = |usage: &str| {
        if args.is_empty() {
            Err(format!("Usage: {usage}"))
        } else {
            Ok(args.to_string())
        }
    };

    let command = match name {
        "new" => SlashCommand::New,
        "history" => SlashCommand::History,
        "open" => SlashCommand::Open(required("/open <number|handle>")?),
        "models" => SlashCommand::Models,
        "model" => SlashCommand::Model(required("/model <name>")?),
        "embed" => SlashCommand::Embed(required("/embed <name>")?),
        "rag" => SlashCommand::Rag,
        "upload" => parse_upload(args)?,
        "help" | "?" => SlashCommand::Help,
        "quit" | "exit" | "q" => SlashCommand::Quit,
        other => return Err(format!("Unknown command: /{other} (try /help)")),
    };
    Ok(Some(command))
}

fn parse_upload(args: &str) -> Result<SlashCommand, String> {
    let mut paths = Vec::new();
    let mut metadata = Vec::new();
    for word in args.split_whitespace() {
        match parse_metadata_pair(word) {
            Some(pair) => metadata.push(pair),
            None => paths.push(PathBuf::from(word)),
        }
    }
    if paths.is_empty() {
        return Err("Usage: /upload <path>... [key=value]...".to_string());
    }
    Ok(SlashCommand::Upload { paths, metadata })
}
