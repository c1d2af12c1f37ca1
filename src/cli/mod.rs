//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod ask;
pub mod chat;
pub mod commands;
pub mod history;
pub mod model_list;
pub mod settings;
pub mod transcript;
pub mod upload;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::warn;

use crate::api::{HttpBackend, ModelKind};
use crate::cli::ask::run_ask;
use crate::cli::chat::run_chat;
use crate::cli::history::print_history;
use crate::cli::model_list::print_models;
use crate::cli::settings::{run_prompts, run_settings, PromptsAction, SettingsAction};
use crate::cli::transcript::TranscriptPrinter;
use crate::cli::upload::{parse_meta_args, run_upload};
use crate::core::config::data::{path_display, BASE_URL_ENV_VAR};
use crate::core::config::{Config, ConfigKey};
use crate::core::controller::ChatController;
use crate::core::models::ModelTarget;
use crate::core::session_pointer::{FileSessionPointer, MemorySessionPointer, SessionPointerStore};
use crate::utils::logging::init_tracing;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ")"
);

#[derive(Parser)]
#[command(name = "tok")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "A terminal client for a retrieval-augmented chat backend")]
#[command(
    long_about = "Tok talks to a local RAG chat backend: it streams answers, keeps your \
place in stored conversations, switches chat and embedding models, and uploads documents \
to the retrieval index.\n\n\
Environment Variables:\n\
  TOK_BASE_URL      Backend URL (overrides the config file, overridden by --base-url)\n\
  TOK_LOG           Log filter, e.g. 'debug' or 'tok=trace' (defaults to warn)\n\n\
Commands inside the chat:\n\
  /new /history /open /models /model /embed /rag /upload /help /quit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Backend URL, e.g. http://127.0.0.1:5000
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive chat (default)
    Chat {
        /// Answer from uploaded documents
        #[arg(long)]
        rag: bool,
    },
    /// Ask one question and print the streamed answer
    Ask {
        /// Answer from uploaded documents
        #[arg(long)]
        rag: bool,
        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// List stored sessions
    History,
    /// Load a stored session, make it active, and print it
    Open { handle: String },
    /// Start a new chat
    New,
    /// List chat and embedding models
    Models,
    /// Switch model; a name that is not installed is pulled first
    SelectModel {
        name: String,
        /// Switch the embedding model instead of the chat model
        #[arg(long)]
        embed: bool,
    },
    /// Remove a model from the backend
    DeleteModel { name: String },
    /// Add documents to the retrieval index
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Metadata attached to every file in the batch
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },
    /// Show backend settings, or change one with `settings set`
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
    /// List, add, activate or remove backend prompts
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },
    /// Set configuration values (no arguments prints the configuration)
    Set {
        key: Option<String>,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Option<Vec<String>>,
    },
    /// Unset configuration values
    Unset { key: String },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

fn build_controller(
    config: &Config,
    base_url_flag: Option<&str>,
) -> Result<Arc<ChatController>, Box<dyn Error>> {
    let base_url = config.base_url_from_env(base_url_flag);
    let backend = HttpBackend::new(base_url, config.connect_timeout())?;

    let pointer: Arc<dyn SessionPointerStore> = match FileSessionPointer::default_path() {
        Some(path) => Arc::new(FileSessionPointer::new(path)),
        None => {
            warn!("no data directory; the active session will not survive a restart");
            Arc::new(MemorySessionPointer::new())
        }
    };

    Ok(Arc::new(ChatController::new(
        Arc::new(backend),
        pointer,
        config.controller_options(),
    )))
}

fn parse_key(raw: &str) -> ConfigKey {
    match ConfigKey::parse(raw) {
        Some(key) => key,
        None => {
            let known: Vec<&str> = ConfigKey::ALL.iter().map(|key| key.as_str()).collect();
            eprintln!("❌ Unknown config key: {raw}");
            eprintln!("Known keys: {}", known.join(", "));
            std::process::exit(1);
        }
    }
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = Config::load()?;
    let base_url_flag = args.base_url.as_deref();

    match args.command.unwrap_or(Commands::Chat { rag: false }) {
        Commands::Set { key, value } => {
            let value = value.map(|parts| parts.join(" ")).filter(|v| !v.trim().is_empty());
            match (key, value) {
                (Some(key), Some(value)) => {
                    let key = parse_key(&key);
                    if let Err(err) = config.set(key, &value) {
                        eprintln!("❌ {err}");
                        std::process::exit(1);
                    }
                    config.save()?;
                    println!("✅ Set {} to: {}", key.as_str(), value);
                    println!("   Saved in {}", path_display(Config::get_config_path()?));
                }
                _ => config.print_all(&config.base_url_from_env(base_url_flag)),
            }
            Ok(())
        }
        Commands::Unset { key } => {
            let key = parse_key(&key);
            config.unset(key);
            config.save()?;
            println!("✅ Unset {}", key.as_str());
            if key == ConfigKey::BaseUrl && std::env::var_os(BASE_URL_ENV_VAR).is_some() {
                println!("   {BASE_URL_ENV_VAR} is still set and takes precedence");
            }
            Ok(())
        }
        Commands::Chat { rag } => {
            let controller = build_controller(&config, base_url_flag)?;
            run_chat(controller, rag || config.use_query_engine()).await
        }
        Commands::Ask { rag, prompt } => {
            let controller = build_controller(&config, base_url_flag)?;
            if let Err(err) = controller.restore_on_startup().await {
                warn!(%err, "continuing without the last session");
            }
            run_ask(&controller, prompt, rag || config.use_query_engine()).await
        }
        Commands::History => {
            let controller = build_controller(&config, base_url_flag)?;
            let entries = controller.load_history_index().await?;
            print_history(&entries);
            Ok(())
        }
        Commands::Open { handle } => {
            let controller = build_controller(&config, base_url_flag)?;
            let summary = controller.select_session(&handle).await?;
            println!(
                "📖 {} ({} exchanges)",
                summary.title.as_deref().unwrap_or(&summary.handle),
                summary.exchanges
            );
            let mut printer = TranscriptPrinter::new();
            print!("{}", printer.render(&controller.store().snapshot()));
            print!("{}", printer.close());
            Ok(())
        }
        Commands::New => {
            let controller = build_controller(&config, base_url_flag)?;
            controller.start_new_session().await;
            println!("✨ Started a new chat");
            Ok(())
        }
        Commands::Models => {
            let controller = build_controller(&config, base_url_flag)?;
            let catalog = controller.refresh_models().await?;
            print_models(&catalog);
            Ok(())
        }
        Commands::SelectModel { name, embed } => {
            let controller = build_controller(&config, base_url_flag)?;
            let target = if embed {
                ModelTarget::embed(name)
            } else {
                ModelTarget::llm(name)
            };
            controller.switch_model(target.clone()).await;
            if controller.models().selected(target.kind) == Some(target.name.as_str()) {
                println!("✅ Now using {} for {}", target.name, target.kind.as_str());
                Ok(())
            } else {
                eprintln!("❌ Could not switch to {}", target.name);
                std::process::exit(1);
            }
        }
        Commands::DeleteModel { name } => {
            let controller = build_controller(&config, base_url_flag)?;
            controller.delete_model(&name).await;
            let catalog = controller.models();
            if catalog.contains(ModelKind::Llm, &name) || catalog.contains(ModelKind::Embed, &name)
            {
                eprintln!("❌ {name} is still installed");
                std::process::exit(1);
            }
            println!("🗑️  Deleted {name}");
            Ok(())
        }
        Commands::Upload { paths, meta } => {
            let metadata = match parse_meta_args(&meta) {
                Ok(metadata) => metadata,
                Err(message) => {
                    eprintln!("❌ {message}");
                    std::process::exit(1);
                }
            };
            let controller = build_controller(&config, base_url_flag)?;
            if !run_upload(&controller, &paths, metadata).await {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Settings { action } => {
            let controller = build_controller(&config, base_url_flag)?;
            run_settings(&controller, action).await
        }
        Commands::Prompts { action } => {
            let controller = build_controller(&config, base_url_flag)?;
            run_prompts(&controller, action).await
        }
    }
}
