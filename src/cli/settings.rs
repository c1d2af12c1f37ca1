//! Backend settings and prompt library commands.

use std::error::Error;

use clap::{Args as ClapArgs, Subcommand};

use crate::api::{settings_complete, Prompt, PromptKind};
use crate::core::controller::ChatController;
use crate::core::settings::{parse_setting_value, PromptBook};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Change one backend setting, e.g. `settings set chunk_size 512`
    Set {
        key: String,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
}

/// Which prompt family a prompt command works on.
#[derive(ClapArgs, Clone, Copy)]
pub struct FamilyArg {
    /// Use the retrieval chat-engine prompts instead of the plain model prompts
    #[arg(long)]
    pub chat: bool,
}

impl FamilyArg {
    pub fn kind(self) -> PromptKind {
        if self.chat {
            PromptKind::Chat
        } else {
            PromptKind::Llm
        }
    }
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// Add a prompt, or replace the text of the one with the same label
    Save {
        label: String,
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
        #[command(flatten)]
        family: FamilyArg,
        /// Make it the active prompt as well
        #[arg(long = "use")]
        activate: bool,
    },
    /// Make a prompt the active one
    Use {
        label: String,
        #[command(flatten)]
        family: FamilyArg,
    },
    /// Remove a prompt
    Delete {
        label: String,
        #[command(flatten)]
        family: FamilyArg,
    },
}

pub async fn run_settings(
    controller: &ChatController,
    action: Option<SettingsAction>,
) -> Result<(), Box<dyn Error>> {
    let settings = match action {
        None => controller.settings().await?,
        Some(SettingsAction::Set { key, value }) => {
            let value = parse_setting_value(&value.join(" "));
            let updated = controller.update_setting(&key, value).await?;
            println!("✅ Updated {key}");
            updated
        }
    };

    println!("{}", serde_json::to_string_pretty(&settings)?);
    if !settings_complete(&settings) {
        println!();
        println!("⚠️  Some settings are unset (null); the backend cannot answer until they are filled in.");
        println!("   Fill one in with `tok settings set <key> <value>`.");
    }
    Ok(())
}

pub fn format_prompts(book: &PromptBook) -> String {
    let mut out = String::new();
    for (kind, heading) in [
        (PromptKind::Llm, "Model prompts"),
        (PromptKind::Chat, "Chat engine prompts (--chat)"),
    ] {
        let family = book.family(kind);
        out.push_str(&format!("{heading}:\n"));
        if family.prompts.is_empty() {
            out.push_str("  (none)\n");
        }
        for prompt in &family.prompts {
            let marker = if family.selected_label() == Some(prompt.label.as_str()) {
                "▶"
            } else {
                " "
            };
            let first_line = prompt.value.lines().next().unwrap_or("");
            out.push_str(&format!("  {marker} {}: {first_line}\n", prompt.label));
        }
    }
    out
}

pub async fn run_prompts(
    controller: &ChatController,
    action: Option<PromptsAction>,
) -> Result<(), Box<dyn Error>> {
    match action {
        None => {
            let book = controller.prompt_book().await?;
            println!("📝 Prompts");
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            print!("{}", format_prompts(&book));
        }
        Some(PromptsAction::Save {
            label,
            text,
            family,
            activate,
        }) => {
            let prompt = Prompt::new(label.clone(), text.join(" "));
            controller.save_prompt(family.kind(), prompt, activate).await?;
            println!("✅ Saved {} prompt {label}", family.kind().as_str());
        }
        Some(PromptsAction::Use { label, family }) => {
            controller.select_prompt(family.kind(), &label).await?;
            println!("✅ Now using {} prompt {label}", family.kind().as_str());
        }
        Some(PromptsAction::Delete { label, family }) => {
            controller.delete_prompt(family.kind(), &label).await?;
            println!("🗑️  Deleted {} prompt {label}", family.kind().as_str());
        }
    }
    Ok(())
}
