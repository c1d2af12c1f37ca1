//! Backend settings and the backend's prompt library.
//!
//! Both are owned by the backend and replaced wholesale on update, so every
//! change here is read-modify-write over the document the backend returned.

use serde_json::{json, Map, Value};

use super::error::SettingsError;
use crate::api::{BackendError, Prompt, PromptKind};

/// Interpret a value typed on the command line. JSON literals (`512`,
/// `0.2`, `true`, `null`) keep their type; anything else is text.
pub fn parse_setting_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) if !value.is_object() && !value.is_array() => value,
        _ => Value::String(trimmed.to_string()),
    }
}

/// Set one field of a settings document and return the whole document.
///
/// The backend reads a fixed set of fields and nulls the ones it is not
/// sent, so the key must already exist unless the document is empty.
pub fn with_setting(settings: Value, key: &str, value: Value) -> Result<Value, SettingsError> {
    let mut map = match settings {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(BackendError::Unexpected {
                endpoint: "api/settings",
                detail: format!("expected an object, got {other}"),
            }
            .into())
        }
    };
    if !map.is_empty() && !map.contains_key(key) {
        return Err(SettingsError::UnknownKey {
            key: key.to_string(),
            known: map.keys().cloned().collect(),
        });
    }
    map.insert(key.to_string(), value);
    Ok(Value::Object(map))
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PromptFamily {
    pub prompts: Vec<Prompt>,
    pub default: Value,
    pub selected: Value,
}

impl PromptFamily {
    pub fn selected_label(&self) -> Option<&str> {
        self.selected.get("label").and_then(Value::as_str)
    }
}

/// The `/api/prompts` listing, in a form that can be edited and sent back.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PromptBook {
    pub llm: PromptFamily,
    pub chat: PromptFamily,
}

impl PromptBook {
    pub fn from_listing(listing: &Value) -> Result<Self, BackendError> {
        Ok(Self {
            llm: family(listing, PromptKind::Llm, "selectedLLMPrompt")?,
            chat: family(listing, PromptKind::Chat, "selectedChatEnginePrompt")?,
        })
    }

    pub fn family(&self, kind: PromptKind) -> &PromptFamily {
        match kind {
            PromptKind::Llm => &self.llm,
            PromptKind::Chat => &self.chat,
        }
    }

    fn family_mut(&mut self, kind: PromptKind) -> &mut PromptFamily {
        match kind {
            PromptKind::Llm => &mut self.llm,
            PromptKind::Chat => &mut self.chat,
        }
    }

    pub fn contains(&self, kind: PromptKind, label: &str) -> bool {
        self.family(kind).prompts.iter().any(|p| p.label == label)
    }

    /// Add a prompt, or replace the text of the one with the same label.
    pub fn upsert(&mut self, kind: PromptKind, prompt: Prompt) {
        let prompts = &mut self.family_mut(kind).prompts;
        match prompts.iter_mut().find(|p| p.label == prompt.label) {
            Some(existing) => *existing = prompt,
            None => prompts.push(prompt),
        }
    }

    /// Make `label` the active prompt of its family.
    pub fn select(&mut self, kind: PromptKind, label: &str) -> Result<(), SettingsError> {
        let family = self.family_mut(kind);
        let prompt = family
            .prompts
            .iter()
            .find(|p| p.label == label)
            .ok_or_else(|| SettingsError::NoSuchPrompt {
                kind: kind.as_str(),
                label: label.to_string(),
            })?;
        family.selected = json!({ "label": prompt.label, "value": prompt.value });
        Ok(())
    }

    /// Body for `POST /api/prompts`.
    pub fn to_update(&self) -> Value {
        let list = |family: &PromptFamily| -> Value {
            family
                .prompts
                .iter()
                .map(|p| json!({ "label": p.label, "value": p.value }))
                .collect()
        };
        json!({
            "LLM": list(&self.llm),
            "Chat": list(&self.chat),
            "defaults": {
                "LLM": self.llm.default.clone(),
                "Chat": self.chat.default.clone(),
            },
            "selectedLLMPrompt": self.llm.selected.clone(),
            "selectedChatEnginePrompt": self.chat.selected.clone(),
        })
    }
}

fn family(
    listing: &Value,
    kind: PromptKind,
    selected_key: &str,
) -> Result<PromptFamily, BackendError> {
    let unexpected = |detail: String| BackendError::Unexpected {
        endpoint: "api/prompts",
        detail,
    };
    let entry = listing
        .get("prompts")
        .and_then(|prompts| prompts.get(kind.listing_key()))
        .ok_or_else(|| unexpected(format!("no \"{}\" prompt family", kind.listing_key())))?;

    let prompts = match entry.get("prompts") {
        None | Some(Value::Null) => Vec::new(),
        Some(raw) => serde_json::from_value(raw.clone())
            .map_err(|err| unexpected(format!("{} prompts: {err}", kind.listing_key())))?,
    };
    Ok(PromptFamily {
        prompts,
        default: entry.get("default").cloned().unwrap_or(Value::Null),
        selected: listing.get(selected_key).cloned().unwrap_or(Value::Null),
    })
}
