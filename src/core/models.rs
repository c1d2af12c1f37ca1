use crate::api::{ModelKind, ModelsResponse, SelectModelRequest};

/// Chat and embedding models the backend can serve, plus the current picks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelCatalog {
    pub llm: Vec<String>,
    pub embed: Vec<String>,
    pub selected_llm: Option<String>,
    pub selected_embed: Option<String>,
}

impl ModelCatalog {
    pub fn models(&self, kind: ModelKind) -> &[String] {
        match kind {
            ModelKind::Llm => &self.llm,
            ModelKind::Embed => &self.embed,
        }
    }

    pub fn selected(&self, kind: ModelKind) -> Option<&str> {
        match kind {
            ModelKind::Llm => self.selected_llm.as_deref(),
            ModelKind::Embed => self.selected_embed.as_deref(),
        }
    }

    pub fn contains(&self, kind: ModelKind, name: &str) -> bool {
        self.models(kind).iter().any(|model| model == name)
    }
}

impl From<ModelsResponse> for ModelCatalog {
    fn from(response: ModelsResponse) -> Self {
        let blank_to_none = |value: Option<String>| value.filter(|name| !name.is_empty());
        match response {
            ModelsResponse::Split {
                llm,
                embed,
                selected_model,
                selected_embed_model,
            } => ModelCatalog {
                llm,
                embed,
                selected_llm: blank_to_none(selected_model),
                selected_embed: blank_to_none(selected_embed_model),
            },
            ModelsResponse::Legacy {
                models,
                selected_model,
            } => ModelCatalog {
                llm: models,
                embed: Vec::new(),
                selected_llm: blank_to_none(selected_model),
                selected_embed: None,
            },
        }
    }
}

/// A model to switch to.
///
/// A name the backend does not have yet is pulled before it is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTarget {
    pub name: String,
    pub kind: ModelKind,
}

impl ModelTarget {
    pub fn llm(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ModelKind::Llm,
        }
    }

    pub fn embed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ModelKind::Embed,
        }
    }

    pub fn to_request(&self) -> SelectModelRequest {
        SelectModelRequest {
            model: self.name.clone(),
            kind: Some(self.kind),
        }
    }
}
