use std::fmt;

use serde::{Deserialize, Serialize};

/// A multimodal model known to answer reliably with images attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownModel {
    /// The identifier sent to the API.
    pub id: &'static str,

    /// A short note shown next to the identifier.
    pub note: &'static str,
}

/// Built-in model list. The first entry is the default selection.
pub const KNOWN_MODELS: &[KnownModel] = &[
    KnownModel {
        id: "google/gemini-2.0-flash-exp:free",
        note: "Fastest & Best",
    },
    KnownModel {
        id: "meta-llama/llama-3.2-11b-vision-instruct:free",
        note: "Reliable",
    },
    KnownModel {
        id: "qwen/qwen-2.5-vl-72b-instruct:free",
        note: "Smart but slow",
    },
];

/// Represents a model identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Model(String);

impl Model {
    /// Wraps a model identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier sent to the API.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Model {
    fn from(model: String) -> Self {
        Model(model)
    }
}

impl From<&str> for Model {
    fn from(model: &str) -> Self {
        Model(model.to_string())
    }
}

/// The ordered list of models offered for selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    models: Vec<Model>,
}

impl ModelCatalog {
    /// Creates a catalog from an ordered list of identifiers.
    pub fn new<I, M>(models: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Model>,
    {
        Self {
            models: models.into_iter().map(Into::into).collect(),
        }
    }

    /// The models in selection order.
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    /// The model used when nothing was selected: the first entry.
    pub fn default_model(&self) -> Option<&Model> {
        self.models.first()
    }

    /// Returns the note for a built-in model, if any.
    pub fn note(&self, model: &Model) -> Option<&'static str> {
        KNOWN_MODELS
            .iter()
            .find(|known| known.id == model.as_str())
            .map(|known| known.note)
    }

    /// Resolves a selection: a 1-based index into the catalog or a model identifier.
    ///
    /// Identifiers outside the catalog are accepted as custom models.
    pub fn resolve(&self, selection: &str) -> Option<Model> {
        let selection = selection.trim();
        if selection.is_empty() {
            return None;
        }
        if let Ok(index) = selection.parse::<usize>() {
            return index
                .checked_sub(1)
                .and_then(|i| self.models.get(i))
                .cloned();
        }
        Some(Model::new(selection))
    }

    /// Returns true if the identifier is part of the catalog.
    pub fn contains(&self, model: &Model) -> bool {
        self.models.contains(model)
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new(KNOWN_MODELS.iter().map(|known| known.id))
    }
}
