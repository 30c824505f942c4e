//! Configuration types for the support console.
//!
//! Values come from three layers: command-line flags parsed with `arrrg`, an optional YAML file,
//! and built-in defaults. Flags win over the file; the file wins over defaults.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::Deserialize;

use crate::client::{API_KEY_ENV, DEFAULT_API_URL, DEFAULT_REFERER, DEFAULT_TIMEOUT, DEFAULT_TITLE};
use crate::error::{Error, Result};
use crate::session::DEFAULT_CONTEXT_TURNS;
use crate::types::{Category, Model, ModelCatalog};

/// Command-line arguments for the supportintel-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use, by identifier or 1-based catalog index.
    #[arrrg(optional, "Model id or catalog index (default: first catalog entry)", "MODEL")]
    pub model: Option<String>,

    /// Initial ticket category.
    #[arrrg(optional, "Ticket category name or index (default: Hardware Failure)", "CATEGORY")]
    pub category: Option<String>,

    /// Path to a YAML configuration file.
    #[arrrg(optional, "YAML config file with api_key, models, and connection settings", "PATH")]
    pub config: Option<String>,

    /// API root.
    #[arrrg(optional, "API base URL (default: https://openrouter.ai/api/v1)", "URL")]
    pub base_url: Option<String>,

    /// Connect, header, and inter-chunk timeout.
    #[arrrg(optional, "Network timeout in seconds (default: 60)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// Number of trailing turns replayed as context.
    #[arrrg(optional, "Turns of history sent with each request (default: 4)", "TURNS")]
    pub context_turns: Option<usize>,

    /// Value for the HTTP-Referer header.
    #[arrrg(optional, "HTTP-Referer header (default: http://localhost:8501)", "URL")]
    pub referer: Option<String>,

    /// Value for the X-Title header.
    #[arrrg(optional, "X-Title header (default: SupportBot)", "TITLE")]
    pub title: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Settings read from the YAML configuration file.
///
/// Every key is optional:
///
/// ```yaml
/// api_key: sk-or-...
/// models:
///   - google/gemini-2.0-flash-exp:free
///   - qwen/qwen-2.5-vl-72b-instruct:free
/// base_url: https://openrouter.ai/api/v1
/// timeout_secs: 90
/// context_turns: 6
/// ```
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Fallback API key, used when the environment variable is unset.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Replacement model catalog, in selection order.
    #[serde(default)]
    pub models: Option<Vec<String>>,

    /// API root.
    #[serde(default)]
    pub base_url: Option<String>,

    /// HTTP-Referer header.
    #[serde(default)]
    pub referer: Option<String>,

    /// X-Title header.
    #[serde(default)]
    pub title: Option<String>,

    /// Network timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Context window size in turns.
    #[serde(default)]
    pub context_turns: Option<usize>,
}

impl std::fmt::Debug for FileConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("models", &self.models)
            .field("base_url", &self.base_url)
            .field("referer", &self.referer)
            .field("title", &self.title)
            .field("timeout_secs", &self.timeout_secs)
            .field("context_turns", &self.context_turns)
            .finish()
    }
}

impl FileConfig {
    /// Parse a configuration document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration(format!("invalid configuration file: {e}"))
        })
    }

    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml(&yaml)
    }
}

/// Resolved configuration for a chat session.
#[derive(Clone)]
pub struct ChatConfig {
    /// Models offered for selection.
    pub catalog: ModelCatalog,

    /// The model used for the next request.
    pub model: Model,

    /// The ticket category used for the next request.
    pub category: Category,

    /// API root.
    pub base_url: String,

    /// HTTP-Referer header.
    pub referer: String,

    /// X-Title header.
    pub title: String,

    /// Connect, header, and inter-chunk timeout.
    pub timeout: Duration,

    /// Turns of history replayed with each request.
    pub context_turns: usize,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    file_api_key: Option<String>,
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("catalog", &self.catalog)
            .field("model", &self.model)
            .field("category", &self.category)
            .field("base_url", &self.base_url)
            .field("referer", &self.referer)
            .field("title", &self.title)
            .field("timeout", &self.timeout)
            .field("context_turns", &self.context_turns)
            .field("use_color", &self.use_color)
            .finish_non_exhaustive()
    }
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: first entry of the built-in catalog
    /// - Category: Hardware Failure
    /// - Timeout: 60 seconds
    /// - Context: 4 turns
    /// - Color: enabled
    pub fn new() -> Self {
        let catalog = ModelCatalog::default();
        let model = catalog
            .default_model()
            .cloned()
            .unwrap_or_else(|| Model::new(crate::types::KNOWN_MODELS[0].id));
        Self {
            catalog,
            model,
            category: Category::default(),
            base_url: DEFAULT_API_URL.trim_end_matches('/').to_string(),
            referer: DEFAULT_REFERER.to_string(),
            title: DEFAULT_TITLE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            context_turns: DEFAULT_CONTEXT_TURNS,
            use_color: true,
            file_api_key: None,
        }
    }

    /// Resolve flags, then the config file they name, over the defaults.
    pub fn resolve(args: ChatArgs) -> Result<Self> {
        let file = match args.config.as_deref() {
            Some(path) => Some(FileConfig::load(path)?),
            None => None,
        };
        Self::from_sources(args, file)
    }

    /// Layer `args` over `file` over the defaults.
    pub fn from_sources(args: ChatArgs, file: Option<FileConfig>) -> Result<Self> {
        let file = file.unwrap_or_default();
        let mut config = Self::new();

        if let Some(models) = file.models {
            let models: Vec<String> = models
                .into_iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
            if models.is_empty() {
                return Err(Error::configuration("config file lists no models"));
            }
            config = config.with_catalog(ModelCatalog::new(models));
        }

        if let Some(selection) = args.model.as_deref() {
            let model = config.catalog.resolve(selection).ok_or_else(|| {
                Error::configuration(format!("no model matches selection {selection:?}"))
            })?;
            config.model = model;
        }
        if let Some(category) = args.category.as_deref() {
            config.category = category.parse().map_err(Error::configuration)?;
        }

        if let Some(base_url) = args.base_url.or(file.base_url) {
            url::Url::parse(&base_url).map_err(|e| {
                Error::configuration(format!("invalid base URL {base_url:?}: {e}"))
            })?;
            config.base_url = base_url;
        }
        if let Some(referer) = args.referer.or(file.referer) {
            config.referer = referer;
        }
        if let Some(title) = args.title.or(file.title) {
            config.title = title;
        }
        if let Some(secs) = args.timeout_secs.or(file.timeout_secs) {
            if secs == 0 {
                return Err(Error::configuration("timeout must be at least one second"));
            }
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(turns) = args.context_turns.or(file.context_turns) {
            config.context_turns = turns;
        }
        config.use_color = !args.no_color;
        config.file_api_key = file.api_key.filter(|key| !key.trim().is_empty());
        Ok(config)
    }

    /// The API key: `OPENROUTER_API_KEY` if set, else the config file's `api_key`.
    pub fn api_key(&self) -> Option<String> {
        let from_env = env::var(API_KEY_ENV).ok();
        pick_api_key(from_env, self.file_api_key.clone())
    }

    /// Replaces the catalog; the selected model becomes its first entry.
    pub fn with_catalog(mut self, catalog: ModelCatalog) -> Self {
        if let Some(first) = catalog.default_model() {
            self.model = first.clone();
        }
        self.catalog = catalog;
        self
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Sets the ticket category.
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Sets the network timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the number of context turns.
    pub fn with_context_turns(mut self, context_turns: usize) -> Self {
        self.context_turns = context_turns;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn pick_api_key(from_env: Option<String>, from_file: Option<String>) -> Option<String> {
    from_env
        .filter(|key| !key.trim().is_empty())
        .or(from_file)
}
