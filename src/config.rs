use crate::provider::{ProviderConfig, Style};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_SUGGEST_SYSTEM_PROMPT: &str = "You are a code completion engine. \
Continue the user's text exactly where it stops. Output only the text to insert, \
with no explanations, no markdown fences and no repetition of the input.";

pub const DEFAULT_CHANGE_SYSTEM_PROMPT: &str = "You rewrite code. The user gives you \
a piece of text and possibly an instruction inside it. Reply with only the replacement \
text, with no explanations and no markdown fences.";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unsupported provider style: {0:?} (expected \"anthropic\" or \"openai\")")]
    UnsupportedStyle(String),

    #[error("unsupported transport kind: {0:?} (expected \"curl\" or \"native\")")]
    UnsupportedTransport(String),
}

/// Fully resolved configuration. Every leaf has a value.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub suggest_system_prompt: String,
    pub change_system_prompt: String,
    pub include_after_cursor: bool,
    pub provider: ProviderConfig,
    pub keymap: Keymap,
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct Keymap {
    pub suggest: String,
    pub change: String,
    pub cancel: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Curl,
    Native,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s {
            "curl" => Ok(Self::Curl),
            "native" => Ok(Self::Native),
            other => Err(ConfigError::UnsupportedTransport(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransportConfig {
    pub kind: TransportKind,

    /// Program to run for the curl transport.
    pub program: String,

    /// Arguments placed before the generated curl arguments.
    pub args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            suggest_system_prompt: DEFAULT_SUGGEST_SYSTEM_PROMPT.to_string(),
            change_system_prompt: DEFAULT_CHANGE_SYSTEM_PROMPT.to_string(),
            include_after_cursor: false,
            provider: ProviderConfig {
                url: "https://api.anthropic.com/v1/messages".to_string(),
                model: "claude-3-5-sonnet-20241022".to_string(),
                api_key_name: "ANTHROPIC_API_KEY".to_string(),
                style: Style::Anthropic,
                body: Map::new(),
            },
            keymap: Keymap {
                suggest: "<leader>l".to_string(),
                change: "<leader>L".to_string(),
                cancel: "<Esc>".to_string(),
            },
            transport: TransportConfig {
                kind: TransportKind::Curl,
                program: "curl".to_string(),
                args: Vec::new(),
            },
        }
    }
}

/// On-disk layer. Any field may be left out; missing leaves keep defaults.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub suggest_system_prompt: Option<String>,
    pub change_system_prompt: Option<String>,
    pub include_after_cursor: Option<bool>,
    pub provider: FileProvider,
    pub keymap: FileKeymap,
    pub transport: FileTransport,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct FileProvider {
    pub url: Option<String>,
    pub model: Option<String>,
    pub api_key_name: Option<String>,
    pub style: Option<String>,
    pub body: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct FileKeymap {
    pub suggest: Option<String>,
    pub change: Option<String>,
    pub cancel: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct FileTransport {
    pub kind: Option<String>,
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
}

impl FileConfig {
    /// Load config if the file exists, otherwise return Ok(None).
    pub fn load_optional(path: impl AsRef<Path>) -> anyhow::Result<Option<Self>> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::Error::new(e))
                    .with_context(|| format!("failed to read config: {}", path.display()))
            }
        };

        let s = String::from_utf8(bytes).context("config is not valid UTF-8")?;
        let cfg: FileConfig = toml::from_str(&s)
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;
        Ok(Some(cfg))
    }
}

impl Config {
    /// Read `path` (if present) and resolve it onto the defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = FileConfig::load_optional(path)?.unwrap_or_default();
        let cfg = Self::resolve(file)
            .with_context(|| format!("invalid config: {}", path.display()))?;
        Ok(cfg)
    }

    pub fn resolve(file: FileConfig) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        set(&mut cfg.suggest_system_prompt, file.suggest_system_prompt);
        set(&mut cfg.change_system_prompt, file.change_system_prompt);
        set(&mut cfg.include_after_cursor, file.include_after_cursor);

        let p = file.provider;
        set(&mut cfg.provider.url, p.url);
        set(&mut cfg.provider.model, p.model);
        set(&mut cfg.provider.api_key_name, p.api_key_name);
        if let Some(style) = p.style {
            cfg.provider.style = style.parse()?;
        }
        cfg.provider.body.extend(p.body);

        let k = file.keymap;
        set(&mut cfg.keymap.suggest, k.suggest);
        set(&mut cfg.keymap.change, k.change);
        set(&mut cfg.keymap.cancel, k.cancel);

        let t = file.transport;
        if let Some(kind) = t.kind {
            cfg.transport.kind = kind.parse()?;
        }
        set(&mut cfg.transport.program, t.program);
        set(&mut cfg.transport.args, t.args);

        Ok(cfg)
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(s: &str) -> Result<Config, ConfigError> {
        let file: FileConfig = toml::from_str(s).unwrap();
        Config::resolve(file)
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.provider.style, Style::Anthropic);
        assert_eq!(cfg.provider.api_key_name, "ANTHROPIC_API_KEY");
        assert_eq!(cfg.transport.kind, TransportKind::Curl);
        assert_eq!(cfg.keymap.cancel, "<Esc>");
    }

    #[test]
    fn overrides_apply_per_leaf() {
        let cfg = parse(
            r#"
            [provider]
            model = "gpt-4o"
            style = "openai"

            [keymap]
            change = "<C-k>"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.provider.model, "gpt-4o");
        assert_eq!(cfg.provider.style, Style::OpenAi);
        // untouched siblings keep their defaults
        assert_eq!(cfg.provider.url, "https://api.anthropic.com/v1/messages");
        assert_eq!(cfg.keymap.suggest, "<leader>l");
        assert_eq!(cfg.keymap.change, "<C-k>");
    }

    #[test]
    fn body_fields_are_carried_over() {
        let cfg = parse(
            r#"
            [provider.body]
            temperature = 0.2
            max_tokens = 512
            "#,
        )
        .unwrap();
        assert_eq!(cfg.provider.body["max_tokens"], 512);
        assert_eq!(cfg.provider.body["temperature"], 0.2);
    }

    #[test]
    fn unknown_style_is_rejected_at_load() {
        let err = parse("[provider]\nstyle = \"gemini\"\n").unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedStyle("gemini".to_string()));
    }

    #[test]
    fn unknown_transport_is_rejected_at_load() {
        let err = parse("[transport]\nkind = \"wget\"\n").unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedTransport("wget".to_string()));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg.transport.program, "curl");
    }

    #[test]
    fn loads_from_disk() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "include_after_cursor = true").unwrap();
        writeln!(f, "[transport]\nkind = \"native\"").unwrap();
        let cfg = Config::load(f.path()).unwrap();
        assert!(cfg.include_after_cursor);
        assert_eq!(cfg.transport.kind, TransportKind::Native);
    }

    #[test]
    fn resolved_config_renders_as_toml() {
        let out = toml::to_string(&Config::default()).unwrap();
        assert!(out.contains("style = \"anthropic\""));
        assert!(out.contains("kind = \"curl\""));
    }
}
