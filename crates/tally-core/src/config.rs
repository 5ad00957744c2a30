use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_COMMAND_PREFIX: &str = "+";
pub const DEFAULT_PREFIX_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_HISTORY_IDLE_SECS: u64 = 30;
pub const DEFAULT_MOJANG_API_BASE: &str = "https://api.mojang.com";
pub const DEFAULT_MOJANG_SESSION_BASE: &str = "https://sessionserver.mojang.com";

/// Top-level config (tally.toml + TALLY_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub collectors: CollectorsConfig,
    /// Ordered role → flag table consulted by the prefix command.
    #[serde(default = "default_language_roles")]
    pub language_roles: Vec<LanguageRole>,
    #[serde(default)]
    pub mojang: MojangConfig,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            discord: DiscordConfig::default(),
            database: DatabaseConfig::default(),
            collectors: CollectorsConfig::default(),
            language_roles: default_language_roles(),
            mojang: MojangConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Empty means "not configured"; the bot refuses to start without it.
    #[serde(default)]
    pub bot_token: String,
    /// Prefix for message commands (`+poll`, `+prefix`).
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Operator channel that receives collector failure reports.
    pub error_channel_id: Option<u64>,
    /// Register and answer slash commands (`/history`).
    #[serde(default = "bool_true")]
    pub slash_commands: bool,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            command_prefix: default_command_prefix(),
            error_channel_id: None,
            slash_commands: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Lifetimes of the interactive collectors started by commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorsConfig {
    /// Absolute lifetime of a prefix selection.
    #[serde(default = "default_prefix_timeout_secs")]
    pub prefix_timeout_secs: u64,
    /// Idle window of a paginated lookup before its buttons are disabled.
    #[serde(default = "default_history_idle_secs")]
    pub history_idle_secs: u64,
    /// When set, polls are tallied by the bot and closed after this many seconds.
    pub poll_duration_secs: Option<u64>,
}

impl CollectorsConfig {
    /// Every configured lifetime must be at least one second.
    pub fn validate(&self) -> crate::error::Result<()> {
        let durations = [
            ("collectors.prefix_timeout_secs", Some(self.prefix_timeout_secs)),
            ("collectors.history_idle_secs", Some(self.history_idle_secs)),
            ("collectors.poll_duration_secs", self.poll_duration_secs),
        ];
        match durations.iter().find(|(_, secs)| *secs == Some(0)) {
            Some((key, _)) => Err(crate::error::TallyError::Config(format!(
                "{key} must be greater than zero"
            ))),
            None => Ok(()),
        }
    }
}

impl Default for CollectorsConfig {
    fn default() -> Self {
        Self {
            prefix_timeout_secs: DEFAULT_PREFIX_TIMEOUT_SECS,
            history_idle_secs: DEFAULT_HISTORY_IDLE_SECS,
            poll_duration_secs: None,
        }
    }
}

/// One row of the role → flag table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageRole {
    /// A member holds this language when one of their role names starts with it.
    pub role_prefix: String,
    pub emoji: String,
}

impl LanguageRole {
    pub fn new(role_prefix: &str, emoji: &str) -> Self {
        Self {
            role_prefix: role_prefix.to_string(),
            emoji: emoji.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MojangConfig {
    #[serde(default = "default_mojang_api_base")]
    pub api_base: String,
    #[serde(default = "default_mojang_session_base")]
    pub session_base: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for MojangConfig {
    fn default() -> Self {
        Self {
            api_base: default_mojang_api_base(),
            session_base: default_mojang_session_base(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// The language roles of the translators' server, in reaction order.
pub fn default_language_roles() -> Vec<LanguageRole> {
    [
        ("Bulgarian", "\u{1f1e7}\u{1f1ec}"),
        ("Chinese", "\u{1f1e8}\u{1f1f3}"),
        ("Czech", "\u{1f1e8}\u{1f1ff}"),
        ("Danish", "\u{1f1e9}\u{1f1f0}"),
        ("Dutch", "\u{1f1f3}\u{1f1f1}"),
        ("Finnish", "\u{1f1eb}\u{1f1ee}"),
        ("French", "\u{1f1eb}\u{1f1f7}"),
        ("German", "\u{1f1e9}\u{1f1ea}"),
        ("Greek", "\u{1f1ec}\u{1f1f7}"),
        ("Italian", "\u{1f1ee}\u{1f1f9}"),
        ("Japanese", "\u{1f1ef}\u{1f1f5}"),
        ("Korean", "\u{1f1f0}\u{1f1f7}"),
        ("Norwegian", "\u{1f1f3}\u{1f1f4}"),
        ("Polish", "\u{1f1f5}\u{1f1f1}"),
        ("Portuguese", "\u{1f1f5}\u{1f1f9}"),
        ("Brazilian", "\u{1f1e7}\u{1f1f7}"),
        ("Russian", "\u{1f1f7}\u{1f1fa}"),
        ("Spanish", "\u{1f1ea}\u{1f1f8}"),
        ("Swedish", "\u{1f1f8}\u{1f1ea}"),
        ("Thai", "\u{1f1f9}\u{1f1ed}"),
        ("Turkish", "\u{1f1f9}\u{1f1f7}"),
        ("Ukrainian", "\u{1f1fa}\u{1f1e6}"),
    ]
    .into_iter()
    .map(|(role, emoji)| LanguageRole::new(role, emoji))
    .collect()
}

fn bool_true() -> bool {
    true
}
fn default_command_prefix() -> String {
    DEFAULT_COMMAND_PREFIX.to_string()
}
fn default_prefix_timeout_secs() -> u64 {
    DEFAULT_PREFIX_TIMEOUT_SECS
}
fn default_history_idle_secs() -> u64 {
    DEFAULT_HISTORY_IDLE_SECS
}
fn default_mojang_api_base() -> String {
    DEFAULT_MOJANG_API_BASE.to_string()
}
fn default_mojang_session_base() -> String {
    DEFAULT_MOJANG_SESSION_BASE.to_string()
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.tally/tally.db", home)
}

impl TallyConfig {
    /// Load config from a TOML file with TALLY_* env var overrides.
    ///
    /// Nested keys use a double underscore: `TALLY_DISCORD__BOT_TOKEN`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: Self = Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::TallyError::Config(e.to_string()))?;
        config.collectors.validate()?;
        Ok(config)
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("TALLY_").split("__"))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.tally/tally.toml", home)
}
