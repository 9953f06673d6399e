use crate::models::{ScoringPolicy, Stage, StageBonusTable};
use crate::core::scoring::STAGE_MAX_POINTS;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub appwrite: AppwriteSettings,
    pub collection: CollectionSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppwriteSettings {
    pub endpoint: String,
    pub api_key: String,
    pub project_id: String,
    pub database_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionSettings {
    pub talent_profiles: String,
    pub startups: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    /// Shared L2 tier; the cache stays process-local when unset
    pub redis_url: Option<String>,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_limit")]
    pub default_limit: u16,
    #[serde(default = "default_max_limit")]
    pub max_limit: u16,
    /// Upper bound on candidates fetched per fan-out recompute
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            candidate_limit: default_candidate_limit(),
        }
    }
}

fn default_limit() -> u16 { 20 }
fn default_max_limit() -> u16 { 100 }
fn default_candidate_limit() -> usize { 500 }

#[derive(Debug, Clone, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
    #[serde(default = "default_max_store_retries")]
    pub max_store_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Capacity of the change-event queue feeding the listener
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_conflict_retries(),
            max_store_retries: default_max_store_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            max_in_flight: default_max_in_flight(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_max_conflict_retries() -> u32 { 3 }
fn default_max_store_retries() -> u32 { 3 }
fn default_backoff_base_ms() -> u64 { 100 }
fn default_max_in_flight() -> usize { 8 }
fn default_event_buffer() -> usize { 1024 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub stage_bonus: StageBonusTable,
}

impl ScoringSettings {
    /// Validated scoring policy
    pub fn to_policy(&self) -> Result<ScoringPolicy, ConfigValidationError> {
        let table = self.stage_bonus;
        let mut previous: Option<(Stage, u8)> = None;

        for stage in Stage::ALL {
            let bonus = table.bonus(stage);
            if bonus > STAGE_MAX_POINTS {
                return Err(ConfigValidationError::StageBonusTooHigh { stage, bonus });
            }
            if let Some((earlier, earlier_bonus)) = previous {
                if bonus > earlier_bonus {
                    return Err(ConfigValidationError::StageBonusIncreasing { earlier, later: stage });
                }
            }
            previous = Some((stage, bonus));
        }

        Ok(ScoringPolicy { stage_bonus: table })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// HS256 secret shared with the auth provider
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

/// Settings that parse but make no sense
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error("Stage bonus for {stage:?} is {bonus}, maximum is 20")]
    StageBonusTooHigh { stage: Stage, bonus: u8 },

    #[error("Stage bonus must not increase with maturity ({earlier:?} < {later:?})")]
    StageBonusIncreasing { earlier: Stage, later: Stage },

    #[error("Invalid limits: {0}")]
    InvalidLimits(String),

    #[error("Missing setting: {0}")]
    Missing(&'static str),
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Environment variables (prefixed with MATCH__)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            // Add default config file
            .add_source(File::with_name("config/default").required(false))
            // Add local config file (for development overrides)
            .add_source(File::with_name("config/local").required(false))
            // e.g., MATCH__SERVER__PORT -> server.port
            .add_source(env_source())
            .build()?;

        settings = substitute_env_vars(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(env_source())
            .build()?;

        settings.try_deserialize()
    }

    /// Cross-field checks that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.scoring.to_policy()?;

        let matching = &self.matching;
        if matching.max_limit == 0 {
            return Err(ConfigValidationError::InvalidLimits("max_limit must be at least 1".to_string()));
        }
        if matching.default_limit == 0 || matching.default_limit > matching.max_limit {
            return Err(ConfigValidationError::InvalidLimits(format!(
                "default_limit {} must be within 1..={}",
                matching.default_limit, matching.max_limit
            )));
        }
        if matching.candidate_limit == 0 {
            return Err(ConfigValidationError::InvalidLimits("candidate_limit must be at least 1".to_string()));
        }
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigValidationError::Missing("auth.jwt_secret"));
        }

        Ok(())
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("MATCH")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Apply well-known environment variables on top of the layered config
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let overrides = [
        ("database.url", env::var("DATABASE_URL").ok()),
        ("cache.redis_url", env::var("REDIS_URL").ok()),
        ("appwrite.endpoint", env::var("APPWRITE_ENDPOINT").ok()),
        ("appwrite.api_key", env::var("APPWRITE_API_KEY").ok()),
        ("appwrite.project_id", env::var("APPWRITE_PROJECT_ID").ok()),
        ("appwrite.database_id", env::var("APPWRITE_DATABASE_ID").ok()),
        ("auth.jwt_secret", env::var("JWT_SECRET").ok()),
        ("logging.level", env::var("LOG_LEVEL").ok()),
        ("logging.format", env::var("LOG_FORMAT").ok()),
    ];

    let mut builder = Config::builder().add_source(settings);
    for (key, value) in overrides {
        if let Some(value) = value {
            builder = builder.set_override(key, value)?;
        }
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    const MINIMAL: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 8080

        [appwrite]
        endpoint = "http://localhost/v1"
        api_key = "key"
        project_id = "project"
        database_id = "db"

        [collection]
        talent_profiles = "talent_profiles"
        startups = "startups"

        [database]
        url = "postgres://localhost/matches"

        [auth]
        jwt_secret = "secret"
    "#;

    fn parse(extra: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(&format!("{}\n{}", MINIMAL, extra), FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_fill_optional_sections() {
        let settings = parse("");
        assert_eq!(settings.matching.default_limit, 20);
        assert_eq!(settings.matching.max_limit, 100);
        assert_eq!(settings.sync.max_conflict_retries, 3);
        assert_eq!(settings.logging.format, "json");
        assert!(settings.cache.redis_url.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_default_stage_bonus_policy() {
        let policy = ScoringSettings::default().to_policy().unwrap();
        assert_eq!(policy.stage_bonus.bonus(Stage::Idea), 20);
        assert_eq!(policy.stage_bonus.bonus(Stage::Scaling), 0);
    }

    #[test]
    fn test_custom_stage_bonus_is_validated() {
        let settings = parse(
            r#"
            [scoring.stage_bonus]
            idea = 18
            mvp = 12
            early_stage = 12
            growth = 4
            scaling = 0
            "#,
        );
        assert_eq!(settings.scoring.to_policy().unwrap().stage_bonus.mvp, 12);

        let increasing = ScoringSettings {
            stage_bonus: StageBonusTable { idea: 10, mvp: 15, early_stage: 5, growth: 0, scaling: 0 },
        };
        assert_eq!(
            increasing.to_policy().unwrap_err(),
            ConfigValidationError::StageBonusIncreasing { earlier: Stage::Idea, later: Stage::Mvp }
        );

        let too_high = ScoringSettings {
            stage_bonus: StageBonusTable { idea: 25, mvp: 15, early_stage: 10, growth: 5, scaling: 0 },
        };
        assert!(matches!(
            too_high.to_policy(),
            Err(ConfigValidationError::StageBonusTooHigh { stage: Stage::Idea, bonus: 25 })
        ));
    }

    #[test]
    fn test_limits_are_validated() {
        let settings = parse(
            r#"
            [matching]
            default_limit = 200
            max_limit = 100
            "#,
        );
        assert!(matches!(settings.validate(), Err(ConfigValidationError::InvalidLimits(_))));
    }
}
