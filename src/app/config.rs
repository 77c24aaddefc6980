use derive_more::Display;
use log::{warn, LevelFilter};
use std::{collections::HashMap, error::Error, path::Path, str::FromStr};

/// The log level used when none, or an unknown one, is configured.
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// The translations file used when none is configured and this one exists.
pub const DEFAULT_I18N_FILE: &str = "./i18n.yml";

/// Basic settings of a service.
///
/// Settings are read from upper-case keys such as `SERVICE_PORT` or
/// `REDIS_HOST`. Missing keys leave the matching field empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub port: String,
    pub log_level: LevelFilter,

    pub redis_host: String,
    pub redis_db: i64,
    pub redis_password: String,

    pub mongo_host: String,
    pub mongo_user: String,
    pub mongo_password: String,
    pub mongo_database: String,

    pub jwt_password: Vec<u8>,

    /// Path to the translations file, if any.
    pub i18n_file: Option<String>,
}

impl AppConfig {
    /// Reads the settings through a lookup function, which is given each
    /// key and returns its value if set.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).unwrap_or_default();

        let i18n_file = lookup("I18N_FILE")
            .filter(|file| !file.is_empty())
            .or_else(|| {
                Path::new(DEFAULT_I18N_FILE)
                    .is_file()
                    .then(|| DEFAULT_I18N_FILE.to_owned())
            });

        AppConfig {
            port: get("SERVICE_PORT"),
            log_level: parse_log_level(&get("LOG_LEVEL")),

            redis_host: get("REDIS_HOST"),
            redis_db: parse_redis_db(&get("REDIS_DB")),
            redis_password: get("REDIS_PASSWORD"),

            mongo_host: get("MONGO_HOST"),
            mongo_user: get("MONGO_USERNAME"),
            mongo_password: get("MONGO_PASSWORD"),
            mongo_database: get("MONGO_DB"),

            jwt_password: get("JWT_PASSWORD").into_bytes(),

            i18n_file,
        }
    }

    /// Reads the settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        AppConfig::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the settings from a `.env` file without modifying the process
    /// environment. Keys in the file are matched case-insensitively.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut values = HashMap::new();
        // `from_path` would export the values into the process environment.
        #[allow(deprecated)]
        let lines = dotenv::from_path_iter(path).map_err(|error| {
            ConfigError::Read {
                path: path.display().to_string(),
                inner: error.to_string(),
            }
        })?;

        for line in lines {
            let (key, value) = line.map_err(|error| ConfigError::Read {
                path: path.display().to_string(),
                inner: error.to_string(),
            })?;
            values.insert(key.to_uppercase(), value);
        }

        Ok(AppConfig::from_lookup(|key| values.get(key).cloned()))
    }

    /// Applies the settings that have process-wide effect. Currently this is
    /// the maximum level of the `log` facade.
    pub fn apply_to_globals(&self) {
        log::set_max_level(self.log_level);
    }
}

/// An error raised while loading an [`AppConfig`].
#[derive(Clone, Debug, Display)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configuration file could not be read or parsed.
    #[display(fmt = "failed to read config file {}: {}", path, inner)]
    Read { path: String, inner: String },
}

impl Error for ConfigError {}

fn parse_log_level(value: &str) -> LevelFilter {
    let value = value.trim();
    if value.is_empty() {
        return DEFAULT_LOG_LEVEL;
    }

    match value.to_ascii_lowercase().as_str() {
        "warning" => LevelFilter::Warn,
        "fatal" | "panic" => LevelFilter::Error,
        other => LevelFilter::from_str(other).unwrap_or_else(|_| {
            warn!(
                "unknown log level {:?}, falling back to {}",
                value, DEFAULT_LOG_LEVEL
            );
            DEFAULT_LOG_LEVEL
        }),
    }
}

fn parse_redis_db(value: &str) -> i64 {
    value.trim().parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lookup_from<'a>(
        pairs: &'a [(&'a str, &'a str)],
    ) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value).to_owned())
        }
    }

    #[test]
    fn reads_every_setting() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("SERVICE_PORT", "80"),
            ("LOG_LEVEL", "debug"),
            ("REDIS_HOST", "localhost:6379"),
            ("REDIS_DB", "3"),
            ("REDIS_PASSWORD", "secret"),
            ("MONGO_HOST", "localhost:27017"),
            ("MONGO_USERNAME", "user"),
            ("MONGO_PASSWORD", "pass"),
            ("MONGO_DB", "main"),
            ("JWT_PASSWORD", "12345"),
            ("I18N_FILE", "texts.yml"),
        ]));

        assert_eq!("80", config.port);
        assert_eq!(LevelFilter::Debug, config.log_level);
        assert_eq!("localhost:6379", config.redis_host);
        assert_eq!(3, config.redis_db);
        assert_eq!("secret", config.redis_password);
        assert_eq!("localhost:27017", config.mongo_host);
        assert_eq!("user", config.mongo_user);
        assert_eq!("pass", config.mongo_password);
        assert_eq!("main", config.mongo_database);
        assert_eq!(b"12345".to_vec(), config.jwt_password);
        assert_eq!(Some("texts.yml".to_owned()), config.i18n_file);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("LOG_LEVEL", "loud"),
            ("REDIS_DB", "first"),
        ]));

        assert_eq!(DEFAULT_LOG_LEVEL, config.log_level);
        assert_eq!(0, config.redis_db);
        assert!(config.port.is_empty());
    }

    #[test]
    fn log_level_aliases() {
        assert_eq!(LevelFilter::Warn, parse_log_level("warning"));
        assert_eq!(LevelFilter::Error, parse_log_level("Fatal"));
        assert_eq!(LevelFilter::Error, parse_log_level("panic"));
        assert_eq!(LevelFilter::Trace, parse_log_level("TRACE"));
        assert_eq!(DEFAULT_LOG_LEVEL, parse_log_level(""));
    }

    #[test]
    fn reads_env_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "SERVICE_PORT=80").unwrap();
        writeln!(file, "redis_host=localhost:6379").unwrap();
        writeln!(file, "MONGO_HOST=localhost:27017").unwrap();
        writeln!(file, "JWT_PASSWORD=12345").unwrap();
        writeln!(file, "LOG_LEVEL=info").unwrap();
        file.flush().unwrap();

        let config = AppConfig::from_env_file(file.path()).unwrap();
        assert_eq!("80", config.port);
        assert_eq!("localhost:6379", config.redis_host);
        assert_eq!("localhost:27017", config.mongo_host);
        assert_eq!(b"12345".to_vec(), config.jwt_password);
        assert_eq!(LevelFilter::Info, config.log_level);
    }

    #[test]
    fn env_file_leaves_process_environment_alone() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "PA_ONLY_IN_FILE=from-file").unwrap();
        writeln!(file, "SERVICE_PORT=81").unwrap();
        file.flush().unwrap();

        let config = AppConfig::from_env_file(file.path()).unwrap();
        assert_eq!("81", config.port);
        assert!(std::env::var("PA_ONLY_IN_FILE").is_err());
    }

    #[test]
    fn missing_env_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::from_env_file(dir.path().join("missing.env"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
