#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::collections::HashMap;
use std::path;
use std::time::Duration;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::ArgMatches;
use clap::Command;
use strum::EnumIter;
use strum::IntoEnumIterator;
use tokio::fs;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, EnumIter, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    BackendHealthCheckTimeout,
    ConfigFile,
    FallbackModel,
    GeminiToken,
    GeminiURL,
    GenerationTimeout,
    Host,
    LogDir,
    Model,
    Port,
    SecretKey,
    SessionTtl,
}

/// Name of the table in the config file holding `email = "password"` pairs.
pub const CREDENTIALS_TABLE: &str = "credentials";

/// Settings for a running server. Built once at startup from defaults, the
/// config file, environment variables and flags, in increasing precedence.
#[derive(Clone)]
pub struct Config {
    pub backend_health_check_timeout: Duration,
    pub config_file: path::PathBuf,
    /// Replaces the built in credential table when set.
    pub credentials: Option<HashMap<String, String>>,
    pub fallback_model: String,
    pub gemini_token: String,
    pub gemini_url: String,
    pub generation_timeout: Duration,
    pub host: String,
    pub log_dir: Option<path::PathBuf>,
    pub model: String,
    pub port: u16,
    pub secret_key: String,
    pub session_ttl: Duration,
}

impl Default for Config {
    fn default() -> Config {
        let values = ConfigKey::iter()
            .map(|key| {
                return (key, Config::default_value(key));
            })
            .collect::<HashMap<ConfigKey, String>>();

        return Config {
            backend_health_check_timeout: Duration::from_millis(5000),
            config_file: path::PathBuf::from(&values[&ConfigKey::ConfigFile]),
            credentials: None,
            fallback_model: values[&ConfigKey::FallbackModel].to_string(),
            gemini_token: "".to_string(),
            gemini_url: values[&ConfigKey::GeminiURL].to_string(),
            generation_timeout: Duration::from_millis(30000),
            host: values[&ConfigKey::Host].to_string(),
            log_dir: None,
            model: values[&ConfigKey::Model].to_string(),
            port: 5000,
            secret_key: values[&ConfigKey::SecretKey].to_string(),
            session_ttl: Duration::from_secs(43200),
        };
    }
}

impl Config {
    pub fn default_value(key: ConfigKey) -> String {
        let config_path = dirs::config_dir()
            .unwrap_or_else(|| return path::PathBuf::from("."))
            .join("agrichat/config.toml");

        let res = match key {
            ConfigKey::BackendHealthCheckTimeout => "5000",
            ConfigKey::FallbackModel => "gemini-pro",
            ConfigKey::GeminiURL => "https://generativelanguage.googleapis.com",
            ConfigKey::GenerationTimeout => "30000",
            ConfigKey::Host => "127.0.0.1",
            ConfigKey::Model => "gemini-2.5-flash-lite",
            ConfigKey::Port => "5000",
            ConfigKey::SecretKey => "dev_secret_key",
            ConfigKey::SessionTtl => "43200",

            // Special
            ConfigKey::ConfigFile => return config_path.to_string_lossy().to_string(),
            ConfigKey::GeminiToken => "",
            ConfigKey::LogDir => "",
        };

        return res.to_string();
    }

    /// True when the session secret was never overridden.
    pub fn uses_default_secret_key(&self) -> bool {
        return self.secret_key == Config::default_value(ConfigKey::SecretKey);
    }

    pub async fn load(clap_arg_matches: Vec<&ArgMatches>) -> Result<Config> {
        let mut values = ConfigKey::iter()
            .map(|key| {
                return (key, Config::default_value(key));
            })
            .collect::<HashMap<ConfigKey, String>>();

        let mut config_file = Config::default_value(ConfigKey::ConfigFile);
        for matches in clap_arg_matches.as_slice() {
            if let Ok(Some(arg_config_file)) =
                matches.try_get_one::<String>(&ConfigKey::ConfigFile.to_string())
            {
                config_file = arg_config_file.to_string();
            }
        }
        values.insert(ConfigKey::ConfigFile, config_file.to_string());

        let mut credentials = None;
        let config_path = path::PathBuf::from(&config_file);
        if config_path.exists() {
            let toml_str = fs::read_to_string(&config_path)
                .await
                .with_context(|| return format!("Failed to read config file {config_file}"))?;
            let doc = toml_str.parse::<toml_edit::Document>()?;

            for key in ConfigKey::iter() {
                if key == ConfigKey::ConfigFile {
                    continue;
                }
                if let Some(val) = doc.get(&key.to_string()) {
                    if let Some(val_int) = val.as_integer() {
                        values.insert(key, val_int.to_string());
                    } else if let Some(val_str) = val.as_str() {
                        if val_str.is_empty() {
                            continue;
                        }
                        values.insert(key, val_str.to_string());
                    } else {
                        bail!(format!(
                            "config.toml has an invalid value for key '{key}', expected a string or integer"
                        ));
                    }
                }
            }

            if let Some(table) = doc.get(CREDENTIALS_TABLE) {
                credentials = Some(Config::parse_credentials(table)?);
            }
        }

        for key in ConfigKey::iter() {
            for matches in clap_arg_matches.as_slice() {
                if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                    if val.is_empty() {
                        continue;
                    }
                    values.insert(key, val.to_string());
                }
            }
        }

        let config = Config::from_values(&values, credentials)?;

        tracing::debug!(
            config_file = config_file,
            host = config.host,
            port = config.port,
            model = config.model,
            fallback_model = config.fallback_model,
            custom_credentials = config.credentials.is_some(),
            "config"
        );

        return Ok(config);
    }

    fn parse_credentials(item: &toml_edit::Item) -> Result<HashMap<String, String>> {
        let table = match item.as_table_like() {
            Some(table) => table,
            None => bail!(format!(
                "config.toml key '{CREDENTIALS_TABLE}' must be a table"
            )),
        };

        let mut credentials = HashMap::new();
        for (email, password) in table.iter() {
            let password = match password.as_str() {
                Some(password) if !password.is_empty() => password,
                _ => bail!(format!(
                    "config.toml credential for '{email}' must be a non-empty string"
                )),
            };
            if email.trim().is_empty() {
                bail!("config.toml credentials cannot have an empty email");
            }
            credentials.insert(email.to_string(), password.to_string());
        }

        if credentials.is_empty() {
            bail!("config.toml credentials table is empty, no one would be able to sign in");
        }

        return Ok(credentials);
    }

    fn parse_millis(values: &HashMap<ConfigKey, String>, key: ConfigKey) -> Result<Duration> {
        let millis = values[&key]
            .parse::<u64>()
            .with_context(|| return format!("'{key}' must be a number of milliseconds"))?;
        if millis == 0 {
            bail!(format!("'{key}' must be greater than zero"));
        }

        return Ok(Duration::from_millis(millis));
    }

    fn parse_secs(values: &HashMap<ConfigKey, String>, key: ConfigKey) -> Result<Duration> {
        let secs = values[&key]
            .parse::<u64>()
            .with_context(|| return format!("'{key}' must be a number of seconds"))?;
        if secs == 0 {
            bail!(format!("'{key}' must be greater than zero"));
        }

        return Ok(Duration::from_secs(secs));
    }

    pub fn from_values(
        values: &HashMap<ConfigKey, String>,
        credentials: Option<HashMap<String, String>>,
    ) -> Result<Config> {
        let gemini_token = values[&ConfigKey::GeminiToken].trim().to_string();
        if gemini_token.is_empty() {
            bail!("Gemini API key is not defined. Set GEMINI_API_KEY or 'gemini-token' in the config file.");
        }

        let port = values[&ConfigKey::Port]
            .parse::<u16>()
            .with_context(|| return format!("'{}' must be a valid port", ConfigKey::Port))?;

        let log_dir = match values[&ConfigKey::LogDir].as_str() {
            "" => None,
            dir => Some(path::PathBuf::from(dir)),
        };

        return Ok(Config {
            backend_health_check_timeout: Config::parse_millis(
                values,
                ConfigKey::BackendHealthCheckTimeout,
            )?,
            config_file: path::PathBuf::from(&values[&ConfigKey::ConfigFile]),
            credentials,
            fallback_model: values[&ConfigKey::FallbackModel].to_string(),
            gemini_token,
            gemini_url: values[&ConfigKey::GeminiURL].to_string(),
            generation_timeout: Config::parse_millis(values, ConfigKey::GenerationTimeout)?,
            host: values[&ConfigKey::Host].to_string(),
            log_dir,
            model: values[&ConfigKey::Model].to_string(),
            port,
            secret_key: values[&ConfigKey::SecretKey].to_string(),
            session_ttl: Config::parse_secs(values, ConfigKey::SessionTtl)?,
        });
    }

    /// Commented config file listing every option with its default, built from
    /// the help text of the matching flags.
    pub fn serialize_default(cmd: Command) -> String {
        let mut sections = ConfigKey::iter()
            .filter_map(|key| {
                if key == ConfigKey::ConfigFile {
                    return None;
                }

                let arg = cmd
                    .get_arguments()
                    .find(|e| return e.get_long() == Some(key.to_string().as_str()))?;

                let description = arg
                    .get_help()
                    .map(|help| return help.to_string())
                    .unwrap_or_default()
                    .split("[default:")
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();

                let mut val = Config::default_value(key);
                if val.is_empty() {
                    val = format!("# {key} = \"\"");
                } else if val.parse::<i64>().is_ok() {
                    val = format!("{key} = {val}");
                } else {
                    val = format!("{key} = \"{val}\"");
                }

                return Some(format!("# {description}\n{val}"));
            })
            .collect::<Vec<String>>();

        sections.push(
            [
                "# Accounts allowed to sign in, as email = \"password\" pairs. Replaces the built in demo accounts when present.",
                "# [credentials]",
                "# \"farmer@example.com\" = \"change-me\"",
            ]
            .join("\n"),
        );

        return sections.join("\n\n");
    }
}
