//! Provider configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, the TOML
//! file (default `config/keyhole.toml`), `KEYHOLE_*` environment variables,
//! and finally the `serve` command's flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config/keyhole.toml";

/// Prefix shared by every environment override.
const ENV_PREFIX: &str = "KEYHOLE_";

/// Errors produced while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`ProviderConfig`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// An environment override holds a value of the wrong type.
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidOverride {
        var: String,
        value: String,
        reason: String,
    },
}

/// Settings for the `[web]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WebSection {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for WebSection {
    fn default() -> Self {
        let web = keyhole_web::WebConfig::default();
        Self {
            bind_addr: web.bind_addr,
            port: web.port,
        }
    }
}

/// Everything the `serve` command needs to run a provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Display name; also the identity asserted to consumers.
    pub name: String,
    pub about: String,
    /// Sealed private key checked against the login passphrase.
    pub private_key_path: PathBuf,
    /// File served verbatim at `/key`.
    pub public_key_path: PathBuf,
    /// File served verbatim at `/avatar`.
    pub avatar_path: PathBuf,
    pub avatar_content_type: String,
    /// Path on the consumer the browser is redirected to after login.
    pub callback_path: String,
    /// Login template identifier.
    pub template: String,
    pub consumer_timeout_secs: u64,
    /// Handshake record lifetime; 0 keeps records forever.
    pub token_ttl_secs: u64,
    pub purge_interval_secs: u64,
    pub web: WebSection,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "keyhole".into(),
            about: String::new(),
            private_key_path: PathBuf::from("keys/private.key"),
            public_key_path: PathBuf::from("keys/public.key"),
            avatar_path: PathBuf::from("assets/avatar.png"),
            avatar_content_type: "image/png".into(),
            callback_path: keyhole_auth::coordinator::DEFAULT_CALLBACK_PATH.into(),
            template: keyhole_web::frontend::LOGIN_TEMPLATE.into(),
            consumer_timeout_secs: 5,
            token_ttl_secs: 600,
            purge_interval_secs: 60,
            web: WebSection::default(),
        }
    }
}

impl ProviderConfig {
    /// Load `path` and apply environment overrides.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))?;
        Ok(config)
    }

    /// Read `path` without consulting the environment.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply `KEYHOLE_*` overrides, reading variables through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |suffix: &str| {
            let var = format!("{ENV_PREFIX}{suffix}");
            lookup(&var).map(|value| (var, value))
        };

        if let Some((_, v)) = get("NAME") {
            self.name = v;
        }
        if let Some((_, v)) = get("ABOUT") {
            self.about = v;
        }
        if let Some((_, v)) = get("PRIVATE_KEY_PATH") {
            self.private_key_path = v.into();
        }
        if let Some((_, v)) = get("PUBLIC_KEY_PATH") {
            self.public_key_path = v.into();
        }
        if let Some((_, v)) = get("AVATAR_PATH") {
            self.avatar_path = v.into();
        }
        if let Some((_, v)) = get("AVATAR_CONTENT_TYPE") {
            self.avatar_content_type = v;
        }
        if let Some((_, v)) = get("CALLBACK_PATH") {
            self.callback_path = v;
        }
        if let Some((_, v)) = get("TEMPLATE") {
            self.template = v;
        }
        if let Some((var, v)) = get("CONSUMER_TIMEOUT_SECS") {
            self.consumer_timeout_secs = parse_number(var, v)?;
        }
        if let Some((var, v)) = get("TOKEN_TTL_SECS") {
            self.token_ttl_secs = parse_number(var, v)?;
        }
        if let Some((var, v)) = get("PURGE_INTERVAL_SECS") {
            self.purge_interval_secs = parse_number(var, v)?;
        }
        if let Some((_, v)) = get("BIND_ADDR") {
            self.web.bind_addr = v;
        }
        if let Some((var, v)) = get("PORT") {
            self.web.port = parse_number(var, v)?;
        }

        Ok(())
    }

    /// Fetch timeout for consumer profile lookups.
    pub fn consumer_timeout(&self) -> Duration {
        Duration::from_secs(self.consumer_timeout_secs)
    }

    /// Handshake record lifetime, or `None` when expiry is disabled.
    pub fn token_ttl(&self) -> Option<chrono::Duration> {
        match self.token_ttl_secs {
            0 => None,
            secs => chrono::Duration::try_seconds(secs.min(i64::MAX as u64) as i64),
        }
    }

    /// Interval of the expiry sweep; `None` when there is nothing to sweep.
    pub fn purge_interval(&self) -> Option<Duration> {
        if self.token_ttl_secs == 0 || self.purge_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.purge_interval_secs))
        }
    }

    /// Listener settings for the web server.
    pub fn web_config(&self) -> keyhole_web::WebConfig {
        keyhole_web::WebConfig {
            bind_addr: self.web.bind_addr.clone(),
            port: self.web.port,
            purge_interval: self.purge_interval(),
        }
    }
}

fn parse_number<T>(var: String, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value.trim().parse() {
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::InvalidOverride {
            reason: e.to_string(),
            var,
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let c = ProviderConfig::default();
        assert_eq!(c.name, "keyhole");
        assert_eq!(c.private_key_path, PathBuf::from("keys/private.key"));
        assert_eq!(c.callback_path, "/login/callback");
        assert_eq!(c.template, "login");
        assert_eq!(c.consumer_timeout(), Duration::from_secs(5));
        assert_eq!(c.token_ttl(), Some(chrono::Duration::seconds(600)));
        assert_eq!(c.purge_interval(), Some(Duration::from_secs(60)));
        assert_eq!(c.web.bind_addr, "127.0.0.1");
        assert_eq!(c.web.port, 3000);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = ProviderConfig::from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(c, ProviderConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyhole.toml");
        std::fs::write(
            &path,
            r#"
name = "alice"
token_ttl_secs = 0

[web]
port = 8080
"#,
        )
        .unwrap();

        let c = ProviderConfig::from_file(&path).unwrap();
        assert_eq!(c.name, "alice");
        assert_eq!(c.web.port, 8080);
        assert_eq!(c.web.bind_addr, "127.0.0.1");
        assert_eq!(c.avatar_content_type, "image/png");
        assert!(c.token_ttl().is_none());
        assert!(c.purge_interval().is_none());
        assert!(c.web_config().purge_interval.is_none());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyhole.toml");
        std::fs::write(&path, "name = [unterminated").unwrap();

        let err = ProviderConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn wrong_type_in_file_is_a_parse_error() {
        assert!(ProviderConfig::from_toml("token_ttl_secs = \"soon\"").is_err());
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut c = ProviderConfig::from_toml("name = \"from-file\"").unwrap();
        c.apply_overrides(env(&[
            ("KEYHOLE_NAME", "from-env"),
            ("KEYHOLE_PORT", "4000"),
            ("KEYHOLE_BIND_ADDR", "0.0.0.0"),
            ("KEYHOLE_TOKEN_TTL_SECS", " 30 "),
            ("KEYHOLE_PRIVATE_KEY_PATH", "/etc/keyhole/sealed.key"),
        ]))
        .unwrap();

        assert_eq!(c.name, "from-env");
        assert_eq!(c.web.port, 4000);
        assert_eq!(c.web.bind_addr, "0.0.0.0");
        assert_eq!(c.token_ttl_secs, 30);
        assert_eq!(c.private_key_path, PathBuf::from("/etc/keyhole/sealed.key"));
    }

    #[test]
    fn non_numeric_override_is_rejected() {
        let mut c = ProviderConfig::default();
        let err = c
            .apply_overrides(env(&[("KEYHOLE_PORT", "eighty")]))
            .unwrap_err();

        match err {
            ConfigError::InvalidOverride { var, value, .. } => {
                assert_eq!(var, "KEYHOLE_PORT");
                assert_eq!(value, "eighty");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn no_overrides_leaves_config_untouched() {
        let mut c = ProviderConfig::default();
        c.apply_overrides(|_| None).unwrap();
        assert_eq!(c, ProviderConfig::default());
    }
}
