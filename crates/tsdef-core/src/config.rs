use crate::constants;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub resolver: ResolverConfig,
    pub snippet: SnippetConfig,
    pub transport: TransportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub backend: ResolverBackendKind,
    /// Command line of the language server, used by the `language_server` backend.
    pub server_command: Vec<String>,
    pub session: SessionPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            backend: ResolverBackendKind::Syntax,
            server_command: vec!["typescript-language-server".into(), "--stdio".into()],
            session: SessionPolicy::PerQuery,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverBackendKind {
    #[default]
    Syntax,
    LanguageServer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPolicy {
    /// A fresh resolver session for every query, released when it ends.
    #[default]
    PerQuery,
    /// Sessions are leased from a pool keyed by project root.
    Pooled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetConfig {
    pub context_before: usize,
    pub context_after: usize,
    pub expansion: ExpansionStrategy,
}

impl Default for SnippetConfig {
    fn default() -> Self {
        Self {
            context_before: 1,
            context_after: 1,
            expansion: ExpansionStrategy::Indentation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionStrategy {
    #[default]
    Indentation,
    /// Use the resolver's enclosing span when present, indentation otherwise.
    EnclosingSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub bind_addr: String,
    pub port: u16,
    pub session_routing: SessionRouting,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: constants::DEFAULT_BIND_ADDR.to_string(),
            port: constants::DEFAULT_SSE_PORT,
            session_routing: SessionRouting::BySessionId,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRouting {
    /// `POST /messages?sessionId=..` reaches exactly that session.
    #[default]
    BySessionId,
    /// Every message goes to the most recently opened session.
    LatestSession,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

macro_rules! impl_from_str_via_serde {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromStr for $ty {
                type Err = String;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    serde_json::from_value(serde_json::Value::String(s.trim().to_string()))
                        .map_err(|e| e.to_string())
                }
            }
        )*
    };
}

impl_from_str_via_serde!(
    ResolverBackendKind,
    SessionPolicy,
    ExpansionStrategy,
    SessionRouting
);

impl Config {
    /// Load config layered as: defaults, global file, project file, explicit
    /// file, then `TSDEF_*` environment variables.
    pub fn load_with_file(
        workspace: Option<&Path>,
        config_file: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global) = global_config_path()
            && global.is_file()
        {
            config = config.merge_file(&global)?;
        }

        if let Some(ws) = workspace {
            let project = ws.join(constants::PROJECT_CONFIG_FILE);
            if project.is_file() {
                config = config.merge_file(&project)?;
            }
        }

        if let Some(path) = config_file {
            config = config.merge_file(path)?;
        }

        config.apply_env_overrides_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay the keys present in `path` on top of `self`.
    fn merge_file(self, path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let overlay: toml::Value = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let base = toml::Value::try_from(&self).map_err(|e| ConfigError::InvalidValue {
            key: "<root>".into(),
            value: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let merged = merge_toml(base, overlay);
        merged
            .try_into()
            .map_err(|source: toml::de::Error| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Apply `TSDEF_*` overrides. The lookup is injected so tests do not
    /// have to touch the process environment.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}{}", constants::ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
        };

        if let Some(v) = var("RESOLVER_BACKEND") {
            self.resolver.backend = parse_env("TSDEF_RESOLVER_BACKEND", &v)?;
        }
        if let Some(v) = var("RESOLVER_SERVER_COMMAND") {
            self.resolver.server_command = v.split_whitespace().map(String::from).collect();
        }
        if let Some(v) = var("RESOLVER_SESSION") {
            self.resolver.session = parse_env("TSDEF_RESOLVER_SESSION", &v)?;
        }
        if let Some(v) = var("SNIPPET_CONTEXT_BEFORE") {
            self.snippet.context_before = parse_env("TSDEF_SNIPPET_CONTEXT_BEFORE", &v)?;
        }
        if let Some(v) = var("SNIPPET_CONTEXT_AFTER") {
            self.snippet.context_after = parse_env("TSDEF_SNIPPET_CONTEXT_AFTER", &v)?;
        }
        if let Some(v) = var("SNIPPET_EXPANSION") {
            self.snippet.expansion = parse_env("TSDEF_SNIPPET_EXPANSION", &v)?;
        }
        if let Some(v) = var("BIND_ADDR") {
            self.transport.bind_addr = v.trim().to_string();
        }
        if let Some(v) = var("PORT") {
            self.transport.port = parse_env("TSDEF_PORT", &v)?;
        }
        if let Some(v) = var("SESSION_ROUTING") {
            self.transport.session_routing = parse_env("TSDEF_SESSION_ROUTING", &v)?;
        }
        if let Some(v) = var("LOG_LEVEL") {
            self.logging.level = v.trim().to_string();
        }

        if self.resolver.server_command.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "resolver.server_command".into(),
                value: String::new(),
                reason: "command must not be empty".into(),
            });
        }
        Ok(())
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            toml::Value::Table(base)
        }
        (_, overlay) => overlay,
    }
}

/// `<config_dir>/tsdef/config.toml`, when the platform has a config dir.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tsdef").join(constants::GLOBAL_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.resolver.backend, ResolverBackendKind::Syntax);
        assert_eq!(config.resolver.session, SessionPolicy::PerQuery);
        assert_eq!(config.snippet.context_before, 1);
        assert_eq!(config.snippet.context_after, 1);
        assert_eq!(config.snippet.expansion, ExpansionStrategy::Indentation);
        assert_eq!(config.transport.port, 3012);
        assert_eq!(config.transport.session_routing, SessionRouting::BySessionId);
    }

    #[test]
    fn project_file_overrides_only_present_keys() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(constants::PROJECT_CONFIG_FILE),
            r#"
[resolver]
backend = "language_server"
session = "pooled"

[transport]
port = 4100
"#,
        )
        .unwrap();

        let config = Config::default()
            .merge_file(&tmp.path().join(constants::PROJECT_CONFIG_FILE))
            .unwrap();
        assert_eq!(config.resolver.backend, ResolverBackendKind::LanguageServer);
        assert_eq!(config.resolver.session, SessionPolicy::Pooled);
        assert_eq!(
            config.resolver.server_command,
            vec!["typescript-language-server", "--stdio"]
        );
        assert_eq!(config.transport.port, 4100);
        assert_eq!(config.transport.bind_addr, "127.0.0.1");
    }

    #[test]
    fn explicit_file_is_applied_after_project_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(constants::PROJECT_CONFIG_FILE),
            "[snippet]\ncontext_before = 3\ncontext_after = 3\n",
        )
        .unwrap();
        let explicit = tmp.path().join("custom.toml");
        std::fs::write(&explicit, "[snippet]\ncontext_after = 0\n").unwrap();

        let config = Config::load_with_file(Some(tmp.path()), Some(&explicit)).unwrap();
        assert_eq!(config.snippet.context_before, 3);
        assert_eq!(config.snippet.context_after, 0);
    }

    #[test]
    fn malformed_file_reports_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "[resolver\nbackend = ").unwrap();
        let err = Config::default().merge_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn env_overrides_apply_on_top_of_files() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("TSDEF_RESOLVER_BACKEND", "language_server"),
            ("TSDEF_RESOLVER_SERVER_COMMAND", "vtsls --stdio"),
            ("TSDEF_PORT", "4500"),
            ("TSDEF_SESSION_ROUTING", "latest_session"),
            ("TSDEF_SNIPPET_EXPANSION", "enclosing_span"),
            ("TSDEF_LOG_LEVEL", "debug"),
        ]);
        let mut config = Config::default();
        config
            .apply_env_overrides_from(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.resolver.backend, ResolverBackendKind::LanguageServer);
        assert_eq!(config.resolver.server_command, vec!["vtsls", "--stdio"]);
        assert_eq!(config.transport.port, 4500);
        assert_eq!(
            config.transport.session_routing,
            SessionRouting::LatestSession
        );
        assert_eq!(config.snippet.expansion, ExpansionStrategy::EnclosingSpan);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn invalid_env_value_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_env_overrides_from(|k| (k == "TSDEF_PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TSDEF_PORT"));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = Config::default();
        config
            .apply_env_overrides_from(|k| (k == "TSDEF_RESOLVER_BACKEND").then(|| "  ".to_string()))
            .unwrap();
        assert_eq!(config.resolver.backend, ResolverBackendKind::Syntax);
    }
}
