use std::time::Duration;

use chatorg_core::{ApiPaths, ClientConfig};
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://chatgpt.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ITEM_LIMIT: usize = 50;
const DEFAULT_PAGE_SIZE: u32 = 50;
const DEFAULT_CONTAINER_LIMIT: usize = 50;
const DEFAULT_ITEMS_PER_CONTAINER: u32 = 5;
const DEFAULT_PER_CONTAINER_LIMIT: usize = 5000;
const DEFAULT_STOP_AFTER_OUT_OF_SCOPE: u32 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("CHATORG_TOKEN is not set")]
    MissingToken,
}

/// Engine settings; command fields override them per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub token: Option<String>,
    pub base_url: String,
    /// Endpoint templates; each `CHATORG_PATH_*` override must start with `/`.
    pub paths: ApiPaths,
    pub timeout: Duration,
    pub item_limit: usize,
    pub page_size: u32,
    pub container_limit: usize,
    pub items_per_container: u32,
    pub per_container_limit: usize,
    pub since_updated_ms: Option<i64>,
    pub stop_after_out_of_scope: u32,
    /// `None` keeps each operation's own default.
    pub throttle_ms: Option<u64>,
    pub strict_ordering: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            paths: ApiPaths::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            item_limit: DEFAULT_ITEM_LIMIT,
            page_size: DEFAULT_PAGE_SIZE,
            container_limit: DEFAULT_CONTAINER_LIMIT,
            items_per_container: DEFAULT_ITEMS_PER_CONTAINER,
            per_container_limit: DEFAULT_PER_CONTAINER_LIMIT,
            since_updated_ms: None,
            stop_after_out_of_scope: DEFAULT_STOP_AFTER_OUT_OF_SCOPE,
            throttle_ms: None,
            strict_ordering: false,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source. Values that do not parse
    /// fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let positive = |name: &str, default: u64| {
            lookup(name)
                .and_then(|value| value.trim().parse::<u64>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(default)
        };

        let token = lookup("CHATORG_TOKEN")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let base_url = lookup("CHATORG_BASE_URL")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.base_url);
        let path = |name: &str, default: String| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| value.starts_with('/'))
                .unwrap_or(default)
        };
        let paths = ApiPaths {
            conversations: path("CHATORG_PATH_CONVERSATIONS", defaults.paths.conversations),
            conversation: path("CHATORG_PATH_CONVERSATION", defaults.paths.conversation),
            gizmos_root: path("CHATORG_PATH_GIZMOS_ROOT", defaults.paths.gizmos_root),
            gizmos_sidebar: path("CHATORG_PATH_GIZMOS_SIDEBAR", defaults.paths.gizmos_sidebar),
            gizmo_conversations: path(
                "CHATORG_PATH_GIZMO_CONVERSATIONS",
                defaults.paths.gizmo_conversations,
            ),
            ui_conversation: path("CHATORG_PATH_UI_CONVERSATION", defaults.paths.ui_conversation),
            ui_gizmo: path("CHATORG_PATH_UI_GIZMO", defaults.paths.ui_gizmo),
        };
        let since_updated_ms = lookup("CHATORG_SINCE_UPDATED_MS")
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|value| *value > 0);
        let stop_after_out_of_scope = lookup("CHATORG_STOP_AFTER_OUT_OF_SCOPE")
            .and_then(|value| value.trim().parse::<u32>().ok())
            .unwrap_or(defaults.stop_after_out_of_scope);
        let throttle_ms = lookup("CHATORG_THROTTLE_MS")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|value| *value > 0);
        let strict_ordering = lookup("CHATORG_STRICT_ORDERING")
            .map(|value| {
                matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "1" | "true" | "yes" | "on"
                )
            })
            .unwrap_or(defaults.strict_ordering);

        Self {
            token,
            base_url,
            paths,
            timeout: Duration::from_secs(positive("CHATORG_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)),
            item_limit: to_usize(positive("CHATORG_ITEM_LIMIT", DEFAULT_ITEM_LIMIT as u64)),
            page_size: to_u32(positive("CHATORG_PAGE_SIZE", u64::from(DEFAULT_PAGE_SIZE))),
            container_limit: to_usize(positive(
                "CHATORG_CONTAINER_LIMIT",
                DEFAULT_CONTAINER_LIMIT as u64,
            )),
            items_per_container: to_u32(positive(
                "CHATORG_ITEMS_PER_CONTAINER",
                u64::from(DEFAULT_ITEMS_PER_CONTAINER),
            )),
            per_container_limit: to_usize(positive(
                "CHATORG_PER_CONTAINER_LIMIT",
                DEFAULT_PER_CONTAINER_LIMIT as u64,
            )),
            since_updated_ms,
            stop_after_out_of_scope,
            throttle_ms,
            strict_ordering,
        }
    }

    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let token = self.token.clone().ok_or(ConfigError::MissingToken)?;
        Ok(ClientConfig {
            base_url: self.base_url.clone(),
            timeout: self.timeout,
            paths: self.paths.clone(),
            ..ClientConfig::new(token)
        })
    }
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

fn to_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> EngineConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        EngineConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(config(&[]), EngineConfig::default());
        assert_eq!(EngineConfig::default().base_url, "https://chatgpt.com");
        assert_eq!(EngineConfig::default().timeout, Duration::from_secs(30));
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("CHATORG_TOKEN", " secret "),
            ("CHATORG_BASE_URL", "http://localhost:9000"),
            ("CHATORG_TIMEOUT_SECS", "5"),
            ("CHATORG_ITEM_LIMIT", "500"),
            ("CHATORG_PAGE_SIZE", "20"),
            ("CHATORG_SINCE_UPDATED_MS", "1700000000000"),
            ("CHATORG_STOP_AFTER_OUT_OF_SCOPE", "0"),
            ("CHATORG_THROTTLE_MS", "900"),
            ("CHATORG_STRICT_ORDERING", "yes"),
        ]);
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.item_limit, 500);
        assert_eq!(config.page_size, 20);
        assert_eq!(config.since_updated_ms, Some(1_700_000_000_000));
        assert_eq!(config.stop_after_out_of_scope, 0);
        assert_eq!(config.throttle_ms, Some(900));
        assert!(config.strict_ordering);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let config = config(&[
            ("CHATORG_ITEM_LIMIT", "lots"),
            ("CHATORG_PAGE_SIZE", "0"),
            ("CHATORG_STOP_AFTER_OUT_OF_SCOPE", "-1"),
            ("CHATORG_SINCE_UPDATED_MS", "yesterday"),
            ("CHATORG_TOKEN", "   "),
        ]);
        assert_eq!(config.item_limit, 50);
        assert_eq!(config.page_size, 50);
        assert_eq!(config.stop_after_out_of_scope, 3);
        assert_eq!(config.since_updated_ms, None);
        assert_eq!(config.token, None);
    }

    #[test]
    fn path_overrides_need_a_leading_slash() {
        let config = config(&[
            ("CHATORG_TOKEN", "t"),
            ("CHATORG_PATH_GIZMOS_ROOT", " /api/v2/projects "),
            ("CHATORG_PATH_UI_CONVERSATION", "/chat/{id}"),
            ("CHATORG_PATH_CONVERSATIONS", "api/v2/chats"),
        ]);
        let defaults = ApiPaths::default();
        assert_eq!(config.paths.gizmos_root, "/api/v2/projects");
        assert_eq!(config.paths.ui_conversation, "/chat/{id}");
        assert_eq!(config.paths.conversations, defaults.conversations);
        assert_eq!(config.paths.gizmos_sidebar, defaults.gizmos_sidebar);

        let client = config.client_config().unwrap();
        assert_eq!(client.paths, config.paths);
    }

    #[test]
    fn client_config_requires_token() {
        assert_eq!(
            EngineConfig::default().client_config().unwrap_err(),
            ConfigError::MissingToken
        );
        let client = config(&[("CHATORG_TOKEN", "t"), ("CHATORG_TIMEOUT_SECS", "7")])
            .client_config()
            .unwrap();
        assert_eq!(client.token, "t");
        assert_eq!(client.timeout, Duration::from_secs(7));
        assert_eq!(client.base_url, "https://chatgpt.com");
    }
}
