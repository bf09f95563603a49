//! Hook configuration with environment variable priority
//!
//! Configuration is resolved in this order (first found wins):
//! 1. Environment variables (CFHOOK_*)
//! 2. Config file (cloudflare.toml)
//! 3. Default values (where applicable)
//!
//! Unlike most settings files, the config file is mandatory: a hook that
//! cannot read its credentials fails before making any network call.

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::challenge::PropagationTiming;
use crate::error::{HookError, HookResult};
use crate::secret::resolve_secret;

/// Environment variable prefix
const ENV_PREFIX: &str = "CFHOOK";

/// Default config file location (next to the ACME client's state)
pub const DEFAULT_CONFIG_PATH: &str = "/var/lib/acme/cloudflare.toml";

pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Cloudflare allows 1200 requests per 5 minutes per user
const DEFAULT_REQUESTS_PER_SECOND: u32 = 4;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const DNS_PORT: u16 = 53;

/// Hook configuration (parsed from TOML, can be overridden by env)
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct HookConfig {
    /// Cloudflare API configuration
    pub cloudflare: Option<CloudflareConfig>,

    /// Propagation check configuration
    pub dns: Option<DnsConfig>,
}

/// Cloudflare API configuration
///
/// Credential values accept `env://VAR` and `file:///path` references.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct CloudflareConfig {
    /// Account email (global API key authentication)
    pub email: Option<String>,

    /// Global API key
    pub api_key: Option<String>,

    /// Scoped API token with Zone:Read and DNS:Edit (preferred over email + key)
    pub api_token: Option<String>,

    /// API base URL
    pub api_base: Option<String>,

    pub requests_per_second: Option<u32>,

    pub request_timeout_secs: Option<u64>,
}

/// DNS propagation check configuration
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct DnsConfig {
    /// Resolvers to query (`IP` or `IP:port`); system resolvers if empty
    pub servers: Option<Vec<String>>,

    pub settle_delay_secs: Option<u64>,

    pub poll_interval_secs: Option<u64>,

    /// Upper bound for the poll interval when backing off
    pub max_poll_interval_secs: Option<u64>,

    /// Multiplier applied to the poll interval after each miss (1.0 = fixed)
    pub backoff_factor: Option<f64>,

    /// Give up after this long and fail the challenge
    pub max_wait_secs: Option<u64>,
}

/// Cloudflare authentication
#[derive(Clone)]
pub enum CloudflareCredentials {
    /// Scoped API token, sent as a bearer token
    ApiToken(String),

    /// Account email and global API key, sent as `X-Auth-Email`/`X-Auth-Key`
    GlobalKey { email: String, api_key: String },
}

impl std::fmt::Debug for CloudflareCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiToken(_) => f.write_str("ApiToken(..)"),
            Self::GlobalKey { email, .. } => f
                .debug_struct("GlobalKey")
                .field("email", email)
                .finish_non_exhaustive(),
        }
    }
}

/// Resolved hook configuration with actual secret values
#[derive(Debug)]
pub struct ResolvedConfig {
    pub cloudflare: ResolvedCloudflareConfig,
    /// Empty means system resolvers
    pub resolvers: Vec<SocketAddr>,
    pub timing: PropagationTiming,
}

/// Resolved Cloudflare configuration with actual secret values
#[derive(Debug, Clone)]
pub struct ResolvedCloudflareConfig {
    pub api_base: String,
    pub credentials: CloudflareCredentials,
    pub requests_per_second: u32,
    pub request_timeout: Duration,
}

/// Parse a resolver address, defaulting to port 53
pub fn parse_resolver_addr(value: &str) -> HookResult<SocketAddr> {
    let value = value.trim();
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(addr);
    }
    value
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
        .map_err(|_| HookError::config(format!("Invalid DNS server address '{}'", value)))
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{}_{}", ENV_PREFIX, name)).ok()
}

impl HookConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> HookResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HookError::config(format!("Unable to read {}: {}", path.display(), e))
        })?;

        let config = toml::from_str(&content).map_err(|e| {
            HookError::config(format!("Unable to parse {}: {}", path.display(), e))
        })?;

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Resolve configuration from environment variables first, then config file
    pub fn resolve(self) -> HookResult<ResolvedConfig> {
        self.resolve_with(get_env)
    }

    /// Resolve with a custom source for `CFHOOK_*` overrides (names without prefix)
    pub fn resolve_with<F>(self, env: F) -> HookResult<ResolvedConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cf_config = self.cloudflare.unwrap_or_default();
        let dns_config = self.dns.unwrap_or_default();

        // Credentials: ENV > config; a token wins over email + key
        let api_token = env("API_TOKEN").or(cf_config.api_token);
        let email = env("EMAIL").or(cf_config.email);
        let api_key = env("API_KEY").or(cf_config.api_key);

        let credentials = match (api_token, email, api_key) {
            (Some(token), _, _) => CloudflareCredentials::ApiToken(resolve_secret(&token)?),
            (None, Some(email), Some(key)) => CloudflareCredentials::GlobalKey {
                email: resolve_secret(&email)?,
                api_key: resolve_secret(&key)?,
            },
            (None, Some(_), None) => {
                return Err(HookError::config(
                    "Cloudflare API key required with email. Set CFHOOK_API_KEY or cloudflare.api_key in config",
                ))
            }
            (None, None, Some(_)) => {
                return Err(HookError::config(
                    "Cloudflare account email required with API key. Set CFHOOK_EMAIL or cloudflare.email in config",
                ))
            }
            (None, None, None) => {
                return Err(HookError::config(
                    "Cloudflare credentials required. Set cloudflare.api_token, or cloudflare.email and cloudflare.api_key in config",
                ))
            }
        };

        let requests_per_second = cf_config
            .requests_per_second
            .unwrap_or(DEFAULT_REQUESTS_PER_SECOND);
        if requests_per_second == 0 {
            return Err(HookError::config(
                "cloudflare.requests_per_second must be greater than zero",
            ));
        }

        // DNS servers: ENV (comma separated) > config > system
        let servers: Vec<String> = env("DNS_SERVERS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .or(dns_config.servers)
            .unwrap_or_default();
        let resolvers = servers
            .iter()
            .map(|s| parse_resolver_addr(s))
            .collect::<HookResult<Vec<_>>>()?;

        let defaults = PropagationTiming::default();
        let max_wait = match env("MAX_WAIT_SECS") {
            Some(v) => Some(v.parse::<u64>().map_err(|_| {
                HookError::config(format!("CFHOOK_MAX_WAIT_SECS is not a number: '{}'", v))
            })?),
            None => dns_config.max_wait_secs,
        };
        let poll_interval = dns_config
            .poll_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_interval);
        let timing = PropagationTiming {
            settle_delay: dns_config
                .settle_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.settle_delay),
            poll_interval,
            max_poll_interval: dns_config
                .max_poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(poll_interval)
                .max(poll_interval),
            backoff_factor: dns_config.backoff_factor.unwrap_or(defaults.backoff_factor),
            max_wait: max_wait
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_wait),
        };
        timing.validate()?;

        if resolvers.is_empty() {
            tracing::debug!("No DNS servers configured, using system resolvers");
        } else {
            tracing::debug!(?resolvers, "Using configured DNS servers");
        }

        Ok(ResolvedConfig {
            cloudflare: ResolvedCloudflareConfig {
                api_base: cf_config
                    .api_base
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                credentials,
                requests_per_second,
                request_timeout: Duration::from_secs(
                    cf_config
                        .request_timeout_secs
                        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
                ),
            },
            resolvers,
            timing,
        })
    }

    /// Load config file and resolve with environment variable overrides
    pub fn load_and_resolve(path: &Path) -> HookResult<ResolvedConfig> {
        Self::load(path)?.resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn parse(toml: &str) -> HookConfig {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(ENV_PREFIX, "CFHOOK");
    }

    #[test]
    fn test_global_key_config() {
        let config = parse(
            r#"
            [cloudflare]
            email = "admin@example.com"
            api_key = "global-key"

            [dns]
            servers = ["1.1.1.1", "8.8.8.8:5353"]
            settle_delay_secs = 5
            poll_interval_secs = 15
            max_wait_secs = 120
            "#,
        );

        let resolved = config.resolve_with(no_env).unwrap();
        match &resolved.cloudflare.credentials {
            CloudflareCredentials::GlobalKey { email, api_key } => {
                assert_eq!(email, "admin@example.com");
                assert_eq!(api_key, "global-key");
            }
            other => panic!("unexpected credentials: {:?}", other),
        }
        assert_eq!(resolved.cloudflare.api_base, DEFAULT_API_BASE);
        assert_eq!(resolved.cloudflare.requests_per_second, 4);
        assert_eq!(
            resolved.resolvers,
            vec![
                "1.1.1.1:53".parse::<SocketAddr>().unwrap(),
                "8.8.8.8:5353".parse::<SocketAddr>().unwrap()
            ]
        );
        assert_eq!(resolved.timing.settle_delay, Duration::from_secs(5));
        assert_eq!(resolved.timing.poll_interval, Duration::from_secs(15));
        assert_eq!(resolved.timing.max_poll_interval, Duration::from_secs(15));
        assert_eq!(resolved.timing.max_wait, Duration::from_secs(120));
    }

    #[test]
    fn test_token_preferred_over_global_key() {
        let config = parse(
            r#"
            [cloudflare]
            email = "admin@example.com"
            api_key = "global-key"
            api_token = "scoped"
            "#,
        );

        let resolved = config.resolve_with(no_env).unwrap();
        assert!(matches!(
            resolved.cloudflare.credentials,
            CloudflareCredentials::ApiToken(ref t) if t == "scoped"
        ));
    }

    #[test]
    fn test_env_overrides_file() {
        let config = parse(
            r#"
            [cloudflare]
            email = "file@example.com"
            api_key = "file-key"

            [dns]
            servers = ["1.1.1.1"]
            max_wait_secs = 60
            "#,
        );

        let env: HashMap<&str, &str> = HashMap::from([
            ("EMAIL", "env@example.com"),
            ("DNS_SERVERS", "9.9.9.9, 2001:4860:4860::8888"),
            ("MAX_WAIT_SECS", "30"),
        ]);
        let resolved = config
            .resolve_with(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        match &resolved.cloudflare.credentials {
            CloudflareCredentials::GlobalKey { email, api_key } => {
                assert_eq!(email, "env@example.com");
                assert_eq!(api_key, "file-key");
            }
            other => panic!("unexpected credentials: {:?}", other),
        }
        assert_eq!(resolved.resolvers.len(), 2);
        assert_eq!(resolved.resolvers[1].port(), 53);
        assert_eq!(resolved.timing.max_wait, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_credentials() {
        let result = HookConfig::default().resolve_with(no_env);
        assert!(matches!(result, Err(HookError::Config(_))));

        let email_only = parse("[cloudflare]\nemail = \"admin@example.com\"\n");
        assert!(matches!(
            email_only.resolve_with(no_env),
            Err(HookError::Config(_))
        ));
    }

    #[test]
    fn test_unresolvable_secret_is_config_error() {
        let config = parse("[cloudflare]\napi_token = \"env://CFHOOK_TEST_UNSET_TOKEN_98765\"\n");
        assert!(matches!(
            config.resolve_with(no_env),
            Err(HookError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_dns_server() {
        let config = parse(
            r#"
            [cloudflare]
            api_token = "t"

            [dns]
            servers = ["not-an-ip"]
            "#,
        );
        assert!(matches!(
            config.resolve_with(no_env),
            Err(HookError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_backoff_rejected() {
        let config = parse(
            r#"
            [cloudflare]
            api_token = "t"

            [dns]
            backoff_factor = 0.5
            "#,
        );
        assert!(matches!(
            config.resolve_with(no_env),
            Err(HookError::Config(_))
        ));
    }

    #[test]
    fn test_out_of_range_timing_rejected() {
        for dns in [
            "backoff_factor = 1e300",
            "poll_interval_secs = 9223372036854775807\nbackoff_factor = 2.0",
            "max_wait_secs = 9223372036854775807",
            "settle_delay_secs = 900\nmax_wait_secs = 600",
        ] {
            let config = parse(&format!("[cloudflare]\napi_token = \"t\"\n\n[dns]\n{}\n", dns));
            assert!(
                matches!(config.resolve_with(no_env), Err(HookError::Config(_))),
                "accepted [dns] {}",
                dns
            );
        }
    }

    #[test]
    fn test_out_of_range_max_wait_from_env() {
        let config = parse("[cloudflare]\napi_token = \"t\"\n");
        let result = config.resolve_with(|name| {
            (name == "MAX_WAIT_SECS").then(|| u64::MAX.to_string())
        });
        assert!(matches!(result, Err(HookError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[cloudflare]\napi_token = \"from-file\"").unwrap();

        let config = HookConfig::load(file.path()).unwrap();
        let resolved = config.resolve_with(no_env).unwrap();
        assert!(matches!(
            resolved.cloudflare.credentials,
            CloudflareCredentials::ApiToken(ref t) if t == "from-file"
        ));
        assert!(resolved.resolvers.is_empty());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let result = HookConfig::load(Path::new("/definitely/not/a/real/cloudflare.toml"));
        assert!(matches!(result, Err(HookError::Config(_))));
    }

    #[test]
    fn test_malformed_file_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[cloudflare\napi_token = ").unwrap();
        assert!(matches!(
            HookConfig::load(file.path()),
            Err(HookError::Config(_))
        ));
    }

    #[test]
    fn test_parse_resolver_addr() {
        assert_eq!(
            parse_resolver_addr("1.1.1.1").unwrap(),
            "1.1.1.1:53".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_resolver_addr("[::1]:5300").unwrap(),
            "[::1]:5300".parse::<SocketAddr>().unwrap()
        );
        assert!(parse_resolver_addr("dns.google").is_err());
    }
}
