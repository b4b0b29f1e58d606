//! Centralized configuration for Searchlight.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Central configuration for all Searchlight components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct SearchlightConfig {
    pub cache: CacheConfig,
    pub search: SearchConfig,
    pub transcode: TranscodeConfig,
    pub server: ServerConfig,
}

/// Query cache lifetime settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum age of a cached path list before it is re-fetched
    pub ttl: Duration,
    /// How often the sweeper evicts expired entries
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),            // 10 minutes
            sweep_interval: Duration::from_secs(300), // 5 minutes
        }
    }
}

/// Pagination limits and locator backend selection.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Page size used when the request omits or mangles `pageSize`
    pub default_page_size: usize,
    /// Largest page size a client may ask for
    pub max_page_size: usize,
    /// External search command tried first, if configured
    pub command: Option<CommandBackendConfig>,
    /// Directory roots scanned by the walk backend
    pub walk_roots: Vec<PathBuf>,
    /// Upper bound on paths a single walk returns
    pub walk_max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 200,
            command: None,
            walk_roots: Vec::new(),
            walk_max_results: 10_000,
        }
    }
}

/// External search CLI invocation: `program args... <query>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBackendConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl FromStr for CommandBackendConfig {
    type Err = ConfigError;

    /// Parses a whitespace-separated command line such as `es -n 5000`.
    ///
    /// Double quotes group words, so a program under a path with spaces is
    /// written `"C:\Program Files\Everything\es.exe" -n 5000`. Backslashes
    /// are taken literally.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidValue {
            key: "search command".to_string(),
            value: s.to_string(),
        };

        let mut parts = split_command_line(s).ok_or_else(invalid)?.into_iter();
        let program = parts.next().ok_or_else(invalid)?;
        Ok(Self {
            program: PathBuf::from(program),
            args: parts.collect(),
        })
    }
}

/// Splits on whitespace outside double quotes. `None` on an unclosed quote.
fn split_command_line(line: &str) -> Option<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quoted {
        return None;
    }
    if in_word {
        words.push(current);
    }
    Some(words)
}

/// Transcoder invocation and admission control.
#[derive(Debug, Clone)]
pub struct TranscodeConfig {
    /// Transcoder executable, resolved through PATH
    pub binary: PathBuf,
    /// Transcoder processes allowed to run at once
    pub max_concurrent: usize,
    /// How long a request may wait for a free transcoder slot
    pub admission_timeout: Duration,
    /// Bytes read from the transcoder per chunk
    pub read_chunk_size: usize,
    /// Chunks buffered between the transcoder and the response body
    pub channel_capacity: usize,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            max_concurrent: 2,
            admission_timeout: Duration::from_secs(10),
            read_chunk_size: 64 * 1024, // 64 KiB
            channel_capacity: 8,
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Errors produced while loading or validating configuration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },
}

const ENV_PREFIX: &str = "SEARCHLIGHT_";

impl SearchlightConfig {
    /// Builds the default configuration with `SEARCHLIGHT_*` overrides applied.
    ///
    /// # Errors
    /// - `ConfigError::InvalidValue` - An environment variable could not be parsed
    /// - `ConfigError::Invalid` - The resulting configuration is inconsistent
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Builds configuration from an arbitrary key lookup (keys without prefix).
    ///
    /// # Errors
    /// - `ConfigError::InvalidValue` - A value could not be parsed
    /// - `ConfigError::Invalid` - The resulting configuration is inconsistent
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(secs) = parse_var::<u64, _>(&lookup, "CACHE_TTL_SECS")? {
            config.cache.ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "SWEEP_INTERVAL_SECS")? {
            config.cache.sweep_interval = Duration::from_secs(secs);
        }
        if let Some(size) = parse_var(&lookup, "DEFAULT_PAGE_SIZE")? {
            config.search.default_page_size = size;
        }
        if let Some(size) = parse_var(&lookup, "MAX_PAGE_SIZE")? {
            config.search.max_page_size = size;
        }
        if let Some(command) = parse_var(&lookup, "SEARCH_COMMAND")? {
            config.search.command = Some(command);
        }
        if let Some(roots) = lookup("WALK_ROOTS") {
            config.search.walk_roots = std::env::split_paths(&roots).collect();
        }
        if let Some(binary) = lookup("FFMPEG") {
            config.transcode.binary = PathBuf::from(binary);
        }
        if let Some(limit) = parse_var(&lookup, "MAX_TRANSCODES")? {
            config.transcode.max_concurrent = limit;
        }
        if let Some(host) = lookup("HOST") {
            config.server.host = host;
        }
        if let Some(port) = parse_var(&lookup, "PORT")? {
            config.server.port = port;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field consistency.
    ///
    /// # Errors
    /// - `ConfigError::Invalid` - A limit is zero or the page sizes contradict each other
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.ttl.is_zero() {
            return Err(invalid("cache TTL must be non-zero"));
        }
        if self.cache.sweep_interval.is_zero() {
            return Err(invalid("sweep interval must be non-zero"));
        }
        if self.search.default_page_size == 0 || self.search.max_page_size == 0 {
            return Err(invalid("page sizes must be non-zero"));
        }
        if self.search.default_page_size > self.search.max_page_size {
            return Err(invalid("default page size exceeds max page size"));
        }
        if self.transcode.max_concurrent == 0 {
            return Err(invalid("at least one transcoder slot is required"));
        }
        if self.transcode.read_chunk_size == 0 || self.transcode.channel_capacity == 0 {
            return Err(invalid("transcode buffers must be non-zero"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_string(),
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: format!("{ENV_PREFIX}{key}"),
                value: raw,
            }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = SearchlightConfig::default();
        assert_eq!(config.cache.ttl, Duration::from_secs(600));
        assert_eq!(config.cache.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.search.default_page_size, 50);
        assert_eq!(config.search.max_page_size, 200);
        assert_eq!(config.server.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = SearchlightConfig::from_lookup(lookup_from(&[
            ("CACHE_TTL_SECS", "30"),
            ("MAX_TRANSCODES", "4"),
            ("SEARCH_COMMAND", "es -n 100"),
            ("PORT", "9000"),
        ]))
        .unwrap();

        assert_eq!(config.cache.ttl, Duration::from_secs(30));
        assert_eq!(config.transcode.max_concurrent, 4);
        assert_eq!(config.server.port, 9000);
        let command = config.search.command.unwrap();
        assert_eq!(command.program, PathBuf::from("es"));
        assert_eq!(command.args, vec!["-n", "100"]);
    }

    #[test]
    fn test_quoted_program_path_keeps_spaces() {
        let command: CommandBackendConfig = r#""C:\Program Files\Everything\es.exe" -n 5000"#
            .parse()
            .unwrap();
        assert_eq!(
            command.program,
            PathBuf::from(r"C:\Program Files\Everything\es.exe")
        );
        assert_eq!(command.args, vec!["-n", "5000"]);

        let command: CommandBackendConfig = r#"locate "-i" "two words""#.parse().unwrap();
        assert_eq!(command.program, PathBuf::from("locate"));
        assert_eq!(command.args, vec!["-i", "two words"]);
    }

    #[test]
    fn test_malformed_search_command_is_rejected() {
        assert!("".parse::<CommandBackendConfig>().is_err());
        assert!("   ".parse::<CommandBackendConfig>().is_err());
        assert!(r#""C:\Program Files\es.exe -n 5"#
            .parse::<CommandBackendConfig>()
            .is_err());
    }

    #[test]
    fn test_unparsable_value_is_rejected() {
        let err = SearchlightConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "SEARCHLIGHT_PORT".to_string(),
                value: "eighty".to_string(),
            }
        );
    }

    #[test]
    fn test_default_page_size_above_max_is_rejected() {
        let result = SearchlightConfig::from_lookup(lookup_from(&[
            ("DEFAULT_PAGE_SIZE", "300"),
            ("MAX_PAGE_SIZE", "200"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_zero_transcoder_slots_is_rejected() {
        let result = SearchlightConfig::from_lookup(lookup_from(&[("MAX_TRANSCODES", "0")]));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
