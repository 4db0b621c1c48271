//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use dirdl_core::download::{CONNECT_TIMEOUT_SECS, DEFAULT_ATTEMPTS, DEFAULT_CONCURRENCY};

/// File configuration for `dirdl` defaults.
///
/// Every field is optional; an explicit CLI flag always wins over it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Default output directory for downloads.
    pub output_dir: Option<PathBuf>,
    /// Default number of simultaneous downloads (same range as CLI).
    pub concurrency: Option<u8>,
    /// Default attempts per file.
    pub retries: Option<u32>,
    /// Connect timeout for every HTTP request, in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Sort bulk downloads into per-system folders.
    pub group_by_system: Option<bool>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=100).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=100");
        }

        if let Some(retries) = self.retries
            && !(1..=10).contains(&retries)
        {
            bail!("Invalid config value for `retries`: {retries}. Expected range: 1..=10");
        }

        if let Some(value) = self.connect_timeout_secs
            && !(1..=3600).contains(&value)
        {
            bail!(
                "Invalid config value for `connect_timeout_secs`: {value}. Expected range: 1..=3600"
            );
        }

        Ok(())
    }

    /// Output directory: CLI flag, then config, then the current directory.
    #[must_use]
    pub fn resolve_output_dir(&self, cli: Option<&Path>) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| self.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    #[must_use]
    pub fn resolve_concurrency(&self, cli: Option<u8>) -> usize {
        cli.or(self.concurrency)
            .map_or(DEFAULT_CONCURRENCY, usize::from)
    }

    #[must_use]
    pub fn resolve_retries(&self, cli: Option<u32>) -> u32 {
        cli.or(self.retries).unwrap_or(DEFAULT_ATTEMPTS)
    }

    #[must_use]
    pub fn connect_timeout_secs(&self) -> u64 {
        self.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS)
    }

    /// Whether bulk downloads go into per-system folders.
    #[must_use]
    pub fn group_by_system(&self, flat: bool) -> bool {
        !flat && self.group_by_system.unwrap_or(true)
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

impl LoadedConfig {
    /// The parsed config, or an empty one when no file was loaded.
    #[must_use]
    pub fn file_config(&self) -> FileConfig {
        self.config.clone().unwrap_or_default()
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/dirdl/config.toml`
/// 2. `$HOME/.config/dirdl/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("dirdl").join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("dirdl")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let line_no = line_index + 1;

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();

        match key {
            "output_dir" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `output_dir` value on line {line_no}"))?;
                cfg.output_dir = Some(PathBuf::from(parsed));
            }
            "concurrency" => {
                let parsed = parse_integer(value)
                    .with_context(|| format!("Invalid `concurrency` value on line {line_no}"))?;
                cfg.concurrency = Some(parsed);
            }
            "retries" => {
                let parsed = parse_integer(value)
                    .with_context(|| format!("Invalid `retries` value on line {line_no}"))?;
                cfg.retries = Some(parsed);
            }
            "connect_timeout_secs" => {
                let parsed = parse_integer(value).with_context(|| {
                    format!("Invalid `connect_timeout_secs` value on line {line_no}")
                })?;
                cfg.connect_timeout_secs = Some(parsed);
            }
            "group_by_system" => {
                let parsed = parse_boolean(value)
                    .with_context(|| format!("Invalid `group_by_system` value on line {line_no}"))?;
                cfg.group_by_system = Some(parsed);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

/// Parses a non-negative integer into whichever width the key uses.
fn parse_integer<T>(raw_value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    if token.starts_with('-') {
        bail!("Expected non-negative integer");
    }
    Ok(token.parse::<T>()?)
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}
