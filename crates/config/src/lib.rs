//! Layered configuration.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults,
//! 2. one config file (`--config`, otherwise the first of
//!    `config.toml`/`config.yaml`/`config.json` in the user's config dir),
//! 3. `DRIVEPATH_*` environment variables, nested with `__`
//!    (`DRIVEPATH_DRIVE__ACCESS_TOKEN`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use drivepath_storage::backend::RetryPolicy;
use drivepath_storage::query::MAX_PAGE_SIZE;
use drivepath_tree::{Context, SiblingPolicy};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APPLICATION: &str = "drivepath";
pub const ENV_PREFIX: &str = "DRIVEPATH_";
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
/// File names searched for in the config dir, in order.
const SEARCH: [&str; 3] = ["config.toml", "config.yaml", "config.json"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub drive: DriveConfig,
    pub tree: TreeConfig,
    pub retry: RetryConfig,
    /// Where `fetch` writes to when no directory is given.
    pub download_dir: PathBuf,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            drive: DriveConfig::default(),
            tree: TreeConfig::default(),
            retry: RetryConfig::default(),
            download_dir: PathBuf::from("documents"),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub base_url: String,
    pub access_token: Option<String>,
}
impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: None,
        }
    }
}
// Keep the token out of logs.
impl fmt::Debug for DriveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub page_size: u32,
    #[serde(with = "policy")]
    pub siblings: SiblingPolicy,
    pub max_depth: usize,
}
impl Default for TreeConfig {
    fn default() -> Self {
        let ctx = Context::default();
        Self {
            page_size: ctx.page_size,
            siblings: ctx.siblings,
            max_depth: ctx.max_depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request; `1` disables retrying.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}
impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
        }
    }
}

impl Config {
    /// Load from the default locations.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Loader::default().file(file).load()
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| exn::Exn::from(ErrorKind::Invalid(reason));
        if !(1..=MAX_PAGE_SIZE).contains(&self.tree.page_size) {
            return Err(invalid(format!("tree.page_size must be between 1 and {MAX_PAGE_SIZE}")));
        }
        if self.tree.max_depth == 0 {
            return Err(invalid("tree.max_depth must be at least 1".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be at least 1".to_string()));
        }
        if !(self.drive.base_url.starts_with("https://") || self.drive.base_url.starts_with("http://")) {
            return Err(invalid(format!("drive.base_url is not an http(s) URL: {}", self.drive.base_url)));
        }
        Ok(())
    }

    /// The access token, for commands that need to talk to the drive.
    pub fn access_token(&self) -> Result<&str> {
        match self.drive.access_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => exn::bail!(ErrorKind::MissingToken),
        }
    }

    pub fn tree_context(&self) -> Context {
        Context {
            page_size: self.tree.page_size,
            siblings: self.tree.siblings,
            max_depth: self.tree.max_depth,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            ..RetryPolicy::default()
        }
    }
}

/// Where configuration is read from.
#[derive(Debug, Clone)]
pub struct Loader {
    file: Option<PathBuf>,
    search_dir: Option<PathBuf>,
    env_prefix: String,
}
impl Default for Loader {
    fn default() -> Self {
        Self {
            file: None,
            search_dir: ProjectDirs::from("", "", APPLICATION).map(|dirs| dirs.config_dir().to_path_buf()),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }
}
impl Loader {
    /// Read exactly this file (which must exist) instead of searching.
    pub fn file(mut self, file: Option<&Path>) -> Self {
        self.file = file.map(Path::to_path_buf);
        self
    }

    pub fn search_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.search_dir = dir;
        self
    }

    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn load(&self) -> Result<Config> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = self.config_file()? {
            tracing::debug!(file = %file.display(), "Loading config file");
            figment = merge_file(figment, &file)?;
        }
        figment = figment.merge(Env::prefixed(&self.env_prefix).split("__"));
        let config: Config = figment.extract().or_raise(|| ErrorKind::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn config_file(&self) -> Result<Option<PathBuf>> {
        if let Some(file) = &self.file {
            if !file.is_file() {
                exn::bail!(ErrorKind::NotFound(file.clone()));
            }
            return Ok(Some(file.clone()));
        }
        let Some(dir) = &self.search_dir else {
            return Ok(None);
        };
        Ok(SEARCH.iter().map(|name| dir.join(name)).find(|candidate| candidate.is_file()))
    }
}

fn merge_file(figment: Figment, file: &Path) -> Result<Figment> {
    let extension = file.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file(file)),
        Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
        Some("json") => figment.merge(Json::file(file)),
        _ => exn::bail!(ErrorKind::Format(file.to_path_buf())),
    })
}

/// Sibling policies are written as their lowercase names.
mod policy {
    use drivepath_tree::SiblingPolicy;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(policy: &SiblingPolicy, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(policy)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SiblingPolicy, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| de::Error::custom(format!("unknown sibling policy '{raw}', expected first, newest or strict")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    /// A loader that can't see the real environment or config dir.
    fn isolated(prefix: &str) -> Loader {
        Loader::default().search_dir(None).env_prefix(prefix)
    }

    #[test]
    fn test_defaults() {
        let config = isolated("DRIVEPATH_TEST_DEFAULTS_").load().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.tree_context(), Context::default());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.download_dir, PathBuf::from("documents"));
    }

    #[rstest]
    #[case("config.toml", "[tree]\npage_size = 25\nsiblings = \"strict\"\n")]
    #[case("config.yaml", "tree:\n  page_size: 25\n  siblings: strict\n")]
    #[case("config.json", r#"{"tree": {"page_size": 25, "siblings": "strict"}}"#)]
    fn test_file_formats(#[case] name: &str, #[case] content: &str) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(name), content).unwrap();
        let config = isolated("DRIVEPATH_TEST_FORMATS_").search_dir(Some(dir.path().to_path_buf())).load().unwrap();
        assert_eq!(config.tree.page_size, 25);
        assert_eq!(config.tree.siblings, SiblingPolicy::Strict);
        assert_eq!(config.tree.max_depth, Context::default().max_depth);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = TempDir::new().unwrap();
        let err = isolated("DRIVEPATH_TEST_MISSING_").file(Some(&dir.path().join("nope.toml"))).load().unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_unknown_format() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("config.ini");
        fs::write(&file, "page_size=1").unwrap();
        let err = isolated("DRIVEPATH_TEST_FORMAT_").file(Some(&file)).load().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Format(_)));
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("drivepath.toml");
        fs::write(&file, "[drive]\naccess_token = \"from-file\"\n[retry]\nmax_attempts = 2\n").unwrap();
        // SAFETY: the variable name is unique to this test.
        unsafe {
            std::env::set_var("DRIVEPATH_TEST_ENV_DRIVE__ACCESS_TOKEN", "from-env");
        }
        let config = isolated("DRIVEPATH_TEST_ENV_").file(Some(&file)).load().unwrap();
        unsafe {
            std::env::remove_var("DRIVEPATH_TEST_ENV_DRIVE__ACCESS_TOKEN");
        }
        assert_eq!(config.access_token().unwrap(), "from-env");
        assert_eq!(config.retry.max_attempts, 2);
    }

    #[rstest]
    #[case("[tree]\npage_size = 0\n")]
    #[case("[tree]\npage_size = 1001\n")]
    #[case("[tree]\nmax_depth = 0\n")]
    #[case("[retry]\nmax_attempts = 0\n")]
    #[case("[drive]\nbase_url = \"ftp://example.com\"\n")]
    fn test_validation(#[case] content: &str) {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("config.toml");
        fs::write(&file, content).unwrap();
        let err = isolated("DRIVEPATH_TEST_VALIDATION_").file(Some(&file)).load().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_unknown_policy() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("config.toml");
        fs::write(&file, "[tree]\nsiblings = \"random\"\n").unwrap();
        let err = isolated("DRIVEPATH_TEST_POLICY_").file(Some(&file)).load().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Parse));
    }

    #[test]
    fn test_missing_token() {
        let mut config = Config::default();
        assert!(matches!(&*config.access_token().unwrap_err(), ErrorKind::MissingToken));
        config.drive.access_token = Some("  ".to_string());
        assert!(config.access_token().is_err());
        config.drive.access_token = Some("secret".to_string());
        assert!(!format!("{config:?}").contains("secret"));
    }
}
