//! Catalog configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML/YAML/JSON
//! file, then `CATALOG_` environment variables (nested keys separated by a
//! double underscore, e.g. `CATALOG_FETCH__WORKERS=8`). The merged result is
//! validated before it's handed out.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "CATALOG_";

pub const DEFAULT_DATABASE_FILENAME: &str = "catalog.sqlite3";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_COVERS_PREFIX: &str = "covers";
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_AUTHENTICATED_THROTTLE_SECS: u64 = 3;
pub const DEFAULT_ANONYMOUS_THROTTLE_SECS: u64 = 15;
pub const DEFAULT_URL_THROTTLE_SECS: u64 = 2 * 60 * 60;
pub const DEFAULT_MAX_RELATED: usize = 10;
pub const DEFAULT_JOB_HISTORY: usize = 1000;
pub const DEFAULT_SCRAPE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_REDIRECT_TIMEOUT_SECS: u64 = 2;
pub const DEFAULT_MAX_DEPTH: usize = 4;

fn data_dir() -> PathBuf {
    match ProjectDirs::from("org", "catalog", "catalog") {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        None => std::env::temp_dir().join("catalog"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub covers: CoversConfig,
    pub fetch: FetchConfig,
    pub link: LinkConfig,
}
impl Default for Config {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            database: DatabaseConfig {
                path: data_dir.join(DEFAULT_DATABASE_FILENAME),
                max_connections: DEFAULT_MAX_CONNECTIONS,
            },
            covers: CoversConfig {
                root: data_dir.join("media"),
                prefix: DEFAULT_COVERS_PREFIX.to_string(),
            },
            fetch: FetchConfig::default(),
            link: LinkConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoversConfig {
    /// Absolute directory cover images are stored under.
    pub root: PathBuf,
    pub prefix: String,
}

/// Background fetch coordination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Concurrently running fetch jobs.
    pub workers: usize,
    /// How often a signed-in caller may trigger a fetch.
    pub authenticated_throttle_secs: u64,
    pub anonymous_throttle_secs: u64,
    /// How often the same URL may be fetched, whoever asks.
    pub url_throttle_secs: u64,
    /// Related resources scheduled per finished job.
    pub max_related: usize,
    /// Finished jobs remembered for `status` and `wait`; the oldest are
    /// forgotten first.
    pub job_history: usize,
}
impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            authenticated_throttle_secs: DEFAULT_AUTHENTICATED_THROTTLE_SECS,
            anonymous_throttle_secs: DEFAULT_ANONYMOUS_THROTTLE_SECS,
            url_throttle_secs: DEFAULT_URL_THROTTLE_SECS,
            max_related: DEFAULT_MAX_RELATED,
            job_history: DEFAULT_JOB_HISTORY,
        }
    }
}
impl FetchConfig {
    pub fn authenticated_throttle(&self) -> Duration {
        Duration::from_secs(self.authenticated_throttle_secs)
    }

    pub fn anonymous_throttle(&self) -> Duration {
        Duration::from_secs(self.anonymous_throttle_secs)
    }

    pub fn url_throttle(&self) -> Duration {
        Duration::from_secs(self.url_throttle_secs)
    }
}

/// Scraping and linking of a single resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub scrape_timeout_secs: u64,
    pub search_timeout_secs: u64,
    pub redirect_timeout_secs: u64,
    /// How deep required resources are followed.
    pub max_depth: usize,
    /// Related resources handed back per link.
    pub max_related: usize,
}
impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            scrape_timeout_secs: DEFAULT_SCRAPE_TIMEOUT_SECS,
            search_timeout_secs: DEFAULT_SEARCH_TIMEOUT_SECS,
            redirect_timeout_secs: DEFAULT_REDIRECT_TIMEOUT_SECS,
            max_depth: DEFAULT_MAX_DEPTH,
            max_related: DEFAULT_MAX_RELATED,
        }
    }
}
impl LinkConfig {
    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn redirect_timeout(&self) -> Duration {
        Duration::from_secs(self.redirect_timeout_secs)
    }
}

impl Config {
    /// Load defaults, the optional file and the environment, then validate.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "Reading configuration file");
            figment = match file.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file_exact(file)),
                Some("yaml" | "yml") => figment.merge(Yaml::file_exact(file)),
                Some("json") => figment.merge(Json::file_exact(file)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(file.to_path_buf())),
            };
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &'static str, reason: &str| ErrorKind::Invalid { field, reason: reason.to_string() };
        if self.database.path.as_os_str().is_empty() {
            exn::bail!(invalid("database.path", "must not be empty"));
        }
        if self.database.max_connections == 0 {
            exn::bail!(invalid("database.max_connections", "must be greater than 0"));
        }
        if !self.covers.root.is_absolute() {
            exn::bail!(invalid("covers.root", "must be an absolute path"));
        }
        if self.fetch.workers == 0 {
            exn::bail!(invalid("fetch.workers", "must be greater than 0"));
        }
        if self.fetch.authenticated_throttle_secs > self.fetch.anonymous_throttle_secs {
            tracing::warn!(
                authenticated = self.fetch.authenticated_throttle_secs,
                anonymous = self.fetch.anonymous_throttle_secs,
                "Signed-in callers are throttled harder than anonymous ones"
            );
        }
        if self.link.scrape_timeout_secs == 0 {
            exn::bail!(invalid("link.scrape_timeout_secs", "must be greater than 0"));
        }
        if self.link.max_depth == 0 {
            exn::bail!(invalid("link.max_depth", "must be greater than 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.fetch.authenticated_throttle(), Duration::from_secs(3));
        assert_eq!(config.fetch.anonymous_throttle(), Duration::from_secs(15));
        assert_eq!(config.fetch.url_throttle(), Duration::from_secs(7200));
        assert!(config.database.path.ends_with(DEFAULT_DATABASE_FILENAME));
    }

    // Loading reads the process environment, so every test that loads runs
    // inside a jail.
    #[rstest]
    #[case("toml", "[fetch]\nworkers = 9\n\n[link]\nmax_depth = 2\n")]
    #[case("yaml", "fetch:\n  workers: 9\nlink:\n  max_depth: 2\n")]
    #[case("json", r#"{"fetch": {"workers": 9}, "link": {"max_depth": 2}}"#)]
    fn test_load_file(#[case] extension: &str, #[case] contents: &str) {
        Jail::expect_with(|jail| {
            let file = format!("catalog.{extension}");
            jail.create_file(&file, contents)?;
            let config = Config::load(Some(Path::new(&file))).map_err(|e| e.to_string())?;
            assert_eq!(config.fetch.workers, 9);
            assert_eq!(config.link.max_depth, 2);
            // Untouched sections keep their defaults.
            assert_eq!(config.fetch.max_related, DEFAULT_MAX_RELATED);
            assert_eq!(config.fetch.job_history, DEFAULT_JOB_HISTORY);
            assert_eq!(config.database, Config::default().database);
            Ok(())
        });
    }

    #[test]
    fn test_unsupported_format() {
        let err = Config::load(Some(Path::new("catalog.ini"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        Jail::expect_with(|_| {
            let err = Config::load(Some(&missing)).unwrap_err();
            assert_eq!(&*err, &ErrorKind::Load);
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("catalog.toml", "[fetch]\nworkers = 2\nmax_related = 1\n")?;
            jail.set_env("CATALOG_FETCH__WORKERS", "8");
            jail.set_env("CATALOG_DATABASE__PATH", "/srv/catalog/db.sqlite3");
            let config = Config::load(Some(Path::new("catalog.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.fetch.workers, 8);
            assert_eq!(config.fetch.max_related, 1);
            assert_eq!(config.database.path, PathBuf::from("/srv/catalog/db.sqlite3"));
            Ok(())
        });
    }

    #[test]
    fn test_validation() {
        Jail::expect_with(|jail| {
            jail.set_env("CATALOG_FETCH__WORKERS", "0");
            let err = Config::load(None).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid { field: "fetch.workers", .. }));
            Ok(())
        });
        let mut config = Config::default();
        config.covers.root = PathBuf::from("relative/media");
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid { field: "covers.root", .. }));
    }
}
