use crate::core::reconciler::{DEFAULT_SOURCE_EPSG, DEFAULT_TARGET_EPSG};
use crate::core::ConfigProvider;
use crate::utils::error::{Result, StatsError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_COG_URL: &str = "https://oin-hotosm.s3.us-east-1.amazonaws.com/669a3a711684770001c33a8f/0/669a3a711684770001c33a90.tif";
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub crs: CrsConfig,
    pub compute: ComputeConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub static_dir: String,
    /// 0 or absent disables eviction.
    pub max_bytes: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            static_dir: DEFAULT_STATIC_DIR.to_string(),
            max_bytes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrsConfig {
    pub source_epsg: u16,
    pub target_epsg: u16,
}

impl Default for CrsConfig {
    fn default() -> Self {
        Self {
            source_epsg: DEFAULT_SOURCE_EPSG,
            target_epsg: DEFAULT_TARGET_EPSG,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    /// Reduction threads; defaults to the available parallelism.
    pub workers: Option<usize>,
    pub default_cog_url: String,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            workers: None,
            default_cog_url: DEFAULT_COG_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbose: bool,
    pub json: bool,
}

impl ServiceConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(StatsError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| StatsError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay verbatim.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| StatsError::ConfigError {
            message: format!("env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// `STATIC_DIR`, `LISTEN_ADDR` and `DEFAULT_COG_URL` override the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("STATIC_DIR") {
            self.cache.static_dir = dir;
        }
        if let Ok(addr) = std::env::var("LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Ok(url) = std::env::var("DEFAULT_COG_URL") {
            self.compute.default_cog_url = url;
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        for (field, value) in [
            ("cache.static_dir", &self.cache.static_dir),
            ("compute.default_cog_url", &self.compute.default_cog_url),
        ] {
            if value.trim().is_empty() {
                return Err(StatsError::MissingConfigError {
                    field: field.to_string(),
                });
            }
        }

        validation::validate_socket_addr("server.listen_addr", &self.server.listen_addr)?;
        validation::validate_path("cache.static_dir", &self.cache.static_dir)?;
        validation::validate_url("compute.default_cog_url", &self.compute.default_cog_url)?;
        validation::validate_epsg_code("crs.source_epsg", self.crs.source_epsg)?;
        validation::validate_epsg_code("crs.target_epsg", self.crs.target_epsg)?;

        if let Some(workers) = self.compute.workers {
            validation::validate_range("compute.workers", workers, 1, 512)?;
        }

        Ok(())
    }
}

impl ConfigProvider for ServiceConfig {
    fn static_dir(&self) -> &str {
        &self.cache.static_dir
    }

    fn default_cog_url(&self) -> &str {
        &self.compute.default_cog_url
    }

    fn source_epsg(&self) -> u16 {
        self.crs.source_epsg
    }

    fn target_epsg(&self) -> u16 {
        self.crs.target_epsg
    }

    fn max_cache_bytes(&self) -> Option<u64> {
        self.cache.max_bytes.filter(|&b| b > 0)
    }

    fn workers(&self) -> usize {
        self.compute.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();

        assert_eq!(config.static_dir(), "static");
        assert_eq!(config.source_epsg(), 4326);
        assert_eq!(config.target_epsg(), 32644);
        assert_eq!(config.default_cog_url(), DEFAULT_COG_URL);
        assert_eq!(config.max_cache_bytes(), None);
        assert!(config.workers() >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml_config() {
        let toml_content = r#"
[cache]
static_dir = "/var/cache/dristi"
max_bytes = 1048576

[crs]
target_epsg = 32645

[compute]
workers = 2
"#;

        let config = ServiceConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.static_dir(), "/var/cache/dristi");
        assert_eq!(config.max_cache_bytes(), Some(1_048_576));
        assert_eq!(config.source_epsg(), 4326);
        assert_eq!(config.target_epsg(), 32645);
        assert_eq!(config.workers(), 2);
        assert_eq!(config.server.listen_addr, DEFAULT_LISTEN_ADDR);
    }

    #[test]
    fn test_zero_max_bytes_disables_eviction() {
        let config = ServiceConfig::from_toml_str("[cache]\nmax_bytes = 0\n").unwrap();
        assert_eq!(config.max_cache_bytes(), None);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("DRISTI_TEST_COG_HOST", "https://cogs.example.com");

        let toml_content = r#"
[compute]
default_cog_url = "${DRISTI_TEST_COG_HOST}/scene.tif"
"#;

        let config = ServiceConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.default_cog_url(),
            "https://cogs.example.com/scene.tif"
        );

        std::env::remove_var("DRISTI_TEST_COG_HOST");
    }

    #[test]
    fn test_config_validation() {
        let bad_url = ServiceConfig::from_toml_str("[compute]\ndefault_cog_url = \"invalid-url\"\n")
            .unwrap();
        assert!(bad_url.validate().is_err());

        let bad_crs = ServiceConfig::from_toml_str("[crs]\nsource_epsg = 1\n").unwrap();
        assert!(bad_crs.validate().is_err());

        let bad_addr = ServiceConfig::from_toml_str("[server]\nlisten_addr = \"nowhere\"\n").unwrap();
        assert!(bad_addr.validate().is_err());

        let bad_workers = ServiceConfig::from_toml_str("[compute]\nworkers = 0\n").unwrap();
        assert!(bad_workers.validate().is_err());
    }

    #[test]
    fn test_blank_required_values_are_missing() {
        let no_url = ServiceConfig::from_toml_str("[compute]\ndefault_cog_url = \"\"\n").unwrap();
        assert!(matches!(
            no_url.validate(),
            Err(StatsError::MissingConfigError { field }) if field == "compute.default_cog_url"
        ));

        let no_dir = ServiceConfig::from_toml_str("[cache]\nstatic_dir = \"  \"\n").unwrap();
        assert!(matches!(
            no_dir.validate(),
            Err(StatsError::MissingConfigError { field }) if field == "cache.static_dir"
        ));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = ServiceConfig::from_toml_str("[cache\nstatic_dir = 1").unwrap_err();
        assert!(matches!(err, StatsError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[server]
listen_addr = "127.0.0.1:9100"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = ServiceConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:9100");
    }
}
