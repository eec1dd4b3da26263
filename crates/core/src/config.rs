// Configuration for the soil-data WMS adapter

use crate::error::{Result, SoilError};
use crate::types::{SoilDataType, WmsVersion};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// BGS UKSO soil WMS endpoint
pub const DEFAULT_BASE_URL: &str =
    "https://map.bgs.ac.uk/arcgis/services/UKSO/UKSO_BGS/MapServer/WMSServer";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SoilWmsConfig {
    #[serde(default)]
    pub wms: WmsSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub point_query: PointQuerySettings,

    #[serde(default)]
    pub limits: LimitSettings,

    /// Data type (e.g. `topsoil`) → upstream layer name overrides
    #[serde(default)]
    pub layers: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WmsSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub version: WmsVersion,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("soilwms/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for WmsSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            version: WmsVersion::default(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    3600
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

/// Synthetic window used to turn a point into a GetFeatureInfo request.
///
/// The point sits at the centre pixel of a `window_pixels` square image
/// spanning `2 * buffer_degrees` on each axis. With the defaults a pixel is
/// about 2 m across, well below the resolution of the BGS soil layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointQuerySettings {
    #[serde(default = "default_buffer_degrees")]
    pub buffer_degrees: f64,

    /// Must be odd so the centre pixel is centred on the point
    #[serde(default = "default_window_pixels")]
    pub window_pixels: u32,

    #[serde(default = "default_feature_count")]
    pub feature_count: u32,
}

fn default_buffer_degrees() -> f64 {
    0.001
}

fn default_window_pixels() -> u32 {
    101
}

fn default_feature_count() -> u32 {
    10
}

impl Default for PointQuerySettings {
    fn default() -> Self {
        Self {
            buffer_degrees: default_buffer_degrees(),
            window_pixels: default_window_pixels(),
            feature_count: default_feature_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitSettings {
    /// Feature-info bodies longer than this are truncated
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,

    /// Upstream bodies longer than this are rejected while downloading
    #[serde(default = "default_max_upstream_bytes")]
    pub max_upstream_bytes: usize,
}

fn default_max_response_bytes() -> usize {
    100_000
}

fn default_max_upstream_bytes() -> usize {
    16 * 1024 * 1024
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_response_bytes: default_max_response_bytes(),
            max_upstream_bytes: default_max_upstream_bytes(),
        }
    }
}

impl SoilWmsConfig {
    /// Load from a TOML file if present, apply environment overrides, validate.
    pub fn load(config_path: &Path) -> Result<Self> {
        let mut config: Self = if config_path.exists() {
            let content = std::fs::read_to_string(config_path).map_err(|e| {
                SoilError::Config(format!(
                    "Failed to read configuration file {}: {}",
                    config_path.display(),
                    e
                ))
            })?;
            Self::from_toml(&content)?
        } else {
            tracing::info!(
                path = %config_path.display(),
                "Configuration file not found, using defaults"
            );
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SoilError::Config(format!("Failed to parse configuration file: {}", e)))
    }

    /// Apply `SOILWMS_*` overrides; `lookup` abstracts the environment for tests.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup("SOILWMS_BASE_URL") {
            self.wms.base_url = base_url;
        }
        if let Some(ttl) = lookup("SOILWMS_CACHE_TTL_SECS") {
            self.cache.ttl_secs = parse_env_number("SOILWMS_CACHE_TTL_SECS", &ttl)?;
        }
        if let Some(timeout) = lookup("SOILWMS_TIMEOUT_SECS") {
            self.wms.timeout_secs = parse_env_number("SOILWMS_TIMEOUT_SECS", &timeout)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.base_url()?;
        if self.wms.timeout_secs == 0 {
            return Err(SoilError::Config("wms.timeout_secs must be positive".into()));
        }
        if self.cache.ttl_secs == 0 {
            return Err(SoilError::Config("cache.ttl_secs must be positive".into()));
        }
        let pq = &self.point_query;
        if !pq.buffer_degrees.is_finite() || pq.buffer_degrees <= 0.0 {
            return Err(SoilError::Config(
                "point_query.buffer_degrees must be a positive number".into(),
            ));
        }
        if pq.window_pixels == 0 || pq.window_pixels % 2 == 0 {
            return Err(SoilError::Config(
                "point_query.window_pixels must be a positive odd number".into(),
            ));
        }
        let mut seen = HashSet::new();
        for key in self.layers.keys() {
            let data_type = key
                .parse::<SoilDataType>()
                .map_err(|_| SoilError::Config(format!("Unknown data type in [layers]: {}", key)))?;
            if !seen.insert(data_type) {
                return Err(SoilError::Config(format!(
                    "Duplicate [layers] entry for {}",
                    data_type
                )));
            }
        }
        if self.limits.max_response_bytes == 0 {
            return Err(SoilError::Config(
                "limits.max_response_bytes must be positive".into(),
            ));
        }
        if self.limits.max_upstream_bytes == 0 {
            return Err(SoilError::Config(
                "limits.max_upstream_bytes must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.wms.base_url)
            .map_err(|e| SoilError::Config(format!("Invalid wms.base_url {}: {}", self.wms.base_url, e)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.wms.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    /// Upstream layer for a data type, honouring `[layers]` overrides.
    ///
    /// Keys match the same way `SoilDataType` parses, so `Topsoil` and
    /// `topsoil` name the same entry.
    pub fn layer_for(&self, data_type: SoilDataType) -> &str {
        self.layers
            .iter()
            .find(|(key, _)| key.parse::<SoilDataType>().ok() == Some(data_type))
            .map(|(_, layer)| layer.as_str())
            .unwrap_or_else(|| data_type.default_layer())
    }
}

fn parse_env_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| SoilError::Config(format!("{} must be an integer, got {:?}", key, value)))
}
