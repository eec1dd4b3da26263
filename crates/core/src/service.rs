// Soil-data operations composed from the request builder, cache and transport

use crate::cache::{CacheEntry, CapabilitiesCache, Clock};
use crate::capabilities::{parse_capabilities, service_exception};
use crate::client::WmsTransport;
use crate::config::SoilWmsConfig;
use crate::crs;
use crate::error::{Result, SoilError};
use crate::types::{Coordinate, Crs, InfoFormat, LayerDescriptor, SoilDataType};
use crate::wms::{FeatureInfoRequest, MapRequest, WmsRequestBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// Upstream GetFeatureInfo body plus the request that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureInfoResponse {
    pub url: String,
    pub layers: Vec<String>,
    /// MIME type that was requested via `INFO_FORMAT`
    pub content_type: String,
    pub body: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateConversion {
    pub source: Coordinate,
    pub target: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTypeSummary {
    pub data_type: SoilDataType,
    pub layer: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrsSummary {
    pub code: String,
    pub description: String,
}

/// Static overview of what the service offers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilDataSummary {
    pub soil_data_types: Vec<DataTypeSummary>,
    pub coordinate_systems: Vec<CrsSummary>,
    pub common_workflows: Vec<String>,
    pub service_url: String,
}

/// Entry point for every soil-data operation.
///
/// Holds the only shared mutable state, the capabilities cache. Everything
/// else is built per call.
pub struct SoilDataService {
    config: SoilWmsConfig,
    builder: WmsRequestBuilder,
    transport: Arc<dyn WmsTransport>,
    cache: CapabilitiesCache,
}

impl SoilDataService {
    pub fn new(
        config: SoilWmsConfig,
        transport: Arc<dyn WmsTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let builder = WmsRequestBuilder::new(config.base_url()?, config.wms.version);
        let cache = CapabilitiesCache::new(config.cache_ttl(), clock);
        Ok(Self {
            config,
            builder,
            transport,
            cache,
        })
    }

    pub fn config(&self) -> &SoilWmsConfig {
        &self.config
    }

    /// Point query for one of the five soil data types
    pub async fn soil_data_at_location(
        &self,
        lat: f64,
        lon: f64,
        data_type: SoilDataType,
        format: InfoFormat,
    ) -> Result<FeatureInfoResponse> {
        let layer = self.config.layer_for(data_type);
        debug!(lat, lon, data_type = %data_type, layer, "Soil data point query");
        let request =
            FeatureInfoRequest::around_point(layer, lat, lon, format, &self.config.point_query)?;
        self.feature_info(&request).await
    }

    /// Raw GetFeatureInfo against caller-supplied layers and window
    pub async fn feature_info(&self, request: &FeatureInfoRequest) -> Result<FeatureInfoResponse> {
        let url = self.builder.get_feature_info(request)?;
        debug!(url = %url, "GetFeatureInfo");

        let response = self.transport.get(&url).await?;
        if let Some(message) = service_exception(&response.body) {
            warn!(message = %message, "WMS returned a service exception");
            return Err(SoilError::service_unavailable(format!(
                "WMS service exception: {}",
                message
            )));
        }

        let (body, truncated) =
            truncate_body(response.body, self.config.limits.max_response_bytes);
        Ok(FeatureInfoResponse {
            url: url.to_string(),
            layers: request.layers.clone(),
            content_type: request.info_format.to_mime().to_string(),
            body,
            truncated,
        })
    }

    /// Cached capabilities, fetched when absent, stale or `force_refresh` is set
    pub async fn capabilities(&self, force_refresh: bool) -> Result<Arc<CacheEntry>> {
        if !force_refresh {
            if let Some(entry) = self.cache.fresh().await {
                debug!("Capabilities served from cache");
                return Ok(entry);
            }
        }
        self.refresh_capabilities().await
    }

    /// Named layers, optionally filtered by a case-insensitive substring
    pub async fn available_layers(&self, search: Option<&str>) -> Result<Vec<LayerDescriptor>> {
        let entry = self.capabilities(false).await?;
        let query = search.map(str::trim).unwrap_or_default().to_lowercase();
        Ok(entry
            .capabilities
            .layers
            .iter()
            .filter(|layer| query.is_empty() || layer.matches(&query))
            .cloned()
            .collect())
    }

    pub async fn layer_info(&self, name: &str) -> Result<LayerDescriptor> {
        let entry = self.capabilities(false).await?;
        let name = name.trim();
        entry
            .capabilities
            .layers
            .iter()
            .find(|layer| layer.name == name)
            .cloned()
            .ok_or_else(|| SoilError::LayerNotFound(name.to_string()))
    }

    /// GetMap URL; no network call
    pub fn map_url(&self, request: &MapRequest) -> Result<Url> {
        let url = self.builder.get_map(request)?;
        debug!(url = %url, "GetMap URL built");
        Ok(url)
    }

    pub fn convert_coordinates(
        &self,
        x: f64,
        y: f64,
        source: &str,
        target: &str,
    ) -> Result<CoordinateConversion> {
        let source_crs: Crs = source.parse()?;
        crs::convert_codes(x, y, source, target).map(|target| CoordinateConversion {
            source: Coordinate::new(x, y, source_crs),
            target,
        })
    }

    pub fn summary(&self) -> SoilDataSummary {
        SoilDataSummary {
            soil_data_types: SoilDataType::ALL
                .iter()
                .map(|&data_type| DataTypeSummary {
                    data_type,
                    layer: self.config.layer_for(data_type).to_string(),
                    description: data_type.description().to_string(),
                })
                .collect(),
            coordinate_systems: Crs::ALL
                .iter()
                .map(|crs| CrsSummary {
                    code: crs.code().to_string(),
                    description: crs.description().to_string(),
                })
                .collect(),
            common_workflows: vec![
                "1. Use get_available_soil_layers to discover soil data layers".to_string(),
                "2. Use get_soil_layer_info to inspect a specific layer".to_string(),
                "3. Use get_soil_map_url to build a map image URL for visualization".to_string(),
                "4. Use get_soil_data_at_location to query soil properties at a point".to_string(),
                "5. Use convert_coordinates to move between WGS84 and British National Grid"
                    .to_string(),
            ],
            service_url: self.builder.base_url().to_string(),
        }
    }

    async fn refresh_capabilities(&self) -> Result<Arc<CacheEntry>> {
        let url = self.builder.get_capabilities();
        info!(url = %url, "Fetching WMS capabilities");

        let response = self.transport.get(&url).await.map_err(|e| {
            warn!(error = %e, "Capabilities fetch failed, keeping cached copy");
            e
        })?;
        let capabilities = parse_capabilities(&response.body, self.cache.now()).map_err(|e| {
            warn!(error = %e, "Capabilities parse failed, keeping cached copy");
            e
        })?;

        Ok(self.cache.store(response.body, capabilities).await)
    }
}

/// Cut `body` to at most `max_bytes` on a char boundary, appending a marker
fn truncate_body(mut body: String, max_bytes: usize) -> (String, bool) {
    if body.len() <= max_bytes {
        return (body, false);
    }
    let mut end = max_bytes;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body.truncate(end);
    body.push_str(TRUNCATION_MARKER);
    (body, true)
}
