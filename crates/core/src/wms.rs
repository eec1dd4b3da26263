// WMS request construction
//
// Pure URL building for GetCapabilities, GetMap and GetFeatureInfo against a
// fixed endpoint and protocol version. Nothing here touches the network

use crate::config::PointQuerySettings;
use crate::error::{Result, SoilError};
use crate::types::{BoundingBox, Crs, ImageFormat, InfoFormat, WmsVersion};
use serde::{Deserialize, Serialize};
use url::Url;

/// GetMap parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRequest {
    pub layers: Vec<String>,
    pub bbox: BoundingBox,
    pub crs: Crs,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub transparent: bool,
}

impl MapRequest {
    /// Single-layer request with the defaults the tool surface exposes
    pub fn new(layer: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            layers: vec![layer.into()],
            bbox,
            crs: Crs::Epsg4326,
            width: 800,
            height: 600,
            format: ImageFormat::Png,
            transparent: true,
        }
    }
}

/// GetFeatureInfo parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureInfoRequest {
    pub layers: Vec<String>,
    pub bbox: BoundingBox,
    pub crs: Crs,
    pub width: u32,
    pub height: u32,
    /// Pixel column, 0-based from the left
    pub i: u32,
    /// Pixel row, 0-based from the top
    pub j: u32,
    pub info_format: InfoFormat,
    pub feature_count: u32,
}

impl FeatureInfoRequest {
    /// Point query expressed as a small synthetic map window.
    ///
    /// WMS has no point operation, so the point becomes the centre pixel of a
    /// `window_pixels` square image covering `buffer_degrees` either side.
    pub fn around_point(
        layer: impl Into<String>,
        lat: f64,
        lon: f64,
        info_format: InfoFormat,
        window: &PointQuerySettings,
    ) -> Result<Self> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(SoilError::invalid_parameter(format!(
                "latitude/longitude must be finite, got {}, {}",
                lat, lon
            )));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(SoilError::invalid_parameter(format!(
                "latitude must be within -90..90, got {}",
                lat
            )));
        }
        let bbox = BoundingBox::around(lon, lat, window.buffer_degrees)?;
        let center = window.window_pixels / 2;
        Ok(Self {
            layers: vec![layer.into()],
            bbox,
            crs: Crs::Epsg4326,
            width: window.window_pixels,
            height: window.window_pixels,
            i: center,
            j: center,
            info_format,
            feature_count: window.feature_count,
        })
    }
}

/// Builds request URLs for one WMS endpoint
#[derive(Debug, Clone)]
pub struct WmsRequestBuilder {
    base_url: Url,
    version: WmsVersion,
}

impl WmsRequestBuilder {
    pub fn new(base_url: Url, version: WmsVersion) -> Self {
        Self { base_url, version }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn version(&self) -> WmsVersion {
        self.version
    }

    pub fn get_capabilities(&self) -> Url {
        self.request_url("GetCapabilities", &[])
    }

    pub fn get_map(&self, request: &MapRequest) -> Result<Url> {
        let layers = join_layers(&request.layers)?;
        check_size(request.width, request.height)?;

        let width = request.width.to_string();
        let height = request.height.to_string();
        let bbox = request.bbox.to_wms_param(request.crs, self.version);
        let transparent = if request.transparent { "TRUE" } else { "FALSE" };

        Ok(self.request_url(
            "GetMap",
            &[
                ("LAYERS", layers.as_str()),
                ("STYLES", ""),
                (self.crs_key(), request.crs.code()),
                ("BBOX", bbox.as_str()),
                ("WIDTH", width.as_str()),
                ("HEIGHT", height.as_str()),
                ("FORMAT", request.format.to_mime()),
                ("TRANSPARENT", transparent),
                ("BGCOLOR", "0xFFFFFF"),
            ],
        ))
    }

    pub fn get_feature_info(&self, request: &FeatureInfoRequest) -> Result<Url> {
        let layers = join_layers(&request.layers)?;
        check_size(request.width, request.height)?;
        if request.i >= request.width || request.j >= request.height {
            return Err(SoilError::invalid_parameter(format!(
                "pixel ({}, {}) lies outside the {}x{} image",
                request.i, request.j, request.width, request.height
            )));
        }

        let width = request.width.to_string();
        let height = request.height.to_string();
        let i = request.i.to_string();
        let j = request.j.to_string();
        let feature_count = request.feature_count.max(1).to_string();
        let bbox = request.bbox.to_wms_param(request.crs, self.version);
        let (i_key, j_key) = match self.version {
            WmsVersion::V1_3_0 => ("I", "J"),
            WmsVersion::V1_1_1 => ("X", "Y"),
        };

        Ok(self.request_url(
            "GetFeatureInfo",
            &[
                ("LAYERS", layers.as_str()),
                ("QUERY_LAYERS", layers.as_str()),
                ("STYLES", ""),
                (self.crs_key(), request.crs.code()),
                ("BBOX", bbox.as_str()),
                ("WIDTH", width.as_str()),
                ("HEIGHT", height.as_str()),
                ("INFO_FORMAT", request.info_format.to_mime()),
                ("FEATURE_COUNT", feature_count.as_str()),
                (i_key, i.as_str()),
                (j_key, j.as_str()),
            ],
        ))
    }

    fn crs_key(&self) -> &'static str {
        match self.version {
            WmsVersion::V1_3_0 => "CRS",
            WmsVersion::V1_1_1 => "SRS",
        }
    }

    fn request_url(&self, request: &str, params: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("SERVICE", "WMS")
                .append_pair("VERSION", self.version.as_str())
                .append_pair("REQUEST", request);
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        url
    }
}

fn join_layers(layers: &[String]) -> Result<String> {
    let names: Vec<&str> = layers
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();
    if names.is_empty() {
        return Err(SoilError::invalid_parameter("at least one layer name is required"));
    }
    Ok(names.join(","))
}

fn check_size(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(SoilError::invalid_parameter(format!(
            "image size must be positive, got {}x{}",
            width, height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BASE_URL;
    use std::collections::HashMap;

    fn builder(version: WmsVersion) -> WmsRequestBuilder {
        WmsRequestBuilder::new(Url::parse(DEFAULT_BASE_URL).unwrap(), version)
    }

    fn params(url: &Url) -> HashMap<String, String> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_get_capabilities_url() {
        let url = builder(WmsVersion::V1_3_0).get_capabilities();
        assert!(url.as_str().starts_with(DEFAULT_BASE_URL));
        let p = params(&url);
        assert_eq!(p["SERVICE"], "WMS");
        assert_eq!(p["REQUEST"], "GetCapabilities");
        assert_eq!(p["VERSION"], "1.3.0");
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn test_get_map_url() {
        let bbox = BoundingBox::from_lat_lon(51.45, -0.15, 51.55, -0.05).unwrap();
        let mut request = MapRequest::new("topsoil_layer", bbox);
        request.width = 450;
        request.height = 450;

        let url = builder(WmsVersion::V1_3_0).get_map(&request).unwrap();
        let p = params(&url);
        assert_eq!(p["REQUEST"], "GetMap");
        assert_eq!(p["LAYERS"], "topsoil_layer");
        assert_eq!(p["WIDTH"], "450");
        assert_eq!(p["HEIGHT"], "450");
        assert_eq!(p["FORMAT"], "image/png");
        assert_eq!(p["CRS"], "EPSG:4326");
        assert_eq!(p["BBOX"], "51.45,-0.15,51.55,-0.05");
        assert_eq!(p["TRANSPARENT"], "TRUE");
    }

    #[test]
    fn test_get_map_encodes_query() {
        let bbox = BoundingBox::from_lat_lon(51.45, -0.15, 51.55, -0.05).unwrap();
        let request = MapRequest::new("a layer&b", bbox);
        let url = builder(WmsVersion::V1_3_0).get_map(&request).unwrap();
        let query = url.query().unwrap();
        assert!(!query.contains("a layer&b"));
        assert_eq!(params(&url)["LAYERS"], "a layer&b");
    }

    #[test]
    fn test_get_map_multiple_layers_and_bng() {
        let bbox = BoundingBox::new(529_000.0, 179_000.0, 531_000.0, 181_000.0).unwrap();
        let request = MapRequest {
            layers: vec!["Soil.Texture".into(), " Soil.Depth.Boreholes ".into()],
            bbox,
            crs: Crs::BritishNationalGrid,
            width: 256,
            height: 256,
            format: ImageFormat::Jpeg,
            transparent: false,
        };
        let url = builder(WmsVersion::V1_3_0).get_map(&request).unwrap();
        let p = params(&url);
        assert_eq!(p["LAYERS"], "Soil.Texture,Soil.Depth.Boreholes");
        assert_eq!(p["CRS"], "EPSG:27700");
        assert_eq!(p["BBOX"], "529000,179000,531000,181000");
        assert_eq!(p["FORMAT"], "image/jpeg");
        assert_eq!(p["TRANSPARENT"], "FALSE");
    }

    #[test]
    fn test_get_map_v111_uses_srs() {
        let bbox = BoundingBox::from_lat_lon(51.45, -0.15, 51.55, -0.05).unwrap();
        let request = MapRequest::new("topsoil_layer", bbox);
        let url = builder(WmsVersion::V1_1_1).get_map(&request).unwrap();
        let p = params(&url);
        assert_eq!(p["VERSION"], "1.1.1");
        assert_eq!(p["SRS"], "EPSG:4326");
        assert!(!p.contains_key("CRS"));
        assert_eq!(p["BBOX"], "-0.15,51.45,-0.05,51.55");
    }

    #[test]
    fn test_get_map_rejects_bad_input() {
        let bbox = BoundingBox::from_lat_lon(51.45, -0.15, 51.55, -0.05).unwrap();
        let mut request = MapRequest::new("  ", bbox);
        assert!(matches!(
            builder(WmsVersion::V1_3_0).get_map(&request),
            Err(SoilError::InvalidParameter(_))
        ));

        request.layers = vec!["topsoil_layer".into()];
        request.width = 0;
        assert!(matches!(
            builder(WmsVersion::V1_3_0).get_map(&request),
            Err(SoilError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_point_query_window() {
        let window = PointQuerySettings::default();
        let request =
            FeatureInfoRequest::around_point("Topsoil.Sample.Data", 51.5074, -0.1278, InfoFormat::Html, &window)
                .unwrap();

        assert_eq!(request.width, 101);
        assert_eq!(request.i, 50);
        assert_eq!(request.j, 50);
        let (cx, cy) = request.bbox.center();
        assert!((cx - -0.1278).abs() < 1e-12);
        assert!((cy - 51.5074).abs() < 1e-12);

        // Centre of pixel 50 in a 101-pixel window maps back to the point
        let pixel = (request.bbox.max_x - request.bbox.min_x) / request.width as f64;
        let x = request.bbox.min_x + (request.i as f64 + 0.5) * pixel;
        assert!((x - -0.1278).abs() < 1e-9);
    }

    #[test]
    fn test_point_query_rejects_bad_latitude() {
        let window = PointQuerySettings::default();
        assert!(FeatureInfoRequest::around_point("x", 91.0, 0.0, InfoFormat::Html, &window).is_err());
        assert!(FeatureInfoRequest::around_point("x", f64::NAN, 0.0, InfoFormat::Html, &window).is_err());
    }

    #[test]
    fn test_get_feature_info_url() {
        let window = PointQuerySettings::default();
        let request =
            FeatureInfoRequest::around_point("Topsoil.Sample.Data", 51.5074, -0.1278, InfoFormat::Html, &window)
                .unwrap();
        let url = builder(WmsVersion::V1_3_0).get_feature_info(&request).unwrap();
        let p = params(&url);
        assert_eq!(p["REQUEST"], "GetFeatureInfo");
        assert_eq!(p["LAYERS"], "Topsoil.Sample.Data");
        assert_eq!(p["QUERY_LAYERS"], "Topsoil.Sample.Data");
        assert_eq!(p["INFO_FORMAT"], "text/html");
        assert_eq!(p["I"], "50");
        assert_eq!(p["J"], "50");
        assert_eq!(p["FEATURE_COUNT"], "10");
        assert_eq!(p["CRS"], "EPSG:4326");
    }

    #[test]
    fn test_get_feature_info_v111_pixel_keys() {
        let bbox = BoundingBox::new(-6.0, 50.0, 2.0, 58.0).unwrap();
        let request = FeatureInfoRequest {
            layers: vec!["Soil.Texture".into()],
            bbox,
            crs: Crs::Epsg4326,
            width: 800,
            height: 600,
            i: 400,
            j: 300,
            info_format: InfoFormat::Text,
            feature_count: 5,
        };
        let url = builder(WmsVersion::V1_1_1).get_feature_info(&request).unwrap();
        let p = params(&url);
        assert_eq!(p["X"], "400");
        assert_eq!(p["Y"], "300");
        assert!(!p.contains_key("I"));
        assert_eq!(p["INFO_FORMAT"], "text/plain");
    }

    #[test]
    fn test_get_feature_info_pixel_outside_image() {
        let bbox = BoundingBox::new(-6.0, 50.0, 2.0, 58.0).unwrap();
        let request = FeatureInfoRequest {
            layers: vec!["Soil.Texture".into()],
            bbox,
            crs: Crs::Epsg4326,
            width: 100,
            height: 100,
            i: 100,
            j: 0,
            info_format: InfoFormat::Text,
            feature_count: 5,
        };
        assert!(builder(WmsVersion::V1_3_0).get_feature_info(&request).is_err());
    }
}
