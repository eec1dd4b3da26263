use crate::error::{Result, SoilError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coordinate reference systems understood by the converter and request builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// WGS84 geographic, latitude-first axis order under WMS 1.3.0
    #[serde(rename = "EPSG:4326")]
    Epsg4326,
    /// WGS84 geographic, longitude-first axis order
    #[serde(rename = "CRS:84")]
    Crs84,
    /// British National Grid (OSGB36 / transverse Mercator), metres
    #[serde(rename = "EPSG:27700")]
    BritishNationalGrid,
}

impl Crs {
    pub const ALL: [Crs; 3] = [Crs::Epsg4326, Crs::Crs84, Crs::BritishNationalGrid];

    pub fn code(&self) -> &'static str {
        match self {
            Crs::Epsg4326 => "EPSG:4326",
            Crs::Crs84 => "CRS:84",
            Crs::BritishNationalGrid => "EPSG:27700",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Crs::Epsg4326 => "WGS84 Latitude/Longitude",
            Crs::Crs84 => "WGS84 Longitude/Latitude (OGC axis order)",
            Crs::BritishNationalGrid => "British National Grid (BNG)",
        }
    }

    /// True for the two WGS84 identifiers
    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Epsg4326 | Crs::Crs84)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Crs {
    type Err = SoilError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EPSG:4326" | "WGS84" => Ok(Crs::Epsg4326),
            "CRS:84" | "OGC:CRS84" => Ok(Crs::Crs84),
            "EPSG:27700" | "BNG" => Ok(Crs::BritishNationalGrid),
            _ => Err(SoilError::UnsupportedCrs(s.to_string())),
        }
    }
}

/// A single position tagged with its reference system.
///
/// `x` is longitude (geographic) or easting (BNG); `y` is latitude or northing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub crs: Crs,
}

impl Coordinate {
    pub fn new(x: f64, y: f64, crs: Crs) -> Self {
        Self { x, y, crs }
    }
}

/// Protocol version sent to the upstream service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WmsVersion {
    #[serde(rename = "1.1.1")]
    V1_1_1,
    #[serde(rename = "1.3.0")]
    #[default]
    V1_3_0,
}

impl WmsVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            WmsVersion::V1_1_1 => "1.1.1",
            WmsVersion::V1_3_0 => "1.3.0",
        }
    }
}

impl fmt::Display for WmsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned extent in the request CRS.
///
/// `x` runs along longitude/easting and `y` along latitude/northing, whatever
/// axis order the wire format later needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Validating constructor: all values finite, min strictly below max.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        let values = [min_x, min_y, max_x, max_y];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(SoilError::invalid_parameter(format!(
                "bounding box values must be finite, got {:?}",
                values
            )));
        }
        if min_x >= max_x || min_y >= max_y {
            return Err(SoilError::invalid_parameter(format!(
                "bounding box minimum must be below maximum on each axis (x: {} .. {}, y: {} .. {})",
                min_x, max_x, min_y, max_y
            )));
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// Build from latitude/longitude bounds (or northing/easting for BNG).
    pub fn from_lat_lon(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Result<Self> {
        Self::new(min_lon, min_lat, max_lon, max_lat)
    }

    /// A square window of `buffer` units around a point.
    pub fn around(x: f64, y: f64, buffer: f64) -> Result<Self> {
        Self::new(x - buffer, y - buffer, x + buffer, y + buffer)
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// `BBOX` value in the axis order the given CRS and version require.
    ///
    /// WMS 1.3.0 honours the EPSG axis order, which is latitude first for
    /// EPSG:4326. CRS:84, EPSG:27700 and every 1.1.1 request are x first.
    pub fn to_wms_param(&self, crs: Crs, version: WmsVersion) -> String {
        let lat_first = version == WmsVersion::V1_3_0 && crs == Crs::Epsg4326;
        if lat_first {
            format!("{},{},{},{}", self.min_y, self.min_x, self.max_y, self.max_x)
        } else {
            format!("{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
        }
    }
}

/// GetMap output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ImageFormat {
    #[serde(rename = "image/png")]
    #[default]
    Png,
    #[serde(rename = "image/gif")]
    Gif,
    #[serde(rename = "image/jpeg")]
    Jpeg,
}

impl ImageFormat {
    pub fn to_mime(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = SoilError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image/png" => Ok(ImageFormat::Png),
            "image/gif" => Ok(ImageFormat::Gif),
            "image/jpeg" | "image/jpg" => Ok(ImageFormat::Jpeg),
            _ => Err(SoilError::UnsupportedFormat {
                format: s.to_string(),
                supported: "image/png, image/gif, image/jpeg".to_string(),
            }),
        }
    }
}

/// GetFeatureInfo response formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InfoFormat {
    /// Human-readable HTML table
    #[serde(rename = "text/html")]
    #[default]
    Html,
    /// OGC-style XML
    #[serde(rename = "text/xml")]
    Xml,
    /// Plain text
    #[serde(rename = "text/plain")]
    Text,
}

impl InfoFormat {
    pub fn to_mime(&self) -> &'static str {
        match self {
            InfoFormat::Html => "text/html",
            InfoFormat::Xml => "text/xml",
            InfoFormat::Text => "text/plain",
        }
    }
}

impl FromStr for InfoFormat {
    type Err = SoilError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text/html" => Ok(InfoFormat::Html),
            "text/xml" => Ok(InfoFormat::Xml),
            "text/plain" => Ok(InfoFormat::Text),
            _ => Err(SoilError::UnsupportedFormat {
                format: s.to_string(),
                supported: "text/html, text/xml, text/plain".to_string(),
            }),
        }
    }
}

/// The five documented soil data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoilDataType {
    Topsoil,
    ProfileSoil,
    SoilTexture,
    SoilDepth,
    ParentMaterial,
}

impl SoilDataType {
    pub const ALL: [SoilDataType; 5] = [
        SoilDataType::Topsoil,
        SoilDataType::ProfileSoil,
        SoilDataType::SoilTexture,
        SoilDataType::SoilDepth,
        SoilDataType::ParentMaterial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SoilDataType::Topsoil => "topsoil",
            SoilDataType::ProfileSoil => "profile_soil",
            SoilDataType::SoilTexture => "soil_texture",
            SoilDataType::SoilDepth => "soil_depth",
            SoilDataType::ParentMaterial => "parent_material",
        }
    }

    /// Upstream layer queried for this data type unless overridden in config
    pub fn default_layer(&self) -> &'static str {
        match self {
            SoilDataType::Topsoil => "Topsoil.Sample.Data",
            SoilDataType::ProfileSoil => "Profile.Soil.Sample.Data",
            SoilDataType::SoilTexture => "Soil.Texture",
            SoilDataType::SoilDepth => "Soil.Depth.Boreholes",
            SoilDataType::ParentMaterial => "Soil.Parent.Material.Grain.Size",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SoilDataType::Topsoil => "Top soil sample data and properties",
            SoilDataType::ProfileSoil => "Profile soil sample data from different depths",
            SoilDataType::SoilTexture => "Soil texture classification and properties",
            SoilDataType::SoilDepth => "Soil depth measurements from boreholes",
            SoilDataType::ParentMaterial => "Soil parent material grain size and composition",
        }
    }
}

impl fmt::Display for SoilDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SoilDataType {
    type Err = SoilError;

    fn from_str(s: &str) -> Result<Self> {
        SoilDataType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SoilError::UnknownDataType(s.to_string()))
    }
}

/// Geographic extent advertised for a layer, in WGS84 degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoExtent {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

/// One named layer from the capabilities document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub name: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub bounding_box: Option<GeoExtent>,
    pub crs_list: Vec<String>,
    pub formats: Vec<String>,
    pub queryable: bool,
}

impl LayerDescriptor {
    /// Case-insensitive substring match over name, title and abstract.
    ///
    /// `query` must already be lowercased.
    pub fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(query)
            || self.title.to_lowercase().contains(query)
            || self
                .abstract_text
                .as_deref()
                .map(|a| a.to_lowercase().contains(query))
                .unwrap_or(false)
    }
}

/// Parsed capabilities document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCapabilities {
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub version: String,
    pub layers: Vec<LayerDescriptor>,
    pub formats: Vec<String>,
    pub info_formats: Vec<String>,
    pub cached_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_parsing() {
        assert_eq!("EPSG:4326".parse::<Crs>().unwrap(), Crs::Epsg4326);
        assert_eq!("crs:84".parse::<Crs>().unwrap(), Crs::Crs84);
        assert_eq!(" EPSG:27700 ".parse::<Crs>().unwrap(), Crs::BritishNationalGrid);
        assert!(matches!(
            "EPSG:9999".parse::<Crs>(),
            Err(SoilError::UnsupportedCrs(code)) if code == "EPSG:9999"
        ));
    }

    #[test]
    fn test_bounding_box_invariants() {
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_ok());
        assert!(BoundingBox::new(1.0, 0.0, 1.0, 1.0).is_err());
        assert!(BoundingBox::new(0.0, 2.0, 1.0, 1.0).is_err());
        assert!(BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0).is_err());
        assert!(BoundingBox::new(0.0, 0.0, f64::INFINITY, 1.0).is_err());
    }

    #[test]
    fn test_bbox_axis_order() {
        let bbox = BoundingBox::from_lat_lon(51.45, -0.15, 51.55, -0.05).unwrap();
        assert_eq!(
            bbox.to_wms_param(Crs::Epsg4326, WmsVersion::V1_3_0),
            "51.45,-0.15,51.55,-0.05"
        );
        assert_eq!(
            bbox.to_wms_param(Crs::Crs84, WmsVersion::V1_3_0),
            "-0.15,51.45,-0.05,51.55"
        );
        assert_eq!(
            bbox.to_wms_param(Crs::Epsg4326, WmsVersion::V1_1_1),
            "-0.15,51.45,-0.05,51.55"
        );

        let bng = BoundingBox::new(529000.0, 179000.0, 531000.0, 181000.0).unwrap();
        assert_eq!(
            bng.to_wms_param(Crs::BritishNationalGrid, WmsVersion::V1_3_0),
            "529000,179000,531000,181000"
        );
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("image/png".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("IMAGE/JPEG".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert!(matches!(
            "image/tiff".parse::<ImageFormat>(),
            Err(SoilError::UnsupportedFormat { .. })
        ));

        assert_eq!("text/xml".parse::<InfoFormat>().unwrap(), InfoFormat::Xml);
        assert!(matches!(
            "application/json".parse::<InfoFormat>(),
            Err(SoilError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_data_type_lookup() {
        assert_eq!(
            "topsoil".parse::<SoilDataType>().unwrap(),
            SoilDataType::Topsoil
        );
        assert_eq!(
            "Parent_Material".parse::<SoilDataType>().unwrap(),
            SoilDataType::ParentMaterial
        );
        assert!(matches!(
            "bedrock".parse::<SoilDataType>(),
            Err(SoilError::UnknownDataType(_))
        ));
        assert_ne!(SoilDataType::Topsoil.default_layer(), "topsoil");
    }

    #[test]
    fn test_layer_matching() {
        let layer = LayerDescriptor {
            name: "Soil.Texture".to_string(),
            title: "Soil texture classes".to_string(),
            abstract_text: Some("Derived from the national soil inventory".to_string()),
            bounding_box: None,
            crs_list: vec![],
            formats: vec![],
            queryable: true,
        };
        assert!(layer.matches("texture"));
        assert!(layer.matches("inventory"));
        assert!(!layer.matches("depth"));
    }
}
