// Map image URL construction (GetMap)

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{
    json_schema_boolean, json_schema_enum, json_schema_integer, json_schema_number,
    json_schema_object, json_schema_string, respond, Tool,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use soilwms_core::{BoundingBox, Crs, ImageFormat, MapRequest, SoilDataService};
use std::sync::Arc;

/// Builds a GetMap URL the agent can hand to a renderer; never fetches it
pub struct SoilMapUrlTool {
    service: Arc<SoilDataService>,
}

impl SoilMapUrlTool {
    pub fn new(service: Arc<SoilDataService>) -> Self {
        Self { service }
    }
}

/// One layer name or several
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LayerNames {
    One(String),
    Many(Vec<String>),
}

impl LayerNames {
    fn into_vec(self) -> Vec<String> {
        match self {
            LayerNames::One(name) => name.split(',').map(str::to_string).collect(),
            LayerNames::Many(names) => names,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SoilMapUrlArgs {
    layer_name: LayerNames,
    min_lat: f64,
    min_lon: f64,
    max_lat: f64,
    max_lon: f64,
    #[serde(default = "default_width")]
    width: u32,
    #[serde(default = "default_height")]
    height: u32,
    #[serde(default = "default_format")]
    format_type: String,
    #[serde(default = "default_crs")]
    crs: String,
    #[serde(default = "default_transparent")]
    transparent: bool,
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

fn default_format() -> String {
    ImageFormat::Png.to_mime().to_string()
}

fn default_crs() -> String {
    Crs::Epsg4326.code().to_string()
}

fn default_transparent() -> bool {
    true
}

impl SoilMapUrlArgs {
    fn into_request(self) -> soilwms_core::Result<MapRequest> {
        Ok(MapRequest {
            bbox: BoundingBox::from_lat_lon(self.min_lat, self.min_lon, self.max_lat, self.max_lon)?,
            crs: self.crs.parse()?,
            format: self.format_type.parse()?,
            layers: self.layer_name.into_vec(),
            width: self.width,
            height: self.height,
            transparent: self.transparent,
        })
    }
}

#[derive(Debug, Serialize)]
struct MapUrl {
    url: String,
    #[serde(flatten)]
    request: MapRequest,
}

#[async_trait::async_trait]
impl Tool for SoilMapUrlTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_soil_map_url".to_string(),
            description: "Build a WMS GetMap URL for soil layers over a bounding box. For EPSG:27700 \
                          the lat/lon bounds are northings/eastings in metres."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "layer_name": json_schema_string("Layer name, or comma-separated names"),
                    "min_lat": json_schema_number("Minimum latitude (or northing)"),
                    "min_lon": json_schema_number("Minimum longitude (or easting)"),
                    "max_lat": json_schema_number("Maximum latitude (or northing)"),
                    "max_lon": json_schema_number("Maximum longitude (or easting)"),
                    "width": json_schema_integer(1, 800, "Image width in pixels"),
                    "height": json_schema_integer(1, 600, "Image height in pixels"),
                    "format_type": json_schema_enum(&["image/png", "image/gif", "image/jpeg"], "image/png", "Image format"),
                    "crs": json_schema_enum(&["EPSG:4326", "CRS:84", "EPSG:27700"], "EPSG:4326", "Coordinate reference system"),
                    "transparent": json_schema_boolean("Transparent background (default: true)")
                }),
                vec!["layer_name", "min_lat", "min_lon", "max_lat", "max_lon"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: SoilMapUrlArgs = serde_json::from_value(arguments)
            .context("Invalid arguments for get_soil_map_url")?;

        let result = args.into_request().and_then(|request| {
            let url = self.service.map_url(&request)?;
            Ok(MapUrl {
                url: url.to_string(),
                request,
            })
        });
        respond(result)
    }
}
