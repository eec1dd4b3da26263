// Point and pixel queries against soil layers (GetFeatureInfo)

use crate::protocol::{CallToolResult, ToolContent, ToolSchema};
use crate::tools::{
    failure, json_schema_array, json_schema_enum, json_schema_integer, json_schema_number,
    json_schema_object, json_schema_string, Tool,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use soilwms_core::{
    BoundingBox, Crs, FeatureInfoRequest, FeatureInfoResponse, InfoFormat, SoilDataService,
    SoilDataType,
};
use std::sync::Arc;

const INFO_FORMATS: [&str; 3] = ["text/html", "text/xml", "text/plain"];
const CRS_CODES: [&str; 3] = ["EPSG:4326", "CRS:84", "EPSG:27700"];

/// Summary line plus the upstream body as an embedded resource
fn feature_info_result(response: FeatureInfoResponse) -> Result<CallToolResult> {
    let summary = serde_json::json!({
        "url": response.url,
        "layers": response.layers,
        "content_type": response.content_type,
        "truncated": response.truncated,
    });
    Ok(CallToolResult {
        content: vec![
            ToolContent::text(serde_json::to_string_pretty(&summary)?),
            ToolContent::resource(response.url, response.content_type, response.body),
        ],
        is_error: None,
    })
}

/// Soil properties at a latitude/longitude for one of the five data types
pub struct SoilDataAtLocationTool {
    service: Arc<SoilDataService>,
}

impl SoilDataAtLocationTool {
    pub fn new(service: Arc<SoilDataService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
struct SoilDataAtLocationArgs {
    latitude: f64,
    longitude: f64,
    #[serde(default = "default_data_type")]
    data_type: String,
    #[serde(default = "default_point_format")]
    format_type: String,
}

fn default_data_type() -> String {
    SoilDataType::Topsoil.as_str().to_string()
}

fn default_point_format() -> String {
    InfoFormat::Html.to_mime().to_string()
}

#[async_trait::async_trait]
impl Tool for SoilDataAtLocationTool {
    fn schema(&self) -> ToolSchema {
        let data_types: Vec<&str> = SoilDataType::ALL.iter().map(|t| t.as_str()).collect();
        ToolSchema {
            name: "get_soil_data_at_location".to_string(),
            description: "Get soil data at a WGS84 latitude/longitude from the BGS soil WMS. \
                          The data type selects the upstream layer."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "latitude": json_schema_number("Latitude in decimal degrees (WGS84)"),
                    "longitude": json_schema_number("Longitude in decimal degrees (WGS84)"),
                    "data_type": json_schema_enum(&data_types, "topsoil", "Soil data type to query"),
                    "format_type": json_schema_enum(&INFO_FORMATS, "text/html", "Response format")
                }),
                vec!["latitude", "longitude"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: SoilDataAtLocationArgs = serde_json::from_value(arguments)
            .context("Invalid arguments for get_soil_data_at_location")?;

        let data_type: SoilDataType = match args.data_type.parse() {
            Ok(t) => t,
            Err(e) => return Ok(failure(&e)),
        };
        let format: InfoFormat = match args.format_type.parse() {
            Ok(f) => f,
            Err(e) => return Ok(failure(&e)),
        };

        match self
            .service
            .soil_data_at_location(args.latitude, args.longitude, data_type, format)
            .await
        {
            Ok(response) => feature_info_result(response),
            Err(e) => Ok(failure(&e)),
        }
    }
}

/// Raw GetFeatureInfo over a caller-defined map window
pub struct FeatureInfoTool {
    service: Arc<SoilDataService>,
}

impl FeatureInfoTool {
    pub fn new(service: Arc<SoilDataService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
struct FeatureInfoArgs {
    layers: Vec<String>,
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    i: u32,
    j: u32,
    #[serde(default = "default_width")]
    width: u32,
    #[serde(default = "default_height")]
    height: u32,
    #[serde(default = "default_raw_format")]
    info_format: String,
    #[serde(default = "default_crs")]
    crs: String,
    #[serde(default = "default_feature_count")]
    feature_count: u32,
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

fn default_raw_format() -> String {
    InfoFormat::Text.to_mime().to_string()
}

fn default_crs() -> String {
    Crs::Epsg4326.code().to_string()
}

fn default_feature_count() -> u32 {
    10
}

impl FeatureInfoArgs {
    fn into_request(self) -> soilwms_core::Result<FeatureInfoRequest> {
        Ok(FeatureInfoRequest {
            bbox: BoundingBox::new(self.min_x, self.min_y, self.max_x, self.max_y)?,
            crs: self.crs.parse()?,
            info_format: self.info_format.parse()?,
            layers: self.layers,
            width: self.width,
            height: self.height,
            i: self.i,
            j: self.j,
            feature_count: self.feature_count,
        })
    }
}

#[async_trait::async_trait]
impl Tool for FeatureInfoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_feature_info".to_string(),
            description: "Query features at pixel (i, j) of a map window. Bounds are \
                          x = longitude/easting, y = latitude/northing in the given CRS."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "layers": json_schema_array(json_schema_string("Layer name"), "Layers to query"),
                    "min_x": json_schema_number("Minimum x (longitude or easting)"),
                    "min_y": json_schema_number("Minimum y (latitude or northing)"),
                    "max_x": json_schema_number("Maximum x (longitude or easting)"),
                    "max_y": json_schema_number("Maximum y (latitude or northing)"),
                    "i": json_schema_integer(0, 400, "Pixel column from the left"),
                    "j": json_schema_integer(0, 300, "Pixel row from the top"),
                    "width": json_schema_integer(1, 800, "Map width in pixels"),
                    "height": json_schema_integer(1, 600, "Map height in pixels"),
                    "info_format": json_schema_enum(&INFO_FORMATS, "text/plain", "Response format"),
                    "crs": json_schema_enum(&CRS_CODES, "EPSG:4326", "Coordinate reference system of the bounds"),
                    "feature_count": json_schema_integer(1, 10, "Maximum features to return")
                }),
                vec!["layers", "min_x", "min_y", "max_x", "max_y", "i", "j"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: FeatureInfoArgs = serde_json::from_value(arguments)
            .context("Invalid arguments for get_feature_info")?;

        let request = match args.into_request() {
            Ok(request) => request,
            Err(e) => return Ok(failure(&e)),
        };

        match self.service.feature_info(&request).await {
            Ok(response) => feature_info_result(response),
            Err(e) => Ok(failure(&e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{service_with, FakeTransport};
    use serde_json::json;

    #[tokio::test]
    async fn test_point_query_returns_embedded_resource() {
        let transport = FakeTransport::returning("<table><tr><td>pH</td><td>6.4</td></tr></table>");
        let tool = SoilDataAtLocationTool::new(service_with(transport.clone()));

        let result = tool
            .execute(json!({
                "latitude": 51.5074,
                "longitude": -0.1278,
                "data_type": "topsoil",
                "format_type": "text/html"
            }))
            .await
            .unwrap();

        assert!(!result.is_error());
        assert_eq!(result.content.len(), 2);
        match &result.content[1] {
            ToolContent::Resource { resource } => {
                assert_eq!(resource.mime_type, "text/html");
                assert!(resource.text.contains("6.4"));
                assert!(resource.uri.contains("GetFeatureInfo"));
            }
            other => panic!("expected resource content, got {:?}", other),
        }

        let params = transport.last_params();
        assert_eq!(params["QUERY_LAYERS"], "Topsoil.Sample.Data");
        assert_eq!(params["INFO_FORMAT"], "text/html");
    }

    #[tokio::test]
    async fn test_unknown_data_type_is_tool_error() {
        let transport = FakeTransport::returning("");
        let tool = SoilDataAtLocationTool::new(service_with(transport.clone()));

        let result = tool
            .execute(json!({"latitude": 51.5, "longitude": -0.1, "data_type": "bedrock"}))
            .await
            .unwrap();

        assert!(result.is_error());
        let value = serde_json::to_value(&result).unwrap();
        assert!(value["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("unknown_data_type"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_info_format_is_tool_error() {
        let tool = SoilDataAtLocationTool::new(service_with(FakeTransport::returning("")));
        let result = tool
            .execute(json!({"latitude": 51.5, "longitude": -0.1, "format_type": "application/json"}))
            .await
            .unwrap();
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_missing_coordinates_is_argument_error() {
        let tool = SoilDataAtLocationTool::new(service_with(FakeTransport::returning("")));
        assert!(tool.execute(json!({"latitude": 51.5})).await.is_err());
    }

    #[tokio::test]
    async fn test_raw_feature_info_defaults() {
        let transport = FakeTransport::returning("Soil texture: clay loam");
        let tool = FeatureInfoTool::new(service_with(transport.clone()));

        let result = tool
            .execute(json!({
                "layers": ["Soil.Texture"],
                "min_x": -1.0, "min_y": 52.0, "max_x": 0.0, "max_y": 53.0,
                "i": 400, "j": 300
            }))
            .await
            .unwrap();

        assert!(!result.is_error());
        let params = transport.last_params();
        assert_eq!(params["INFO_FORMAT"], "text/plain");
        assert_eq!(params["WIDTH"], "800");
        assert_eq!(params["HEIGHT"], "600");
        assert_eq!(params["FEATURE_COUNT"], "10");
        assert_eq!(params["BBOX"], "52,-1,53,0");
    }

    #[tokio::test]
    async fn test_raw_feature_info_rejects_inverted_bbox() {
        let transport = FakeTransport::returning("");
        let tool = FeatureInfoTool::new(service_with(transport.clone()));

        let result = tool
            .execute(json!({
                "layers": ["Soil.Texture"],
                "min_x": 1.0, "min_y": 52.0, "max_x": 0.0, "max_y": 53.0,
                "i": 0, "j": 0
            }))
            .await
            .unwrap();
        assert!(result.is_error());
        assert_eq!(transport.call_count(), 0);
    }
}
