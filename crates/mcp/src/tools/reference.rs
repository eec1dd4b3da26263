// Offline tools: coordinate conversion and the data-type summary

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{json_schema_enum, json_schema_number, json_schema_object, respond, Tool};
use anyhow::{Context, Result};
use serde::Deserialize;
use soilwms_core::SoilDataService;
use std::sync::Arc;

const CRS_CODES: [&str; 3] = ["EPSG:4326", "CRS:84", "EPSG:27700"];

pub struct ConvertCoordinatesTool {
    service: Arc<SoilDataService>,
}

impl ConvertCoordinatesTool {
    pub fn new(service: Arc<SoilDataService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
struct ConvertCoordinatesArgs {
    x: f64,
    y: f64,
    source_crs: String,
    target_crs: String,
}

#[async_trait::async_trait]
impl Tool for ConvertCoordinatesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "convert_coordinates".to_string(),
            description: "Convert a point between WGS84 (EPSG:4326, CRS:84) and British National \
                          Grid (EPSG:27700). x is longitude or easting, y is latitude or northing."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "x": json_schema_number("Longitude or easting"),
                    "y": json_schema_number("Latitude or northing"),
                    "source_crs": json_schema_enum(&CRS_CODES, "EPSG:4326", "Source CRS"),
                    "target_crs": json_schema_enum(&CRS_CODES, "EPSG:27700", "Target CRS")
                }),
                vec!["x", "y", "source_crs", "target_crs"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: ConvertCoordinatesArgs = serde_json::from_value(arguments)
            .context("Invalid arguments for convert_coordinates")?;

        respond(
            self.service
                .convert_coordinates(args.x, args.y, &args.source_crs, &args.target_crs),
        )
    }
}

pub struct SoilDataSummaryTool {
    service: Arc<SoilDataService>,
}

impl SoilDataSummaryTool {
    pub fn new(service: Arc<SoilDataService>) -> Self {
        Self { service }
    }
}

#[async_trait::async_trait]
impl Tool for SoilDataSummaryTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_soil_data_summary".to_string(),
            description: "Describe the soil data types, coordinate systems and typical workflows"
                .to_string(),
            input_schema: json_schema_object(serde_json::json!({}), vec![]),
        }
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<CallToolResult> {
        Ok(CallToolResult::json(&self.service.summary())?)
    }
}
