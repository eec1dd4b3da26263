// Capabilities and layer discovery tools

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{failure, json_schema_boolean, json_schema_object, json_schema_string, respond, Tool};
use anyhow::{Context, Result};
use serde::Deserialize;
use soilwms_core::SoilDataService;
use std::sync::Arc;

/// Service metadata and the full layer list
pub struct CapabilitiesTool {
    service: Arc<SoilDataService>,
}

impl CapabilitiesTool {
    pub fn new(service: Arc<SoilDataService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize, Default)]
struct CapabilitiesArgs {
    #[serde(default)]
    force_refresh: bool,
    #[serde(default)]
    include_raw: bool,
}

#[async_trait::async_trait]
impl Tool for CapabilitiesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_capabilities".to_string(),
            description: "Get the BGS soil WMS capabilities: service metadata, formats and layers. \
                          Results are cached."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "force_refresh": json_schema_boolean("Bypass the cache and refetch (default: false)"),
                    "include_raw": json_schema_boolean("Include the raw capabilities XML (default: false)")
                }),
                vec![],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: CapabilitiesArgs = if arguments.is_null() {
            CapabilitiesArgs::default()
        } else {
            serde_json::from_value(arguments).context("Invalid arguments for get_capabilities")?
        };

        let entry = match self.service.capabilities(args.force_refresh).await {
            Ok(entry) => entry,
            Err(e) => return Ok(failure(&e)),
        };

        let mut body = serde_json::to_value(&entry.capabilities)?;
        body["layer_count"] = entry.capabilities.layers.len().into();
        if args.include_raw {
            body["raw"] = entry.raw.clone().into();
        }
        Ok(CallToolResult::json(&body)?)
    }
}

/// Layer listing with optional substring search
pub struct AvailableLayersTool {
    service: Arc<SoilDataService>,
}

impl AvailableLayersTool {
    pub fn new(service: Arc<SoilDataService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize, Default)]
struct AvailableLayersArgs {
    #[serde(default)]
    search_query: Option<String>,
}

#[async_trait::async_trait]
impl Tool for AvailableLayersTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_available_soil_layers".to_string(),
            description: "List soil data layers, optionally filtered by a case-insensitive search \
                          over name, title and abstract"
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "search_query": json_schema_string("Text to search for (omit to list all layers)")
                }),
                vec![],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: AvailableLayersArgs = if arguments.is_null() {
            AvailableLayersArgs::default()
        } else {
            serde_json::from_value(arguments)
                .context("Invalid arguments for get_available_soil_layers")?
        };

        respond(self.service.available_layers(args.search_query.as_deref()).await)
    }
}

/// Metadata for a single named layer
pub struct LayerInfoTool {
    service: Arc<SoilDataService>,
}

impl LayerInfoTool {
    pub fn new(service: Arc<SoilDataService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
struct LayerInfoArgs {
    layer_name: String,
}

#[async_trait::async_trait]
impl Tool for LayerInfoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_soil_layer_info".to_string(),
            description: "Get title, abstract, extent, CRS list and formats for one layer".to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "layer_name": json_schema_string("Exact layer name, e.g. Soil.Texture")
                }),
                vec!["layer_name"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: LayerInfoArgs = serde_json::from_value(arguments)
            .context("Invalid arguments for get_soil_layer_info")?;

        respond(self.service.layer_info(&args.layer_name).await)
    }
}
