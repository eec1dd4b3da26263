pub mod layers;
pub mod location;
pub mod map;
pub mod reference;
mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use layers::{AvailableLayersTool, CapabilitiesTool, LayerInfoTool};
pub use location::{FeatureInfoTool, SoilDataAtLocationTool};
pub use map::SoilMapUrlTool;
pub use reference::{ConvertCoordinatesTool, SoilDataSummaryTool};
pub use registry::{
    failure, json_schema_array, json_schema_boolean, json_schema_enum, json_schema_integer,
    json_schema_number, json_schema_object, json_schema_string, respond, Tool, ToolRegistry,
};

use soilwms_core::SoilDataService;
use std::sync::Arc;

/// Registry holding every soil-data tool backed by `service`
pub fn soil_registry(service: Arc<SoilDataService>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(SoilDataAtLocationTool::new(service.clone())));
    registry.register(Arc::new(FeatureInfoTool::new(service.clone())));

    registry.register(Arc::new(AvailableLayersTool::new(service.clone())));
    registry.register(Arc::new(CapabilitiesTool::new(service.clone())));
    registry.register(Arc::new(LayerInfoTool::new(service.clone())));

    registry.register(Arc::new(SoilMapUrlTool::new(service.clone())));

    registry.register(Arc::new(ConvertCoordinatesTool::new(service.clone())));
    registry.register(Arc::new(SoilDataSummaryTool::new(service)));

    registry
}
