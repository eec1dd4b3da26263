// Shared fixtures for tool and server tests

use crate::protocol::{CallToolResult, ToolContent};
use async_trait::async_trait;
use soilwms_core::{
    ManualClock, SoilDataService, SoilError, SoilWmsConfig, UpstreamResponse, WmsTransport,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use url::Url;

pub const CAPABILITIES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<WMS_Capabilities version="1.3.0" xmlns="http://www.opengis.net/wms">
  <Service><Name>WMS</Name><Title>UKSO_BGS</Title></Service>
  <Capability>
    <Request>
      <GetMap><Format>image/png</Format><Format>image/jpeg</Format></GetMap>
      <GetFeatureInfo><Format>text/html</Format><Format>text/plain</Format></GetFeatureInfo>
    </Request>
    <Layer>
      <Title>UKSO_BGS</Title>
      <CRS>EPSG:4326</CRS>
      <CRS>EPSG:27700</CRS>
      <Layer queryable="1">
        <Name>Soil.Texture</Name>
        <Title>Soil texture</Title>
        <Abstract>Topsoil texture classes</Abstract>
      </Layer>
      <Layer queryable="1">
        <Name>Soil.Depth.Boreholes</Name>
        <Title>Soil depth</Title>
      </Layer>
    </Layer>
  </Capability>
</WMS_Capabilities>"#;

/// Transport returning a fixed response and counting calls
pub struct FakeTransport {
    calls: Mutex<Vec<Url>>,
    response: soilwms_core::Result<UpstreamResponse>,
}

impl FakeTransport {
    pub fn returning(body: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            response: Ok(UpstreamResponse {
                status: 200,
                content_type: None,
                body: body.to_string(),
            }),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            response: Err(SoilError::service_unavailable(message)),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_params(&self) -> HashMap<String, String> {
        self.calls
            .lock()
            .unwrap()
            .last()
            .expect("no request recorded")
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }
}

#[async_trait]
impl WmsTransport for FakeTransport {
    async fn get(&self, url: &Url) -> soilwms_core::Result<UpstreamResponse> {
        self.calls.lock().unwrap().push(url.clone());
        self.response.clone()
    }
}

pub fn service_with(transport: Arc<FakeTransport>) -> Arc<SoilDataService> {
    let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
    Arc::new(SoilDataService::new(SoilWmsConfig::default(), transport, clock).unwrap())
}

/// First text content parsed as JSON
pub fn result_json(result: &CallToolResult) -> serde_json::Value {
    match &result.content[0] {
        ToolContent::Text { text } => serde_json::from_str(text).unwrap(),
        other => panic!("expected text content, got {:?}", other),
    }
}
