// Core types and functionality for the BGS soil-data WMS adapter

pub mod cache;
pub mod capabilities;
pub mod client;
pub mod config;
pub mod crs;
pub mod error;
pub mod service;
pub mod types;
pub mod wms;

pub use cache::{CacheEntry, CapabilitiesCache, Clock, ManualClock, SystemClock};
pub use client::{HttpTransport, UpstreamResponse, WmsTransport};
pub use config::SoilWmsConfig;
pub use error::{ErrorKind, ErrorReport, Result, SoilError};
pub use service::{FeatureInfoResponse, SoilDataService, SoilDataSummary};
pub use types::*;
pub use wms::{FeatureInfoRequest, MapRequest, WmsRequestBuilder};
