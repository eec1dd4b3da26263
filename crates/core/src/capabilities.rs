// WMS GetCapabilities document parsing
//
// Handles both 1.3.0 (`WMS_Capabilities`, `CRS`, `EX_GeographicBoundingBox`)
// and 1.1.1 (`WMT_MS_Capabilities`, `SRS`, `LatLonBoundingBox`) documents
// Element names are matched on their local part so namespace prefixes do not
// matter

use crate::error::{Result, SoilError};
use crate::types::{GeoExtent, LayerDescriptor, ServiceCapabilities};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

const DEFAULT_TITLE: &str = "BGS Soil Data WMS";

/// Layer under construction while its element is open
#[derive(Debug, Default)]
struct LayerBuilder {
    order: usize,
    name: Option<String>,
    title: Option<String>,
    abstract_text: Option<String>,
    crs_list: Vec<String>,
    extent: ExtentBuilder,
    queryable: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct ExtentBuilder {
    west: Option<f64>,
    east: Option<f64>,
    south: Option<f64>,
    north: Option<f64>,
}

impl ExtentBuilder {
    fn build(&self) -> Option<GeoExtent> {
        Some(GeoExtent {
            west: self.west?,
            east: self.east?,
            south: self.south?,
            north: self.north?,
        })
    }
}

/// Parse a capabilities document fetched at `fetched_at`.
pub fn parse_capabilities(xml: &str, fetched_at: DateTime<Utc>) -> Result<ServiceCapabilities> {
    if let Some(message) = service_exception(xml) {
        return Err(SoilError::service_unavailable(format!(
            "WMS service exception: {}",
            message
        )));
    }

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut saw_root = false;

    let mut title: Option<String> = None;
    let mut abstract_text: Option<String> = None;
    let mut version: Option<String> = None;
    let mut formats: Vec<String> = Vec::new();
    let mut info_formats: Vec<String> = Vec::new();

    let mut open_layers: Vec<LayerBuilder> = Vec::new();
    let mut finished: Vec<LayerBuilder> = Vec::new();
    let mut layer_count = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                if path.is_empty() {
                    saw_root = is_capabilities_root(&name);
                    version = attribute(&e, b"version");
                }
                match name.as_str() {
                    "Layer" => {
                        let layer = start_layer(&e, open_layers.last(), layer_count);
                        open_layers.push(layer);
                        layer_count += 1;
                    }
                    "LatLonBoundingBox" => {
                        if let Some(layer) = open_layers.last_mut() {
                            layer.extent = lat_lon_box(&e);
                        }
                    }
                    _ => {}
                }
                path.push(name);
                text.clear();
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e);
                if name == "LatLonBoundingBox" {
                    if let Some(layer) = open_layers.last_mut() {
                        layer.extent = lat_lon_box(&e);
                    }
                }
            }
            Ok(Event::Text(t)) => match t.unescape() {
                Ok(unescaped) => text.push_str(&unescaped),
                // HTML entities such as &nbsp; turn up in ArcGIS abstracts
                Err(_) => text.push_str(&String::from_utf8_lossy(&t)),
            },
            Ok(Event::CData(c)) => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Ok(Event::End(_)) => {
                let Some(name) = path.pop() else {
                    return Err(SoilError::parse("unbalanced end tag"));
                };
                let value = std::mem::take(&mut text).trim().to_string();
                let parent = path.last().map(String::as_str);

                match (name.as_str(), parent) {
                    ("Title", Some("Service")) if !value.is_empty() => title = Some(value),
                    ("Abstract", Some("Service")) if !value.is_empty() => {
                        abstract_text = Some(value)
                    }
                    ("Format", Some("GetMap")) if !value.is_empty() => formats.push(value),
                    ("Format", Some("GetFeatureInfo")) if !value.is_empty() => {
                        info_formats.push(value)
                    }
                    ("Layer", _) => {
                        if let Some(layer) = open_layers.pop() {
                            finished.push(layer);
                        }
                    }
                    (field, Some("Layer")) => {
                        if let Some(layer) = open_layers.last_mut() {
                            set_layer_field(layer, field, value);
                        }
                    }
                    (edge, Some("EX_GeographicBoundingBox")) => {
                        if let Some(layer) = open_layers.last_mut() {
                            set_extent_edge(&mut layer.extent, edge, &value)?;
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SoilError::parse(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(SoilError::parse("document is not a WMS capabilities response"));
    }
    if !path.is_empty() {
        return Err(SoilError::parse(format!("unclosed element <{}>", path.join("/"))));
    }

    // Document order, not close order
    finished.sort_by_key(|l| l.order);
    let layers = finished
        .into_iter()
        .filter_map(|layer| {
            let name = layer.name?;
            Some(LayerDescriptor {
                title: layer.title.unwrap_or_else(|| name.clone()),
                name,
                abstract_text: layer.abstract_text,
                bounding_box: layer.extent.build(),
                crs_list: layer.crs_list,
                formats: formats.clone(),
                queryable: layer.queryable,
            })
        })
        .collect();

    Ok(ServiceCapabilities {
        title: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        abstract_text,
        version: version.unwrap_or_default(),
        layers,
        formats,
        info_formats,
        cached_at: fetched_at,
    })
}

/// Text of an OGC `ServiceExceptionReport`, if `body` is one.
pub fn service_exception(body: &str) -> Option<String> {
    if !body.contains("ExceptionReport") {
        return None;
    }

    let mut reader = Reader::from_str(body);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut in_exception = false;
    let mut messages = Vec::new();
    let mut is_report = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                if name.ends_with("ExceptionReport") {
                    is_report = true;
                }
                if matches!(name.as_str(), "ServiceException" | "Exception" | "ExceptionText") {
                    in_exception = true;
                    if let Some(code) = exception_code(&e) {
                        messages.push(format!("[{}]", code));
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e);
                if matches!(name.as_str(), "ServiceException" | "Exception") {
                    if let Some(code) = exception_code(&e) {
                        messages.push(format!("[{}]", code));
                    }
                }
            }
            Ok(Event::Text(t)) if in_exception => {
                if let Ok(text) = t.unescape() {
                    messages.push(text.trim().to_string());
                }
            }
            Ok(Event::End(_)) => in_exception = false,
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    if !is_report {
        return None;
    }
    let message = messages
        .into_iter()
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    Some(if message.is_empty() {
        "unspecified service exception".to_string()
    } else {
        message
    })
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

fn exception_code(e: &BytesStart<'_>) -> Option<String> {
    attribute(e, b"code").or_else(|| attribute(e, b"exceptionCode"))
}

fn is_capabilities_root(name: &str) -> bool {
    matches!(name, "WMS_Capabilities" | "WMT_MS_Capabilities")
}

/// CRS list and extent are inherited from the enclosing layer
fn start_layer(e: &BytesStart<'_>, parent: Option<&LayerBuilder>, order: usize) -> LayerBuilder {
    let queryable = attribute(e, b"queryable")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    LayerBuilder {
        order,
        queryable,
        crs_list: parent.map(|p| p.crs_list.clone()).unwrap_or_default(),
        extent: parent.map(|p| p.extent).unwrap_or_default(),
        ..Default::default()
    }
}

fn set_layer_field(layer: &mut LayerBuilder, field: &str, value: String) {
    if value.is_empty() {
        return;
    }
    match field {
        "Name" => layer.name = Some(value),
        "Title" => layer.title = Some(value),
        "Abstract" => layer.abstract_text = Some(value),
        "CRS" | "SRS" => {
            // 1.1.1 servers sometimes pack several codes into one SRS element
            for code in value.split_whitespace() {
                if !layer.crs_list.iter().any(|c| c == code) {
                    layer.crs_list.push(code.to_string());
                }
            }
        }
        _ => {}
    }
}

fn set_extent_edge(extent: &mut ExtentBuilder, edge: &str, value: &str) -> Result<()> {
    let slot = match edge {
        "westBoundLongitude" => &mut extent.west,
        "eastBoundLongitude" => &mut extent.east,
        "southBoundLatitude" => &mut extent.south,
        "northBoundLatitude" => &mut extent.north,
        _ => return Ok(()),
    };
    let parsed = value
        .parse::<f64>()
        .map_err(|_| SoilError::parse(format!("invalid {} value: {:?}", edge, value)))?;
    *slot = Some(parsed);
    Ok(())
}

fn lat_lon_box(e: &BytesStart<'_>) -> ExtentBuilder {
    let read = |key: &[u8]| attribute(e, key).and_then(|v| v.parse::<f64>().ok());
    ExtentBuilder {
        west: read(b"minx"),
        east: read(b"maxx"),
        south: read(b"miny"),
        north: read(b"maxy"),
    }
}
