//! View configuration documents for displaying a single tileset

use crate::constants::PUBLIC_TRACK_SOURCE;
use crate::error::{ManageError, ManageResult};
use crate::ingestion::file_types::DataType;
use serde_json::{json, Map, Value};

const TRACK_HEIGHT: u32 = 200;
const POSITIONS: [&str; 6] = ["top", "bottom", "left", "right", "center", "whole"];
/// Initial x domain for alignment views, narrow enough to show individual reads.
const ALIGNMENT_X_DOMAIN: [u64; 2] = [0, 40_000];

/// What to display and where to fetch it from.
#[derive(Debug, Clone)]
pub struct ViewSpec {
    /// Identifier of the tileset to display
    pub tileset_uid: String,
    pub datatype: DataType,
    /// Overrides the track type derived from the datatype
    pub track_type: Option<String>,
    /// Overrides the position derived from the datatype
    pub position: Option<String>,
    /// API base URL of the serving instance, with trailing slash
    pub server: String,
    /// Alignment file served directly from this URL instead of through the server
    pub alignment_url: Option<String>,
    /// Also offer tilesets from the public server
    pub public_data: bool,
}

impl ViewSpec {
    fn track_and_position(&self) -> ManageResult<(String, String)> {
        let derived = self.datatype.track_type();
        let track_type = match (&self.track_type, derived) {
            (Some(t), _) => t.clone(),
            (None, Some((t, _))) => t.to_string(),
            (None, None) => {
                return Err(ManageError::invalid_input(format!(
                    "Unknown track type for the given datatype: {}",
                    self.datatype
                )))
            }
        };
        let position = match (&self.position, derived) {
            (Some(p), _) => p.clone(),
            (None, Some((_, p))) => p.to_string(),
            (None, None) => "top".to_string(),
        };
        if !POSITIONS.contains(&position.as_str()) {
            return Err(ManageError::invalid_input(format!(
                "Unknown track position: {}",
                position
            )));
        }
        Ok((track_type, position))
    }
}

/// Build a single-view document showing one track.
pub fn build_viewconf(spec: &ViewSpec) -> ManageResult<Value> {
    let (track_type, position) = spec.track_and_position()?;

    let mut track = Map::new();
    track.insert("type".to_string(), json!(track_type));
    track.insert("height".to_string(), json!(TRACK_HEIGHT));
    match &spec.alignment_url {
        Some(url) => {
            track.insert("data".to_string(), json!({ "type": "bam", "url": url }));
        }
        None => {
            track.insert("tilesetUid".to_string(), json!(spec.tileset_uid));
            track.insert("server".to_string(), json!(spec.server));
        }
    }

    let mut tracks = Map::new();
    for p in POSITIONS {
        tracks.insert(p.to_string(), json!([]));
    }
    let mut placed = vec![Value::Object(track)];
    if spec.alignment_url.is_some() {
        placed.insert(0, json!({ "type": "top-axis" }));
    }
    tracks.insert(position, Value::Array(placed));

    let mut view = json!({
        "uid": format!("view-{}", spec.tileset_uid),
        "tracks": tracks,
        "layout": { "x": 0, "y": 0, "w": 12, "h": 6 },
    });
    if spec.alignment_url.is_some() {
        view["initialXDomain"] = json!(ALIGNMENT_X_DOMAIN);
    }

    let mut sources = vec![spec.server.clone()];
    if spec.public_data {
        sources.push(PUBLIC_TRACK_SOURCE.to_string());
    }

    Ok(json!({
        "editable": true,
        "zoomFixed": false,
        "views": [view],
        "trackSourceServers": sources,
        "locationLocks": { "locksByViewUid": {}, "locksDict": {} },
        "zoomLocks": { "locksByViewUid": {}, "locksDict": {} },
    }))
}

/// Browser URL opening a stored view on the local instance.
pub fn view_url(port: u16, viewconf_uid: &str) -> String {
    format!("http://localhost:{}/app/?config={}", port, viewconf_uid)
}
