//! Data binder: turns the caller's data object into the read-only facade
//! that template code sees as the global `data`.
//!
//! The facade is a deep copy with derived aggregates (clip counts, total
//! size and duration, reel and copy-volume lists) computed up front as plain
//! values. Nothing in it refers back to the caller's objects; inside the
//! sandbox it is additionally deep-frozen.

use crate::sanitize;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Data supplied by the caller for one render request.
///
/// Fields are kept as raw JSON: the binder only requires the minimal shape
/// and reads everything else leniently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataObject {
    #[serde(default)]
    pub project: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all: Option<Value>,
}

impl DataObject {
    /// An empty project with no logs; enough to render static templates.
    pub fn empty() -> Self {
        Self {
            project: Value::Object(Map::new()),
            selection: None,
            all: Some(Value::Array(Vec::new())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct BindError(String);

impl From<BindError> for crate::RenderError {
    fn from(err: BindError) -> Self {
        crate::RenderError::bind(err.0)
    }
}

/// Read-only view of the bound data, serialized into the sandbox as `data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFacade {
    pub project: Map<String, Value>,
    pub selection: SelectionView,
    pub log: Option<LogView>,
    pub logs: Vec<LogView>,
    pub all: Vec<LogView>,
    pub totals: Totals,
}

/// Mirrors the shape the caller selected: one log, many, or none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SelectionView {
    One(LogView),
    Many(Vec<LogView>),
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogView {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub ocf: MediaSummary,
    pub sound: MediaSummary,
    pub proxy: MediaSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
    pub ocf: MediaSummary,
    pub sound: MediaSummary,
    pub proxy: MediaSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSummary {
    pub clips: Vec<Value>,
    pub count: usize,
    /// Total size in bytes.
    pub size: u64,
    pub size_text: String,
    /// Total duration in seconds.
    pub duration: f64,
    pub duration_text: String,
    pub reels: Vec<String>,
    pub volumes: Vec<String>,
}

const MEDIA_KEYS: [&str; 3] = ["ocf", "sound", "proxy"];

/// Builds the facade for `data`.
///
/// Fails only when the minimal shape is missing: `project` must be an object,
/// at least one of `selection`/`all` must be present, `selection` must be a
/// log object or a list of them, and `all` must be a list of log objects.
pub fn bind(data: &DataObject) -> Result<DataFacade, BindError> {
    let project = match checked(data.project.clone(), "project")? {
        Value::Object(map) => map,
        Value::Null => return Err(BindError("`project` is required".into())),
        _ => return Err(BindError("`project` must be an object".into())),
    };

    if data.selection.is_none() && data.all.is_none() {
        return Err(BindError("either `selection` or `all` is required".into()));
    }

    let selection = match data.selection.clone().map(|v| checked(v, "selection")).transpose()? {
        None | Some(Value::Null) => SelectionView::None,
        Some(Value::Object(log)) => SelectionView::One(log_view(log)),
        Some(Value::Array(items)) => SelectionView::Many(log_list(items, "selection")?),
        Some(_) => {
            return Err(BindError(
                "`selection` must be a log object or a list of log objects".into(),
            ))
        }
    };

    let all = match data.all.clone().map(|v| checked(v, "all")).transpose()? {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => log_list(items, "all")?,
        Some(_) => return Err(BindError("`all` must be a list of log objects".into())),
    };

    let logs = match &selection {
        SelectionView::One(log) => vec![log.clone()],
        SelectionView::Many(logs) => logs.clone(),
        SelectionView::None => Vec::new(),
    };

    let totals = Totals {
        ocf: summarize(logs.iter().flat_map(|log| log.ocf.clips.iter().cloned()).collect()),
        sound: summarize(logs.iter().flat_map(|log| log.sound.clips.iter().cloned()).collect()),
        proxy: summarize(logs.iter().flat_map(|log| log.proxy.clips.iter().cloned()).collect()),
    };

    Ok(DataFacade {
        project,
        log: logs.first().cloned(),
        selection,
        logs,
        all,
        totals,
    })
}

impl DataFacade {
    pub fn to_value(&self) -> Result<Value, BindError> {
        serde_json::to_value(self).map_err(|e| BindError(format!("failed to serialize data: {e}")))
    }
}

fn checked(value: Value, field: &str) -> Result<Value, BindError> {
    sanitize::check(&value, field).map_err(|e| BindError(e.to_string()))?;
    Ok(value)
}

fn log_list(items: Vec<Value>, field: &str) -> Result<Vec<LogView>, BindError> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(log) => Ok(log_view(log)),
            _ => Err(BindError(format!("`{field}[{index}]` must be a log object"))),
        })
        .collect()
}

fn log_view(mut fields: Map<String, Value>) -> LogView {
    let [ocf, sound, proxy] = MEDIA_KEYS.map(|key| summarize(clip_list(fields.remove(key))));
    LogView {
        fields,
        ocf,
        sound,
        proxy,
    }
}

/// Clips may be given directly as a list or wrapped as `{clips: [...]}` /
/// `{files: [...]}`.
fn clip_list(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(clips)) => clips,
        Some(Value::Object(mut wrapper)) => match wrapper.remove("clips").or_else(|| wrapper.remove("files")) {
            Some(Value::Array(clips)) => clips,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn summarize(clips: Vec<Value>) -> MediaSummary {
    let mut size = 0u64;
    let mut duration = 0f64;
    let mut reels = BTreeSet::new();
    let mut volumes = BTreeSet::new();

    for clip in &clips {
        size = size.saturating_add(clip.get("size").and_then(Value::as_u64).unwrap_or(0));
        duration += clip
            .get("duration")
            .and_then(Value::as_f64)
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(0.0);
        if let Some(reel) = clip.get("reel").and_then(Value::as_str) {
            reels.insert(reel.to_string());
        }
        if let Some(Value::Array(copies)) = clip.get("copies") {
            for copy in copies {
                let volume = copy.as_str().or_else(|| copy.get("volume").and_then(Value::as_str));
                if let Some(volume) = volume {
                    volumes.insert(volume.to_string());
                }
            }
        }
    }

    MediaSummary {
        count: clips.len(),
        clips,
        size,
        size_text: format_size(size),
        duration,
        duration_text: format_duration(duration),
        reels: reels.into_iter().collect(),
        volumes: volumes.into_iter().collect(),
    }
}

/// Human readable size using decimal units (`1.50 GB`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
    if bytes < 1000 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// `HH:MM:SS`, rounded to the nearest second.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };
    format!("{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}
