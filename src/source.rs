//! Record sources: the admin REST API and local data files.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use polars::prelude::*;
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use tracing::{debug, info, trace};

use crate::domain::{TDConfig, TDError};
use crate::table::{ColumnDescriptor, Record, TabularView, Value};

pub fn build_agent(timeout_ms: u64) -> ureq::Agent {
    let timeout = Duration::from_millis(timeout_ms.max(100));
    ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout_read(timeout)
        .timeout_write(timeout)
        .user_agent(concat!("tourdesk/", env!("CARGO_PKG_VERSION")))
        .build()
}

#[derive(Clone)]
pub struct ApiClient {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>, timeout_ms: u64) -> Self {
        Self {
            agent: build_agent(timeout_ms),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn from_config(config: &TDConfig) -> Result<Self, TDError> {
        let base_url = config.api_base_url.as_deref().ok_or(TDError::MissingApiUrl)?;
        Ok(Self::new(base_url, config.api_token.clone(), config.request_timeout_ms))
    }

    pub fn agent(&self) -> &ureq::Agent {
        &self.agent
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn get_json(&self, path: &str) -> Result<Json, TDError> {
        let url = self.url(path);
        let start_time = Instant::now();
        let mut req = self.agent.get(&url).set("Accept", "application/json");
        if let Some(token) = self.token.as_ref() {
            req = req.set("Authorization", &format!("Bearer {token}"));
        }
        let body: Json = req.call()?.into_json()?;
        debug!("GET {url} took {}ms", start_time.elapsed().as_millis());
        Ok(body)
    }

    /// Fetch a list endpoint. The payload may be a bare array or an object
    /// holding the array under `envelope`.
    pub fn fetch_list<R: DeserializeOwned>(&self, path: &str, envelope: &str) -> Result<Vec<R>, TDError> {
        let items = unwrap_envelope(self.get_json(path)?, envelope)?;
        let records = items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<R>, _>>()?;
        info!("Fetched {} records from {path}", records.len());
        Ok(records)
    }
}

pub fn unwrap_envelope(body: Json, envelope: &str) -> Result<Vec<Json>, TDError> {
    match body {
        Json::Array(items) => Ok(items),
        Json::Object(mut map) => match map.remove(envelope) {
            Some(Json::Array(items)) => Ok(items),
            None | Some(Json::Null) => Ok(Vec::new()),
            Some(other) => Err(TDError::LoadingFailed(format!(
                "expected a list under \"{envelope}\", got {other}"
            ))),
        },
        other => Err(TDError::LoadingFailed(format!("unexpected payload {other}"))),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Field {
    pub fn as_value(&self) -> Value<'_> {
        match self {
            Field::Text(s) => Value::Text(s),
            Field::Number(n) => Value::Number(*n),
            Field::Bool(b) => Value::Bool(*b),
        }
    }

    fn from_json(value: &Json) -> Option<Self> {
        match value {
            Json::String(s) => Some(Field::Text(s.clone())),
            Json::Number(n) => n.as_f64().map(Field::Number),
            Json::Bool(b) => Some(Field::Bool(*b)),
            Json::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(Field::from_json)
                    .map(|f| f.as_value().to_display())
                    .collect();
                Some(Field::Text(parts.join(", ")))
            }
            Json::Null | Json::Object(_) => None,
        }
    }
}

/// A record whose attributes are only known at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicRecord {
    id: String,
    fields: HashMap<String, Field>,
}

impl DynamicRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, field: Field) -> Self {
        self.fields.insert(key.into(), field);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.fields.get(key)
    }

    /// `id` (or `_id`) becomes the record id, otherwise the 1-based position.
    pub fn from_json(object: &serde_json::Map<String, Json>, position: usize) -> Self {
        let fields: HashMap<String, Field> = object
            .iter()
            .filter_map(|(k, v)| Field::from_json(v).map(|f| (k.clone(), f)))
            .collect();
        let id = ["id", "_id"]
            .iter()
            .find_map(|k| fields.get(*k))
            .map(|f| f.as_value().to_display())
            .unwrap_or_else(|| (position + 1).to_string());
        Self { id, fields }
    }
}

impl Record for DynamicRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, key: &str) -> Option<Value<'_>> {
        self.fields.get(key).map(Field::as_value)
    }
}

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
    JSON,
}

/// A local table loaded into memory.
#[derive(Debug)]
pub struct DataFile {
    pub name: String,
    pub columns: Vec<String>,
    pub records: Vec<DynamicRecord>,
}

impl DataFile {
    /// Every column sortable and searchable.
    pub fn into_view(self) -> TabularView<DynamicRecord> {
        let columns = self
            .columns
            .iter()
            .map(|c| ColumnDescriptor::new(c.as_str(), c.as_str()).sortable(true))
            .collect();
        TabularView::new(self.records, columns)
            .with_search_keys(self.columns)
            .with_empty_message(format!("No rows in {}", self.name))
            .with_title(self.name)
    }
}

pub fn load_data_file(path: PathBuf) -> Result<DataFile, TDError> {
    let file_type = check_file(&path)?;
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("???")
        .to_string();
    let start_time = Instant::now();

    let (columns, records) = match file_type {
        FileType::JSON => load_json(&path)?,
        FileType::CSV => load_frame(load_csv(&path)?)?,
        FileType::PARQUET => load_frame(load_parquet(&path)?)?,
        FileType::ARROW => load_frame(load_arrow(&path)?)?,
    };
    info!(
        "Loaded {} rows, {} columns from {name} in {}ms",
        records.len(),
        columns.len(),
        start_time.elapsed().as_millis()
    );
    Ok(DataFile {
        name,
        columns,
        records,
    })
}

fn check_file(path: &Path) -> Result<FileType, TDError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => TDError::FileNotFound,
        ErrorKind::PermissionDenied => TDError::PermissionDenied,
        _ => TDError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(TDError::LoadingFailed("Not a file!".into()));
    }
    detect_file_type(path)
}

fn detect_file_type(path: &Path) -> Result<FileType, TDError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        Some("JSON") => Ok(FileType::JSON),
        _ => Err(TDError::UnknownFileType),
    }
}

fn load_json(path: &Path) -> Result<(Vec<String>, Vec<DynamicRecord>), TDError> {
    let body: Json = serde_json::from_str(&fs::read_to_string(path)?)?;
    let items = match body {
        Json::Array(items) => items,
        Json::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                Json::Array(items) => Some(items),
                _ => None,
            })
            .ok_or_else(|| TDError::LoadingFailed("no list found in JSON object".into()))?,
        _ => return Err(TDError::LoadingFailed("expected a JSON list".into())),
    };

    let mut columns: Vec<String> = Vec::new();
    let mut records = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let Json::Object(object) = item else {
            trace!("Skipping non-object entry {position}");
            continue;
        };
        let record = DynamicRecord::from_json(object, position);
        for key in object.keys() {
            if record.get(key).is_some() && !columns.contains(key) {
                columns.push(key.clone());
            }
        }
        records.push(record);
    }
    Ok((columns, records))
}

#[derive(Debug, Clone, Copy)]
enum CellKind {
    Text,
    Number,
    Bool,
}

fn load_frame(frame: LazyFrame) -> Result<(Vec<String>, Vec<DynamicRecord>), TDError> {
    // Each column is converted in its own rayon task.
    let df = Arc::new(frame.collect()?);
    let columns: Vec<(String, Vec<Option<Field>>)> = df
        .get_column_names()
        .par_iter()
        .map(|name| load_column(&df, name))
        .collect::<Result<_, PolarsError>>()?;

    let id_column = columns
        .iter()
        .position(|(name, _)| name == "id" || name == "_id");
    let records = (0..df.height())
        .map(|row| {
            let id = id_column
                .and_then(|c| columns[c].1[row].as_ref())
                .map(|f| f.as_value().to_display())
                .unwrap_or_else(|| (row + 1).to_string());
            let fields = columns
                .iter()
                .filter_map(|(name, data)| data[row].clone().map(|f| (name.clone(), f)))
                .collect();
            DynamicRecord { id, fields }
        })
        .collect();
    let names = columns.into_iter().map(|(name, _)| name).collect();
    Ok((names, records))
}

fn load_column(df: &DataFrame, col_name: &str) -> Result<(String, Vec<Option<Field>>), PolarsError> {
    let source_dtype = df.column(col_name)?.dtype().clone();
    let kind = if is_numeric_type(&source_dtype) {
        CellKind::Number
    } else if source_dtype == DataType::Boolean {
        CellKind::Bool
    } else {
        CellKind::Text
    };

    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;
    let data = series
        .into_iter()
        .map(|value| value.map(|s| parse_cell(s, kind)))
        .collect();
    Ok((col_name.to_string(), data))
}

fn parse_cell(s: &str, kind: CellKind) -> Field {
    match kind {
        CellKind::Number => s
            .parse::<f64>()
            .map(Field::Number)
            .unwrap_or_else(|_| Field::Text(s.to_string())),
        CellKind::Bool => match s {
            "true" => Field::Bool(true),
            "false" => Field::Bool(false),
            _ => Field::Text(s.to_string()),
        },
        CellKind::Text => Field::Text(s.to_string()),
    }
}

fn is_numeric_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}
