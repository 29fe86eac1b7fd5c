//! Direct-to-object-storage image uploads.
//!
//! Each file of a batch is exchanged for a single-use [`UploadGrant`] with a
//! [`GrantAuthority`], its bytes are written straight to the grant's upload
//! url through an [`ObjectStore`], and the grant's public url is reported
//! back as an [`UploadedAsset`]. Files never pass through the application's
//! own backend.
//!
//! A batch is split in three steps so the caller decides where the blocking
//! work runs:
//!
//! 1. [`DirectUploadClient::drop_files`] / [`DirectUploadClient::select_files`]
//!    filter the input and move the client into [`UploaderState::Uploading`],
//!    returning a [`PendingBatch`].
//! 2. [`PendingBatch::run`] settles every file concurrently on the rayon pool.
//! 3. [`DirectUploadClient::complete`] merges the [`BatchOutcome`] into the
//!    client's value and returns it to [`UploaderState::Idle`].

pub mod file;
pub mod http;

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use tracing_error::SpanTrace;

pub use file::LocalFile;

pub const IMAGE_TYPE_PREFIX: &str = "image/";
pub const DEFAULT_IMAGE_TYPE: &str = "image/jpeg";

/// Request sent to the grant authority for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    pub file_name: String,
    pub content_type: String,
}

/// Write capability for exactly one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadGrant {
    pub upload_url: String,
    pub key: String,
    pub public_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAsset {
    pub url: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    GrantRequestFailed(String),
    UploadFailed { status: Option<u16>, reason: String },
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::GrantRequestFailed(reason) => {
                write!(f, "upload grant request failed: {reason}")
            }
            UploadError::UploadFailed {
                status: Some(status),
                reason,
            } => write!(f, "upload failed with status {status}: {reason}"),
            UploadError::UploadFailed { status: None, reason } => {
                write!(f, "upload failed: {reason}")
            }
        }
    }
}

impl std::error::Error for UploadError {}

/// Hands out upload grants, e.g. the admin API's presign endpoint.
pub trait GrantAuthority: Send + Sync {
    fn request_grant(&self, target: &UploadTarget) -> Result<UploadGrant, UploadError>;
}

/// Accepts a direct write of raw bytes to a granted url.
pub trait ObjectStore: Send + Sync {
    fn put(&self, url: &str, content_type: &str, bytes: &[u8]) -> Result<(), UploadError>;
}

/// Both collaborators of an upload, shareable with a worker thread.
pub struct UploadBackend {
    pub authority: Box<dyn GrantAuthority>,
    pub store: Box<dyn ObjectStore>,
}

impl UploadBackend {
    pub fn new(authority: impl GrantAuthority + 'static, store: impl ObjectStore + 'static) -> Self {
        Self {
            authority: Box::new(authority),
            store: Box::new(store),
        }
    }

    pub fn run(&self, batch: PendingBatch) -> BatchOutcome {
        batch.run(self.authority.as_ref(), self.store.as_ref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    Single,
    Multiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploaderState {
    Idle,
    DraggingOver,
    Uploading { pending: usize },
}

/// What the owning form receives: one optional asset or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AssetValue {
    Single(Option<UploadedAsset>),
    Multiple(Vec<UploadedAsset>),
}

impl AssetValue {
    pub fn assets(&self) -> Vec<&UploadedAsset> {
        match self {
            AssetValue::Single(asset) => asset.iter().collect(),
            AssetValue::Multiple(assets) => assets.iter().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileFailure {
    pub file_name: String,
    pub error: UploadError,
    pub span_trace: SpanTrace,
}

/// Files accepted for one batch, not yet transferred.
#[derive(Debug)]
pub struct PendingBatch {
    files: Vec<LocalFile>,
    rejected: Vec<String>,
}

impl PendingBatch {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.name.as_str()).collect()
    }

    /// Runs every file's pipeline in parallel and waits until all of them
    /// settled. Results keep the input order.
    pub fn run<A, S>(self, authority: &A, store: &S) -> BatchOutcome
    where
        A: GrantAuthority + ?Sized,
        S: ObjectStore + ?Sized,
    {
        let settled = self
            .files
            .par_iter()
            .map(|file| settle(file, authority, store))
            .collect();
        BatchOutcome {
            settled,
            rejected: self.rejected,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Settled {
    Uploaded(UploadedAsset),
    Failed(FileFailure),
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub settled: Vec<Settled>,
    /// Names of files excluded for not being images.
    pub rejected: Vec<String>,
}

impl BatchOutcome {
    pub fn uploaded(&self) -> impl Iterator<Item = &UploadedAsset> {
        self.settled.iter().filter_map(|s| match s {
            Settled::Uploaded(asset) => Some(asset),
            Settled::Failed(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileFailure> {
        self.settled.iter().filter_map(|s| match s {
            Settled::Failed(failure) => Some(failure),
            Settled::Uploaded(_) => None,
        })
    }

    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{} uploaded", self.uploaded().count())];
        let failed = self.failures().count();
        if failed > 0 {
            parts.push(format!("{failed} failed"));
        }
        if !self.rejected.is_empty() {
            parts.push(format!("skipped {} non-image file(s)", self.rejected.len()));
        }
        parts.join(", ")
    }
}

#[instrument(skip_all, fields(file = %file.name))]
fn settle<A, S>(file: &LocalFile, authority: &A, store: &S) -> Settled
where
    A: GrantAuthority + ?Sized,
    S: ObjectStore + ?Sized,
{
    match upload_file(file, authority, store) {
        Ok(asset) => Settled::Uploaded(asset),
        Err(error) => Settled::Failed(FileFailure {
            file_name: file.name.clone(),
            error,
            span_trace: SpanTrace::capture(),
        }),
    }
}

/// Grant request, direct write, public reference. A fresh grant is asked
/// for on every call.
pub fn upload_file<A, S>(file: &LocalFile, authority: &A, store: &S) -> Result<UploadedAsset, UploadError>
where
    A: GrantAuthority + ?Sized,
    S: ObjectStore + ?Sized,
{
    let content_type = file.effective_content_type();
    let grant = authority.request_grant(&UploadTarget {
        file_name: file.name.clone(),
        content_type: content_type.to_string(),
    })?;
    debug!("Got grant for key {}", grant.key);

    store.put(&grant.upload_url, content_type, &file.bytes)?;
    info!("Uploaded {} bytes as {}", file.bytes.len(), grant.key);

    Ok(UploadedAsset {
        url: grant.public_url,
        key: grant.key,
    })
}

type ChangeCallback = Box<dyn FnMut(&AssetValue)>;
type FailureCallback = Box<dyn FnMut(&FileFailure)>;

pub struct DirectUploadClient {
    mode: UploadMode,
    state: UploaderState,
    assets: Vec<UploadedAsset>,
    on_change: Option<ChangeCallback>,
    on_failure: Option<FailureCallback>,
}

impl DirectUploadClient {
    pub fn new(mode: UploadMode) -> Self {
        Self {
            mode,
            state: UploaderState::Idle,
            assets: Vec::new(),
            on_change: None,
            on_failure: None,
        }
    }

    /// Start from the form's current value. A list handed to a single-mode
    /// client keeps its first entry; a single asset handed to a multi-mode
    /// client becomes a one-element list.
    pub fn with_value(mut self, value: AssetValue) -> Self {
        self.assets = match value {
            AssetValue::Single(asset) => asset.into_iter().collect(),
            AssetValue::Multiple(assets) => assets,
        };
        if self.mode == UploadMode::Single {
            self.assets.truncate(1);
        }
        self
    }

    pub fn on_change(mut self, callback: impl FnMut(&AssetValue) + 'static) -> Self {
        self.on_change = Some(Box::new(callback));
        self
    }

    pub fn on_failure(mut self, callback: impl FnMut(&FileFailure) + 'static) -> Self {
        self.on_failure = Some(Box::new(callback));
        self
    }

    pub fn mode(&self) -> UploadMode {
        self.mode
    }

    pub fn state(&self) -> UploaderState {
        self.state
    }

    pub fn is_accepting_input(&self) -> bool {
        !matches!(self.state, UploaderState::Uploading { .. })
    }

    pub fn assets(&self) -> &[UploadedAsset] {
        &self.assets
    }

    pub fn value(&self) -> AssetValue {
        match self.mode {
            UploadMode::Single => AssetValue::Single(self.assets.first().cloned()),
            UploadMode::Multiple => AssetValue::Multiple(self.assets.clone()),
        }
    }

    pub fn drag_enter(&mut self) {
        if self.state == UploaderState::Idle {
            self.state = UploaderState::DraggingOver;
        }
    }

    pub fn drag_leave(&mut self) {
        if self.state == UploaderState::DraggingOver {
            self.state = UploaderState::Idle;
        }
    }

    pub fn drop_files(&mut self, files: Vec<LocalFile>) -> Option<PendingBatch> {
        self.drag_leave();
        self.begin_batch(files)
    }

    pub fn select_files(&mut self, files: Vec<LocalFile>) -> Option<PendingBatch> {
        self.begin_batch(files)
    }

    fn begin_batch(&mut self, files: Vec<LocalFile>) -> Option<PendingBatch> {
        if !self.is_accepting_input() {
            debug!("Ignoring {} file(s), a batch is still uploading", files.len());
            return None;
        }

        let (accepted, rejected): (Vec<LocalFile>, Vec<LocalFile>) =
            files.into_iter().partition(LocalFile::is_image);
        let rejected: Vec<String> = rejected.into_iter().map(|f| f.name).collect();
        if !rejected.is_empty() {
            debug!("Excluding non-image files {rejected:?}");
        }

        if accepted.is_empty() {
            return None;
        }
        self.state = UploaderState::Uploading {
            pending: accepted.len(),
        };
        Some(PendingBatch {
            files: accepted,
            rejected,
        })
    }

    /// Apply a settled batch. Failures are reported one by one; the value
    /// only changes when at least one file made it. Single mode keeps the
    /// first successful file in batch order.
    pub fn complete(&mut self, outcome: &BatchOutcome) {
        self.state = UploaderState::Idle;

        for failure in outcome.failures() {
            warn!(
                "Upload of {} failed: {}\n{}",
                failure.file_name, failure.error, failure.span_trace
            );
            if let Some(callback) = self.on_failure.as_mut() {
                callback(failure);
            }
        }

        let mut uploaded = outcome.uploaded().cloned().peekable();
        if uploaded.peek().is_none() {
            debug!("Batch produced no assets, value unchanged");
            return;
        }
        match self.mode {
            UploadMode::Single => self.assets = uploaded.take(1).collect(),
            UploadMode::Multiple => self.assets.extend(uploaded),
        }
        self.notify();
    }

    /// Synchronous batch: begin, run, complete. `None` when nothing was
    /// started (no images, or a batch is in flight).
    pub fn upload<A, S>(&mut self, files: Vec<LocalFile>, authority: &A, store: &S) -> Option<BatchOutcome>
    where
        A: GrantAuthority + ?Sized,
        S: ObjectStore + ?Sized,
    {
        let batch = self.select_files(files)?;
        let outcome = batch.run(authority, store);
        self.complete(&outcome);
        Some(outcome)
    }

    /// Multi mode removes the entry at `index`; single mode clears the value.
    pub fn remove(&mut self, index: usize) -> bool {
        if !self.is_accepting_input() {
            return false;
        }
        let removed = match self.mode {
            UploadMode::Single => !std::mem::take(&mut self.assets).is_empty(),
            UploadMode::Multiple if index < self.assets.len() => {
                self.assets.remove(index);
                true
            }
            UploadMode::Multiple => false,
        };
        if removed {
            self.notify();
        }
        removed
    }

    pub fn clear(&mut self) -> bool {
        if !self.is_accepting_input() || self.assets.is_empty() {
            return false;
        }
        self.assets.clear();
        self.notify();
        true
    }

    fn notify(&mut self) {
        let value = self.value();
        if let Some(callback) = self.on_change.as_mut() {
            callback(&value);
        }
    }
}
