//! Core types and error definitions for precomp_data.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, PrecompError>;

#[derive(Debug, Error)]
pub enum PrecompError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("npy parse error at {path}: {msg}")]
    Npy { path: PathBuf, msg: String },
    #[error("vocabulary validation failed at {path}: {msg}")]
    Vocab { path: PathBuf, msg: String },
    #[error("shape mismatch at {path}: {msg}")]
    Shape { path: PathBuf, msg: String },
    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
}

/// One fetched record: the region arrays for one image plus one encoded
/// caption, flattened row-major with dims carried alongside.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecompSample {
    /// Region features, [regions * feature_dim].
    pub features: Vec<f32>,
    pub regions: usize,
    pub feature_dim: usize,
    /// Region boxes, [regions * box_dim].
    pub boxes: Vec<f32>,
    pub box_dim: usize,
    /// Caption vocabulary ids, start/end sentinels included.
    pub caption: Vec<u32>,
    /// Flat sample index this record was fetched with.
    pub index: usize,
    /// Image-store row the features and boxes came from.
    pub image_id: usize,
}

/// Which store the raw sample index addresses directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitMode {
    /// Captions outnumber images (the public-benchmark 5:1 layout); the raw
    /// index is a caption index.
    Public,
    /// Images outnumber captions; the raw index is an image index.
    Internal,
}

impl SplitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitMode::Public => "public",
            SplitMode::Internal => "internal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreMode {
    /// Array data copied into memory upfront.
    InMemory,
    /// Memory-mapped arrays (low RAM, fast random access on most systems).
    Mmap,
}

impl StoreMode {
    pub fn from_env() -> Self {
        match std::env::var("PRECOMP_STORE_MODE").as_deref() {
            Ok("inmemory") => StoreMode::InMemory,
            Ok("mmap") => StoreMode::Mmap,
            _ => StoreMode::Mmap, // default
        }
    }
}

/// Load-time facts about one split, for logging and the inspect tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub split: String,
    pub mode: SplitMode,
    pub captions: usize,
    pub images: usize,
    pub regions: usize,
    pub feature_dim: usize,
    pub box_dim: usize,
    pub im_div: f64,
    pub length: usize,
}
