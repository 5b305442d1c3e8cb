//! Precomputed region-feature dataset pipeline for cross-modal retrieval.
//!
//! The crate covers the data path from precomp dumps on disk to collated
//! training batches:
//! - per-split caption text plus `.npy` region feature/box arrays, memory
//!   mapped by default (`PRECOMP_STORE_MODE=inmemory` opts out);
//! - flat sample indices aligned to (caption, image) pairs through the
//!   caption-per-image ratio;
//! - captions encoded to vocabulary ids and collated into length-sorted,
//!   zero-padded batches behind `burn`'s dataloader.

pub mod batch;
pub mod captions;
pub mod dataset;
pub mod loader;
pub mod npy;
pub mod tokenize;
pub mod types;
pub mod vocab;

pub use batch::{RetrievalBatch, RetrievalBatcher};
pub use captions::CaptionStore;
pub use dataset::PrecompDataset;
pub use loader::{
    build_eval_loader, build_split_loader, build_train_val_loaders, LoaderConfig, SplitLoader,
};
pub use npy::RegionStore;
pub use types::{
    DatasetResult, DatasetSummary, PrecompError, PrecompSample, SplitMode, StoreMode,
};
pub use vocab::{
    encode_caption, JsonVocab, Vocabulary, END_TOKEN, PAD_ID, PAD_TOKEN, START_TOKEN, UNK_TOKEN,
};
