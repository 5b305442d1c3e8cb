//! Dataloader wiring: from a data directory to iterable collated batches.

use crate::batch::{RetrievalBatch, RetrievalBatcher};
use crate::dataset::PrecompDataset;
use crate::types::DatasetResult;
use crate::vocab::Vocabulary;
use burn::data::dataloader::{DataLoader, DataLoaderBuilder};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub type SplitLoader<B> = Arc<dyn DataLoader<B, RetrievalBatch<B>>>;

/// Knobs for one split loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Samples per collated batch.
    pub batch_size: usize,
    /// Reshuffle sample order every epoch.
    pub shuffle: bool,
    /// Worker threads prefetching samples; 0 keeps loading on the caller's
    /// thread.
    pub num_workers: usize,
    /// Shuffle seed; a random one is drawn at build time when absent.
    pub seed: Option<u64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            batch_size: 128,
            shuffle: false,
            num_workers: 2,
            seed: None,
        }
    }
}

/// Builds the loader for one split: dataset construction plus framework
/// wiring, nothing else.
pub fn build_split_loader<B: Backend>(
    data_path: &Path,
    split: &str,
    vocab: Arc<dyn Vocabulary>,
    config: &LoaderConfig,
) -> DatasetResult<SplitLoader<B>> {
    let dataset = PrecompDataset::load(data_path, split, vocab)?;
    let mut builder = DataLoaderBuilder::<B, _, _>::new(RetrievalBatcher::new())
        .batch_size(config.batch_size);
    if config.num_workers > 0 {
        builder = builder.num_workers(config.num_workers);
    }
    if config.shuffle {
        let seed = config.seed.unwrap_or_else(rand::random);
        builder = builder.shuffle(seed);
    }
    Ok(builder.build(dataset))
}

/// Builds the (train, dev) pair for a named dataset under `data_root`
/// (e.g. `f30k_precomp`, `coco_precomp`). Train shuffles; dev keeps file
/// order so retrieval scores stay comparable across runs.
pub fn build_train_val_loaders<B: Backend>(
    data_root: &Path,
    data_name: &str,
    vocab: Arc<dyn Vocabulary>,
    config: &LoaderConfig,
) -> DatasetResult<(SplitLoader<B>, SplitLoader<B>)> {
    let data_path = data_root.join(data_name);
    let train_cfg = LoaderConfig {
        shuffle: true,
        ..config.clone()
    };
    let dev_cfg = LoaderConfig {
        shuffle: false,
        ..config.clone()
    };
    let train = build_split_loader::<B>(&data_path, "train", Arc::clone(&vocab), &train_cfg)?;
    let dev = build_split_loader::<B>(&data_path, "dev", vocab, &dev_cfg)?;
    Ok((train, dev))
}

/// Builds a single unshuffled loader for a named evaluation split.
pub fn build_eval_loader<B: Backend>(
    split: &str,
    data_root: &Path,
    data_name: &str,
    vocab: Arc<dyn Vocabulary>,
    config: &LoaderConfig,
) -> DatasetResult<SplitLoader<B>> {
    let data_path = data_root.join(data_name);
    let eval_cfg = LoaderConfig {
        shuffle: false,
        ..config.clone()
    };
    build_split_loader::<B>(&data_path, split, vocab, &eval_cfg)
}
