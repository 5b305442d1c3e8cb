//! Inspect one precomp split: summary, a probe fetch, and one collated batch.

use anyhow::Context;
use burn::data::dataloader::batcher::Batcher;
use clap::Parser;
use precomp_data::{JsonVocab, PrecompDataset, RetrievalBatch, RetrievalBatcher};
use std::path::PathBuf;
use std::sync::Arc;

type InspectBackend = burn_ndarray::NdArray<f32>;

#[derive(Parser, Debug)]
#[command(
    name = "precomp_inspect",
    about = "Inspect a precomputed retrieval data split"
)]
struct Args {
    /// Root directory containing dataset folders.
    #[arg(long)]
    data_path: PathBuf,
    /// Dataset folder name under the root (e.g. f30k_precomp, coco_precomp).
    #[arg(long, default_value = "f30k_precomp")]
    data_name: String,
    /// Split to inspect.
    #[arg(long, default_value = "dev")]
    split: String,
    /// Vocabulary JSON file (flat token -> id map).
    #[arg(long)]
    vocab: PathBuf,
    /// Samples collated into the probe batch.
    #[arg(long, default_value_t = 8)]
    batch_size: usize,
    /// Emit the summary as JSON instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let vocab = JsonVocab::load(&args.vocab)
        .with_context(|| format!("loading vocabulary {}", args.vocab.display()))?;
    let data_dir = args.data_path.join(&args.data_name);
    let dataset = PrecompDataset::load(&data_dir, &args.split, Arc::new(vocab))
        .with_context(|| format!("loading split {} from {}", args.split, data_dir.display()))?;

    let summary = dataset.summary();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "[inspect] {}/{}: mode={} captions={} images={} regions={} feature_dim={} box_dim={} im_div={} length={}",
            args.data_name,
            summary.split,
            summary.mode.as_str(),
            summary.captions,
            summary.images,
            summary.regions,
            summary.feature_dim,
            summary.box_dim,
            summary.im_div,
            summary.length,
        );
    }

    if dataset.is_empty() {
        println!("[inspect] split has no addressable samples; skipping probe batch");
        return Ok(());
    }

    let probe = dataset.fetch(0)?;
    println!(
        "[inspect] sample 0 -> image {} caption ids {:?}",
        probe.image_id, probe.caption
    );

    let take = args.batch_size.min(dataset.len());
    let items = (0..take)
        .map(|i| dataset.fetch(i))
        .collect::<Result<Vec<_>, _>>()?;
    let device = burn_ndarray::NdArrayDevice::Cpu;
    let batch: RetrievalBatch<InspectBackend> = RetrievalBatcher::new().batch(items, &device);
    println!(
        "[inspect] probe batch: images={:?} boxes={:?} captions={:?} lengths={:?} sample_ids={:?}",
        batch.images.dims(),
        batch.boxes.dims(),
        batch.captions.dims(),
        batch.lengths,
        batch.sample_ids,
    );
    Ok(())
}
