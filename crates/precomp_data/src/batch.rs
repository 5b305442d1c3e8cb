//! Batch collation: sort by caption length, stack regions, pad caption ids.

use crate::types::PrecompSample;
use crate::vocab::PAD_ID;
use burn::data::dataloader::batcher::Batcher;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

/// One collated batch. Row order is consistent across all five fields: row i
/// of `images`, `boxes`, and `captions` describes the sample whose true
/// caption length is `lengths[i]` and whose fetch index is `sample_ids[i]`.
#[derive(Debug, Clone)]
pub struct RetrievalBatch<B: Backend> {
    /// Region features, [batch, regions, feature_dim].
    pub images: Tensor<B, 3>,
    /// Region boxes, [batch, regions, box_dim].
    pub boxes: Tensor<B, 3>,
    /// Caption ids padded with [`PAD_ID`], [batch, max_len].
    pub captions: Tensor<B, 2, Int>,
    /// True caption lengths, non-increasing after the sort.
    pub lengths: Vec<usize>,
    /// Original fetch indices in post-sort order; callers use these to map
    /// rows back to dataset positions.
    pub sample_ids: Vec<usize>,
}

/// Stateless collator: recurrent caption encoders downstream want batches
/// ordered longest-caption-first, so rows are sorted before stacking.
#[derive(Debug, Clone, Default)]
pub struct RetrievalBatcher;

impl RetrievalBatcher {
    pub fn new() -> Self {
        RetrievalBatcher
    }
}

impl<B: Backend> Batcher<B, PrecompSample, RetrievalBatch<B>> for RetrievalBatcher {
    fn batch(&self, mut items: Vec<PrecompSample>, device: &B::Device) -> RetrievalBatch<B> {
        // Stable sort: equal lengths keep their incoming order.
        items.sort_by(|a, b| b.caption.len().cmp(&a.caption.len()));

        let batch = items.len();
        let regions = items.first().map_or(0, |s| s.regions);
        let feature_dim = items.first().map_or(0, |s| s.feature_dim);
        let box_dim = items.first().map_or(0, |s| s.box_dim);
        let max_len = items.iter().map(|s| s.caption.len()).max().unwrap_or(0);

        let mut features = Vec::with_capacity(batch * regions * feature_dim);
        let mut boxes = Vec::with_capacity(batch * regions * box_dim);
        let mut ids = vec![PAD_ID as i64; batch * max_len];
        let mut lengths = Vec::with_capacity(batch);
        let mut sample_ids = Vec::with_capacity(batch);

        for (row, item) in items.iter().enumerate() {
            features.extend_from_slice(&item.features);
            boxes.extend_from_slice(&item.boxes);
            for (col, &id) in item.caption.iter().enumerate() {
                ids[row * max_len + col] = id as i64;
            }
            lengths.push(item.caption.len());
            sample_ids.push(item.index);
        }

        RetrievalBatch {
            images: Tensor::<B, 1>::from_floats(features.as_slice(), device).reshape([
                batch,
                regions,
                feature_dim,
            ]),
            boxes: Tensor::<B, 1>::from_floats(boxes.as_slice(), device).reshape([
                batch,
                regions,
                box_dim,
            ]),
            captions: Tensor::<B, 1, Int>::from_ints(ids.as_slice(), device)
                .reshape([batch, max_len]),
            lengths,
            sample_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn_ndarray::NdArray<f32>;

    fn sample(index: usize, caption: Vec<u32>) -> PrecompSample {
        PrecompSample {
            features: vec![index as f32; 2 * 3],
            regions: 2,
            feature_dim: 3,
            boxes: vec![index as f32 + 0.5; 2 * 4],
            box_dim: 4,
            caption,
            index,
            image_id: index,
        }
    }

    #[test]
    fn sorts_descending_and_pads_to_longest() {
        let batcher = RetrievalBatcher::new();
        let device = burn_ndarray::NdArrayDevice::Cpu;
        let items = vec![
            sample(0, vec![1, 4, 2]),
            sample(1, vec![1, 4, 5, 6, 7, 8, 2]),
            sample(2, vec![1, 9, 9, 9, 2]),
        ];
        let batch: RetrievalBatch<TestBackend> = batcher.batch(items, &device);

        assert_eq!(batch.lengths, vec![7, 5, 3]);
        assert_eq!(batch.sample_ids, vec![1, 2, 0]);
        assert_eq!(batch.images.dims(), [3, 2, 3]);
        assert_eq!(batch.boxes.dims(), [3, 2, 4]);
        assert_eq!(batch.captions.dims(), [3, 7]);

        let ids: Vec<i64> = batch.captions.into_data().to_vec().unwrap();
        assert_eq!(&ids[0..7], &[1, 4, 5, 6, 7, 8, 2]);
        assert_eq!(&ids[7..14], &[1, 9, 9, 9, 2, 0, 0]);
        assert_eq!(&ids[14..21], &[1, 4, 2, 0, 0, 0, 0]);

        // Feature rows follow the same permutation as the caption rows.
        let feats: Vec<f32> = batch.images.into_data().to_vec().unwrap();
        assert_eq!(&feats[0..6], &[1.0; 6]);
        assert_eq!(&feats[6..12], &[2.0; 6]);
        assert_eq!(&feats[12..18], &[0.0; 6]);
    }

    #[test]
    fn equal_lengths_keep_incoming_order() {
        let batcher = RetrievalBatcher::new();
        let device = burn_ndarray::NdArrayDevice::Cpu;
        let items = vec![
            sample(7, vec![1, 4, 2]),
            sample(3, vec![1, 5, 2]),
            sample(9, vec![1, 6, 2]),
        ];
        let batch: RetrievalBatch<TestBackend> = batcher.batch(items, &device);
        assert_eq!(batch.sample_ids, vec![7, 3, 9]);
        assert_eq!(batch.lengths, vec![3, 3, 3]);
    }

    #[test]
    fn singleton_batch_keeps_exact_width() {
        let batcher = RetrievalBatcher::new();
        let device = burn_ndarray::NdArrayDevice::Cpu;
        let batch: RetrievalBatch<TestBackend> =
            batcher.batch(vec![sample(0, vec![1, 8, 8, 2])], &device);
        assert_eq!(batch.captions.dims(), [1, 4]);
        assert_eq!(batch.lengths, vec![4]);
        let ids: Vec<i64> = batch.captions.into_data().to_vec().unwrap();
        assert_eq!(ids, vec![1, 8, 8, 2]);
    }

    #[test]
    fn empty_batch_collates_to_zero_dims() {
        let batcher = RetrievalBatcher::new();
        let device = burn_ndarray::NdArrayDevice::Cpu;
        let batch: RetrievalBatch<TestBackend> = batcher.batch(Vec::new(), &device);
        assert_eq!(batch.images.dims(), [0, 0, 0]);
        assert_eq!(batch.boxes.dims(), [0, 0, 0]);
        assert_eq!(batch.captions.dims(), [0, 0]);
        assert!(batch.lengths.is_empty());
        assert!(batch.sample_ids.is_empty());
    }
}
