// ============================================================
// Layer 4 — Interaction Batcher
// ============================================================
// Turns loader rows into tensors on the target device.
//
//   PairwiseRow × N → PairwiseBatch
//       users     [N] Int
//       pos_items [N] Int
//       neg_items [N] Int
//       weights   [N] Float   (1.0 unless a trainer reweights users)
//
//   EvalRow × N     → PointwiseBatch
//       users     [N] Int
//       items     [N] Int
//
// Burn's Int element on the ndarray backend is i64, so ids are
// widened once here and never again.

use burn::{prelude::*, tensor::TensorData};

use crate::data::dataloader::{EvalRow, PairwiseRow};

/// One training batch of (user, positive, negative) triples.
#[derive(Debug, Clone)]
pub struct PairwiseBatch<B: Backend> {
    pub users:     Tensor<B, 1, Int>,
    pub pos_items: Tensor<B, 1, Int>,
    pub neg_items: Tensor<B, 1, Int>,
    /// Per-row loss weight
    pub weights:   Tensor<B, 1>,
}

/// One evaluation batch of (user, item) pairs to score.
#[derive(Debug, Clone)]
pub struct PointwiseBatch<B: Backend> {
    pub users: Tensor<B, 1, Int>,
    pub items: Tensor<B, 1, Int>,
}

/// Holds the device so every tensor lands in the same place.
#[derive(Clone, Debug)]
pub struct InteractionBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> InteractionBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// `user_weights` is indexed by user id; `None` weights every row 1.0.
    pub fn pairwise(&self, rows: &[PairwiseRow], user_weights: Option<&[f32]>) -> PairwiseBatch<B> {
        let users     = rows.iter().map(|r| i64::from(r.user)).collect();
        let pos_items = rows.iter().map(|r| i64::from(r.pos_item)).collect();
        let neg_items = rows.iter().map(|r| i64::from(r.neg_item)).collect();
        let weights   = rows
            .iter()
            .map(|r| {
                user_weights
                    .and_then(|w| w.get(r.user as usize).copied())
                    .unwrap_or(1.0)
            })
            .collect();

        PairwiseBatch {
            users:     self.ids(users),
            pos_items: self.ids(pos_items),
            neg_items: self.ids(neg_items),
            weights:   self.floats(weights),
        }
    }

    pub fn pointwise(&self, rows: &[EvalRow]) -> PointwiseBatch<B> {
        PointwiseBatch {
            users: self.ids(rows.iter().map(|r| i64::from(r.user)).collect()),
            items: self.ids(rows.iter().map(|r| i64::from(r.item)).collect()),
        }
    }

    fn ids(&self, values: Vec<i64>) -> Tensor<B, 1, Int> {
        let n = values.len();
        Tensor::<B, 1, Int>::from_data(TensorData::new(values, [n]), &self.device)
    }

    fn floats(&self, values: Vec<f32>) -> Tensor<B, 1> {
        let n = values.len();
        Tensor::<B, 1>::from_data(TensorData::new(values, [n]), &self.device)
    }
}
