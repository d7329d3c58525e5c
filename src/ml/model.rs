// ============================================================
// Layer 5 — Recommendation Models
// ============================================================
// BPR (Bayesian Personalised Ranking)
//
//   user table  [user_num, d]      item table  [item_num, d]
//
//   score(u, i) = ⟨e_u, e_i⟩
//   loss        = −mean( w · log σ(score(u, i⁺) − score(u, i⁻)) )
//                 + weight_decay · (‖e_u‖² + ‖e_i⁺‖² + ‖e_i⁻‖²) / batch
//
//   Reported predictions are σ(score) so they lie in (0, 1).
//   Tables start from a Xavier-uniform draw of the "model_init"
//   stream, so a fixed seed gives identical initial weights.
//
// Pop
//
//   score(i) = train count of i / largest train count
//
//   Nothing to optimise; the trainer fits it by counting.

use burn::{
    module::{AutodiffModule, Param},
    prelude::*,
    tensor::{
        activation::{log_sigmoid, sigmoid},
        TensorData,
    },
};
use rand::{rngs::StdRng, Rng};
use std::fmt;

use crate::data::batcher::{InteractionBatcher, PairwiseBatch, PointwiseBatch};
use crate::data::dataloader::EvalRow;
use crate::domain::interaction::DatasetSchema;
use crate::ml::{InferBackend, TrainBackend};

// ─── BPR ──────────────────────────────────────────────────────────────────────

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct BprConfig {
    pub user_num:       usize,
    pub item_num:       usize,
    pub embedding_size: usize,
}

impl BprConfig {
    pub fn init<B: Backend>(&self, device: &B::Device, rng: &mut StdRng) -> Bpr<B> {
        Bpr {
            user_embedding: xavier_uniform(self.user_num, self.embedding_size, device, rng),
            item_embedding: xavier_uniform(self.item_num, self.embedding_size, device, rng),
        }
    }
}

fn xavier_uniform<B: Backend>(
    rows:   usize,
    cols:   usize,
    device: &B::Device,
    rng:    &mut StdRng,
) -> Param<Tensor<B, 2>> {
    let bound  = (6.0 / (rows + cols) as f64).sqrt() as f32;
    let values: Vec<f32> = (0..rows * cols).map(|_| rng.gen_range(-bound..bound)).collect();
    Param::from_tensor(Tensor::from_data(TensorData::new(values, [rows, cols]), device))
}

#[derive(Module, Debug)]
pub struct Bpr<B: Backend> {
    pub user_embedding: Param<Tensor<B, 2>>,
    pub item_embedding: Param<Tensor<B, 2>>,
}

impl<B: Backend> Bpr<B> {
    /// Raw inner products for aligned (user, item) id tensors → [n]
    pub fn forward(&self, users: Tensor<B, 1, Int>, items: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        let n = users.dims()[0];
        let u = self.user_embedding.val().select(0, users);
        let i = self.item_embedding.val().select(0, items);
        (u * i).sum_dim(1).reshape([n])
    }

    /// σ(⟨u, i⟩) for every row of the batch.
    pub fn predict(&self, batch: PointwiseBatch<B>) -> Tensor<B, 1> {
        sigmoid(self.forward(batch.users, batch.items))
    }

    /// Weighted BPR loss plus L2 on the embeddings the batch touched → [1]
    pub fn forward_loss(&self, batch: PairwiseBatch<B>, weight_decay: f64) -> Tensor<B, 1> {
        let n = batch.users.dims()[0];
        let u = self.user_embedding.val().select(0, batch.users);
        let p = self.item_embedding.val().select(0, batch.pos_items);
        let q = self.item_embedding.val().select(0, batch.neg_items);

        let pos = (u.clone() * p.clone()).sum_dim(1).reshape([n]);
        let neg = (u.clone() * q.clone()).sum_dim(1).reshape([n]);
        let bpr = (log_sigmoid(pos - neg) * batch.weights).mean().neg();

        if weight_decay == 0.0 {
            return bpr;
        }
        let l2 = (u.clone() * u).sum() + (p.clone() * p).sum() + (q.clone() * q).sum();
        bpr + l2.mul_scalar(weight_decay / n as f64)
    }
}

// ─── Pop ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Pop {
    item_scores: Vec<f32>,
}

impl Pop {
    pub fn new(schema: DatasetSchema) -> Self {
        Self { item_scores: vec![0.0; schema.item_num] }
    }

    /// Replace the scores with normalised item counts.
    pub fn fit(&mut self, item_counts: &[usize]) {
        let max = item_counts.iter().copied().max().unwrap_or(0).max(1) as f32;
        self.item_scores = item_counts.iter().map(|c| *c as f32 / max).collect();
    }

    pub fn score(&self, item: u32) -> f32 {
        self.item_scores.get(item as usize).copied().unwrap_or(0.0)
    }
}

// ─── RecModel ─────────────────────────────────────────────────────────────────

/// Every model the registry can build.
#[derive(Debug, Clone)]
pub enum RecModel {
    Bpr(Bpr<TrainBackend>),
    Pop(Pop),
}

impl RecModel {
    pub fn num_params(&self) -> usize {
        match self {
            RecModel::Bpr(m) => m.num_params(),
            RecModel::Pop(_) => 0,
        }
    }

    /// Inference copy of the current weights.
    pub fn scorer(&self) -> Scorer {
        match self {
            RecModel::Bpr(m) => Scorer::Bpr(m.valid()),
            RecModel::Pop(m) => Scorer::Pop(m.clone()),
        }
    }
}

impl fmt::Display for RecModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecModel::Bpr(m) => {
                let [users, dim] = m.user_embedding.val().dims();
                let [items, _]   = m.item_embedding.val().dims();
                writeln!(f, "BPR(")?;
                writeln!(f, "  (user_embedding): Embedding({users}, {dim})")?;
                writeln!(f, "  (item_embedding): Embedding({items}, {dim})")?;
                writeln!(f, ")")?;
            }
            RecModel::Pop(m) => {
                writeln!(f, "Pop(items={})", m.item_scores.len())?;
            }
        }
        write!(f, "Trainable parameters: {}", self.num_params())
    }
}

/// A frozen model used for evaluation.
#[derive(Debug, Clone)]
pub enum Scorer {
    Bpr(Bpr<InferBackend>),
    Pop(Pop),
}

impl Scorer {
    pub fn predict(&self, rows: &[EvalRow], batcher: &InteractionBatcher<InferBackend>) -> Vec<f32> {
        match self {
            Scorer::Bpr(m) => m
                .predict(batcher.pointwise(rows))
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .unwrap_or_default(),
            Scorer::Pop(m) => rows.iter().map(|r| m.score(r.item)).collect(),
        }
    }
}
