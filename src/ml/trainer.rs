// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch loop with periodic validation and early stopping:
//
//   for epoch in 1..=epochs
//       sample + shuffle pairwise rows ("train_epoch_<N>")
//       forward → weighted BPR loss → backward → Adam step
//       every `eval_step` epochs:
//           score the valid loader with model.valid()
//           better `valid_metric`?  keep model, save checkpoint
//           otherwise               count a stale evaluation
//           more than `stopping_step` stale evaluations → stop
//
// Training runs on Autodiff<NdArray>. model.valid() returns
// the same weights on the plain NdArray backend, which is what
// evaluation and the kept best model use.
//
// FairFedTrainer runs the same loop with per-user loss weights
//
//   w_u = (mean_count / count_u) ^ fairness_alpha
//
// normalised to mean 1 over users with train interactions, so
// users with little history pull harder on the gradient.

use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;

use crate::data::batcher::InteractionBatcher;
use crate::data::dataloader::{EvalLoader, TrainLoader};
use crate::domain::rank::RankRow;
use crate::error::{RecError, RecResult};
use crate::infra::{
    checkpoint::CheckpointManager,
    config::Config,
    logger::set_color,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    evaluator::{to_rank_rows, Evaluator, MetricMap, ScoredRow},
    model::{Bpr, Pop, RecModel, Scorer},
    InferBackend, RecDevice, TrainBackend,
};

/// What the orchestrator needs from any trainer.
pub trait RecTrainer {
    /// Train, validating on `valid` when given.
    ///
    /// Returns the best validation score and its full result, or
    /// `(-1.0, empty)` without a validation loader.
    fn fit(
        &mut self,
        train:         &TrainLoader,
        valid:         Option<&EvalLoader>,
        show_progress: bool,
    ) -> RecResult<(f64, MetricMap)>;

    /// Evaluate the best model kept by `fit` (the current one if `fit`
    /// never ran) and return the metrics with the ranked rows.
    fn evaluate(&mut self, test: &EvalLoader) -> RecResult<(MetricMap, Vec<RankRow>)>;
}

pub type TrainerConstructor = fn(&Config, RecModel, &RecDevice) -> RecResult<Box<dyn RecTrainer>>;

// ─── Loss weighting ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LossWeighting {
    Uniform,
    UserFairness { alpha: f64 },
}

impl LossWeighting {
    /// Weight per user id, or `None` when every row weighs 1.
    pub fn user_weights(&self, user_counts: &[usize]) -> Option<Vec<f32>> {
        let LossWeighting::UserFairness { alpha } = *self else {
            return None;
        };

        let active: Vec<f64> = user_counts.iter().filter(|c| **c > 0).map(|c| *c as f64).collect();
        if active.is_empty() {
            return None;
        }
        let mean = active.iter().sum::<f64>() / active.len() as f64;
        let raw: Vec<f64> = user_counts
            .iter()
            .map(|c| if *c == 0 { 0.0 } else { (mean / *c as f64).powf(alpha) })
            .collect();
        let norm = raw.iter().sum::<f64>() / active.len() as f64;
        Some(raw.into_iter().map(|w| (w / norm) as f32).collect())
    }
}

// ─── Trainer ──────────────────────────────────────────────────────────────────

pub struct Trainer {
    config:        Config,
    model:         RecModel,
    best:          Option<Scorer>,
    weighting:     LossWeighting,
    evaluator:     Evaluator,
    checkpoint:    CheckpointManager,
    train_batcher: InteractionBatcher<TrainBackend>,
    eval_batcher:  InteractionBatcher<InferBackend>,
}

impl Trainer {
    pub fn new(
        config:    &Config,
        model:     RecModel,
        device:    &RecDevice,
        weighting: LossWeighting,
    ) -> RecResult<Self> {
        Ok(Self {
            config:        config.clone(),
            model,
            best:          None,
            weighting,
            evaluator:     Evaluator::from_config(config)?,
            checkpoint:    CheckpointManager::new(&config.checkpoint_dir, &config.model, &config.dataset)?,
            train_batcher: InteractionBatcher::new(device.clone()),
            eval_batcher:  InteractionBatcher::new(device.clone()),
        })
    }

    /// Registry entry for the general trainer.
    pub fn build(config: &Config, model: RecModel, device: &RecDevice) -> RecResult<Box<dyn RecTrainer>> {
        Ok(Box::new(Self::new(config, model, device, LossWeighting::Uniform)?))
    }

    fn score_loader(&self, scorer: &Scorer, loader: &EvalLoader) -> (MetricMap, Vec<ScoredRow>) {
        tracing::debug!("Scoring {} rows for {}", loader.len(), loader.phase());
        let mut scored = Vec::with_capacity(loader.len());
        for rows in loader.batches() {
            let preds = scorer.predict(rows, &self.eval_batcher);
            scored.extend(rows.iter().zip(preds).map(|(r, s)| ScoredRow::new(r, s)));
        }
        self.evaluator.evaluate(scored)
    }

    fn valid_epoch(&self, scorer: &Scorer, valid: &EvalLoader) -> RecResult<(f64, MetricMap)> {
        let (result, _) = self.score_loader(scorer, valid);
        let key   = self.config.valid_metric_key();
        let score = result.get(&key).ok_or_else(|| {
            RecError::Trainer(format!("validation result has no `{key}` entry"))
        })?;
        Ok((score, result))
    }

    fn save_best(&self, scorer: &Scorer) -> RecResult<()> {
        if !self.config.saved {
            return Ok(());
        }
        if let Scorer::Bpr(model) = scorer {
            self.checkpoint.save_model::<InferBackend, _>(model)?;
        }
        self.checkpoint.save_config(&self.config)
    }

    fn fit_pop(&mut self, mut pop: Pop, train: &TrainLoader, valid: Option<&EvalLoader>) -> RecResult<(f64, MetricMap)> {
        let metrics = MetricsLogger::new(&self.config.checkpoint_dir, &self.config.model, &self.config.dataset)?;

        pop.fit(&train.item_counts());
        self.model = RecModel::Pop(pop.clone());
        let scorer = Scorer::Pop(pop);
        self.save_best(&scorer)?;

        let outcome = match valid {
            Some(valid) => {
                let (score, result) = self.valid_epoch(&scorer, valid)?;
                tracing::info!("valid result: {result}");
                (score, result)
            }
            None => (-1.0, MetricMap::default()),
        };
        let valid_score = valid.map(|_| outcome.0);
        metrics.log(&EpochMetrics::new(1, 0.0, valid_score))?;
        self.best = Some(scorer);
        Ok(outcome)
    }

    fn fit_bpr(
        &mut self,
        mut model:     Bpr<TrainBackend>,
        train:         &TrainLoader,
        valid:         Option<&EvalLoader>,
        show_progress: bool,
    ) -> RecResult<(f64, MetricMap)> {
        let cfg     = self.config.clone();
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir, &cfg.model, &cfg.dataset)?;
        let weights = self.weighting.user_weights(&train.user_counts());
        if let Some(w) = &weights {
            let spread = w.iter().filter(|x| **x > 0.0).fold((f32::MAX, 0.0f32), |(lo, hi), x| {
                (lo.min(*x), hi.max(*x))
            });
            tracing::info!("User loss weights range from {:.4} to {:.4}", spread.0, spread.1);
        }

        // m = β1*m + (1-β1)*g ;  v = β2*v + (1-β2)*g² ;  θ -= lr * m / (√v + ε)
        let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

        let bigger          = cfg.valid_metric_bigger;
        let mut best_score  = if bigger { f64::NEG_INFINITY } else { f64::INFINITY };
        let mut best_result = MetricMap::default();
        let mut stale_evals = 0usize;

        for epoch in 1..=cfg.epochs {
            // ── Training phase ────────────────────────────────────────────────
            let started  = Instant::now();
            let batches  = train.epoch_batches(epoch);
            let progress = if show_progress {
                ProgressBar::new(batches.len() as u64)
            } else {
                ProgressBar::hidden()
            };
            progress.set_style(progress_style());
            progress.set_prefix(format!("Train {epoch:>4}"));

            let mut loss_sum = 0.0f64;
            let mut steps    = 0usize;
            for rows in &batches {
                let batch = self.train_batcher.pairwise(rows, weights.as_deref());
                let loss  = model.forward_loss(batch, cfg.weight_decay);

                let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
                if !loss_val.is_finite() {
                    progress.abandon();
                    return Err(RecError::Trainer(format!(
                        "training loss is {loss_val} at epoch {epoch}"
                    )));
                }
                loss_sum += loss_val;
                steps    += 1;

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(cfg.learning_rate, model, grads);

                progress.set_message(format!("loss={loss_val:.4}"));
                progress.inc(1);
            }
            progress.finish_and_clear();

            let train_loss = if steps > 0 { loss_sum / steps as f64 } else { 0.0 };
            tracing::info!(
                "epoch {epoch} training [{}: {:.2}s, {}: {train_loss:.4}]",
                set_color("time", "blue"),
                started.elapsed().as_secs_f64(),
                set_color("train loss", "blue"),
            );

            // ── Validation phase ──────────────────────────────────────────────
            let mut valid_score = None;
            let mut stop        = false;
            if let Some(valid) = valid.filter(|_| epoch % cfg.eval_step == 0) {
                let started = Instant::now();
                let scorer  = Scorer::Bpr(model.valid());
                let (score, result) = self.valid_epoch(&scorer, valid)?;
                valid_score = Some(score);

                let row = EpochMetrics::new(epoch, train_loss, valid_score);
                if self.best.is_none() || row.is_improvement(best_score, bigger) {
                    best_score  = score;
                    best_result = result.clone();
                    stale_evals = 0;
                    self.save_best(&scorer)?;
                    self.best = Some(scorer);
                    tracing::info!("{}", set_color("Saving current best", "blue"));
                } else {
                    stale_evals += 1;
                    stop = stale_evals > cfg.stopping_step;
                }

                tracing::info!(
                    "epoch {epoch} evaluating [{}: {:.2}s, {}: {score:.6}]",
                    set_color("time", "blue"),
                    started.elapsed().as_secs_f64(),
                    set_color("valid_score", "blue"),
                );
                tracing::info!("{} {result}", set_color("valid result:", "blue"));
            }

            metrics.log(&EpochMetrics::new(epoch, train_loss, valid_score))?;
            if stop {
                tracing::info!(
                    "Finished training, best eval result in epoch {}",
                    epoch - (stale_evals * cfg.eval_step)
                );
                break;
            }
        }

        self.model = RecModel::Bpr(model);
        if valid.is_none() || self.best.is_none() {
            // Nothing was validated: the last epoch's model is the one kept
            let scorer = self.model.scorer();
            self.save_best(&scorer)?;
            self.best = Some(scorer);
        }
        if valid.is_none() {
            return Ok((-1.0, MetricMap::default()));
        }
        if best_result.is_empty() {
            return Ok((-1.0, best_result));
        }
        Ok((best_score, best_result))
    }
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

impl RecTrainer for Trainer {
    fn fit(
        &mut self,
        train:         &TrainLoader,
        valid:         Option<&EvalLoader>,
        show_progress: bool,
    ) -> RecResult<(f64, MetricMap)> {
        match self.model.clone() {
            RecModel::Bpr(model) => self.fit_bpr(model, train, valid, show_progress),
            RecModel::Pop(model) => self.fit_pop(model, train, valid),
        }
    }

    fn evaluate(&mut self, test: &EvalLoader) -> RecResult<(MetricMap, Vec<RankRow>)> {
        let scorer = match &self.best {
            Some(best) => best.clone(),
            None       => self.model.scorer(),
        };
        let (result, ranked) = self.score_loader(&scorer, test);
        Ok((result, to_rank_rows(&ranked, test.vocab())))
    }
}

// ─── FairFedTrainer ───────────────────────────────────────────────────────────

/// General trainer with fairness-weighted pairwise loss.
pub struct FairFedTrainer {
    inner: Trainer,
}

impl FairFedTrainer {
    pub fn new(config: &Config, model: RecModel, device: &RecDevice) -> RecResult<Self> {
        let weighting = LossWeighting::UserFairness { alpha: config.fairness_alpha };
        Ok(Self { inner: Trainer::new(config, model, device, weighting)? })
    }

    /// Registry entry for the fairness-aware trainer.
    pub fn build(config: &Config, model: RecModel, device: &RecDevice) -> RecResult<Box<dyn RecTrainer>> {
        Ok(Box::new(Self::new(config, model, device)?))
    }
}

impl RecTrainer for FairFedTrainer {
    fn fit(
        &mut self,
        train:         &TrainLoader,
        valid:         Option<&EvalLoader>,
        show_progress: bool,
    ) -> RecResult<(f64, MetricMap)> {
        tracing::debug!("Fairness-weighted training, alpha={}", self.inner.config.fairness_alpha);
        self.inner.fit(train, valid, show_progress)
    }

    fn evaluate(&mut self, test: &EvalLoader) -> RecResult<(MetricMap, Vec<RankRow>)> {
        self.inner.evaluate(test)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{dataset::RecDataset, splitter::data_preparation};
    use crate::domain::interaction::RawInteraction;
    use crate::infra::seed::init_seed;
    use crate::ml::{model::BprConfig, registry::ModelRegistry};
    use rand::{rngs::StdRng, SeedableRng};
    use tempfile::TempDir;

    fn config(temp: &TempDir, overrides: &[(&str, &str)]) -> Config {
        let mut all = vec![
            ("checkpoint_dir".to_string(), temp.path().join("saved").display().to_string()),
            ("epochs".to_string(), "3".to_string()),
            ("embedding_size".to_string(), "4".to_string()),
        ];
        all.extend(overrides.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        Config::build("BPR", "toy", None, &all, &ModelRegistry::with_builtin()).unwrap()
    }

    fn toy_dataset() -> RecDataset {
        let mut rows = Vec::new();
        for u in 0..6 {
            for i in 0..8 {
                if (u + i) % 3 != 0 {
                    rows.push(RawInteraction::new(format!("u{u}"), format!("i{i}")));
                }
            }
        }
        RecDataset::from_raw("toy", "user_id", "item_id", rows)
    }

    fn bpr_model(ds: &RecDataset) -> RecModel {
        RecModel::Bpr(
            BprConfig::new(ds.user_num(), ds.item_num(), 4)
                .init(&RecDevice::Cpu, &mut StdRng::seed_from_u64(1)),
        )
    }

    #[test]
    fn test_fairness_weights_favour_sparse_users() {
        let w = LossWeighting::UserFairness { alpha: 0.5 }.user_weights(&[0, 4, 1]).unwrap();
        assert_eq!(w[0], 0.0);
        assert!((w[2] / w[1] - 2.0).abs() < 1e-5);
        assert!(((w[1] + w[2]) / 2.0 - 1.0).abs() < 1e-5);
        assert_eq!(LossWeighting::Uniform.user_weights(&[0, 4, 1]), None);
    }

    #[test]
    fn test_alpha_zero_is_uniform() {
        let w = LossWeighting::UserFairness { alpha: 0.0 }.user_weights(&[0, 7, 2, 3]).unwrap();
        assert!(w[1..].iter().all(|x| (*x - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_fit_tracks_best_and_writes_artifacts() {
        let temp   = TempDir::new().unwrap();
        let cfg    = config(&temp, &[]);
        let ds     = toy_dataset();
        let split  = data_preparation(&cfg, &ds, &init_seed(cfg.seed, true)).unwrap();
        let mut trainer = Trainer::new(&cfg, bpr_model(&ds), &RecDevice::Cpu, LossWeighting::Uniform).unwrap();

        let (score, result) = trainer.fit(&split.train, Some(&split.valid), false).unwrap();
        assert!((0.0..=1.0).contains(&score));
        assert_eq!(result.get("mrr@10"), Some(score));
        assert!(temp.path().join("saved/BPR-toy.mpk").exists());
        assert!(temp.path().join("saved/BPR-toy.json").exists());

        let text = std::fs::read_to_string(temp.path().join("saved/metrics.csv")).unwrap();
        assert_eq!(text.lines().count(), 4);

        let (test_result, rows) = trainer.evaluate(&split.test).unwrap();
        assert_eq!(rows.len(), split.test.len());
        assert!(test_result.get("recall@10").is_some());
        assert!(rows.iter().all(|r| r.score > 0.0 && r.score < 1.0));
    }

    #[test]
    fn test_fit_without_valid_keeps_last_model() {
        let temp  = TempDir::new().unwrap();
        let cfg   = config(&temp, &[("saved", "false")]);
        let ds    = toy_dataset();
        let split = data_preparation(&cfg, &ds, &init_seed(cfg.seed, true)).unwrap();
        let mut trainer = FairFedTrainer::new(&cfg, bpr_model(&ds), &RecDevice::Cpu).unwrap();

        let (score, result) = trainer.fit(&split.train, None, false).unwrap();
        assert_eq!(score, -1.0);
        assert!(result.is_empty());
        assert!(!temp.path().join("saved/BPR-toy.mpk").exists());
        assert_eq!(trainer.evaluate(&split.test).unwrap().1.len(), split.test.len());
    }

    #[test]
    fn test_early_stopping_after_stale_evaluation() {
        // A learning rate this small leaves the weights unchanged, so the
        // second evaluation cannot improve and zero patience stops there.
        let temp  = TempDir::new().unwrap();
        let cfg   = config(&temp, &[
            ("epochs", "50"), ("stopping_step", "0"), ("learning_rate", "1e-12"), ("saved", "false"),
        ]);
        let ds    = toy_dataset();
        let split = data_preparation(&cfg, &ds, &init_seed(cfg.seed, true)).unwrap();
        let mut trainer = Trainer::new(&cfg, bpr_model(&ds), &RecDevice::Cpu, LossWeighting::Uniform).unwrap();

        trainer.fit(&split.train, Some(&split.valid), false).unwrap();
        let text = std::fs::read_to_string(temp.path().join("saved/metrics.csv")).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_pop_is_fitted_by_counting() {
        let temp  = TempDir::new().unwrap();
        let cfg   = config(&temp, &[]);
        let ds    = toy_dataset();
        let split = data_preparation(&cfg, &ds, &init_seed(cfg.seed, true)).unwrap();
        let mut trainer = Trainer::new(
            &cfg, RecModel::Pop(Pop::new(ds.schema())), &RecDevice::Cpu, LossWeighting::Uniform,
        ).unwrap();

        let (score, _) = trainer.fit(&split.train, Some(&split.valid), false).unwrap();
        assert!(score >= 0.0);
        let (_, rows) = trainer.evaluate(&split.test).unwrap();
        assert!(rows.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    }
}
