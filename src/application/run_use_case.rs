// ============================================================
// Layer 2 — RunUseCase
// ============================================================
// One full experiment, in strict order:
//
//   Step  1: Merge configuration          (Layer 6 - infra)
//   Step  2: Seed the run                 (Layer 6 - infra)
//   Step  3: Start logging, dump config   (Layer 6 - infra)
//   Step  4: Load + filter + remap data   (Layer 4 - data)
//   Step  5: Split, build loaders, groups (Layer 4 - data)
//   Step  6: Resolve + build the model    (Layer 5 - ml)
//   Step  7: Resolve + build the trainer  (Layer 5 - ml)
//   Step  8: Fit with validation          (Layer 5 - ml)
//   Step  9: Evaluate on test             (Layer 5 - ml)
//   Step 10: Log best valid / test result
//   Step 11: Write the rank file          (Layer 6 - infra)
//
// Any failure ends the run with its error; dataset problems
// therefore surface before an unknown model name does.

use std::path::PathBuf;

use crate::data::{dataset::create_dataset, splitter::data_preparation};
use crate::domain::rank::RankRow;
use crate::error::RecResult;
use crate::infra::{
    config::Config,
    logger::{init_logger, set_color},
    rank_writer::write_rank_file,
    seed::{init_seed, Seeder},
};
use crate::ml::{
    device_from_config,
    evaluator::MetricMap,
    registry::{ModelRegistry, TrainerRegistry},
    RecDevice,
};

/// What the caller asks for.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub model:        String,
    pub dataset:      String,
    pub config_files: Option<Vec<PathBuf>>,
    /// `--key=value` pairs from the command line
    pub overrides:    Vec<(String, String)>,
}

/// Shared state handed to every step after configuration.
pub struct RunContext {
    pub config: Config,
    pub seeder: Seeder,
    pub device: RecDevice,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub best_valid_score:  f64,
    pub best_valid_result: MetricMap,
    pub test_result:       MetricMap,
    pub rank_path:         PathBuf,
    pub rank_rows:         Vec<RankRow>,
}

pub struct RunUseCase {
    models:        ModelRegistry,
    trainers:      TrainerRegistry,
    show_progress: bool,
}

impl RunUseCase {
    pub fn new() -> Self {
        Self::with_registries(ModelRegistry::with_builtin(), TrainerRegistry::with_builtin())
    }

    pub fn with_registries(models: ModelRegistry, trainers: TrainerRegistry) -> Self {
        Self { models, trainers, show_progress: true }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn execute(&self, request: &RunRequest) -> RecResult<RunOutcome> {
        // ── Steps 1–3: context ────────────────────────────────────────────────
        let config = Config::build(
            &request.model,
            &request.dataset,
            request.config_files.as_deref(),
            &request.overrides,
            &self.models,
        )?;
        let seeder = init_seed(config.seed, config.reproducibility);
        if let Some(path) = init_logger(&config)? {
            tracing::debug!("Logging to '{}'", path.display());
        }
        tracing::info!("\n{config}");
        let device = device_from_config(&config)?;
        let ctx    = RunContext { config, seeder, device };

        // ── Steps 4–5: data ───────────────────────────────────────────────────
        let dataset = create_dataset(&ctx.config)?;
        tracing::info!("\n{dataset}");

        let split = data_preparation(&ctx.config, &dataset, &ctx.seeder)?;
        tracing::info!(
            "Fairness groups: g1={} users, g2={} users",
            split.g1_user_list.len(),
            split.g2_user_list.len(),
        );

        // ── Step 6: model ─────────────────────────────────────────────────────
        let build_model = self.models.get_model(&ctx.config.model)?;
        let model = build_model(&ctx.config, split.train.schema(), &ctx.seeder, &ctx.device)?;
        tracing::info!("\n{model}");

        // ── Step 7: trainer ───────────────────────────────────────────────────
        let build_trainer = self
            .trainers
            .get_trainer(ctx.config.model_type, &ctx.config.model, true)?;
        let mut trainer = build_trainer(&ctx.config, model, &ctx.device)?;

        // ── Steps 8–10: fit and evaluate ──────────────────────────────────────
        let (best_valid_score, best_valid_result) =
            trainer.fit(&split.train, Some(&split.valid), self.show_progress)?;
        let (test_result, rank_rows) = trainer.evaluate(&split.test)?;

        tracing::info!("{}: {best_valid_result}", set_color("best valid ", "yellow"));
        tracing::info!("{}: {test_result}", set_color("test result", "yellow"));

        // ── Step 11: rank file ────────────────────────────────────────────────
        let rank_path = write_rank_file(
            &ctx.config.rank_save_dir,
            &ctx.config.dataset,
            &ctx.config.model,
            &rank_rows,
        )?;
        tracing::info!("Rank file written to '{}'", rank_path.display());

        Ok(RunOutcome { best_valid_score, best_valid_result, test_result, rank_path, rank_rows })
    }
}

impl Default for RunUseCase {
    fn default() -> Self {
        Self::new()
    }
}
