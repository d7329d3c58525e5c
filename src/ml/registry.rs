// ============================================================
// Layer 5 — Model and Trainer Registries
// ============================================================
// Explicit lookup tables filled once at startup.
//
//   ModelRegistry    "BPR" → (GENERAL, constructor)
//                    "Pop" → (GENERAL, constructor)
//
//   TrainerRegistry  two tables, picked by the fairfed flag:
//
//                    general   GENERAL → Trainer
//                    fairfed   GENERAL → FairFedTrainer
//                              "Pop"   → Trainer
//
//   Trainer lookup tries the model name first, then the model
//   type. Names are case-sensitive.

use std::collections::{BTreeMap, HashMap};

use crate::domain::{interaction::DatasetSchema, model_type::ModelType};
use crate::error::{RecError, RecResult};
use crate::infra::{config::Config, seed::Seeder};
use crate::ml::{
    model::{BprConfig, Pop, RecModel},
    trainer::{FairFedTrainer, Trainer, TrainerConstructor},
    RecDevice,
};

/// Builds a model for the train split's id space.
pub type ModelConstructor = fn(&Config, DatasetSchema, &Seeder, &RecDevice) -> RecResult<RecModel>;

#[derive(Clone, Copy)]
struct ModelEntry {
    model_type:  ModelType,
    constructor: ModelConstructor,
}

#[derive(Clone, Default)]
pub struct ModelRegistry {
    entries: BTreeMap<String, ModelEntry>,
}

impl ModelRegistry {
    /// Every model this crate ships.
    pub fn with_builtin() -> Self {
        let mut registry = Self::default();
        registry.register("BPR", ModelType::General, build_bpr);
        registry.register("Pop", ModelType::General, build_pop);
        registry
    }

    pub fn register(&mut self, name: &str, model_type: ModelType, constructor: ModelConstructor) {
        self.entries.insert(name.to_string(), ModelEntry { model_type, constructor });
    }

    pub fn get_model(&self, name: &str) -> RecResult<ModelConstructor> {
        self.entries
            .get(name)
            .map(|e| e.constructor)
            .ok_or_else(|| {
                RecError::lookup(format!(
                    "`model_name` [{name}] is not the name of an existing model (available: {})",
                    self.names().join(", ")
                ))
            })
    }

    pub fn model_type_of(&self, name: &str) -> Option<ModelType> {
        self.entries.get(name).map(|e| e.model_type)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

fn build_bpr(config: &Config, schema: DatasetSchema, seeder: &Seeder, device: &RecDevice) -> RecResult<RecModel> {
    // Initial weights stay seeded even when the rest of the run is not
    let mut rng = seeder.seeded_stream("model_init");
    let model   = BprConfig::new(schema.user_num, schema.item_num, config.embedding_size)
        .init(device, &mut rng);
    Ok(RecModel::Bpr(model))
}

fn build_pop(_config: &Config, schema: DatasetSchema, _seeder: &Seeder, _device: &RecDevice) -> RecResult<RecModel> {
    Ok(RecModel::Pop(Pop::new(schema)))
}

// ─── Trainers ─────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct TrainerTable {
    by_model: HashMap<String, TrainerConstructor>,
    by_type:  HashMap<ModelType, TrainerConstructor>,
}

impl TrainerTable {
    fn find(&self, model_type: ModelType, model_name: &str) -> Option<TrainerConstructor> {
        self.by_model
            .get(model_name)
            .or_else(|| self.by_type.get(&model_type))
            .copied()
    }
}

#[derive(Clone, Default)]
pub struct TrainerRegistry {
    general: TrainerTable,
    fairfed: TrainerTable,
}

impl TrainerRegistry {
    pub fn with_builtin() -> Self {
        let mut registry = Self::default();
        registry.register_type(false, ModelType::General, Trainer::build);
        registry.register_type(true, ModelType::General, FairFedTrainer::build);
        // Nothing to reweight for a counting model
        registry.register_model(true, "Pop", Trainer::build);
        registry
    }

    fn table_mut(&mut self, fairfed: bool) -> &mut TrainerTable {
        if fairfed { &mut self.fairfed } else { &mut self.general }
    }

    pub fn register_type(&mut self, fairfed: bool, model_type: ModelType, constructor: TrainerConstructor) {
        self.table_mut(fairfed).by_type.insert(model_type, constructor);
    }

    pub fn register_model(&mut self, fairfed: bool, model_name: &str, constructor: TrainerConstructor) {
        self.table_mut(fairfed).by_model.insert(model_name.to_string(), constructor);
    }

    pub fn get_trainer(
        &self,
        model_type:      ModelType,
        model_name:      &str,
        fairfed_trainer: bool,
    ) -> RecResult<TrainerConstructor> {
        let table = if fairfed_trainer { &self.fairfed } else { &self.general };
        table.find(model_type, model_name).ok_or_else(|| {
            RecError::lookup(format!(
                "no trainer registered for model `{model_name}` of type {model_type} (fairfed={fairfed_trainer})"
            ))
        })
    }
}
