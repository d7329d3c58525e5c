// ============================================================
// Layer 6 — Run Configuration
// ============================================================
// A run is configured by layering YAML mappings:
//
//   built-in defaults  (DEFAULT_CONFIG below)
//        │
//        ▼
//   config files       (in the order given on the command line)
//        │
//        ▼
//   --key=value        (leftover command-line tokens)
//        │
//        ▼
//   model / dataset    (the two CLI flags)
//
// Later layers win. Nested mappings (eval_args) are merged key
// by key, so a file that only sets `eval_args.order` keeps the
// default split ratios.
//
// The merged mapping is kept as-is (`Config::get`) and also
// deserialised into the typed `Config` view the rest of the
// crate reads from.

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::data::preprocessor::Interval;
use crate::domain::model_type::ModelType;
use crate::error::{RecError, RecResult};
use crate::infra::logger::set_color;
use crate::ml::evaluator::{Metric, MetricKey};
use crate::ml::registry::ModelRegistry;

const DEFAULT_CONFIG: &str = r#"
seed: 2020
reproducibility: true
device: cpu
state: INFO

data_path: dataset
field_separator: "\t"
USER_ID_FIELD: user_id
ITEM_ID_FIELD: item_id
RATING_FIELD: rating
TIME_FIELD: timestamp
rm_dup_inter: ~
user_inter_num_interval: "[0,inf)"
item_inter_num_interval: "[0,inf)"
val_interval: ~

eval_args:
  split: {RS: [0.8, 0.1, 0.1]}
  order: RO
  group_by: user
  mode: uni1

epochs: 300
train_batch_size: 2048
eval_batch_size: 4096
learning_rate: 0.001
train_neg_sample_num: 1
embedding_size: 64
weight_decay: 0.0

eval_step: 1
stopping_step: 10
metrics: [Recall, MRR, NDCG, Hit, Precision]
topk: [10]
valid_metric: MRR@10
valid_metric_bigger: true

fairness_group_ratio: 0.05
fairness_alpha: 0.5

checkpoint_dir: saved
saved: true
log_dir: log
rank_save_dir: saved/rank
"#;

// ─── Evaluation arguments ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalArgs {
    pub split:    SplitArgs,
    pub order:    SplitOrder,
    pub group_by: Option<GroupBy>,
    pub mode:     EvalMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitArgs {
    /// Ratio split: [train, valid, test]
    #[serde(rename = "RS")]
    pub ratios: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitOrder {
    /// Random ordering
    #[serde(rename = "RO")]
    Random,
    /// Temporal ordering (by timestamp)
    #[serde(rename = "TO")]
    Temporal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    User,
}

/// How evaluation candidates are built for each positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EvalMode {
    /// Only the observed positives are scored
    Labeled,
    /// N uniformly sampled negatives per positive ("uniN")
    Uniform(usize),
}

impl TryFrom<String> for EvalMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let lower = value.trim().to_lowercase();
        if lower == "labeled" {
            return Ok(EvalMode::Labeled);
        }
        match lower.strip_prefix("uni").map(str::parse::<usize>) {
            Some(Ok(n)) if n > 0 => Ok(EvalMode::Uniform(n)),
            _ => Err(format!("unknown eval mode `{value}` (expected `labeled` or `uniN`)")),
        }
    }
}

impl From<EvalMode> for String {
    fn from(mode: EvalMode) -> Self {
        match mode {
            EvalMode::Labeled    => "labeled".to_string(),
            EvalMode::Uniform(n) => format!("uni{n}"),
        }
    }
}

/// Which copy of a duplicated (user, item) pair survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DupPolicy {
    First,
    Last,
}

// ─── Config ───────────────────────────────────────────────────────────────────

/// Typed view of the merged configuration mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model:   String,
    pub dataset: String,
    #[serde(rename = "MODEL_TYPE")]
    pub model_type: ModelType,

    pub seed:            u64,
    pub reproducibility: bool,
    pub device:          String,
    pub state:           String,

    pub data_path:       PathBuf,
    pub field_separator: String,
    #[serde(rename = "USER_ID_FIELD")]
    pub user_id_field:   String,
    #[serde(rename = "ITEM_ID_FIELD")]
    pub item_id_field:   String,
    #[serde(rename = "RATING_FIELD")]
    pub rating_field:    String,
    #[serde(rename = "TIME_FIELD")]
    pub time_field:      String,
    pub rm_dup_inter:    Option<DupPolicy>,
    pub user_inter_num_interval: Option<String>,
    pub item_inter_num_interval: Option<String>,
    pub val_interval:    Option<String>,

    pub eval_args: EvalArgs,

    pub epochs:               usize,
    pub train_batch_size:     usize,
    pub eval_batch_size:      usize,
    pub learning_rate:        f64,
    pub train_neg_sample_num: usize,
    pub embedding_size:       usize,
    pub weight_decay:         f64,

    pub eval_step:     usize,
    pub stopping_step: usize,
    #[serde(deserialize_with = "one_or_many")]
    pub metrics:       Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub topk:          Vec<usize>,
    pub valid_metric:  String,
    pub valid_metric_bigger: bool,

    pub fairness_group_ratio: f64,
    pub fairness_alpha:       f64,

    pub checkpoint_dir: PathBuf,
    pub saved:          bool,
    pub log_dir:        PathBuf,
    pub rank_save_dir:  PathBuf,

    #[serde(skip)]
    values: Mapping,
}

impl Config {
    /// Merge defaults, config files and command-line overrides into a
    /// validated configuration.
    ///
    /// `MODEL_TYPE` is looked up in the model catalog when no layer sets
    /// it. An unknown model name is not an error here: it surfaces when
    /// the model itself is resolved, after the dataset has been built.
    pub fn build(
        model:        &str,
        dataset:      &str,
        config_files: Option<&[PathBuf]>,
        overrides:    &[(String, String)],
        models:       &ModelRegistry,
    ) -> RecResult<Self> {
        let mut values = parse_mapping(DEFAULT_CONFIG, "built-in defaults")?;

        for path in config_files.unwrap_or(&[]) {
            let layer = read_config_file(path)?;
            merge(&mut values, layer);
        }

        for (key, raw) in overrides {
            let value = serde_yaml::from_str::<Value>(raw)
                .unwrap_or_else(|_| Value::String(raw.clone()));
            let mut layer = Mapping::new();
            layer.insert(Value::from(key.as_str()), value);
            merge(&mut values, layer);
        }

        values.insert(Value::from("model"), Value::from(model));
        values.insert(Value::from("dataset"), Value::from(dataset));

        if !values.contains_key("MODEL_TYPE") {
            let model_type = models.model_type_of(model).unwrap_or(ModelType::General);
            values.insert(Value::from("MODEL_TYPE"), serde_yaml::to_value(model_type)?);
        }

        let mut config: Config = serde_yaml::from_value(Value::Mapping(values.clone()))
            .map_err(|e| RecError::config(format!("invalid configuration: {e}")))?;
        config.values = values;
        config.validate()?;
        Ok(config)
    }

    /// Raw access to any merged option, including keys the typed view ignores.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// The validation metric as an evaluator key, e.g. `mrr@10`.
    pub fn valid_metric_key(&self) -> String {
        self.valid_metric.to_lowercase()
    }

    pub fn field_separator_byte(&self) -> RecResult<u8> {
        match self.field_separator.as_bytes() {
            [b] => Ok(*b),
            _ => Err(RecError::config(format!(
                "field_separator must be a single byte, got {:?}",
                self.field_separator
            ))),
        }
    }

    fn validate(&self) -> RecResult<()> {
        let ratios = &self.eval_args.split.ratios;
        if ratios.len() != 3 {
            return Err(RecError::config(format!(
                "eval_args.split.RS needs [train, valid, test] ratios, got {ratios:?}"
            )));
        }
        if ratios.iter().any(|r| !r.is_finite() || *r < 0.0) || ratios.iter().sum::<f64>() <= 0.0 {
            return Err(RecError::config(format!(
                "eval_args.split.RS ratios must be non-negative with a positive sum, got {ratios:?}"
            )));
        }

        if self.train_batch_size == 0 || self.eval_batch_size == 0 {
            return Err(RecError::config("batch sizes must be >= 1"));
        }
        if self.eval_step == 0 {
            return Err(RecError::config("eval_step must be >= 1"));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(RecError::config("learning_rate must be > 0"));
        }
        if self.embedding_size == 0 {
            return Err(RecError::config("embedding_size must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.fairness_group_ratio) {
            return Err(RecError::config("fairness_group_ratio must be in [0, 1]"));
        }
        if !self.fairness_alpha.is_finite() || self.fairness_alpha < 0.0 {
            return Err(RecError::config("fairness_alpha must be >= 0"));
        }

        if self.topk.is_empty() || self.topk.contains(&0) {
            return Err(RecError::config(format!("topk values must be >= 1, got {:?}", self.topk)));
        }
        let metrics = self
            .metrics
            .iter()
            .map(|name| Metric::from_str(name))
            .collect::<RecResult<Vec<_>>>()?;
        let key = MetricKey::from_str(&self.valid_metric)?;
        if !metrics.contains(&key.metric) || !self.topk.contains(&key.k) {
            return Err(RecError::config(format!(
                "valid_metric `{}` is not among the configured metrics {:?} at topk {:?}",
                self.valid_metric, self.metrics, self.topk
            )));
        }

        for raw in [&self.user_inter_num_interval, &self.item_inter_num_interval, &self.val_interval]
            .into_iter()
            .flatten()
        {
            Interval::parse_union(raw)?;
        }

        self.field_separator_byte()?;
        tracing::Level::from_str(&self.state)
            .map_err(|_| RecError::config(format!("unknown log state `{}`", self.state)))?;

        Ok(())
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sections: [(&str, &[&str]); 4] = [
            ("General Hyper Parameters", &[
                "model", "MODEL_TYPE", "dataset", "seed", "reproducibility", "device",
                "state", "checkpoint_dir", "saved", "log_dir", "rank_save_dir",
            ]),
            ("Training Hyper Parameters", &[
                "epochs", "train_batch_size", "learning_rate", "train_neg_sample_num",
                "embedding_size", "weight_decay", "eval_step", "stopping_step", "fairness_alpha",
            ]),
            ("Evaluation Hyper Parameters", &[
                "eval_args", "metrics", "topk", "valid_metric", "valid_metric_bigger",
                "eval_batch_size",
            ]),
            ("Dataset Hyper Parameters", &[
                "data_path", "field_separator", "USER_ID_FIELD", "ITEM_ID_FIELD",
                "RATING_FIELD", "TIME_FIELD", "rm_dup_inter", "user_inter_num_interval",
                "item_inter_num_interval", "val_interval", "fairness_group_ratio",
            ]),
        ];

        writeln!(f)?;
        for (title, keys) in sections {
            writeln!(f, "{}", set_color(title, "magenta"))?;
            for key in keys {
                if let Some(value) = self.values.get(*key) {
                    writeln!(f, "{} = {}", set_color(key, "cyan"), render_value(value))?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn read_config_file(path: &Path) -> RecResult<Mapping> {
    let text = fs::read_to_string(path).map_err(|e| {
        RecError::config(format!("cannot read config file '{}': {e}", path.display()))
    })?;
    parse_mapping(&text, &path.display().to_string())
}

fn parse_mapping(text: &str, origin: &str) -> RecResult<Mapping> {
    let value: Value = serde_yaml::from_str(text)
        .map_err(|e| RecError::config(format!("malformed YAML in {origin}: {e}")))?;
    match value {
        Value::Mapping(mapping) => Ok(mapping),
        // An empty file is an empty layer
        Value::Null => Ok(Mapping::new()),
        _ => Err(RecError::config(format!("{origin} must contain a key/value mapping"))),
    }
}

/// Recursively merge `layer` into `base`; nested mappings merge key by key.
fn merge(base: &mut Mapping, layer: Mapping) {
    for (key, value) in layer {
        if let Value::Mapping(incoming) = value {
            if let Some(Value::Mapping(existing)) = base.get_mut(&key) {
                merge(existing, incoming);
                continue;
            }
            base.insert(key, Value::Mapping(incoming));
        } else {
            base.insert(key, value);
        }
    }
}

fn render_value(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match OneOrMany::<T>::deserialize(deserializer)? {
        OneOrMany::One(value)   => vec![value],
        OneOrMany::Many(values) => values,
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn build(files: Option<&[PathBuf]>, overrides: &[(String, String)]) -> RecResult<Config> {
        Config::build("BPR", "milk_tea", files, overrides, &ModelRegistry::with_builtin())
    }

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_files() {
        let cfg = build(None, &[]).unwrap();
        assert_eq!(cfg.model, "BPR");
        assert_eq!(cfg.dataset, "milk_tea");
        assert_eq!(cfg.model_type, ModelType::General);
        assert_eq!(cfg.seed, 2020);
        assert!(cfg.reproducibility);
        assert_eq!(cfg.field_separator, "\t");
        assert_eq!(cfg.eval_args.mode, EvalMode::Uniform(1));
        assert_eq!(cfg.eval_args.group_by, Some(GroupBy::User));
        assert_eq!(cfg.valid_metric_key(), "mrr@10");
    }

    #[test]
    fn test_later_files_override_earlier_ones() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "basic.yaml", "epochs: 5\nlearning_rate: 0.01\n");
        let b = write(&dir, "milk_tea.yaml", "epochs: 7\n");
        let cfg = build(Some(&[a, b]), &[]).unwrap();
        assert_eq!(cfg.epochs, 7);
        assert_eq!(cfg.learning_rate, 0.01);
    }

    #[test]
    fn test_nested_eval_args_merge_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "basic.yaml", "eval_args:\n  order: TO\n");
        let cfg = build(Some(&[a]), &[]).unwrap();
        assert_eq!(cfg.eval_args.order, SplitOrder::Temporal);
        assert_eq!(cfg.eval_args.split.ratios, vec![0.8, 0.1, 0.1]);
    }

    #[test]
    fn test_command_line_overrides_win() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "basic.yaml", "epochs: 5\n");
        let overrides = vec![
            ("epochs".to_string(), "9".to_string()),
            ("topk".to_string(), "[5, 10]".to_string()),
            ("reproducibility".to_string(), "false".to_string()),
        ];
        let cfg = build(Some(&[a]), &overrides).unwrap();
        assert_eq!(cfg.epochs, 9);
        assert_eq!(cfg.topk, vec![5, 10]);
        assert!(!cfg.reproducibility);
    }

    #[test]
    fn test_scalar_topk_and_metrics_are_accepted() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "basic.yaml", "topk: 5\nmetrics: Recall\nvalid_metric: Recall@5\n");
        let cfg = build(Some(&[a]), &[]).unwrap();
        assert_eq!(cfg.topk, vec![5]);
        assert_eq!(cfg.metrics, vec!["Recall".to_string()]);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let missing = vec![PathBuf::from("/definitely/not/here.yaml")];
        let err = build(Some(&missing), &[]).unwrap_err();
        assert!(matches!(err, RecError::Config(_)));
    }

    #[test]
    fn test_malformed_yaml_is_config_error() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "bad.yaml", "epochs: [1, 2\n");
        assert!(matches!(build(Some(&[a]), &[]).unwrap_err(), RecError::Config(_)));
    }

    #[test]
    fn test_wrong_value_type_is_config_error() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "bad.yaml", "epochs: lots\n");
        assert!(matches!(build(Some(&[a]), &[]).unwrap_err(), RecError::Config(_)));
    }

    #[test]
    fn test_valid_metric_must_be_configured() {
        let overrides = vec![("valid_metric".to_string(), "NDCG@20".to_string())];
        assert!(matches!(build(None, &overrides).unwrap_err(), RecError::Config(_)));
    }

    #[test]
    fn test_unknown_model_defaults_to_general_type() {
        let cfg = Config::build("NoSuchModel", "milk_tea", None, &[], &ModelRegistry::with_builtin())
            .unwrap();
        assert_eq!(cfg.model_type, ModelType::General);
    }

    #[test]
    fn test_empty_config_file_is_an_empty_layer() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "empty.yaml", "");
        assert!(build(Some(&[a]), &[]).is_ok());
    }

    #[test]
    fn test_raw_mapping_keeps_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "basic.yaml", "gpu_id: 3\n");
        let cfg = build(Some(&[a]), &[]).unwrap();
        assert_eq!(cfg.get("gpu_id").and_then(Value::as_u64), Some(3));
    }
}
