use serde::{Deserialize, Serialize};
use std::fmt;

/// Family a recommender belongs to. Trainers are registered per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    #[serde(alias = "GENERAL")]
    General,
    #[serde(alias = "SEQUENTIAL")]
    Sequential,
    #[serde(alias = "CONTEXT")]
    Context,
    #[serde(alias = "KNOWLEDGE")]
    Knowledge,
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelType::General    => "GENERAL",
            ModelType::Sequential => "SEQUENTIAL",
            ModelType::Context    => "CONTEXT",
            ModelType::Knowledge  => "KNOWLEDGE",
        };
        f.write_str(name)
    }
}
