// ============================================================
// Layer 4 — Recommendation Dataset
// ============================================================
// Turns filtered raw rows into dense internal ids:
//
//   "alice" → 1, "bob" → 2, ...      (0 is [PAD])
//   "oolong" → 1, "matcha" → 2, ...
//
// Ids follow first appearance in the filtered rows, so the
// same file and config always give the same ids.

use std::{collections::HashMap, fmt, sync::Arc};

use crate::data::{loader::AtomicFileLoader, preprocessor::Preprocessor};
use crate::domain::interaction::{DatasetSchema, Interaction, RawInteraction, Vocab, PAD_TOKEN};
use crate::domain::traits::InteractionSource;
use crate::error::{RecError, RecResult};
use crate::infra::config::Config;

/// Load, filter and remap the dataset named in the config.
pub fn create_dataset(config: &Config) -> RecResult<RecDataset> {
    let loader = AtomicFileLoader::from_config(config)?;
    let raw    = loader.load_all()?;
    tracing::debug!("Loaded {} raw interactions from '{}'", raw.len(), loader.path().display());

    let filtered = Preprocessor::from_config(config)?.apply(raw);
    if filtered.is_empty() {
        return Err(RecError::dataset(format!(
            "dataset `{}` has no interactions left after filtering",
            config.dataset
        )));
    }

    Ok(RecDataset::from_raw(
        &config.dataset,
        &config.user_id_field,
        &config.item_id_field,
        filtered,
    ))
}

#[derive(Debug, Clone)]
pub struct RecDataset {
    name:         String,
    user_field:   String,
    item_field:   String,
    vocab:        Arc<Vocab>,
    interactions: Vec<Interaction>,
}

impl RecDataset {
    pub fn from_raw(name: &str, user_field: &str, item_field: &str, rows: Vec<RawInteraction>) -> Self {
        let mut users = IdMap::default();
        let mut items = IdMap::default();

        let interactions = rows
            .into_iter()
            .map(|r| Interaction {
                user:      users.id_of(r.user),
                item:      items.id_of(r.item),
                timestamp: r.timestamp,
            })
            .collect();

        Self {
            name:       name.to_string(),
            user_field: user_field.to_string(),
            item_field: item_field.to_string(),
            vocab:      Arc::new(Vocab { users: users.tokens, items: items.tokens }),
            interactions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Users including the padding slot.
    pub fn user_num(&self) -> usize {
        self.vocab.users.len()
    }

    /// Items including the padding slot.
    pub fn item_num(&self) -> usize {
        self.vocab.items.len()
    }

    pub fn inter_num(&self) -> usize {
        self.interactions.len()
    }

    pub fn schema(&self) -> DatasetSchema {
        DatasetSchema { user_num: self.user_num(), item_num: self.item_num() }
    }

    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    pub fn vocab(&self) -> Arc<Vocab> {
        Arc::clone(&self.vocab)
    }

    /// Share of the (user, item) matrix with no interaction.
    pub fn sparsity(&self) -> f64 {
        let cells = (self.user_num() - 1) as f64 * (self.item_num() - 1) as f64;
        if cells == 0.0 {
            return 1.0;
        }
        1.0 - self.inter_num() as f64 / cells
    }
}

impl fmt::Display for RecDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let users = self.user_num() - 1;
        let items = self.item_num() - 1;
        let inter = self.inter_num() as f64;
        writeln!(f, "{}", self.name)?;
        writeln!(f, "The number of users: {users}")?;
        writeln!(f, "Average actions of users: {:.4}", inter / users.max(1) as f64)?;
        writeln!(f, "The number of items: {items}")?;
        writeln!(f, "Average actions of items: {:.4}", inter / items.max(1) as f64)?;
        writeln!(f, "The number of inters: {}", self.inter_num())?;
        writeln!(f, "The sparsity of the dataset: {:.4}%", self.sparsity() * 100.0)?;
        write!(f, "Remain Fields: [{}, {}]", self.user_field, self.item_field)
    }
}

/// Token → dense id, with id 0 pre-assigned to [PAD].
struct IdMap {
    ids:    HashMap<String, u32>,
    tokens: Vec<String>,
}

impl Default for IdMap {
    fn default() -> Self {
        Self { ids: HashMap::new(), tokens: vec![PAD_TOKEN.to_string()] }
    }
}

impl IdMap {
    fn id_of(&mut self, token: String) -> u32 {
        if let Some(id) = self.ids.get(&token) {
            return *id;
        }
        let id = self.tokens.len() as u32;
        self.tokens.push(token.clone());
        self.ids.insert(token, id);
        id
    }
}
