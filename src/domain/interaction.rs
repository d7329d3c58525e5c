// ============================================================
// Layer 3 — Interaction Domain Types
// ============================================================
// A user-item interaction exists in two shapes:
//
//   RawInteraction — straight from the atomic file, ids are the
//                    original string tokens ("u_17", "oolong")
//   Interaction    — after remapping, ids are dense integers
//                    that index directly into embedding tables
//
// Internal id 0 is reserved for padding, so real users and
// items start at 1.

use serde::{Deserialize, Serialize};

/// Dense internal user id (0 is padding).
pub type UserId = u32;

/// Dense internal item id (0 is padding).
pub type ItemId = u32;

/// Token used for the reserved padding slot of every id field.
pub const PAD_TOKEN: &str = "[PAD]";

/// One row of the interaction file before remapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInteraction {
    pub user:      String,
    pub item:      String,
    pub rating:    Option<f64>,
    pub timestamp: Option<f64>,
}

impl RawInteraction {
    pub fn new(user: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            user:      user.into(),
            item:      item.into(),
            rating:    None,
            timestamp: None,
        }
    }
}

#[cfg(test)]
impl RawInteraction {
    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// One observed interaction with internal ids.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user:      UserId,
    pub item:      ItemId,
    pub timestamp: Option<f64>,
}

/// The sizes a model needs to allocate its tables.
/// Both counts include the padding slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSchema {
    pub user_num: usize,
    pub item_num: usize,
}

/// Id → original token tables for users and items.
#[derive(Debug, Clone, Default)]
pub struct Vocab {
    pub users: Vec<String>,
    pub items: Vec<String>,
}

impl Vocab {
    pub fn user_token(&self, id: UserId) -> &str {
        self.users.get(id as usize).map(String::as_str).unwrap_or(PAD_TOKEN)
    }

    pub fn item_token(&self, id: ItemId) -> &str {
        self.items.get(id as usize).map(String::as_str).unwrap_or(PAD_TOKEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocab_falls_back_to_pad_for_unknown_ids() {
        let vocab = Vocab {
            users: vec![PAD_TOKEN.into(), "alice".into()],
            items: vec![PAD_TOKEN.into(), "oolong".into()],
        };
        assert_eq!(vocab.user_token(1), "alice");
        assert_eq!(vocab.item_token(1), "oolong");
        assert_eq!(vocab.user_token(9), PAD_TOKEN);
    }
}
