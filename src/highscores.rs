//! Best score per game
//!
//! One number per game, stored under `"<game>-high-score"`. A missing,
//! corrupt or unreachable store reads as "no best score yet".

use serde::{Deserialize, Serialize};

use crate::persistence::KeyValueStore;

/// Best score on record for one game
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestScore {
    pub score: u64,
}

impl BestScore {
    /// Store key for a game
    pub fn storage_key(game: &str) -> String {
        format!("{}-high-score", game)
    }

    /// Load the best score, degrading to zero on any failure
    pub fn load(store: &dyn KeyValueStore, game: &str) -> Self {
        let key = Self::storage_key(game);
        match store.get(&key) {
            Ok(Some(raw)) => match raw.trim().parse::<u64>() {
                Ok(score) => {
                    log::info!("Loaded {} best score {}", game, score);
                    Self { score }
                }
                Err(_) => {
                    log::warn!("Ignoring corrupt best score for {}: {:?}", game, raw);
                    Self::default()
                }
            },
            Ok(None) => Self::default(),
            Err(e) => {
                log::warn!("Could not read best score for {}: {}", game, e);
                Self::default()
            }
        }
    }

    /// Fold in a finished run and persist if it improved.
    /// Returns the best score after the update.
    pub fn record(&mut self, store: &mut dyn KeyValueStore, game: &str, score: u64) -> u64 {
        if score <= self.score {
            return self.score;
        }
        self.score = score;
        if let Err(e) = store.set(&Self::storage_key(game), &score.to_string()) {
            log::warn!("Could not save best score for {}: {}", game, e);
        } else {
            log::info!("New {} best score {}", game, score);
        }
        self.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryStore, NullStore};

    #[test]
    fn test_key_format() {
        assert_eq!(BestScore::storage_key("snake"), "snake-high-score");
    }

    #[test]
    fn test_record_keeps_max() {
        let mut store = MemoryStore::new();
        let mut best = BestScore::load(&store, "snake");
        assert_eq!(best.score, 0);
        assert_eq!(best.record(&mut store, "snake", 120), 120);
        assert_eq!(best.record(&mut store, "snake", 80), 120);
        assert_eq!(BestScore::load(&store, "snake").score, 120);
    }

    #[test]
    fn test_corrupt_value_reads_as_zero() {
        let mut store = MemoryStore::new();
        store.set("tetris-high-score", "not a number").unwrap();
        assert_eq!(BestScore::load(&store, "tetris").score, 0);
    }

    #[test]
    fn test_unavailable_store_degrades() {
        let mut store = NullStore;
        let mut best = BestScore::load(&store, "frogger");
        assert_eq!(best.record(&mut store, "frogger", 50), 50);
    }
}
