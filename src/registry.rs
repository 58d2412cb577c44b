//! Tourist registry
//!
//! Holds the complete tourist collection. The collection is only ever
//! replaced as a whole; readers take an `Arc` snapshot and never see a batch
//! half-way through replacement.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::Tourist;

#[derive(Debug, Clone)]
pub struct TouristRegistry {
    tourists: Arc<[Tourist]>,
}

impl Default for TouristRegistry {
    fn default() -> Self {
        Self {
            tourists: Arc::from(Vec::new()),
        }
    }
}

impl TouristRegistry {
    pub fn new(tourists: Vec<Tourist>) -> AppResult<Self> {
        let mut registry = Self::default();
        registry.replace_all(tourists)?;
        Ok(registry)
    }

    /// Swap in a new collection. Ids must be unique; on a duplicate the
    /// current collection is kept.
    pub fn replace_all(&mut self, tourists: Vec<Tourist>) -> AppResult<()> {
        if let Some(duplicate) = first_duplicate_id(&tourists) {
            warn!(tourist_id = %duplicate, "Rejecting tourist batch with duplicate id");
            return Err(AppError::ValidationError(format!(
                "Duplicate tourist id: {}",
                duplicate
            )));
        }

        info!(
            previous = self.tourists.len(),
            current = tourists.len(),
            "Tourist registry replaced"
        );
        self.tourists = tourists.into();
        Ok(())
    }

    /// Cheap shared handle on the current collection
    pub fn snapshot(&self) -> Arc<[Tourist]> {
        Arc::clone(&self.tourists)
    }

    pub fn len(&self) -> usize {
        self.tourists.len()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Tourist> {
        self.tourists.iter().find(|tourist| tourist.id == id)
    }

    /// Case-insensitive substring search over "First Last" and the id, in
    /// registry order. An empty query matches every tourist.
    pub fn filter_by_name_or_id(&self, query: &str) -> Vec<&Tourist> {
        let needle = query.trim().to_lowercase();

        let matches: Vec<&Tourist> = self
            .tourists
            .iter()
            .filter(|tourist| {
                needle.is_empty()
                    || tourist.full_name().to_lowercase().contains(&needle)
                    || tourist.id.to_lowercase().contains(&needle)
            })
            .collect();

        debug!(query = %query, matches = matches.len(), "Tourist search");
        matches
    }
}

/// First id that occurs more than once, if any
pub fn first_duplicate_id(tourists: &[Tourist]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(tourists.len());
    tourists
        .iter()
        .map(|tourist| tourist.id.as_str())
        .find(|id| !seen.insert(*id))
}
