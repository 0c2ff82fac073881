use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, warn};

use super::error::ClientError;
use super::storage::LocalStorage;
use crate::models::Recipe;

/// Storage key holding the serialized favorites array.
pub const FAVORITES_KEY: &str = "favorites";

/// Favorited recipe snapshots, persisted write-through to local storage.
///
/// Built once when the client starts and shared by reference with every view.
/// The snapshots are copies: they do not follow later changes on the server.
pub struct FavoritesStore<S> {
    storage: S,
    favorites: Mutex<Vec<Recipe>>,
}

impl<S: LocalStorage> FavoritesStore<S> {
    /// Loads the persisted set. Missing, unreadable or corrupt data yields an
    /// empty set; a single unreadable snapshot is skipped on its own.
    pub fn load(storage: S) -> Self {
        let favorites = match storage.get(FAVORITES_KEY) {
            Ok(Some(raw)) => decode_snapshots(&raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "favorites entry unreadable; starting empty");
                Vec::new()
            }
        };
        debug!(count = favorites.len(), "favorites loaded");
        Self {
            storage,
            favorites: Mutex::new(favorites),
        }
    }

    /// Removes the recipe if its id is present, appends it otherwise, and
    /// persists before returning. Returns the new membership. If the write
    /// fails nothing changes.
    pub fn toggle_favorite(&self, recipe: &Recipe) -> Result<bool, ClientError> {
        let mut favorites = self.lock();
        let mut next = favorites.clone();
        let added = match next.iter().position(|f| f.id == recipe.id) {
            Some(idx) => {
                next.remove(idx);
                false
            }
            None => {
                next.push(recipe.clone());
                true
            }
        };

        let raw = serde_json::to_string(&next)?;
        self.storage.set(FAVORITES_KEY, &raw)?;
        *favorites = next;
        debug!(recipe_id = recipe.id, added, "favorite toggled");
        Ok(added)
    }

    pub fn is_favorite(&self, id: i64) -> bool {
        self.lock().iter().any(|f| f.id == id)
    }

    /// Favorites in the order they were added.
    pub fn favorites(&self) -> Vec<Recipe> {
        self.lock().clone()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Recipe>> {
        self.favorites.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn decode_snapshots(raw: &str) -> Vec<Recipe> {
    let entries = match serde_json::from_str::<Vec<Value>>(raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "corrupt favorites entry; starting empty");
            return Vec::new();
        }
    };
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(idx, entry)| match serde_json::from_value::<Recipe>(entry) {
            Ok(recipe) => Some(recipe),
            Err(e) => {
                warn!(index = idx, error = %e, "skipping unreadable favorite");
                None
            }
        })
        .collect()
}
