//! Browsing client: talks to the recipes API, owns the listing state and the
//! locally persisted favorites.

pub mod api;
pub mod error;
pub mod favorites;
pub mod listing;
pub mod storage;

pub use api::{HttpRecipeApi, ListingQuery, RecipeApi};
pub use error::ClientError;
pub use favorites::FavoritesStore;
pub use listing::{ListingClient, ListingState, Pager, RecipeCard};
pub use storage::{FileStorage, LocalStorage, MemoryStorage};
