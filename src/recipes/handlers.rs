use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::{ListQuery, SearchQuery};
use super::services;
use crate::{
    error::ApiError,
    models::{Page, Recipe},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes))
        .route("/recipes/search", get(search_recipes))
        .route("/recipes/:id", get(get_recipe))
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Page<Recipe>>, ApiError> {
    let page = services::list_recipes(state.recipes.as_ref(), &q.filter(), q.page_request()).await?;
    Ok(Json(page))
}

#[instrument(skip(state))]
pub async fn search_recipes(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Page<Recipe>>, ApiError> {
    let page = services::search_recipes(
        state.recipes.as_ref(),
        q.cuisine.as_deref(),
        q.page_request(),
    )
    .await?;
    Ok(Json(page))
}

/// A non-numeric id cannot match any row, so it is reported as not found.
#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Recipe>, ApiError> {
    let id = id.parse::<i64>().map_err(|_| ApiError::NotFound)?;
    let recipe = services::get_recipe(state.recipes.as_ref(), id).await?;
    Ok(Json(recipe))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{http::StatusCode, response::IntoResponse};

    use super::*;
    use crate::models::sample_recipe;
    use crate::recipes::repo::memory::MemoryRecipeStore;

    fn state_with(store: Arc<MemoryRecipeStore>) -> AppState {
        AppState::fake(store)
    }

    async fn body_json(res: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn list_second_page() {
        let store = Arc::new(MemoryRecipeStore::new((1..=20).map(sample_recipe).collect()));
        let q = ListQuery {
            page: Some("2".into()),
            limit: Some("9".into()),
            ..Default::default()
        };
        let Json(page) = list_recipes(State(state_with(store)), Query(q))
            .await
            .unwrap();
        assert_eq!(page.page, 2);
        assert_eq!(page.limit, 9);
        assert_eq!(page.total, 20);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.data.first().map(|r| r.id), Some(10));
        assert_eq!(page.data.last().map(|r| r.id), Some(18));
    }

    #[tokio::test]
    async fn missing_recipe_is_404_without_data() {
        let store = Arc::new(MemoryRecipeStore::new((1..=3).map(sample_recipe).collect()));
        let res = get_recipe(State(state_with(store)), Path("999".into()))
            .await
            .into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body = body_json(res).await;
        assert_eq!(body["error"], "Recipe not found");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn non_numeric_id_is_404() {
        let store = Arc::new(MemoryRecipeStore::new(vec![sample_recipe(1)]));
        let res = get_recipe(State(state_with(store.clone())), Path("abc".into()))
            .await
            .into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn search_without_cuisine_is_400() {
        let store = Arc::new(MemoryRecipeStore::new(vec![sample_recipe(1)]));
        let res = search_recipes(State(state_with(store.clone())), Query(SearchQuery::default()))
            .await
            .into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = body_json(res).await;
        assert_eq!(body["error"], "Cuisine query is required");
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn search_matches_substring_ignoring_case() {
        let mut mexican = sample_recipe(4);
        mexican.cuisine = Some("Mexican".into());
        let store = Arc::new(MemoryRecipeStore::new(vec![sample_recipe(1), mexican]));
        let q = SearchQuery {
            cuisine: Some("mex".into()),
            ..Default::default()
        };
        let Json(page) = search_recipes(State(state_with(store)), Query(q))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].id, 4);
    }

    #[tokio::test]
    async fn store_failure_is_500_with_generic_message() {
        let store = Arc::new(MemoryRecipeStore::failing());
        let res = list_recipes(State(state_with(store)), Query(ListQuery::default()))
            .await
            .into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(res).await;
        assert_eq!(body, serde_json::json!({ "error": "Database error" }));
    }
}
