use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::repo_types::RecipeRow;
use crate::models::{Recipe, RecipeFilter};

const SELECT_RECIPES: &str = r#"
    SELECT id, title, cuisine, contient, country_state, url,
           rating::float8 AS rating, total_time, prep_time, cook_time,
           description, ingredients, instructions, nutrients::text AS nutrients, serves
      FROM recipes
"#;

/// Read access to the recipe table.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Rows matching `filter`, ordered by id ascending.
    async fn fetch_page(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Recipe>>;

    /// Number of rows matching `filter`.
    async fn count(&self, filter: &RecipeFilter) -> anyhow::Result<i64>;

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Recipe>>;
}

#[derive(Clone)]
pub struct PgRecipeStore {
    db: PgPool,
}

impl PgRecipeStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecipeStore for PgRecipeStore {
    async fn fetch_page(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Recipe>> {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_RECIPES);
        push_predicate(&mut qb, filter);
        qb.push(" ORDER BY id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb
            .build_query_as::<RecipeRow>()
            .fetch_all(&self.db)
            .await
            .context("select recipes page")?;
        Ok(rows.into_iter().map(Recipe::from).collect())
    }

    async fn count(&self, filter: &RecipeFilter) -> anyhow::Result<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM recipes");
        push_predicate(&mut qb, filter);

        let (total,) = qb
            .build_query_as::<(i64,)>()
            .fetch_one(&self.db)
            .await
            .context("count recipes")?;
        Ok(total)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Recipe>> {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_RECIPES);
        qb.push(" WHERE id = ").push_bind(id);

        let row = qb
            .build_query_as::<RecipeRow>()
            .fetch_optional(&self.db)
            .await
            .context("select recipe by id")?;
        Ok(row.map(Recipe::from))
    }
}

/// Appends a `WHERE` clause equivalent to [`RecipeFilter::matches`].
fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, filter: &RecipeFilter) {
    qb.push(" WHERE TRUE");
    if let Some(title) = &filter.title {
        qb.push(" AND COALESCE(title, '') ILIKE ")
            .push_bind(like_pattern(title));
    }
    if let Some(min) = filter.min_rating {
        qb.push(" AND COALESCE(rating, 0) >= ").push_bind(min);
    }
    if let Some(max) = filter.max_time {
        qb.push(" AND COALESCE(total_time, 0) <= ").push_bind(max);
    }
    if let Some(cuisine) = &filter.cuisine {
        qb.push(" AND cuisine = ").push_bind(cuisine.clone());
    }
    if let Some(continent) = &filter.continent {
        qb.push(" AND contient = ").push_bind(continent.clone());
    }
    if let Some(region) = &filter.region {
        qb.push(" AND country_state = ").push_bind(region.clone());
    }
    if let Some(needle) = &filter.cuisine_contains {
        qb.push(" AND cuisine ILIKE ").push_bind(like_pattern(needle));
    }
}

/// `%needle%` with LIKE metacharacters escaped.
fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[cfg(test)]
pub(crate) mod memory {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// In-memory store that counts calls and can be told to fail.
    #[derive(Default)]
    pub struct MemoryRecipeStore {
        rows: Vec<Recipe>,
        calls: AtomicUsize,
        failing: bool,
    }

    impl MemoryRecipeStore {
        pub fn new(mut rows: Vec<Recipe>) -> Self {
            rows.sort_by_key(|r| r.id);
            Self {
                rows,
                ..Default::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                failing: true,
                ..Default::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn enter(&self) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing {
                anyhow::bail!("connection reset by peer");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RecipeStore for MemoryRecipeStore {
        async fn fetch_page(
            &self,
            filter: &RecipeFilter,
            limit: i64,
            offset: i64,
        ) -> anyhow::Result<Vec<Recipe>> {
            self.enter()?;
            Ok(self
                .rows
                .iter()
                .filter(|r| filter.matches(r))
                .skip(offset.max(0) as usize)
                .take(limit.max(0) as usize)
                .cloned()
                .collect())
        }

        async fn count(&self, filter: &RecipeFilter) -> anyhow::Result<i64> {
            self.enter()?;
            Ok(self.rows.iter().filter(|r| filter.matches(r)).count() as i64)
        }

        async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Recipe>> {
            self.enter()?;
            Ok(self.rows.iter().find(|r| r.id == id).cloned())
        }
    }
}
