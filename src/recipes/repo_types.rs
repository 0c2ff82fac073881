use serde_json::{Map, Value};
use sqlx::FromRow;
use tracing::warn;

use crate::models::Recipe;

/// Row as stored in `recipes`, legacy column names included.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeRow {
    pub id: i64,
    pub title: Option<String>,
    pub cuisine: Option<String>,
    pub contient: Option<String>,
    pub country_state: Option<String>,
    pub url: Option<String>,
    pub rating: Option<f64>,
    pub total_time: Option<i32>,
    pub prep_time: Option<i32>,
    pub cook_time: Option<i32>,
    pub description: Option<String>,
    pub ingredients: Option<Vec<String>>,
    pub instructions: Option<Vec<String>>,
    pub nutrients: Option<String>,
    pub serves: Option<i32>,
}

impl From<RecipeRow> for Recipe {
    fn from(r: RecipeRow) -> Self {
        let nutrients = r.nutrients.as_deref().and_then(|raw| parse_nutrients(r.id, raw));
        Self {
            id: r.id,
            title: r.title.unwrap_or_default(),
            cuisine: r.cuisine,
            continent: r.contient,
            region: r.country_state,
            source_url: r.url,
            rating: r.rating.filter(|v| v.is_finite()).unwrap_or(0.0),
            total_time: r.total_time.unwrap_or(0),
            prep_time: r.prep_time.unwrap_or(0),
            cook_time: r.cook_time.unwrap_or(0),
            description: r.description,
            ingredients: r.ingredients,
            instructions: r.instructions,
            nutrients,
            serves: r.serves,
        }
    }
}

fn parse_nutrients(id: i64, raw: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(map),
        Ok(Value::Null) => None,
        Ok(other) => {
            warn!(recipe_id = id, kind = ?other, "nutrients is not an object; dropping");
            None
        }
        Err(e) => {
            warn!(recipe_id = id, error = %e, "unparseable nutrients; dropping");
            None
        }
    }
}
