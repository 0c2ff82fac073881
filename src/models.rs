use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Time ceiling value that means "no ceiling" on the listing filter.
pub const MAX_TIME_LIMIT: i32 = 120;

/// A recipe as served by the API and held by the client.
///
/// Field names are canonical. Older snapshots used `Contient`, `Country_State`
/// and `URL`; those spellings are accepted on input and never written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    pub cuisine: Option<String>,
    #[serde(default, alias = "Contient", alias = "contient")]
    pub continent: Option<String>,
    #[serde(default, alias = "Country_State", alias = "country_state")]
    pub region: Option<String>,
    #[serde(default, alias = "URL", alias = "url")]
    pub source_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub rating: f64,
    #[serde(default, deserialize_with = "lenient_minutes")]
    pub total_time: i32,
    #[serde(default, deserialize_with = "lenient_minutes")]
    pub prep_time: i32,
    #[serde(default, deserialize_with = "lenient_minutes")]
    pub cook_time: i32,
    pub description: Option<String>,
    pub ingredients: Option<Vec<String>>,
    pub instructions: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_nutrients")]
    pub nutrients: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient_serves")]
    pub serves: Option<i32>,
}

/// Page envelope returned by the listing endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
    pub data: Vec<T>,
}

/// Predicate over recipes shared by the SQL store and the in-memory paths.
///
/// `None` means "no constraint". Build it through [`RecipeFilter::normalized`]
/// so that empty strings, a zero rating threshold and the maximum time
/// ceiling all collapse to `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    pub min_rating: Option<f64>,
    /// Upper bound on total time in minutes.
    pub max_time: Option<i32>,
    /// Exact-match filters.
    pub cuisine: Option<String>,
    pub continent: Option<String>,
    pub region: Option<String>,
    /// Case-insensitive substring of the cuisine, used by cuisine search.
    pub cuisine_contains: Option<String>,
}

impl RecipeFilter {
    pub fn normalized(self) -> Self {
        Self {
            title: non_empty(self.title),
            min_rating: self.min_rating.filter(|r| r.is_finite() && *r > 0.0),
            max_time: self.max_time.filter(|t| *t < MAX_TIME_LIMIT),
            cuisine: non_empty(self.cuisine),
            continent: non_empty(self.continent),
            region: non_empty(self.region),
            cuisine_contains: non_empty(self.cuisine_contains),
        }
    }

    /// Applies title, rating, time and exact filters in that order.
    pub fn matches(&self, recipe: &Recipe) -> bool {
        if let Some(title) = &self.title {
            if !contains_ignore_case(&recipe.title, title) {
                return false;
            }
        }
        if let Some(min) = self.min_rating {
            if recipe.rating < min {
                return false;
            }
        }
        if let Some(max) = self.max_time {
            if recipe.total_time > max {
                return false;
            }
        }
        if !exact(&self.cuisine, &recipe.cuisine)
            || !exact(&self.continent, &recipe.continent)
            || !exact(&self.region, &recipe.region)
        {
            return false;
        }
        match &self.cuisine_contains {
            Some(needle) => recipe
                .cuisine
                .as_deref()
                .is_some_and(|c| contains_ignore_case(c, needle)),
            None => true,
        }
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

fn exact(wanted: &Option<String>, actual: &Option<String>) -> bool {
    match wanted {
        Some(w) => actual.as_deref() == Some(w.as_str()),
        None => true,
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Reads a rating the way older clients stored it: numbers pass through,
/// strings lose every character that is not a digit or a dot and the leading
/// decimal is parsed. Anything else is 0.
pub fn parse_rating(value: &Value) -> f64 {
    lazy_static! {
        static ref NON_NUMERIC: Regex = Regex::new(r"[^\d.]").unwrap();
        static ref LEADING_DECIMAL: Regex = Regex::new(r"^\d*\.?\d+").unwrap();
    }
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = NON_NUMERIC.replace_all(s, "");
            LEADING_DECIMAL
                .find(&cleaned)
                .and_then(|m| m.as_str().parse::<f64>().ok())
        }
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn parse_minutes(value: &Value) -> i32 {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|v| i32::try_from(v).ok())
        .unwrap_or(0)
}

/// Nutrients arrive as an object, or as that object serialized into a string
/// when the snapshot came straight from a database row.
fn parse_nutrients(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

/// Leading integer of a servings count such as `"6 servings"`.
fn parse_serves(value: &Value) -> Option<i32> {
    lazy_static! {
        static ref LEADING_INT: Regex = Regex::new(r"^\d+").unwrap();
    }
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => LEADING_INT
            .find(s.trim())
            .and_then(|m| m.as_str().parse::<i64>().ok()),
        _ => None,
    };
    parsed.and_then(|v| i32::try_from(v).ok())
}

fn lenient_rating<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_rating(&value))
}

fn lenient_minutes<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_minutes(&value))
}

fn lenient_nutrients<'de, D>(deserializer: D) -> Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_nutrients(value))
}

fn lenient_serves<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_serves(&value))
}

#[cfg(test)]
pub(crate) fn sample_recipe(id: i64) -> Recipe {
    Recipe {
        id,
        title: format!("Recipe {id}"),
        cuisine: Some("Italian".into()),
        continent: Some("Europe".into()),
        region: Some("Italy".into()),
        source_url: None,
        rating: 4.0,
        total_time: 30,
        prep_time: 10,
        cook_time: 20,
        description: None,
        ingredients: Some(vec!["flour".into(), "water".into()]),
        instructions: None,
        nutrients: None,
        serves: Some(2),
    }
}
