use serde::Deserialize;

use super::services::PageRequest;
use crate::models::RecipeFilter;

/// Query string of `GET /recipes`. Everything arrives as text so that
/// malformed numbers fall back to defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    /// Title substring.
    pub q: Option<String>,
    pub min_rating: Option<String>,
    pub max_time: Option<String>,
    pub cuisine: Option<String>,
    pub continent: Option<String>,
    pub region: Option<String>,
}

impl ListQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::from_raw(self.page.as_deref(), self.limit.as_deref())
    }

    pub fn filter(&self) -> RecipeFilter {
        RecipeFilter {
            title: self.q.clone(),
            min_rating: self
                .min_rating
                .as_deref()
                .and_then(|v| v.trim().parse::<f64>().ok()),
            max_time: self
                .max_time
                .as_deref()
                .and_then(|v| v.trim().parse::<i32>().ok()),
            cuisine: self.cuisine.clone(),
            continent: self.continent.clone(),
            region: self.region.clone(),
            cuisine_contains: None,
        }
        .normalized()
    }
}

/// Query string of `GET /recipes/search`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub cuisine: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl SearchQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::from_raw(self.page.as_deref(), self.limit.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_filters_are_ignored() {
        let q = ListQuery {
            min_rating: Some("lots".into()),
            max_time: Some("soon".into()),
            q: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(q.filter(), RecipeFilter::default());
    }

    #[test]
    fn filters_are_parsed() {
        let q = ListQuery {
            q: Some("curry".into()),
            min_rating: Some("3.5".into()),
            max_time: Some("60".into()),
            region: Some("Kerala".into()),
            ..Default::default()
        };
        let f = q.filter();
        assert_eq!(f.title.as_deref(), Some("curry"));
        assert_eq!(f.min_rating, Some(3.5));
        assert_eq!(f.max_time, Some(60));
        assert_eq!(f.region.as_deref(), Some("Kerala"));
        assert!(f.cuisine.is_none());
    }

    #[test]
    fn max_time_at_ceiling_means_unbounded() {
        let q = ListQuery {
            max_time: Some("120".into()),
            ..Default::default()
        };
        assert!(q.filter().max_time.is_none());
    }
}
