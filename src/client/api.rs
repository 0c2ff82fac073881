use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::ClientError;
use crate::config::ClientConfig;
use crate::error::ErrorBody;
use crate::models::{Page, Recipe, RecipeFilter};

/// One listing request: page coordinates plus every filter, all of which
/// the server applies before paginating.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    pub page: i64,
    pub limit: i64,
    pub filter: RecipeFilter,
}

impl ListingQuery {
    /// Query-string pairs for `GET /recipes`; unset filters are omitted.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("page", self.page.to_string()), ("limit", self.limit.to_string())];
        let f = &self.filter;
        if let Some(q) = &f.title {
            pairs.push(("q", q.clone()));
        }
        if let Some(r) = f.min_rating {
            pairs.push(("min_rating", r.to_string()));
        }
        if let Some(t) = f.max_time {
            pairs.push(("max_time", t.to_string()));
        }
        if let Some(c) = &f.cuisine {
            pairs.push(("cuisine", c.clone()));
        }
        if let Some(c) = &f.continent {
            pairs.push(("continent", c.clone()));
        }
        if let Some(r) = &f.region {
            pairs.push(("region", r.clone()));
        }
        pairs
    }
}

#[async_trait]
pub trait RecipeApi: Send + Sync {
    async fn list(&self, query: &ListingQuery) -> Result<Page<Recipe>, ClientError>;

    async fn search_by_cuisine(
        &self,
        cuisine: &str,
        page: i64,
        limit: i64,
    ) -> Result<Page<Recipe>, ClientError>;

    /// `Ok(None)` when the server has no such recipe.
    async fn get(&self, id: i64) -> Result<Option<Recipe>, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpRecipeApi {
    http: Client,
    base_url: String,
}

impl HttpRecipeApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent("recipes-client/0.1")
            .no_proxy()
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn from_config(cfg: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(cfg.api_url.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, ClientError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res.json::<T>().await?);
        }
        let message = match res.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
        };
        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RecipeApi for HttpRecipeApi {
    async fn list(&self, query: &ListingQuery) -> Result<Page<Recipe>, ClientError> {
        debug!(?query, "GET /recipes");
        let res = self
            .http
            .get(self.url("/recipes"))
            .query(&query.to_pairs())
            .send()
            .await?;
        Self::decode(res).await
    }

    async fn search_by_cuisine(
        &self,
        cuisine: &str,
        page: i64,
        limit: i64,
    ) -> Result<Page<Recipe>, ClientError> {
        debug!(cuisine, page, limit, "GET /recipes/search");
        let res = self
            .http
            .get(self.url("/recipes/search"))
            .query(&[
                ("cuisine", cuisine.to_string()),
                ("page", page.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;
        Self::decode(res).await
    }

    async fn get(&self, id: i64) -> Result<Option<Recipe>, ClientError> {
        let res = self.http.get(self.url(&format!("/recipes/{id}"))).send().await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::decode(res).await.map(Some)
    }
}
