// bcctl - CLI for the BigCommerce catalog REST API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use crate::config::Credentials;
use crate::import::CategoryStore;
use crate::models::{
    Brand, Category, CategoryTree, CategoryUpdate, Channel, NewCategory, Product, TreeCategory,
    Variant,
};
use crate::pagination::{self, DataEnvelope, PageEnvelope, PaginationError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.bigcommerce.com";
const UA: &str = concat!("bcctl/", env!("CARGO_PKG_VERSION"));

/// `key=value` pairs appended to list requests.
pub type Query = [(String, String)];

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid base URL `{url}`: {source}")]
    BaseUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("failed to {context}: {source}")]
    Transport {
        context: String,
        source: reqwest::Error,
    },
    #[error("failed to {context} with status code {status}{}", body_suffix(.body))]
    Status {
        context: String,
        status: u16,
        body: String,
    },
    #[error("failed to {context}: unexpected response body: {source}")]
    Decode {
        context: String,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

fn body_suffix(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

#[derive(Debug, Clone)]
pub struct ResponseData {
    pub status: u16,
    pub body: String,
}

/// Bulk endpoints answer either with the usual envelope or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BulkResponse {
    Bare(Vec<Category>),
    Envelope(PageEnvelope<Category>),
}

impl ResponseData {
    fn decode<T: DeserializeOwned>(&self, context: &str) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|source| ApiError::Decode {
            context: context.to_string(),
            source,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    http: Client,
    store_hash: String,
    access_token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, credentials: &Credentials) -> Result<Self, ApiError> {
        let parsed = Url::parse(base_url).map_err(|source| ApiError::BaseUrl {
            url: base_url.to_string(),
            source,
        })?;
        let http = Client::builder()
            .user_agent(HeaderValue::from_static(UA))
            .build()
            .map_err(|source| ApiError::Transport {
                context: "build HTTP client".into(),
                source,
            })?;

        Ok(Self {
            base_url: parsed,
            http,
            store_hash: credentials.store_hash.clone(),
            access_token: credentials.access_token.clone(),
        })
    }

    pub async fn category_trees(&self) -> Result<Vec<CategoryTree>, ApiError> {
        self.drain("catalog/trees", &[], "get Category Trees").await
    }

    pub async fn tree_categories(&self, tree_id: u64) -> Result<Vec<TreeCategory>, ApiError> {
        let context = "get Categories";
        let response = self
            .request(
                Method::GET,
                &self.store_path(&format!("catalog/trees/{tree_id}/categories")),
                &[],
                Option::<&()>::None,
                context,
            )
            .await?;
        Ok(response.decode::<DataEnvelope<_>>(context)?.data)
    }

    pub async fn categories(&self, query: &Query) -> Result<Vec<Category>, ApiError> {
        self.drain("catalog/trees/categories", query, "get Categories")
            .await
    }

    pub async fn products(&self, query: &Query) -> Result<Vec<Product>, ApiError> {
        self.drain("catalog/products", query, "get Products").await
    }

    pub async fn product(&self, product_id: u64) -> Result<Product, ApiError> {
        let context = "get Product";
        let response = self
            .request(
                Method::GET,
                &self.store_path(&format!("catalog/products/{product_id}")),
                &[],
                Option::<&()>::None,
                context,
            )
            .await?;
        Ok(response.decode::<DataEnvelope<_>>(context)?.data)
    }

    pub async fn variants(&self, product_id: u64, query: &Query) -> Result<Vec<Variant>, ApiError> {
        self.drain(
            &format!("catalog/products/{product_id}/variants"),
            query,
            "get Product Variants",
        )
        .await
    }

    pub async fn brands(&self, query: &Query) -> Result<Vec<Brand>, ApiError> {
        self.drain("catalog/brands", query, "get Brands").await
    }

    pub async fn channels(&self, query: &Query) -> Result<Vec<Channel>, ApiError> {
        self.drain("channels", query, "get Channels").await
    }

    async fn bulk<B: Serialize>(
        &self,
        method: Method,
        body: &[B],
        context: &str,
    ) -> Result<Vec<Category>, ApiError> {
        let response = self
            .request(
                method,
                &self.store_path("catalog/trees/categories"),
                &[],
                Some(body),
                context,
            )
            .await?;
        // Some bulk responses come back without a body.
        if response.body.trim().is_empty() {
            tracing::debug!(status = response.status, "bulk call returned no body");
            return Ok(Vec::new());
        }
        Ok(match response.decode::<BulkResponse>(context)? {
            BulkResponse::Bare(items) => items,
            BulkResponse::Envelope(envelope) => envelope.data,
        })
    }

    async fn drain<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &Query,
        context: &str,
    ) -> Result<Vec<T>, ApiError> {
        let path = self.store_path(resource);
        pagination::drain(|page| {
            let path = &path;
            async move {
                let mut params = Vec::with_capacity(query.len() + 1);
                params.push(("page".to_string(), page.to_string()));
                params.extend(query.iter().cloned());
                self.request(Method::GET, path, &params, Option::<&()>::None, context)
                    .await?
                    .decode::<PageEnvelope<T>>(context)
            }
        })
        .await
    }

    fn store_path(&self, resource: &str) -> String {
        format!("stores/{}/v3/{}", self.store_hash, resource)
    }

    async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&B>,
        context: &str,
    ) -> Result<ResponseData, ApiError> {
        let normalized = path.trim_start_matches('/');
        let url = self
            .base_url
            .join(normalized)
            .map_err(|source| ApiError::BaseUrl {
                url: format!("{}{}", self.base_url, normalized),
                source,
            })?;

        tracing::debug!(%method, %url, ?query, "sending request");

        let mut request = self
            .http
            .request(method, url)
            .header("X-Auth-Token", &self.access_token)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(USER_AGENT, HeaderValue::from_static(UA));

        if !query.is_empty() {
            request = request.query(query);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let transport = |source| ApiError::Transport {
            context: context.to_string(),
            source,
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let text = response.text().await.map_err(transport)?;

        if !status.is_success() {
            return Err(ApiError::Status {
                context: context.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        tracing::debug!(status = status.as_u16(), bytes = text.len(), "received response");
        Ok(ResponseData {
            status: status.as_u16(),
            body: text,
        })
    }
}

#[async_trait]
impl CategoryStore for ApiClient {
    async fn create_categories(&self, batch: &[NewCategory]) -> Result<Vec<Category>, ApiError> {
        self.bulk(Method::POST, batch, "create categories").await
    }

    async fn update_categories(
        &self,
        batch: &[CategoryUpdate],
    ) -> Result<Vec<Category>, ApiError> {
        self.bulk(Method::PUT, batch, "update categories").await
    }
}
