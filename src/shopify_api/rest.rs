use std::fmt;

use async_trait::async_trait;
use log::{debug, trace};
use reqwest::{
    header::{HeaderValue, ACCEPT},
    Client, RequestBuilder, Response, StatusCode,
};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{Map, Value};

use super::{
    next_cursor, Capability, Collection, CollectionKind, PageCursor, Permissions, Product,
    ShopifyApi, ShopifyApiError, ShopifyCredentials, PAGE_LIMIT,
};

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

#[derive(Debug, Deserialize)]
struct RawCollection {
    id: u64,
    #[serde(default)]
    handle: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

pub struct RestClient {
    base_url: String,
    access_token: HeaderValue,
    client: Client,
}

impl fmt::Debug for RestClient {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "RestClient({})", self.base_url)
    }
}

impl RestClient {
    pub fn new(credentials: &ShopifyCredentials) -> Result<Self, ShopifyApiError> {
        Self::with_base_url(credentials, credentials.base_url())
    }

    /// Like [`RestClient::new`], but talks to `base_url` instead of the
    /// shop's myshopify.com host.
    pub fn with_base_url(
        credentials: &ShopifyCredentials,
        base_url: impl Into<String>,
    ) -> Result<Self, ShopifyApiError> {
        let mut access_token =
            HeaderValue::from_str(credentials.access_token.expose_secret())
                .map_err(|_| ShopifyApiError::InvalidAccessToken)?;
        access_token.set_sensitive(true);

        let base_url = base_url.into().trim_end_matches('/').to_owned();

        Ok(Self {
            base_url,
            access_token,
            client: Client::builder().build()?,
        })
    }

    /// Attach the headers every Admin API request needs.
    fn attach_headers(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(ACCESS_TOKEN_HEADER, self.access_token.clone())
            .header(ACCEPT, "application/json")
    }

    async fn get(&self, url: &str) -> reqwest::Result<Response> {
        trace!("GET {}", url);

        self.attach_headers(self.client.get(url)).send().await
    }

    /// Walks every page of a list endpoint, collecting the array stored
    /// under `key` in each body. Any failure ends the walk and keeps what
    /// was collected so far.
    async fn paginate<T: DeserializeOwned>(&self, path: &str, key: &str) -> Vec<T> {
        let first_page = format!("{}{}?limit={}", self.base_url, path, PAGE_LIMIT);
        let mut items = Vec::new();
        let mut cursor: Option<PageCursor> = None;
        let mut pages = 0;

        loop {
            // The cursor arrives already percent-encoded and goes back verbatim.
            let url = match &cursor {
                Some(cursor) => format!("{}&page_info={}", first_page, cursor),
                None => first_page.clone(),
            };

            let response = match self.get(&url).await {
                Ok(response) => response,
                Err(err) => {
                    debug!("stopping pagination of {} after {} pages: {}", path, pages, err);
                    break;
                }
            };

            if response.status() != StatusCode::OK {
                debug!(
                    "stopping pagination of {} after {} pages: HTTP {}",
                    path,
                    pages,
                    response.status()
                );
                break;
            }

            pages += 1;
            let next = next_cursor(response.headers());

            match response.json::<Map<String, Value>>().await {
                Ok(mut body) => {
                    let page = match body.remove(key) {
                        Some(Value::Array(page)) => page,
                        _ => Vec::new(),
                    };

                    // One malformed record must not cost the rest of the page.
                    for record in page {
                        match serde_json::from_value::<T>(record) {
                            Ok(item) => items.push(item),
                            Err(err) => {
                                debug!("skipping a record on page {} of {}: {}", pages, path, err)
                            }
                        }
                    }
                }
                Err(err) => {
                    debug!("page {} of {} was not valid JSON: {}", pages, path, err);
                    break;
                }
            }

            match next {
                Some(next) if cursor.as_ref() != Some(&next) => cursor = Some(next),
                _ => break,
            }
        }

        debug!("read {} items from {} in {} pages", items.len(), path, pages);
        items
    }

    async fn probe(&self, capability: Capability) -> bool {
        let url = format!("{}{}", self.base_url, capability.probe_path());

        match self.get(&url).await {
            Ok(response) => {
                debug!("probe for {} returned {}", capability.scope(), response.status());
                response.status() == StatusCode::OK
            }
            Err(err) => {
                debug!("probe for {} failed: {}", capability.scope(), err);
                false
            }
        }
    }

    pub async fn list_collections(&self, kind: CollectionKind) -> Vec<Collection> {
        let path = format!("/{}.json", kind.resource());

        self.paginate::<RawCollection>(&path, kind.resource())
            .await
            .into_iter()
            .map(|raw| Collection {
                id: raw.id.to_string(),
                handle: raw.handle.unwrap_or_default(),
                title: raw.title.unwrap_or_default(),
                kind,
            })
            .collect()
    }
}

#[async_trait]
impl ShopifyApi for RestClient {
    async fn probe_permissions(&self) -> Permissions {
        let mut permissions = Permissions::default();
        for capability in Capability::ALL {
            permissions.insert(capability, self.probe(capability).await);
        }

        permissions
    }

    async fn list_all_collections(&self) -> Vec<Collection> {
        let mut collections = Vec::new();
        for kind in CollectionKind::ALL {
            collections.extend(self.list_collections(kind).await);
        }

        collections
    }

    async fn fetch_products(&self, collection_id: &str) -> Vec<Product> {
        let path = format!("/collections/{}/products.json", collection_id);
        self.paginate(&path, "products").await
    }
}
