mod cursor;
mod rest;

use std::fmt;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::cursor::{next_cursor, PageCursor};
pub use self::rest::RestClient;

/// Admin REST API version every request is pinned to.
pub const API_VERSION: &str = "2023-10";

/// Largest page size the Admin REST API accepts for list endpoints.
pub const PAGE_LIMIT: u32 = 250;

#[derive(Clone, Debug)]
pub struct ShopifyCredentials {
    pub shop: String,
    pub access_token: SecretString,
}

impl ShopifyCredentials {
    /// Builds the Admin API base URL for this shop, e.g.
    /// `https://my-shop.myshopify.com/admin/api/2023-10`.
    pub fn base_url(&self) -> String {
        format!(
            "https://{}.myshopify.com/admin/api/{}",
            normalize_shop(&self.shop),
            API_VERSION
        )
    }
}

/// Reduces whatever the user typed as their shop to the bare subdomain.
/// Accepts `my-shop`, `my-shop.myshopify.com` and
/// `https://my-shop.myshopify.com/admin`.
pub fn normalize_shop(shop: &str) -> &str {
    let shop = shop.trim();
    let shop = shop
        .strip_prefix("https://")
        .or_else(|| shop.strip_prefix("http://"))
        .unwrap_or(shop);
    let host = shop.split('/').next().unwrap_or(shop);

    host.strip_suffix(".myshopify.com").unwrap_or(host)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// Manually curated collections.
    Custom,
    /// Rule-based collections.
    Smart,
}

impl CollectionKind {
    /// Listing order used when building the collection index.
    pub const ALL: [CollectionKind; 2] = [CollectionKind::Custom, CollectionKind::Smart];

    /// The resource name, which is both the endpoint stem and the key of the
    /// list in the response body.
    pub fn resource(self) -> &'static str {
        match self {
            CollectionKind::Custom => "custom_collections",
            CollectionKind::Smart => "smart_collections",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CollectionKind::Custom => formatter.pad("custom"),
            CollectionKind::Smart => formatter.pad("smart"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collection {
    pub id: String,
    pub handle: String,
    pub title: String,
    pub kind: CollectionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Product {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,

    #[serde(default, deserialize_with = "image_sources")]
    pub images: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Image URLs in API order. Images without a `src` are dropped.
fn image_sources<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct RawImage {
        #[serde(default)]
        src: Option<String>,
    }

    let images = Option::<Vec<RawImage>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(images.into_iter().filter_map(|image| image.src).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Capability {
    ReadProducts,
    ReadCollections,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::ReadProducts, Capability::ReadCollections];

    /// The cheapest request that only succeeds when the token holds this
    /// capability.
    pub fn probe_path(self) -> &'static str {
        match self {
            Capability::ReadProducts => "/products.json?limit=1",
            Capability::ReadCollections => "/custom_collections.json?limit=1",
        }
    }

    /// Name of the access scope the store admin has to grant.
    pub fn scope(self) -> &'static str {
        match self {
            Capability::ReadProducts => "read_products",
            Capability::ReadCollections => "read_collections",
        }
    }
}

/// Result of probing every [`Capability`] once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions {
    granted: Vec<(Capability, bool)>,
}

impl Permissions {
    pub fn insert(&mut self, capability: Capability, granted: bool) {
        match self.granted.iter_mut().find(|(c, _)| *c == capability) {
            Some(entry) => entry.1 = granted,
            None => self.granted.push((capability, granted)),
        }
    }

    pub fn is_granted(&self, capability: Capability) -> bool {
        self.granted
            .iter()
            .any(|&(c, granted)| c == capability && granted)
    }

    pub fn all_granted(&self) -> bool {
        Capability::ALL.iter().all(|&c| self.is_granted(c))
    }

    pub fn missing(&self) -> Vec<Capability> {
        Capability::ALL
            .iter()
            .copied()
            .filter(|&c| !self.is_granted(c))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Capability, bool)> + '_ {
        self.granted.iter().copied()
    }
}

/// The read-only slice of the Admin API the exporter needs. Everything that
/// talks to Shopify goes through this trait so the export pipeline can be
/// driven against other implementations.
#[async_trait]
pub trait ShopifyApi: Send + Sync {
    async fn probe_permissions(&self) -> Permissions;

    async fn list_all_collections(&self) -> Vec<Collection>;

    async fn fetch_products(&self, collection_id: &str) -> Vec<Product>;
}

#[derive(Debug, Error)]
pub enum ShopifyApiError {
    #[error("Shopify API HTTP error")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("The access token contains characters that cannot be sent in an HTTP header")]
    InvalidAccessToken,

    #[error("No access token was given. Pass --access-token or set SHOPIFY_ACCESS_TOKEN")]
    MissingAccessToken,

    #[error("No shop was given. Pass --shop or set SHOPIFY_SHOP")]
    MissingShop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_uses_pinned_version() {
        let credentials = ShopifyCredentials {
            shop: "a608d7-cf".to_owned(),
            access_token: SecretString::new("shpat_x".to_owned()),
        };

        assert_eq!(
            credentials.base_url(),
            "https://a608d7-cf.myshopify.com/admin/api/2023-10"
        );
    }

    #[test]
    fn normalize_shop_strips_host_and_scheme() {
        assert_eq!(normalize_shop("my-shop"), "my-shop");
        assert_eq!(normalize_shop(" my-shop.myshopify.com "), "my-shop");
        assert_eq!(
            normalize_shop("https://my-shop.myshopify.com/admin/products"),
            "my-shop"
        );
    }

    #[test]
    fn product_images_keep_api_order() {
        let product: Product = serde_json::from_str(
            r#"{
                "id": 1,
                "title": "Shirt",
                "images": [{"id": 9, "src": "https://cdn/a.jpg"}, {"id": 3, "src": "https://cdn/b.png"}]
            }"#,
        )
        .unwrap();

        assert_eq!(product.title, "Shirt");
        assert_eq!(product.images, vec!["https://cdn/a.jpg", "https://cdn/b.png"]);
    }

    #[test]
    fn product_without_images_or_title() {
        let product: Product = serde_json::from_str(r#"{"id": 1}"#).unwrap();

        assert_eq!(product.title, "");
        assert!(product.images.is_empty());
    }

    #[test]
    fn product_with_null_fields() {
        let product: Product = serde_json::from_str(
            r#"{"id": 1, "title": null, "images": [{"src": null}, {"src": "https://cdn/b.png"}]}"#,
        )
        .unwrap();

        assert_eq!(product.title, "");
        assert_eq!(product.images, vec!["https://cdn/b.png"]);

        let product: Product = serde_json::from_str(r#"{"title": "T", "images": null}"#).unwrap();
        assert!(product.images.is_empty());
    }

    #[test]
    fn permissions_report_missing_capabilities() {
        let mut permissions = Permissions::default();
        permissions.insert(Capability::ReadProducts, true);
        permissions.insert(Capability::ReadCollections, false);

        assert!(!permissions.all_granted());
        assert_eq!(permissions.missing(), vec![Capability::ReadCollections]);

        permissions.insert(Capability::ReadCollections, true);
        assert!(permissions.all_granted());
    }
}
