//! Turning whatever the user typed to identify a collection into one of the
//! store's collections.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::shopify_api::Collection;

lazy_static! {
    static ref COLLECTION_PATH: Regex = Regex::new(r"/collections/([^/?#]+)").unwrap();
}

/// The token a collection reference boils down to: a numeric id or a
/// handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReference(String);

impl CollectionReference {
    /// Accepts a bare id, a handle, or any URL containing
    /// `/collections/<token>`.
    pub fn parse(raw: &str) -> Self {
        match COLLECTION_PATH.captures(raw) {
            Some(captures) => CollectionReference(captures[1].to_owned()),
            None => CollectionReference(raw.trim().to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, collection: &Collection) -> bool {
        collection.id == self.0 || collection.handle.to_lowercase() == self.0.to_lowercase()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("The store returned no collections at all")]
    NoCollections,

    #[error("No collection has the id or handle '{reference}'")]
    NotFound { reference: String },
}

/// Finds the first collection whose id equals the reference, or whose
/// handle equals it ignoring case.
pub fn resolve<'a>(
    collections: &'a [Collection],
    reference: &CollectionReference,
) -> Result<&'a Collection, ResolveError> {
    if collections.is_empty() {
        return Err(ResolveError::NoCollections);
    }

    collections
        .iter()
        .find(|collection| reference.matches(collection))
        .ok_or_else(|| ResolveError::NotFound {
            reference: reference.as_str().to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::shopify_api::CollectionKind;

    fn collection(id: &str, handle: &str, kind: CollectionKind) -> Collection {
        Collection {
            id: id.to_owned(),
            handle: handle.to_owned(),
            title: format!("Title {}", id),
            kind,
        }
    }

    #[test]
    fn token_from_storefront_url() {
        let reference =
            CollectionReference::parse("https://shop.example.com/collections/summer-sale?page=2");
        assert_eq!(reference.as_str(), "summer-sale");
    }

    #[test]
    fn token_from_admin_url_with_fragment() {
        let reference = CollectionReference::parse(
            "https://admin.shopify.com/store/x/collections/4432219/products#top",
        );
        assert_eq!(reference.as_str(), "4432219");
    }

    #[test]
    fn bare_token_is_trimmed() {
        assert_eq!(CollectionReference::parse("  288938 \n").as_str(), "288938");
        assert_eq!(CollectionReference::parse("Summer-Sale").as_str(), "Summer-Sale");
    }

    #[test]
    fn matches_id_or_handle_ignoring_case() {
        let collections = vec![
            collection("1", "winter", CollectionKind::Custom),
            collection("2", "summer-sale", CollectionKind::Smart),
        ];

        let by_handle = resolve(&collections, &CollectionReference::parse("SUMMER-Sale")).unwrap();
        assert_eq!(by_handle.id, "2");

        let by_id = resolve(&collections, &CollectionReference::parse("1")).unwrap();
        assert_eq!(by_id.handle, "winter");
    }

    #[test]
    fn id_match_is_exact() {
        let collections = vec![collection("10", "ten", CollectionKind::Custom)];

        assert_eq!(
            resolve(&collections, &CollectionReference::parse("1")),
            Err(ResolveError::NotFound {
                reference: "1".to_owned()
            })
        );
    }

    #[test]
    fn first_match_wins_across_kinds() {
        let collections = vec![
            collection("5", "dup", CollectionKind::Custom),
            collection("5", "dup", CollectionKind::Smart),
        ];

        let found = resolve(&collections, &CollectionReference::parse("dup")).unwrap();
        assert_eq!(found.kind, CollectionKind::Custom);
    }

    #[test]
    fn empty_index_is_distinct_from_not_found() {
        assert_eq!(
            resolve(&[], &CollectionReference::parse("anything")),
            Err(ResolveError::NoCollections)
        );
    }
}
