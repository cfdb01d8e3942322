use crate::commands::Command;
use crate::shopify_api::{RestClient, ShopifyApiError, ShopifyCredentials};
use clap::Parser;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

#[derive(Debug, Parser)]
#[clap(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Options {
    #[command(flatten)]
    pub global: Global,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Parser)]
pub struct Global {
    /// The shop to export from, e.g. 'a608d7-cf' or
    /// 'a608d7-cf.myshopify.com'.
    #[clap(long, global(true), env("SHOPIFY_SHOP"))]
    pub shop: Option<String>,

    /// An Admin API access token (shpat_...) with the 'read_products' and
    /// 'read_collections' scopes.
    #[clap(
        long,
        global(true),
        env("SHOPIFY_ACCESS_TOKEN"),
        hide_env_values(true)
    )]
    pub access_token: Option<SecretString>,

    /// Talk to this Admin API base URL instead of the shop's
    /// myshopify.com host.
    #[clap(long, global(true), hide(true))]
    pub api_base: Option<String>,

    /// Sets verbosity level. Can be specified multiple times to increase the verbosity
    /// of this program.
    #[clap(long = "verbose", short, global(true), action(clap::ArgAction::Count))]
    pub verbosity: u8,
}

/// A required input that was not given, or was blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MissingInput {
    #[error("shop")]
    Shop,

    #[error("access token")]
    AccessToken,

    #[error("collection")]
    Collection,
}

impl Global {
    /// The trimmed shop and token. Blank values count as missing.
    pub fn credentials(&self) -> Result<ShopifyCredentials, MissingInput> {
        let shop = self
            .shop
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(MissingInput::Shop)?;
        let access_token = self
            .access_token
            .as_ref()
            .map(|token| token.expose_secret().trim())
            .filter(|token| !token.is_empty())
            .ok_or(MissingInput::AccessToken)?;

        Ok(ShopifyCredentials {
            shop: shop.to_owned(),
            access_token: SecretString::new(access_token.to_owned()),
        })
    }

    pub fn client_for(&self, credentials: &ShopifyCredentials) -> Result<RestClient, ShopifyApiError> {
        match &self.api_base {
            Some(base_url) => RestClient::with_base_url(credentials, base_url.as_str()),
            None => RestClient::new(credentials),
        }
    }

    /// Builds a client, failing if the shop or token were not given.
    pub fn client(&self) -> Result<RestClient, ShopifyApiError> {
        let credentials = self.credentials().map_err(|missing| match missing {
            MissingInput::Shop => ShopifyApiError::MissingShop,
            _ => ShopifyApiError::MissingAccessToken,
        })?;

        self.client_for(&credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(shop: Option<&str>, token: Option<&str>) -> Global {
        Global {
            shop: shop.map(str::to_owned),
            access_token: token.map(|t| SecretString::new(t.to_owned())),
            api_base: None,
            verbosity: 0,
        }
    }

    #[test]
    fn blank_inputs_are_missing() {
        assert_eq!(
            global(Some("  "), Some("shpat_x")).credentials().unwrap_err(),
            MissingInput::Shop
        );
        assert_eq!(
            global(Some("shop"), Some("")).credentials().unwrap_err(),
            MissingInput::AccessToken
        );
        assert_eq!(
            global(None, None).credentials().unwrap_err(),
            MissingInput::Shop
        );
    }

    #[test]
    fn credentials_are_trimmed() {
        let credentials = global(Some(" shop "), Some(" shpat_x\n")).credentials().unwrap();

        assert_eq!(credentials.shop, "shop");
        assert_eq!(credentials.access_token.expose_secret(), "shpat_x");
    }

    #[test]
    fn client_names_the_missing_input() {
        assert!(matches!(
            global(None, Some("shpat_x")).client(),
            Err(ShopifyApiError::MissingShop)
        ));
        assert!(matches!(
            global(Some("shop"), None).client(),
            Err(ShopifyApiError::MissingAccessToken)
        ));
    }

    #[test]
    fn parses_export_command() {
        let options = Options::try_parse_from([
            "shopify-image-export",
            "--shop",
            "my-shop",
            "export",
            "https://my-shop.com/collections/sale",
            "--mode",
            "images",
            "--turbo",
        ])
        .unwrap();

        assert_eq!(options.global.shop.as_deref(), Some("my-shop"));
        match options.command {
            Command::Export(export) => {
                assert!(export.turbo);
                assert_eq!(
                    export.collection.as_deref(),
                    Some("https://my-shop.com/collections/sale")
                );
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
