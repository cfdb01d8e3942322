use anyhow::{bail, Result};
use clap::Args;
use log::info;

use crate::options::Global;
use crate::shopify_api::ShopifyApi;

#[derive(Debug, Args)]
pub struct CheckAccessOptions {}

pub async fn check_access(global: Global, _: CheckAccessOptions) -> Result<()> {
    let client = global.client()?;
    let permissions = client.probe_permissions().await;

    for (capability, granted) in permissions.iter() {
        info!(
            "{:<18} {}",
            capability.scope(),
            if granted { "granted" } else { "missing" }
        );
    }

    if !permissions.all_granted() {
        bail!("the access token cannot read everything an export needs");
    }

    info!("The access token can be used for exports.");
    Ok(())
}
