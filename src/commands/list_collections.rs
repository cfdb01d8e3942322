use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use fs_err as fs;
use log::{info, warn};

use crate::options::Global;
use crate::shopify_api::ShopifyApi;

#[derive(Debug, Args)]
pub struct ListCollectionsOptions {
    /// Write the collections to this file as JSON instead of printing them.
    #[clap(long = "output")]
    pub output: Option<PathBuf>,
}

pub async fn list_collections(global: Global, options: ListCollectionsOptions) -> Result<()> {
    let client = global.client()?;
    let collections = client.list_all_collections().await;

    if collections.is_empty() {
        warn!("No collections found. Check that the token has the 'read_collections' scope.");
    }

    match options.output {
        Some(output) => {
            let mut file = BufWriter::new(fs::File::create(&output)?);
            serde_json::to_writer_pretty(&mut file, &collections)?;
            file.flush()?;

            info!("Wrote {} collections to {}", collections.len(), output.display());
        }
        None => {
            for collection in &collections {
                info!(
                    "{:<6} {:<16} {:<32} {}",
                    collection.kind, collection.id, collection.handle, collection.title
                );
            }
        }
    }

    Ok(())
}
