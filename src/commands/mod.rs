mod check_access;
mod export;
mod list_collections;

use clap::Subcommand;
pub use check_access::*;
pub use export::*;
pub use list_collections::*;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Export the image links of every product in a collection to a CSV
    /// file, optionally downloading the images into a ZIP archive.
    Export(ExportOptions),

    /// Checks that the access token can read products and collections.
    CheckAccess(CheckAccessOptions),

    /// Lists every custom and smart collection in the shop.
    ListCollections(ListCollectionsOptions),
}
