use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};
use fs_err as fs;
use log::{debug, info, warn};
use resolve_path::PathResolveExt;

use crate::{
    download::{archive_directory, plan_downloads, DownloadMode, DownloadSummary, ImageFetcher},
    export::{write_csv_file, ExportRow},
    options::{Global, MissingInput},
    resolve::{resolve, CollectionReference, ResolveError},
    shopify_api::{Capability, Collection, Product, ShopifyApi, ShopifyCredentials},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportMode {
    /// Only write a CSV with the image links.
    Links,
    /// Also download every image and pack them into a ZIP archive.
    Images,
}

#[derive(Debug, Args)]
pub struct ExportOptions {
    /// The collection to export: its numeric ID, its handle, or any URL
    /// containing '/collections/<id or handle>'.
    pub collection: Option<String>,

    /// What to produce.
    #[clap(long, value_enum, default_value_t = ExportMode::Links)]
    pub mode: ExportMode,

    /// Download up to 16 images at once. Only used with '--mode images'.
    #[clap(long)]
    pub turbo: bool,

    /// Where to put the CSV and ZIP files.
    #[clap(long = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,

    /// Where downloaded images are stored before they are archived.
    #[clap(long = "download-dir", default_value = "imagens_baixadas")]
    pub download_dir: PathBuf,
}

/// Everything an export run needs, after validation.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub credentials: ShopifyCredentials,
    pub collection: CollectionReference,
    /// `None` when only links are exported.
    pub download: Option<DownloadMode>,
    pub output_dir: PathBuf,
    pub download_dir: PathBuf,
}

impl ExportRequest {
    /// Checks that all required inputs are present, returning the name of the
    /// first one that is missing otherwise.
    pub fn from_inputs(global: &Global, options: &ExportOptions) -> Result<Self, MissingInput> {
        let credentials = global.credentials()?;

        let collection = options
            .collection
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(CollectionReference::parse)
            .ok_or(MissingInput::Collection)?;

        let download = match (options.mode, options.turbo) {
            (ExportMode::Links, turbo) => {
                if turbo {
                    warn!("--turbo only has an effect with --mode images, ignoring it");
                }
                None
            }
            (ExportMode::Images, false) => Some(DownloadMode::Sequential),
            (ExportMode::Images, true) => Some(DownloadMode::Turbo),
        };

        Ok(Self {
            credentials,
            collection,
            download,
            output_dir: options.output_dir.clone(),
            download_dir: options.download_dir.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub collection: Collection,
    pub products: usize,
    pub csv_path: PathBuf,
    pub archive: Option<ArchiveReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    pub zip_path: PathBuf,
    pub downloads: DownloadSummary,
    pub entries: usize,
}

/// How an export run ended. Everything except `Completed` and `NoProducts`
/// means the export did not happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    MissingInput(MissingInput),
    InsufficientPermissions(Vec<Capability>),
    NoCollections,
    CollectionNotFound(String),
    NoProducts(Collection),
    Completed(ExportReport),
}

impl ExportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ExportOutcome::Completed(_) | ExportOutcome::NoProducts(_)
        )
    }
}

impl fmt::Display for ExportOutcome {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExportOutcome::MissingInput(field) => {
                write!(formatter, "Missing {}. Fill in every input before exporting.", field)
            }
            ExportOutcome::InsufficientPermissions(missing) => {
                let scopes: Vec<_> = missing.iter().map(|c| c.scope()).collect();
                write!(
                    formatter,
                    "The access token lacks permissions. Enable {} for the app.",
                    scopes.join(" and ")
                )
            }
            ExportOutcome::NoCollections => write!(
                formatter,
                "The shop returned no collections. Check the shop name and token."
            ),
            ExportOutcome::CollectionNotFound(reference) => write!(
                formatter,
                "Collection '{}' not found. Check the ID or handle and try again.",
                reference
            ),
            ExportOutcome::NoProducts(collection) => {
                write!(formatter, "No products found in collection '{}'.", collection.title)
            }
            ExportOutcome::Completed(report) => {
                write!(
                    formatter,
                    "Exported {} products from '{}' to {}",
                    report.products,
                    report.collection.title,
                    report.csv_path.display()
                )?;
                if let Some(archive) = &report.archive {
                    write!(
                        formatter,
                        " and {} images to {}",
                        archive.entries,
                        archive.zip_path.display()
                    )?;
                    if archive.downloads.failed > 0 {
                        write!(
                            formatter,
                            " ({} images could not be downloaded)",
                            archive.downloads.failed
                        )?;
                    }
                }
                Ok(())
            }
        }
    }
}

pub fn csv_file_name(collection_id: &str) -> String {
    format!("imagens_colecao_{}.csv", collection_id)
}

pub fn zip_file_name(collection_id: &str) -> String {
    format!("imagens_colecao_{}.zip", collection_id)
}

pub async fn export(global: Global, options: ExportOptions) -> Result<()> {
    let request = match ExportRequest::from_inputs(&global, &options) {
        Ok(request) => request,
        Err(field) => bail!("{}", ExportOutcome::MissingInput(field)),
    };

    let client = global.client_for(&request.credentials)?;
    let outcome = run_export(&client, &request).await?;

    if !outcome.is_success() {
        bail!("{}", outcome);
    }

    match outcome {
        ExportOutcome::NoProducts(_) => warn!("{}", outcome),
        _ => info!("{}", outcome),
    }

    Ok(())
}

/// The export pipeline: probe permissions, resolve the collection, fetch its
/// products, then write the CSV and, when asked to, the image archive.
///
/// Conditions that stop the export are returned as an [`ExportOutcome`];
/// only filesystem failures are errors.
pub async fn run_export(api: &dyn ShopifyApi, request: &ExportRequest) -> Result<ExportOutcome> {
    info!("Connecting to Shopify...");

    let permissions = api.probe_permissions().await;
    if !permissions.all_granted() {
        return Ok(ExportOutcome::InsufficientPermissions(permissions.missing()));
    }

    let collections = api.list_all_collections().await;
    debug!("loaded {} collections", collections.len());

    let collection = match resolve(&collections, &request.collection) {
        Ok(collection) => collection.clone(),
        Err(ResolveError::NoCollections) => return Ok(ExportOutcome::NoCollections),
        Err(ResolveError::NotFound { reference }) => {
            return Ok(ExportOutcome::CollectionNotFound(reference))
        }
    };

    let products = api.fetch_products(&collection.id).await;
    if products.is_empty() {
        return Ok(ExportOutcome::NoProducts(collection));
    }

    info!(
        "Found collection '{}' with {} products",
        collection.title,
        products.len()
    );

    let output_dir = request.output_dir.try_resolve()?.into_owned();
    fs::create_dir_all(&output_dir)?;

    let archive = match request.download {
        Some(mode) => {
            let download_dir = request.download_dir.try_resolve()?.into_owned();
            let zip_path = output_dir.join(zip_file_name(&collection.id));
            Some(download_and_archive(&products, &download_dir, &zip_path, mode).await?)
        }
        None => None,
    };

    let rows: Vec<_> = products.iter().map(ExportRow::from_product).collect();
    let csv_path = output_dir.join(csv_file_name(&collection.id));
    write_csv_file(&rows, &csv_path)?;

    Ok(ExportOutcome::Completed(ExportReport {
        collection,
        products: products.len(),
        csv_path,
        archive,
    }))
}

async fn download_and_archive(
    products: &[Product],
    download_dir: &Path,
    zip_path: &Path,
    mode: DownloadMode,
) -> Result<ArchiveReport> {
    fs::create_dir_all(download_dir)?;
    let tasks = plan_downloads(products, download_dir)?;

    let outcomes = ImageFetcher::new()?.fetch_all(tasks, mode).await;
    let downloads = DownloadSummary::from_outcomes(&outcomes);

    let entries = archive_directory(download_dir, zip_path)?;
    info!("Archived {} images into {}", entries, zip_path.display());

    Ok(ArchiveReport {
        zip_path: zip_path.to_owned(),
        downloads,
        entries,
    })
}
