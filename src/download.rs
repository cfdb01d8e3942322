//! Best-effort bulk image download and the ZIP archive built from it.

use std::{
    fmt,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use fs_err as fs;
use futures::stream::{self, StreamExt};
use log::{debug, info, trace};
use path_slash::PathExt;
use reqwest::{Client, StatusCode};
use walkdir::WalkDir;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use crate::shopify_api::Product;

/// Per-image request timeout.
pub const IMAGE_TIMEOUT: Duration = Duration::from_secs(15);

/// Number of images fetched at once in turbo mode.
pub const TURBO_WORKERS: usize = 16;

/// Characters that are not allowed in a directory name on at least one
/// platform we write to.
const FORBIDDEN_CHARACTERS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMode {
    Sequential,
    Turbo,
}

impl fmt::Display for DownloadMode {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DownloadMode::Sequential => write!(formatter, "sequential"),
            DownloadMode::Turbo => write!(formatter, "turbo ({} workers)", TURBO_WORKERS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub task: DownloadTask,
    pub succeeded: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl DownloadSummary {
    pub fn from_outcomes(outcomes: &[DownloadOutcome]) -> Self {
        let succeeded = outcomes.iter().filter(|outcome| outcome.succeeded).count();

        DownloadSummary {
            attempted: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
        }
    }
}

/// Makes a product title usable as a directory name by replacing each
/// character in `\ / * ? : " < > |` with `_`.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if FORBIDDEN_CHARACTERS.contains(&c) { '_' } else { c })
        .collect()
}

/// Directory name for a product. Titles that would not name a directory of
/// their own (empty, `.` or `..`) become `_`.
fn product_directory(title: &str) -> String {
    let name = sanitize_title(title);
    match name.as_str() {
        "" | "." | ".." => "_".to_owned(),
        _ => name,
    }
}

/// Creates one directory per product that has images under `root` and
/// returns one task per image, named `1.jpg`, `2.jpg`, ... in image order.
pub fn plan_downloads(products: &[Product], root: &Path) -> Result<Vec<DownloadTask>> {
    let mut tasks = Vec::new();

    for product in products.iter().filter(|product| !product.images.is_empty()) {
        let directory = root.join(product_directory(&product.title));
        fs::create_dir_all(&directory)?;

        for (index, url) in product.images.iter().enumerate() {
            tasks.push(DownloadTask {
                url: url.clone(),
                destination: directory.join(format!("{}.jpg", index + 1)),
            });
        }
    }

    Ok(tasks)
}

/// Downloads one image to one file. Never fails: anything that goes wrong
/// shows up as an unsuccessful [`DownloadOutcome`].
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: Client,
    timeout: Duration,
}

impl ImageFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(IMAGE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            timeout,
        })
    }

    pub async fn fetch(&self, task: DownloadTask) -> DownloadOutcome {
        let succeeded = match self.try_fetch(&task).await {
            Ok(()) => true,
            Err(err) => {
                debug!("skipping {}: {:#}", task.url, err);
                false
            }
        };

        DownloadOutcome { task, succeeded }
    }

    async fn try_fetch(&self, task: &DownloadTask) -> Result<()> {
        trace!("GET {}", task.url);

        let response = self
            .client
            .get(&task.url)
            .timeout(self.timeout)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            anyhow::bail!("HTTP {}", response.status());
        }

        let body = response.bytes().await?;

        if let Err(err) = fs::tokio::write(&task.destination, &body).await {
            // Don't leave a truncated image behind.
            let _ = fs::tokio::remove_file(&task.destination).await;
            return Err(err.into());
        }

        Ok(())
    }

    /// Runs every task and waits for all of them to settle. Outcomes are in
    /// task order for [`DownloadMode::Sequential`] and in completion order
    /// for [`DownloadMode::Turbo`].
    pub async fn fetch_all(
        &self,
        tasks: Vec<DownloadTask>,
        mode: DownloadMode,
    ) -> Vec<DownloadOutcome> {
        info!("Downloading {} images ({})...", tasks.len(), mode);

        let outcomes = match mode {
            DownloadMode::Sequential => {
                let mut outcomes = Vec::with_capacity(tasks.len());
                for task in tasks {
                    outcomes.push(self.fetch(task).await);
                }
                outcomes
            }
            DownloadMode::Turbo => {
                stream::iter(tasks)
                    .map(|task| self.fetch(task))
                    .buffer_unordered(TURBO_WORKERS)
                    .collect()
                    .await
            }
        };

        let summary = DownloadSummary::from_outcomes(&outcomes);
        if summary.failed > 0 {
            for outcome in outcomes.iter().filter(|outcome| !outcome.succeeded) {
                debug!("not downloaded: {}", outcome.task.destination.display());
            }
            info!(
                "Downloaded {} of {} images, {} could not be fetched",
                summary.succeeded, summary.attempted, summary.failed
            );
        } else {
            info!("Downloaded {} images", summary.succeeded);
        }

        outcomes
    }
}

/// Writes every file below `root` into a deflate-compressed ZIP at
/// `zip_path`. Entry names are relative to `root` and use `/`.
pub fn archive_directory(root: &Path, zip_path: &Path) -> Result<usize> {
    let mut zip = ZipWriter::new(io::BufWriter::new(fs::File::create(zip_path)?));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut entries = 0;

    for entry in WalkDir::new(root).sort_by(|a, b| a.file_name().cmp(b.file_name())) {
        let entry = entry?;
        if !entry.file_type().is_file() || entry.path() == zip_path {
            continue;
        }

        let relative = entry.path().strip_prefix(root)?;
        let name = relative
            .to_slash()
            .with_context(|| format!("path {} is not valid UTF-8", relative.display()))?;

        trace!("adding {} to archive", name);
        zip.start_file(name, options)?;
        io::copy(&mut fs::File::open(entry.path())?, &mut zip)?;
        entries += 1;
    }

    zip.finish()?.flush()?;
    debug!("wrote {} entries to {}", entries, zip_path.display());

    Ok(entries)
}
