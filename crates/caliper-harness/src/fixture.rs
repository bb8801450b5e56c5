//! Pinned downloadable fixtures with verified caching.
//!
//! A [`Fixture`] names a tar.gz archive, the URL it comes from and the MD5
//! digest it must hash to. [`Fixture::ensure_in`] reuses a cached archive
//! whose digest still matches, downloads otherwise, and extracts the result
//! once. Suites that keep re-running against the same pretrained model only
//! pay for the download the first time.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use flate2::read::GzDecoder;
use futures_util::StreamExt;
use md5::{Digest, Md5};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::error::{HarnessError, Result};

/// Environment variable overriding the fixture cache location.
pub const CACHE_DIR_VAR: &str = "CALIPER_CACHE_DIR";

const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// A downloadable archive pinned to an MD5 digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    name: String,
    url: String,
    md5: String,
}

impl Fixture {
    /// Describe a fixture. `md5` is the lowercase hex digest the archive
    /// must hash to.
    pub fn new(name: impl Into<String>, url: impl Into<String>, md5: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            md5: md5.into(),
        }
    }

    /// The pretrained MNIST classifier archive used by the quantization
    /// suite.
    pub fn mnist() -> Self {
        Self::new(
            "mnist_model",
            "http://paddle-inference-dist.bj.bcebos.com/int8/mnist_model.tar.gz",
            "be71d3997ec35ac2a65ae8a145e2887c",
        )
    }

    /// Fixture name; also the directory name it extracts into.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Download URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Where the archive lives under `root`.
    pub fn archive_path(&self, root: &Path) -> PathBuf {
        root.join(format!("{}.tar.gz", self.name))
    }

    /// Where the archive extracts under `root`.
    pub fn extract_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.name)
    }

    /// Make the fixture available under the default cache root.
    pub async fn ensure(&self) -> Result<PathBuf> {
        let root = cache_root()?;
        self.ensure_in(&root).await
    }

    /// Make the fixture available under `root` and return its extraction
    /// directory.
    ///
    /// A cached archive is reused when its digest matches and re-downloaded
    /// when it does not. A freshly downloaded archive that still fails
    /// verification is an error.
    pub async fn ensure_in(&self, root: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("creating cache directory {}", root.display()))?;

        let archive = self.archive_path(root);
        if archive.exists() {
            let digest = file_md5(&archive)?;
            if digest == self.md5 {
                debug!(fixture = %self.name, "reusing cached archive");
            } else {
                warn!(fixture = %self.name, %digest, "cached archive is stale, re-downloading");
                std::fs::remove_file(&archive)
                    .with_context(|| format!("removing stale archive {}", archive.display()))?;
            }
        }

        if !archive.exists() {
            download(&self.url, &archive).await?;
            let digest = file_md5(&archive)?;
            if digest != self.md5 {
                return Err(HarnessError::ChecksumMismatch {
                    name: self.name.clone(),
                    expected: self.md5.clone(),
                    actual: digest,
                }
                .into());
            }
            info!(fixture = %self.name, url = %self.url, "downloaded and verified archive");
        }

        let dir = self.extract_dir(root);
        if !dir.exists() {
            extract(&archive, &dir)?;
            info!(fixture = %self.name, dir = %dir.display(), "extracted archive");
        }
        Ok(dir)
    }
}

/// Cache root for fixture archives: `$CALIPER_CACHE_DIR` when set, else
/// `~/.cache/caliper/fixtures`.
pub fn cache_root() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CACHE_DIR_VAR) {
        return Ok(PathBuf::from(dir));
    }
    std::env::var_os("HOME")
        .map(|home| {
            PathBuf::from(home)
                .join(".cache")
                .join("caliper")
                .join("fixtures")
        })
        .ok_or_else(|| HarnessError::NoCacheDir.into())
}

/// Create a directory for suite outputs, terminating the process when that
/// fails.
///
/// Every other failure in this crate propagates as a `Result`; suites call
/// this from setup, where a missing output directory makes all later steps
/// meaningless.
pub fn ensure_dir_or_exit(path: &Path) {
    if let Err(err) = std::fs::create_dir_all(path) {
        error!(path = %path.display(), error = %err, "failed to create directory");
        std::process::exit(1);
    }
}

/// Lowercase hex MD5 digest of a file's contents.
pub fn file_md5(path: &Path) -> Result<String> {
    let mut file =
        std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Md5::new();
    std::io::copy(&mut file, &mut hasher)
        .with_context(|| format!("hashing {}", path.display()))?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Stream `url` into a part file next to `dest`, then move it into place.
/// Interrupted downloads never appear at the final path.
async fn download(url: &str, dest: &Path) -> Result<()> {
    debug!(%url, dest = %dest.display(), "starting download");
    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("building http client")?;
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("requesting {url}"))?
        .error_for_status()
        .with_context(|| format!("fetching {url}"))?;

    let part = dest.with_extension("part");
    let mut file = tokio::fs::File::create(&part)
        .await
        .with_context(|| format!("creating {}", part.display()))?;
    let mut stream = response.bytes_stream();
    let mut total = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("reading download stream")?;
        file.write_all(&chunk)
            .await
            .context("writing archive chunk")?;
        total += chunk.len() as u64;
    }
    file.sync_all().await.context("flushing archive")?;
    drop(file);
    tokio::fs::rename(&part, dest)
        .await
        .with_context(|| format!("moving archive into place at {}", dest.display()))?;
    debug!(bytes = total, "download complete");
    Ok(())
}

fn extract(archive: &Path, dest: &Path) -> Result<()> {
    let file = std::fs::File::open(archive)
        .with_context(|| format!("opening archive {}", archive.display()))?;
    let decoder = GzDecoder::new(std::io::BufReader::new(file));
    tar::Archive::new(decoder)
        .unpack(dest)
        .with_context(|| format!("extracting {} into {}", archive.display(), dest.display()))?;
    Ok(())
}
