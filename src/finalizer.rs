//! Post-transfer finalization: extension correction and publishing.
//!
//! A finished transfer sits on disk as `<name><suffix>`. Finalizing strips the
//! suffix, optionally swaps the extension for the one detected from the file
//! content, and renames the file in place. Either the rename happens in full or
//! the temporary file is left untouched.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::config::Config;
use crate::error::FinalizeError;

/// Number of leading bytes read for content sniffing
const SNIFF_LEN: u64 = 8192;

/// Guesses a file extension from file content
#[async_trait]
pub trait ContentSniffer: Send + Sync {
    /// Best-guess extension without the leading dot, empty when unknown
    async fn detect(&self, path: &Path) -> std::io::Result<String>;
}

/// Magic-byte sniffer backed by the `infer` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct InferSniffer;

#[async_trait]
impl ContentSniffer for InferSniffer {
    async fn detect(&self, path: &Path) -> std::io::Result<String> {
        let file = tokio::fs::File::open(path).await?;
        let mut head = Vec::with_capacity(SNIFF_LEN as usize);
        file.take(SNIFF_LEN).read_to_end(&mut head).await?;

        if let Some(kind) = infer::get(&head) {
            return Ok(kind.extension().to_string());
        }

        // infer has no matchers for text, so fall back to a UTF-8 check
        if looks_like_text(&head) {
            return Ok("txt".to_string());
        }

        Ok(String::new())
    }
}

/// Whether a file head reads as plain text
///
/// An empty head counts as text. A multibyte character cut off at the end of
/// the sniffed window is tolerated.
fn looks_like_text(head: &[u8]) -> bool {
    let valid_utf8 = match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    };
    valid_utf8
        && !head
            .iter()
            .any(|&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C | 0x1B))
}

/// Publishes completed temporary files under their final name
#[derive(Clone)]
pub struct Finalizer {
    rewrite_ext: bool,
    temp_suffix: String,
    sniffer: Arc<dyn ContentSniffer>,
}

impl std::fmt::Debug for Finalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Finalizer")
            .field("rewrite_ext", &self.rewrite_ext)
            .field("temp_suffix", &self.temp_suffix)
            .finish_non_exhaustive()
    }
}

impl Finalizer {
    /// Create a finalizer using the [`InferSniffer`]
    pub fn new(config: &Config) -> Self {
        Self::with_sniffer(config, Arc::new(InferSniffer))
    }

    /// Create a finalizer with a custom content sniffer
    pub fn with_sniffer(config: &Config, sniffer: Arc<dyn ContentSniffer>) -> Self {
        Self {
            rewrite_ext: config.rewrite_ext,
            temp_suffix: config.temp_suffix.clone(),
            sniffer,
        }
    }

    /// Rename `temp_path` to its final name in the same directory
    ///
    /// Returns the published path. On error the file at `temp_path` is untouched.
    pub async fn finalize(&self, temp_path: &Path) -> Result<PathBuf, FinalizeError> {
        let temp_name = temp_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| FinalizeError::InvalidName {
                path: temp_path.to_path_buf(),
            })?;

        let mut final_name = temp_name
            .strip_suffix(self.temp_suffix.as_str())
            .unwrap_or(temp_name)
            .to_string();
        if final_name.is_empty() {
            return Err(FinalizeError::InvalidName {
                path: temp_path.to_path_buf(),
            });
        }

        if self.rewrite_ext {
            let detected =
                self.sniffer
                    .detect(temp_path)
                    .await
                    .map_err(|source| FinalizeError::Detect {
                        path: temp_path.to_path_buf(),
                        source,
                    })?;

            let corrected = with_detected_extension(&final_name, &detected);
            if corrected != final_name {
                debug!(from = %final_name, to = %corrected, "correcting file extension");
                final_name = corrected;
            }
        }

        let final_path = temp_path.with_file_name(&final_name);
        tokio::fs::rename(temp_path, &final_path)
            .await
            .map_err(|source| FinalizeError::Rename {
                from: temp_path.to_path_buf(),
                to: final_path.clone(),
                source,
            })?;

        debug!(path = ?final_path, "published file");
        Ok(final_path)
    }
}

/// Replace the extension of `name` with `detected`, keeping the stem
///
/// Leaves `name` alone when nothing was detected or when it already carries
/// the detected extension (compared ASCII case-insensitively).
pub fn with_detected_extension(name: &str, detected: &str) -> String {
    let detected = detected.trim_start_matches('.');
    if detected.is_empty() {
        return name.to_string();
    }

    let path = Path::new(name);
    match (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|e| e.to_str()),
    ) {
        (_, Some(ext)) if ext.eq_ignore_ascii_case(detected) => name.to_string(),
        (Some(stem), Some(_)) => format!("{stem}.{detected}"),
        _ => format!("{name}.{detected}"),
    }
}
