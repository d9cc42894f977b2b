//! Attachment resolution.
//!
//! Turns an [`AttachmentDescriptor`] into a [`ResolvedAttachment`]:
//! - inline content is base64-decoded
//! - path references are confined to the [`AttachmentsRoot`], symlinks included
//! - every attachment is held to the configured size limit
//!
//! Failures are terminal for the attachment and are never retried.

pub mod content_type;
pub mod path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ConnectorConfig, HARD_ATTACHMENTS_LIMIT_MB};
use crate::errors::{ConnectorError, ConnectorErrorKind, ConnectorResult};
use crate::types::{AttachmentDescriptor, ResolvedAttachment};

use self::content_type::effective_mime_type;

/// Canonical directory that path attachments must stay inside.
///
/// Cheap to clone; the path is canonicalized once, at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentsRoot {
    canonical: Arc<Path>,
}

impl AttachmentsRoot {
    /// Opens an attachments root. The path must be absolute and an existing directory.
    pub fn new(path: impl AsRef<Path>) -> ConnectorResult<Self> {
        let path = path.as_ref();
        if !path.is_absolute() {
            return Err(ConnectorError::configuration(format!(
                "Attachments folder must be an absolute path, got {:?}",
                path
            )));
        }

        let canonical = std::fs::canonicalize(path).map_err(|e| {
            ConnectorError::configuration(format!(
                "Attachments folder {:?} is not accessible: {}",
                path, e
            ))
            .with_cause(e)
        })?;

        if !canonical.is_dir() {
            return Err(ConnectorError::configuration(format!(
                "Attachments folder {:?} is not a directory",
                path
            )));
        }

        Ok(Self {
            canonical: Arc::from(canonical),
        })
    }

    /// Returns the canonical root path.
    pub fn path(&self) -> &Path {
        &self.canonical
    }
}

#[derive(Debug, Clone)]
enum RootState {
    Ready(AttachmentsRoot),
    Unconfigured,
    Unavailable(String),
}

/// Resolves attachments against a root and a size limit.
#[derive(Debug, Clone)]
pub struct AttachmentResolver {
    root: RootState,
    limit_bytes: u64,
}

impl AttachmentResolver {
    /// Creates a resolver for the given root and per-attachment limit.
    pub fn new(root: AttachmentsRoot, limit_bytes: u64) -> Self {
        Self {
            root: RootState::Ready(root),
            limit_bytes,
        }
    }

    /// Creates a resolver that only accepts inline attachments.
    pub fn inline_only(limit_bytes: u64) -> Self {
        Self {
            root: RootState::Unconfigured,
            limit_bytes,
        }
    }

    /// Creates a resolver from configuration.
    ///
    /// A missing or broken attachments folder does not fail here; it fails
    /// every path attachment later with a configuration error.
    pub fn from_config(config: &ConnectorConfig) -> Self {
        let root = match &config.attachments_root {
            None => RootState::Unconfigured,
            Some(path) => match AttachmentsRoot::new(path) {
                Ok(root) => RootState::Ready(root),
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %e, "Attachments folder unavailable, path attachments disabled");
                    RootState::Unavailable(e.message().to_string())
                }
            },
        };

        Self {
            root,
            limit_bytes: config.attachments_limit_bytes,
        }
    }

    /// Returns the attachments root, or the configuration error explaining its absence.
    pub fn root(&self) -> ConnectorResult<&AttachmentsRoot> {
        match &self.root {
            RootState::Ready(root) => Ok(root),
            RootState::Unconfigured => Err(ConnectorError::configuration(format!(
                "Path attachments require {} to be set",
                crate::config::ATTACHMENTS_FOLDER_ENV
            ))),
            RootState::Unavailable(reason) => Err(ConnectorError::configuration(reason.clone())),
        }
    }

    /// Returns the per-attachment limit in bytes.
    pub fn limit_bytes(&self) -> u64 {
        self.limit_bytes
    }

    /// Resolves a single attachment.
    pub fn resolve(&self, descriptor: &AttachmentDescriptor) -> ConnectorResult<ResolvedAttachment> {
        match descriptor {
            AttachmentDescriptor::Inline {
                content_base64,
                filename,
                mime_type,
            } => resolve_inline(content_base64, filename, mime_type, self.limit_bytes),
            AttachmentDescriptor::Path {
                relative_path,
                filename,
                mime_type,
            } => resolve_path(
                relative_path,
                filename.as_deref(),
                mime_type.as_deref(),
                self.root()?,
                self.limit_bytes,
            ),
        }
    }

    /// Resolves all attachments of a request in parallel.
    ///
    /// Results keep the input order; the first failure in that order wins.
    pub async fn resolve_all(
        &self,
        descriptors: Vec<AttachmentDescriptor>,
    ) -> ConnectorResult<Vec<ResolvedAttachment>> {
        let tasks = descriptors.into_iter().map(|descriptor| {
            let resolver = self.clone();
            tokio::task::spawn_blocking(move || resolver.resolve(&descriptor))
        });

        futures::future::join_all(tasks)
            .await
            .into_iter()
            .enumerate()
            .map(|(index, joined)| {
                joined.map_err(|e| {
                    ConnectorError::io(format!("Attachment #{} could not be resolved: {}", index, e))
                        .with_cause(e)
                })?
            })
            .collect()
    }
}

/// Resolves a descriptor against a root using the hard size limit.
pub fn resolve(
    descriptor: &AttachmentDescriptor,
    root: &AttachmentsRoot,
) -> ConnectorResult<ResolvedAttachment> {
    AttachmentResolver::new(root.clone(), HARD_ATTACHMENTS_LIMIT_MB * 1024 * 1024).resolve(descriptor)
}

fn resolve_inline(
    content_base64: &str,
    filename: &str,
    mime_type: &str,
    limit_bytes: u64,
) -> ConnectorResult<ResolvedAttachment> {
    let filename = filename.trim();
    if filename.is_empty() {
        return Err(ConnectorError::validation(
            "Inline attachment is missing required field 'filename'",
        ));
    }
    if mime_type.trim().is_empty() {
        return Err(ConnectorError::validation(format!(
            "Inline attachment '{}' is missing its MIME type",
            filename
        )));
    }
    let mime_type = effective_mime_type(filename, Some(mime_type));

    let cleaned: String = content_base64.split_whitespace().collect();

    // Check the estimate first so a huge payload is never decoded
    enforce_limit(filename, estimated_decoded_size(&cleaned), limit_bytes)?;

    let bytes = BASE64.decode(cleaned.as_bytes()).map_err(|e| {
        ConnectorError::decoding(format!(
            "Attachment '{}' has invalid base64 content: {}",
            filename, e
        ))
        .with_cause(e)
    })?;

    enforce_limit(filename, bytes.len() as u64, limit_bytes)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(attachment = %filename, bytes = bytes.len(), "Decoded inline attachment");

    Ok(ResolvedAttachment::new(filename, mime_type, bytes))
}

fn resolve_path(
    relative_path: &str,
    filename: Option<&str>,
    mime_type: Option<&str>,
    root: &AttachmentsRoot,
    limit_bytes: u64,
) -> ConnectorResult<ResolvedAttachment> {
    let relative = path::normalize_relative(relative_path).map_err(log_traversal)?;
    let canonical = canonicalize_in(root, &relative).map_err(log_traversal)?;
    path::ensure_within(root.path(), &canonical).map_err(log_traversal)?;

    let file = File::open(&canonical).map_err(|e| {
        if canonical.is_dir() {
            not_a_file(&relative)
        } else {
            read_error(&canonical, e)
        }
    })?;

    // Type and size come from the open handle, never from a second lookup
    let metadata = file.metadata().map_err(|e| read_error(&canonical, e))?;
    if !metadata.is_file() {
        return Err(not_a_file(&relative));
    }
    verify_unchanged(root, &relative, &metadata).map_err(log_traversal)?;

    let filename = match filename.map(str::trim).filter(|f| !f.is_empty()) {
        Some(name) => name.to_string(),
        None => base_name(&canonical)?,
    };
    let mime_type = effective_mime_type(&filename, mime_type);

    // Size check before reading into memory
    enforce_limit(&filename, metadata.len(), limit_bytes)?;

    let mut bytes = Vec::with_capacity(metadata.len() as usize);
    file.take(limit_bytes.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|e| read_error(&canonical, e))?;

    // The file may have grown since it was stat'ed
    enforce_limit(&filename, bytes.len() as u64, limit_bytes)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(attachment = %filename, bytes = bytes.len(), path = %canonical.display(), "Read attachment from disk");

    Ok(ResolvedAttachment::new(filename, mime_type, bytes))
}

/// Upper bound on dangling symlinks followed by hand.
const MAX_LINK_HOPS: usize = 40;

fn canonicalize_in(root: &AttachmentsRoot, relative: &Path) -> ConnectorResult<PathBuf> {
    let joined = root.path().join(relative);
    match std::fs::canonicalize(&joined) {
        Ok(canonical) => Ok(canonical),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            // Containment is decided before existence
            ensure_missing_target_within(root, &joined)?;
            Err(ConnectorError::not_found(format!(
                "No such file in attachments folder: {}",
                relative.display()
            ))
            .with_cause(e))
        }
        Err(e) => Err(read_error(&joined, e)),
    }
}

/// Checks where a path that does not exist would have landed: the deepest
/// entry that does exist, with dangling symlinks followed by hand.
fn ensure_missing_target_within(root: &AttachmentsRoot, missing: &Path) -> ConnectorResult<()> {
    let mut pending = missing.to_path_buf();

    for _ in 0..MAX_LINK_HOPS {
        let anchor = match pending.ancestors().find(|p| p.symlink_metadata().is_ok()) {
            Some(anchor) => anchor.to_path_buf(),
            None => return Ok(()),
        };

        match std::fs::canonicalize(&anchor) {
            Ok(canonical) => return path::ensure_within(root.path(), &canonical),
            Err(_) => {
                let target = std::fs::read_link(&anchor).map_err(|e| read_error(&anchor, e))?;
                let rest = pending
                    .strip_prefix(&anchor)
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                let mut next = anchor.parent().unwrap_or(&anchor).join(target);
                if !rest.as_os_str().is_empty() {
                    next.push(rest);
                }
                pending = next;
            }
        }
    }

    Err(ConnectorError::path_traversal(format!(
        "Too many symbolic links while resolving {}",
        missing.display()
    )))
}

/// Re-resolves the path after opening and checks it still names the
/// opened file, so a component swapped for a symlink in between is caught.
#[cfg(unix)]
fn verify_unchanged(
    root: &AttachmentsRoot,
    relative: &Path,
    opened: &std::fs::Metadata,
) -> ConnectorResult<()> {
    use std::os::unix::fs::MetadataExt;

    let current = canonicalize_in(root, relative)?;
    path::ensure_within(root.path(), &current)?;
    let on_disk = std::fs::metadata(&current).map_err(|e| read_error(&current, e))?;

    if on_disk.dev() != opened.dev() || on_disk.ino() != opened.ino() {
        return Err(ConnectorError::path_traversal(format!(
            "Attachment '{}' changed while it was being opened",
            relative.display()
        )));
    }
    Ok(())
}

// Without file identities the attachments folder must not be writable by
// untrusted parties.
#[cfg(not(unix))]
fn verify_unchanged(
    _root: &AttachmentsRoot,
    _relative: &Path,
    _opened: &std::fs::Metadata,
) -> ConnectorResult<()> {
    Ok(())
}

fn not_a_file(relative: &Path) -> ConnectorError {
    ConnectorError::not_found(format!(
        "Attachment '{}' is not a regular file",
        relative.display()
    ))
}

fn read_error(path: &Path, e: io::Error) -> ConnectorError {
    if e.kind() == io::ErrorKind::NotFound {
        ConnectorError::not_found(format!("No such file: {}", path.display())).with_cause(e)
    } else {
        ConnectorError::io(format!("Could not read attachment {}: {}", path.display(), e)).with_cause(e)
    }
}

fn base_name(path: &Path) -> ConnectorResult<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            ConnectorError::validation(format!("Attachment path {} has no file name", path.display()))
        })
}

fn log_traversal(err: ConnectorError) -> ConnectorError {
    #[cfg(feature = "tracing")]
    {
        if err.kind() == ConnectorErrorKind::PathTraversal {
            tracing::warn!(error = %err, "Blocked attachment path outside the attachments folder");
        }
    }
    err
}

/// Estimates the decoded size of base64 text without decoding it.
pub fn estimated_decoded_size(cleaned: &str) -> u64 {
    if cleaned.is_empty() {
        return 0;
    }
    let padding = if cleaned.ends_with("==") {
        2
    } else if cleaned.ends_with('=') {
        1
    } else {
        0
    };
    ((cleaned.len() as u64) * 3 / 4).saturating_sub(padding)
}

fn enforce_limit(name: &str, size_bytes: u64, limit_bytes: u64) -> ConnectorResult<()> {
    if size_bytes > limit_bytes {
        let mb = |bytes: u64| bytes as f64 / (1024.0 * 1024.0);
        return Err(ConnectorError::too_large(format!(
            "Attachment '{}' is too large: {:.2} MB. Limit is {:.2} MB (hard max {} MB)",
            name,
            mb(size_bytes),
            mb(limit_bytes),
            HARD_ATTACHMENTS_LIMIT_MB
        )));
    }
    Ok(())
}
