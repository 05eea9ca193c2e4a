//! Placing a source into the hosting directory by link or by copy.
//!
//! In-memory sources are always written out. Files on disk are linked when the
//! [`LinkPolicy`] allows it and copied otherwise; a failed link silently
//! degrades to a copy so callers never see link errors.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Cursor, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Invalid source: {0}")]
    InvalidSource(String),
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Hard,
    Symbolic,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::Hard => "hard",
            LinkKind::Symbolic => "symbolic",
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a file on disk gets linked instead of copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Never link.
    Copy,
    /// Link files of at least this many bytes, copy smaller ones.
    Threshold(u64),
    /// Link whenever possible.
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkPolicy {
    pub kind: LinkKind,
    pub mode: LinkMode,
}

impl LinkPolicy {
    pub fn copy() -> Self {
        Self {
            kind: LinkKind::Hard,
            mode: LinkMode::Copy,
        }
    }

    pub fn should_link(&self, size: u64) -> bool {
        match self.mode {
            LinkMode::Copy => false,
            LinkMode::Threshold(limit) => size >= limit,
            LinkMode::Always => true,
        }
    }
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self {
            kind: LinkKind::Hard,
            mode: LinkMode::Always,
        }
    }
}

/// Something that can be hosted.
#[derive(Debug)]
pub enum Source {
    Bytes(Bytes),
    /// The whole buffer is hosted regardless of the cursor position.
    Buffer(Cursor<Vec<u8>>),
    Path(PathBuf),
    File(File),
}

impl From<Bytes> for Source {
    fn from(data: Bytes) -> Self {
        Source::Bytes(data)
    }
}

impl From<Vec<u8>> for Source {
    fn from(data: Vec<u8>) -> Self {
        Source::Bytes(Bytes::from(data))
    }
}

impl From<&'static [u8]> for Source {
    fn from(data: &'static [u8]) -> Self {
        Source::Bytes(Bytes::from_static(data))
    }
}

impl From<Cursor<Vec<u8>>> for Source {
    fn from(buffer: Cursor<Vec<u8>>) -> Self {
        Source::Buffer(buffer)
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

impl From<File> for Source {
    fn from(file: File) -> Self {
        Source::File(file)
    }
}

/// Creates a filesystem link at `target` pointing at `source`.
pub trait Linker: Send + Sync {
    fn link(&self, kind: LinkKind, source: &Path, target: &Path) -> io::Result<()>;
}

/// Links through the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLinker;

impl Linker for FsLinker {
    fn link(&self, kind: LinkKind, source: &Path, target: &Path) -> io::Result<()> {
        match kind {
            LinkKind::Hard => fs::hard_link(source, target),
            LinkKind::Symbolic => symlink_file(source, target),
        }
    }
}

#[cfg(unix)]
fn symlink_file(source: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(windows)]
fn symlink_file(source: &Path, target: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(source, target)
}

#[cfg(not(any(unix, windows)))]
fn symlink_file(_source: &Path, _target: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}

/// Decides between linking and copying and performs the placement.
#[derive(Clone)]
pub struct LinkResolver {
    linker: Arc<dyn Linker>,
    policy: LinkPolicy,
}

impl fmt::Debug for LinkResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkResolver")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl LinkResolver {
    pub fn new(policy: LinkPolicy) -> Self {
        Self::with_linker(policy, Arc::new(FsLinker))
    }

    pub fn with_linker(policy: LinkPolicy, linker: Arc<dyn Linker>) -> Self {
        Self { linker, policy }
    }

    pub fn policy(&self) -> LinkPolicy {
        self.policy
    }

    /// Place `source` at `target` and return the resulting file size.
    ///
    /// Blocks on filesystem I/O. Use [`LinkResolver::place_async`] from async code.
    pub fn place(&self, source: Source, target: &Path) -> Result<u64, HostError> {
        match source {
            Source::Bytes(data) => write_bytes(target, &data),
            Source::Buffer(buffer) => write_bytes(target, buffer.get_ref()),
            Source::Path(path) => self.place_path(&path, target),
            Source::File(file) => self.place_file(file, target),
        }
    }

    /// Same as [`LinkResolver::place`], run on the blocking thread pool.
    pub async fn place_async(&self, source: Source, target: PathBuf) -> Result<u64, HostError> {
        let resolver = self.clone();
        tokio::task::spawn_blocking(move || resolver.place(source, &target)).await?
    }

    fn place_path(&self, path: &Path, target: &Path) -> Result<u64, HostError> {
        let metadata = fs::metadata(path).map_err(|e| {
            HostError::InvalidSource(format!("{} is not a valid file: {e}", path.display()))
        })?;
        if !metadata.is_file() {
            return Err(HostError::InvalidSource(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        // Symbolic links must not depend on the working directory.
        let source = path.canonicalize()?;
        self.link_or_copy(&source, metadata.len(), target)
    }

    fn place_file(&self, mut file: File, target: &Path) -> Result<u64, HostError> {
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(HostError::InvalidSource(
                "open file handle does not refer to a regular file".to_string(),
            ));
        }

        if let Some(path) = handle_path(&file, &metadata) {
            return self.link_or_copy(&path, metadata.len(), target);
        }

        debug!(target = %target.display(), "Open file has no resolvable path, copying contents");
        file.seek(SeekFrom::Start(0))?;
        let mut out = File::create(target)?;
        let copied = io::copy(&mut file, &mut out)?;
        out.sync_all()?;
        Ok(copied)
    }

    fn link_or_copy(&self, source: &Path, size: u64, target: &Path) -> Result<u64, HostError> {
        if self.policy.should_link(size) {
            match self.linker.link(self.policy.kind, source, target) {
                Ok(()) => {
                    debug!(
                        kind = %self.policy.kind,
                        source = %source.display(),
                        target = %target.display(),
                        size,
                        "Linked file into hosting directory"
                    );
                    return Ok(size);
                }
                Err(e) => {
                    warn!(
                        kind = %self.policy.kind,
                        errno = e.raw_os_error(),
                        error = %e,
                        "Failed to create link, falling back to copy"
                    );
                }
            }
        }

        let copied = fs::copy(source, target)?;
        debug!(
            source = %source.display(),
            target = %target.display(),
            size = copied,
            "Copied file into hosting directory"
        );
        Ok(copied)
    }
}

fn write_bytes(target: &Path, data: &[u8]) -> Result<u64, HostError> {
    fs::write(target, data)?;
    Ok(data.len() as u64)
}

/// Path of an open file, if it can be recovered and still names the same inode.
#[cfg(target_os = "linux")]
fn handle_path(file: &File, metadata: &fs::Metadata) -> Option<PathBuf> {
    use std::os::fd::AsRawFd;
    use std::os::unix::fs::MetadataExt;

    let path = fs::read_link(format!("/proc/self/fd/{}", file.as_raw_fd())).ok()?;
    let on_disk = fs::metadata(&path).ok()?;
    (on_disk.is_file() && on_disk.dev() == metadata.dev() && on_disk.ino() == metadata.ino())
        .then_some(path)
}

#[cfg(not(target_os = "linux"))]
fn handle_path(_file: &File, _metadata: &fs::Metadata) -> Option<PathBuf> {
    None
}
