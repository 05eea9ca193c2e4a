//! The file host: a process-lifetime hosting directory plus the operations that
//! put files into it and turn them into public URLs.

use std::io;
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};
use url::Url;

use crate::config::HostingConfig;
use crate::context;
use crate::link::{HostError, LinkResolver, Source};
use crate::public_url::{self, UrlError};

const DIR_PREFIX: &str = "filehost-";

/// Temporary directory served under `/filehost/`, removed on [`HostingDir::close`] or drop.
#[derive(Debug)]
pub struct HostingDir {
    dir: TempDir,
}

impl HostingDir {
    /// Create the directory inside `parent`, or the system temp dir when `None`.
    pub fn create(parent: Option<&Path>) -> Result<Self, io::Error> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(DIR_PREFIX);
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        info!(path = %dir.path().display(), "Created hosting directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Resolve a public name to a path inside the directory.
    ///
    /// Returns `None` for names that would escape it.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let mut components = relative.components().peekable();
        components.peek()?;
        if !components.all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.dir.path().join(relative))
    }

    /// Remove the directory and everything hosted in it.
    pub fn close(self) -> Result<(), io::Error> {
        let path = self.dir.path().to_path_buf();
        debug!(path = %path.display(), "Cleaning up hosting directory");
        self.dir.close()?;
        info!(path = %path.display(), "Removed hosting directory");
        Ok(())
    }
}

/// A file made available under the hosting directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedFile {
    pub byte_size: u64,
    pub id: String,
    /// Public name: the id, or `<id>/<filename>` when a filename was given.
    pub name: String,
    pub path: PathBuf,
}

/// Hosts files and builds their public URLs.
#[derive(Debug)]
pub struct FileHost {
    dir: HostingDir,
    host_override: Option<Url>,
    resolver: LinkResolver,
}

impl FileHost {
    pub fn new(dir: HostingDir, resolver: LinkResolver, host_override: Option<Url>) -> Self {
        Self {
            dir,
            host_override,
            resolver,
        }
    }

    /// Create the hosting directory and resolver described by `config`.
    pub fn from_config(config: &HostingConfig) -> Result<Self, io::Error> {
        let dir = HostingDir::create(config.tmp_dir.as_deref())?;
        let resolver = LinkResolver::new(config.link_policy());
        Ok(Self::new(dir, resolver, config.host_override.clone()))
    }

    pub fn dir(&self) -> &HostingDir {
        &self.dir
    }

    pub fn resolver(&self) -> &LinkResolver {
        &self.resolver
    }

    /// Host `source`, optionally under an explicit `filename`.
    ///
    /// Blocks the calling thread on filesystem I/O; never call it from a request
    /// handler. Use [`FileHost::host`] there.
    pub fn host_blocking(
        &self,
        source: impl Into<Source>,
        filename: Option<&str>,
    ) -> Result<HostedFile, HostError> {
        let slot = self.allocate(filename)?;
        match self.resolver.place(source.into(), &slot.path) {
            Ok(byte_size) => Ok(slot.into_hosted(byte_size)),
            Err(e) => Err(slot.discard(e)),
        }
    }

    /// Host `source` with the filesystem work offloaded to the blocking pool.
    pub async fn host(
        &self,
        source: impl Into<Source>,
        filename: Option<&str>,
    ) -> Result<HostedFile, HostError> {
        let slot = self.allocate(filename)?;
        match self
            .resolver
            .place_async(source.into(), slot.path.clone())
            .await
        {
            Ok(byte_size) => Ok(slot.into_hosted(byte_size)),
            Err(e) => Err(slot.discard(e)),
        }
    }

    /// Public URL of `file`, derived from the override or the current request.
    pub fn url(&self, file: &HostedFile) -> Result<Url, UrlError> {
        self.url_for(&file.name)
    }

    /// Public URL of the hosted file named `name`.
    pub fn url_for(&self, name: &str) -> Result<Url, UrlError> {
        let request = context::current();
        public_url::build_url(name, self.host_override.as_ref(), request.as_ref())
    }

    /// Tear down the hosting directory.
    pub fn close(self) -> Result<(), io::Error> {
        self.dir.close()
    }

    fn allocate(&self, filename: Option<&str>) -> Result<Slot, HostError> {
        let id = uuid::Uuid::new_v4().simple().to_string();

        let (name, path) = match filename {
            Some(filename) => {
                validate_filename(filename)?;
                let dir = self.dir.path().join(&id);
                std::fs::create_dir(&dir)?;
                (format!("{id}/{filename}"), dir.join(filename))
            }
            None => (id.clone(), self.dir.path().join(&id)),
        };

        let own_dir = filename.is_some();
        Ok(Slot {
            id,
            name,
            own_dir,
            path,
        })
    }
}

struct Slot {
    id: String,
    name: String,
    /// The slot created its own `<id>/` directory.
    own_dir: bool,
    path: PathBuf,
}

impl Slot {
    fn into_hosted(self, byte_size: u64) -> HostedFile {
        HostedFile {
            byte_size,
            id: self.id,
            name: self.name,
            path: self.path,
        }
    }

    /// Remove the `<id>/` directory of a failed named upload and pass `err` through.
    fn discard(self, err: HostError) -> HostError {
        if self.own_dir {
            if let Some(dir) = self.path.parent() {
                if let Err(e) = std::fs::remove_dir_all(dir) {
                    debug!(path = %dir.display(), error = %e, "Failed to remove slot directory");
                }
            }
        }
        err
    }
}

fn validate_filename(filename: &str) -> Result<(), HostError> {
    let mut components = Path::new(filename).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );

    if !single_normal || filename.contains(['/', '\\']) {
        return Err(HostError::InvalidFilename(format!(
            "{filename:?} must be a single path component"
        )));
    }

    Ok(())
}
