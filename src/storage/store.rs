//! Shard Store
//!
//! One shard's on-disk tree: every file with the shard's extension below a
//! root directory. Used by storage nodes and by the hub for its own shard.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use tempfile::NamedTempFile;

use super::archive::{ArchiveBuilder, EntryHeader};
use crate::error::{Result, ShardError};
use crate::shard::{base_name, extension_of, normalize_extension};

/// Reserved directory under the root holding in-flight uploads
pub const STAGING_DIR: &str = ".shardfs-staging";

const UPLOAD_PREFIX: &str = ".upload-";

/// A shard's file tree
#[derive(Debug, Clone)]
pub struct ShardStore {
    root: PathBuf,
    extension: String,
    staging_dir: PathBuf,
}

impl ShardStore {
    /// Open (creating if needed) the tree at `root` for files ending in `.extension`
    pub fn open(root: impl Into<PathBuf>, extension: &str) -> Result<Self> {
        let root = root.into();
        create_dirs(&root)?;

        Ok(Self {
            root,
            extension: normalize_extension(extension).to_string(),
            staging_dir: std::env::temp_dir(),
        })
    }

    /// Directory where transient archives are written
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        create_dirs(&dir)?;
        self.staging_dir = dir;
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    // =========================================================================
    // Write
    // =========================================================================

    /// Persist `body` as `relative_dir/file_name`, creating directories
    ///
    /// Bytes land in a temporary file under [`STAGING_DIR`] and are renamed
    /// into place once the body is exhausted, so readers never see a
    /// partial file.
    pub fn write_file<R: Read + ?Sized>(
        &self,
        relative_dir: &Path,
        file_name: &str,
        body: &mut R,
    ) -> Result<(PathBuf, u64)> {
        let file_name = base_name(file_name);
        if file_name.is_empty() || file_name == "." || file_name == ".." {
            return Err(ShardError::InvalidPath(file_name.to_string()));
        }

        let dir = self.root.join(self.checked_relative(relative_dir)?);
        create_dirs(&dir)?;

        let staging = self.root.join(STAGING_DIR);
        create_dirs(&staging)?;
        let mut staged = tempfile::Builder::new()
            .prefix(UPLOAD_PREFIX)
            .suffix(".part")
            .tempfile_in(&staging)?;
        let written = io::copy(body, staged.as_file_mut())?;
        staged.as_file().sync_all()?;

        let target = dir.join(file_name);
        staged.persist(&target).map_err(|e| ShardError::Io(e.error))?;

        tracing::debug!("Stored {} ({} bytes)", target.display(), written);
        Ok((target, written))
    }

    /// Persist `body` at a relative path (`dir/name.ext`)
    pub fn write_path<R: Read + ?Sized>(&self, relative_path: &str, body: &mut R) -> Result<(PathBuf, u64)> {
        let relative = sanitize_relative(Path::new(relative_path))?;
        let file_name = relative
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ShardError::InvalidPath(relative_path.to_string()))?
            .to_string();
        let dir = relative.parent().unwrap_or_else(|| Path::new(""));
        self.write_file(dir, &file_name, body)
    }

    // =========================================================================
    // Read / Delete
    // =========================================================================

    /// Find a file by relative path, falling back to a tree search by base
    /// name when `name` has no directory part
    pub fn locate(&self, name: &str) -> Result<PathBuf> {
        let relative = self.checked_relative(Path::new(name))?;
        let direct = self.root.join(&relative);
        if direct.is_file() {
            return Ok(direct);
        }

        if relative.components().count() == 1 {
            let wanted = relative.as_os_str();
            if let Some(found) = self
                .files()?
                .into_iter()
                .find(|p| p.file_name() == Some(wanted))
            {
                return Ok(found);
            }
        }

        Err(ShardError::FileNotFound(name.to_string()))
    }

    /// Open a file for streaming
    pub fn open_file(&self, name: &str) -> Result<File> {
        let path = self.locate(name)?;
        Ok(File::open(path)?)
    }

    /// Delete one file
    pub fn remove(&self, name: &str) -> Result<PathBuf> {
        let path = self.locate(name).map_err(|e| match e {
            ShardError::FileNotFound(_) => ShardError::DeleteFailed {
                path: self.root.join(name),
                source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
            },
            other => other,
        })?;

        fs::remove_file(&path).map_err(|source| ShardError::DeleteFailed {
            path: path.clone(),
            source,
        })?;

        tracing::debug!("Deleted {}", path.display());
        Ok(path)
    }

    // =========================================================================
    // Enumeration
    // =========================================================================

    /// Every managed file, sorted by path
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        self.files_under(&self.root)
    }

    /// Sorted base names of managed files below `relative_dir`
    ///
    /// A directory that does not exist lists as empty.
    pub fn list(&self, relative_dir: &Path) -> Result<Vec<String>> {
        let dir = self.root.join(self.checked_relative(relative_dir)?);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = self
            .files_under(&dir)?
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Listing rendered as newline-terminated text
    pub fn list_text(&self, relative_dir: &Path) -> Result<String> {
        Ok(self
            .list(relative_dir)?
            .into_iter()
            .map(|name| name + "\n")
            .collect())
    }

    fn files_under(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        walk(dir, &self.extension, &self.root.join(STAGING_DIR), &mut found)?;
        found.sort();
        Ok(found)
    }

    // =========================================================================
    // Archive
    // =========================================================================

    /// Build a tar of every managed file into a uniquely named temporary file
    ///
    /// The returned file is positioned at its start and is deleted when
    /// dropped. Entry paths are relative to the shard root.
    pub fn build_archive(&self) -> Result<NamedTempFile> {
        let files = self.files()?;

        let staged = tempfile::Builder::new()
            .prefix(&format!("{}files-", self.extension))
            .suffix(".tar")
            .tempfile_in(&self.staging_dir)
            .map_err(|e| ShardError::ArchiveBuild(format!("cannot create archive file: {}", e)))?;

        let mut builder = ArchiveBuilder::new(io::BufWriter::new(staged));
        for path in &files {
            // Files may vanish between enumeration and archiving
            let mut file = match File::open(path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(ShardError::ArchiveBuild(format!("{}: {}", path.display(), e))),
            };
            let header = self.entry_header(path, &file)?;
            builder.append(&header, &mut file)?;
        }

        let count = builder.entry_count();
        let mut staged = builder
            .finish()?
            .into_inner()
            .map_err(|e| ShardError::ArchiveBuild(format!("flush failed: {}", e.error())))?;
        staged.as_file_mut().seek(SeekFrom::Start(0))?;

        tracing::debug!(
            "Built archive {} with {} .{} file(s)",
            staged.path().display(),
            count,
            self.extension
        );
        Ok(staged)
    }

    /// Sanitized relative path that stays out of the staging area
    fn checked_relative(&self, path: &Path) -> Result<PathBuf> {
        let relative = sanitize_relative(path)?;
        if relative.components().next() == Some(Component::Normal(STAGING_DIR.as_ref())) {
            return Err(ShardError::InvalidPath(path.display().to_string()));
        }
        Ok(relative)
    }

    fn entry_header(&self, path: &Path, file: &File) -> Result<EntryHeader> {
        let metadata = file.metadata()?;
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| ShardError::ArchiveBuild(format!("{} is outside the shard", path.display())))?;

        let archive_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Ok(EntryHeader {
            path: archive_path,
            size: metadata.len(),
            mode: file_mode(&metadata),
            mtime,
        })
    }
}

/// Validate a client-supplied relative path
///
/// Leading `/` and `.` components are dropped; `..` is rejected.
pub fn sanitize_relative(path: &Path) -> Result<PathBuf> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(ShardError::InvalidPath(path.display().to_string()));
            }
        }
    }
    Ok(clean)
}

fn create_dirs(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| ShardError::DirectoryCreation {
        path: dir.to_path_buf(),
        source,
    })
}

/// Recursive walk collecting regular files with `extension`
///
/// Symlinked directories and `skip` are not entered.
fn walk(dir: &Path, extension: &str, skip: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();

        if file_type.is_dir() {
            if path != skip {
                walk(&path, extension, skip, found)?;
            }
        } else if file_type.is_file() && is_managed(&path, extension) {
            found.push(path);
        }
    }
    Ok(())
}

/// Same rule the shard table routes by: text after the base name's last `.`
fn is_managed(path: &Path, extension: &str) -> bool {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => matches!(extension_of(name), Ok(ext) if ext == extension),
        None => false,
    }
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}
