//! Atomic output of rendered modules.
//!
//! A module is staged in a temp file next to its destination, flushed and
//! synced, then renamed into place. Readers of the destination see either the
//! previous contents or the complete new module, never a partial write. The
//! staged file is removed on every failing path.
//!
//! Two writers targeting the same destination at once are not ordered; callers
//! that need that must serialize them.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, PersistError};

use crate::render::RenderedModule;

/// Options for [`write`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Replace an existing file at the destination
    pub overwrite: bool,
}

/// Errors that can occur while writing a module
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Cannot write {path:?}: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path:?} already exists (use overwrite to replace it)")]
    DestinationConflict { path: PathBuf },
}

impl WriteError {
    /// Taxonomy name of this error
    pub fn kind(&self) -> &'static str {
        match self {
            WriteError::DestinationUnwritable { .. } => "DestinationUnwritable",
            WriteError::DestinationConflict { .. } => "DestinationConflict",
        }
    }

    /// The path the write was attempted at
    pub fn path(&self) -> &Path {
        match self {
            WriteError::DestinationUnwritable { path, .. } => path,
            WriteError::DestinationConflict { path } => path,
        }
    }
}

/// The final step of a write: moving the staged file onto the destination.
///
/// Implementations must either place the complete staged file at the
/// destination or leave the destination untouched. On failure the staged file
/// is handed back inside the [`PersistError`] and deleted when dropped.
pub trait Commit {
    fn commit(
        &self,
        staged: NamedTempFile,
        destination: &Path,
        overwrite: bool,
    ) -> Result<(), PersistError>;
}

/// Commit through the platform's atomic rename.
///
/// With `overwrite` this is `rename(2)` (`MoveFileEx` with replace on Windows).
/// Without it, a no-clobber rename is used (`renameat2(RENAME_NOREPLACE)` on
/// Linux, falling back to hard link + unlink), so a file created after the
/// conflict check still yields [`WriteError::DestinationConflict`]. When the
/// filesystem supports neither, the commit fails with
/// [`WriteError::DestinationUnwritable`] instead of overwriting.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicRename;

impl Commit for AtomicRename {
    fn commit(
        &self,
        staged: NamedTempFile,
        destination: &Path,
        overwrite: bool,
    ) -> Result<(), PersistError> {
        if overwrite {
            staged.persist(destination)?;
        } else {
            staged.persist_noclobber(destination)?;
        }
        Ok(())
    }
}

/// Writes rendered modules using a [`Commit`] strategy.
#[derive(Debug, Clone, Default)]
pub struct OutputWriter<C = AtomicRename> {
    commit: C,
}

impl OutputWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Commit> OutputWriter<C> {
    /// Use a custom commit step
    pub fn with_commit(commit: C) -> Self {
        Self { commit }
    }

    /// Write `module` to `destination`, returning the resolved absolute path.
    pub fn write(
        &self,
        module: &RenderedModule<'_>,
        destination: &Path,
        options: WriteOptions,
    ) -> Result<PathBuf, WriteError> {
        let (parent, target) = resolve(destination)?;

        let existing = match fs::symlink_metadata(&target) {
            Ok(meta) => Some(meta),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(WriteError::DestinationUnwritable {
                    path: target,
                    source,
                })
            }
        };

        if let Some(meta) = &existing {
            if meta.is_dir() || !options.overwrite {
                return Err(WriteError::DestinationConflict { path: target });
            }
        }

        let mut staged = stage(&parent, &target).map_err(|source| {
            WriteError::DestinationUnwritable {
                path: target.clone(),
                source,
            }
        })?;

        let permissions = existing.and_then(|_| fs::metadata(&target).ok());
        fill(&mut staged, module.text(), permissions.as_ref()).map_err(|source| {
            WriteError::DestinationUnwritable {
                path: target.clone(),
                source,
            }
        })?;

        tracing::debug!("Staged {} bytes at {:?}", module.text().len(), staged.path());

        self.commit
            .commit(staged, &target, options.overwrite)
            .map_err(|e| {
                if e.error.kind() == io::ErrorKind::AlreadyExists {
                    WriteError::DestinationConflict {
                        path: target.clone(),
                    }
                } else {
                    WriteError::DestinationUnwritable {
                        path: target.clone(),
                        source: e.error,
                    }
                }
            })?;

        tracing::info!("Wrote module to {:?}", target);
        Ok(target)
    }
}

/// Write `module` to `destination` with the default atomic rename.
///
/// Returns the resolved absolute path of the written file.
pub fn write(
    module: &RenderedModule<'_>,
    destination: &Path,
    options: WriteOptions,
) -> Result<PathBuf, WriteError> {
    OutputWriter::new().write(module, destination, options)
}

/// Resolve `destination` to (canonical parent directory, final path).
fn resolve(destination: &Path) -> Result<(PathBuf, PathBuf), WriteError> {
    let unwritable = |source: io::Error| WriteError::DestinationUnwritable {
        path: destination.to_path_buf(),
        source,
    };

    let file_name = destination.file_name().ok_or_else(|| {
        unwritable(io::Error::new(
            io::ErrorKind::InvalidInput,
            "destination has no file name",
        ))
    })?;

    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let parent = parent.canonicalize().map_err(unwritable)?;
    if !parent.is_dir() {
        return Err(unwritable(io::Error::other(format!(
            "{} is not a directory",
            parent.display()
        ))));
    }

    let target = parent.join(file_name);
    Ok((parent, target))
}

fn stage(parent: &Path, target: &Path) -> io::Result<NamedTempFile> {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = format!(".{}.", file_name);

    tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(parent)
}

fn fill(
    staged: &mut NamedTempFile,
    text: &str,
    existing: Option<&fs::Metadata>,
) -> io::Result<()> {
    staged.write_all(text.as_bytes())?;
    staged.flush()?;
    apply_permissions(staged, existing)?;
    staged.as_file().sync_all()
}

/// Temp files are created 0600; give the module the permissions of the file it
/// replaces, or 0644.
#[cfg(unix)]
fn apply_permissions(staged: &NamedTempFile, existing: Option<&fs::Metadata>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permissions = match existing {
        Some(meta) => meta.permissions(),
        None => fs::Permissions::from_mode(0o644),
    };
    staged.as_file().set_permissions(permissions)
}

#[cfg(not(unix))]
fn apply_permissions(_staged: &NamedTempFile, _existing: Option<&fs::Metadata>) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldSpec, ModuleDescriptor, TypeTag};
    use crate::render::render;
    use crate::validate::{validate, ValidatedDescriptor};
    use tempfile::TempDir;

    fn orders() -> ValidatedDescriptor {
        validate(
            ModuleDescriptor::new("orders", "Order", "Store", "save_order")
                .with_field(FieldSpec::new("id", TypeTag::Integer))
                .with_field(FieldSpec::new("note", TypeTag::String).with_default()),
        )
        .unwrap()
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// A commit step whose rename always fails.
    struct FailingCommit(io::ErrorKind);

    impl Commit for FailingCommit {
        fn commit(
            &self,
            staged: NamedTempFile,
            _destination: &Path,
            _overwrite: bool,
        ) -> Result<(), PersistError> {
            Err(PersistError {
                error: io::Error::new(self.0, "simulated rename failure"),
                file: staged,
            })
        }
    }

    #[test]
    fn test_write_new_file() {
        let temp = TempDir::new().unwrap();
        let validated = orders();
        let rendered = render(&validated);

        let dest = temp.path().join("orders.py");
        let path = write(&rendered, &dest, WriteOptions::default()).unwrap();

        assert_eq!(path, temp.path().canonicalize().unwrap().join("orders.py"));
        assert_eq!(fs::read_to_string(&path).unwrap(), rendered.text());
        assert_eq!(entries(temp.path()), vec!["orders.py"]);
    }

    #[test]
    fn test_existing_file_without_overwrite_conflicts() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("orders.py");
        fs::write(&dest, "# hand written\n").unwrap();

        let validated = orders();
        let rendered = render(&validated);
        let err = write(&rendered, &dest, WriteOptions::default()).unwrap_err();

        assert!(matches!(err, WriteError::DestinationConflict { .. }));
        assert_eq!(err.kind(), "DestinationConflict");
        assert_eq!(err.path(), temp.path().canonicalize().unwrap().join("orders.py"));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "# hand written\n");
        assert_eq!(entries(temp.path()), vec!["orders.py"]);
    }

    #[test]
    fn test_existing_file_with_overwrite_replaced() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("orders.py");
        fs::write(&dest, "# hand written\n").unwrap();

        let validated = orders();
        let rendered = render(&validated);
        let path = write(&rendered, &dest, WriteOptions { overwrite: true }).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), rendered.text());
        assert_eq!(entries(temp.path()), vec!["orders.py"]);
    }

    #[test]
    fn test_missing_parent_is_unwritable() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("missing").join("orders.py");

        let validated = orders();
        let rendered = render(&validated);
        let err = write(&rendered, &dest, WriteOptions::default()).unwrap_err();

        match err {
            WriteError::DestinationUnwritable { path, source } => {
                assert_eq!(path, dest);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected DestinationUnwritable, got {other:?}"),
        }
        assert!(!temp.path().join("missing").exists());
    }

    #[test]
    fn test_parent_is_a_file_is_unwritable() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let validated = orders();
        let rendered = render(&validated);
        let err = write(&rendered, &blocker.join("orders.py"), WriteOptions::default())
            .unwrap_err();

        assert_eq!(err.kind(), "DestinationUnwritable");
    }

    #[test]
    fn test_directory_at_destination_conflicts_even_with_overwrite() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("orders.py");
        fs::create_dir(&dest).unwrap();

        let validated = orders();
        let rendered = render(&validated);
        let err = write(&rendered, &dest, WriteOptions { overwrite: true }).unwrap_err();

        assert!(matches!(err, WriteError::DestinationConflict { .. }));
        assert!(dest.is_dir());
    }

    #[test]
    fn test_failed_rename_leaves_destination_unchanged() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("orders.py");
        fs::write(&dest, "# previous contents\n").unwrap();

        let validated = orders();
        let rendered = render(&validated);
        let writer = OutputWriter::with_commit(FailingCommit(io::ErrorKind::PermissionDenied));
        let err = writer
            .write(&rendered, &dest, WriteOptions { overwrite: true })
            .unwrap_err();

        assert_eq!(err.kind(), "DestinationUnwritable");
        assert_eq!(fs::read_to_string(&dest).unwrap(), "# previous contents\n");
        // Staged file was cleaned up
        assert_eq!(entries(temp.path()), vec!["orders.py"]);
    }

    #[test]
    fn test_failed_rename_on_fresh_path_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("orders.py");

        let validated = orders();
        let rendered = render(&validated);
        let writer = OutputWriter::with_commit(FailingCommit(io::ErrorKind::Other));
        writer
            .write(&rendered, &dest, WriteOptions::default())
            .unwrap_err();

        assert!(!dest.exists());
        assert!(entries(temp.path()).is_empty());
    }

    #[test]
    fn test_rename_race_reports_conflict() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("orders.py");

        let validated = orders();
        let rendered = render(&validated);
        let writer = OutputWriter::with_commit(FailingCommit(io::ErrorKind::AlreadyExists));
        let err = writer
            .write(&rendered, &dest, WriteOptions::default())
            .unwrap_err();

        assert!(matches!(err, WriteError::DestinationConflict { .. }));
    }

    #[test]
    fn test_noclobber_commit_keeps_file_created_after_check() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("orders.py");
        fs::write(&dest, "# hand written\n").unwrap();

        let mut staged = stage(temp.path(), &dest).unwrap();
        fill(&mut staged, "# generated\n", None).unwrap();
        let err = AtomicRename.commit(staged, &dest, false).unwrap_err();

        assert_eq!(err.error.kind(), io::ErrorKind::AlreadyExists);
        drop(err);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "# hand written\n");
        assert_eq!(entries(temp.path()), vec!["orders.py".to_string()]);
    }

    #[test]
    fn test_destination_without_file_name() {
        let temp = TempDir::new().unwrap();
        let validated = orders();
        let rendered = render(&validated);

        let err = write(&rendered, &temp.path().join(".."), WriteOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "DestinationUnwritable");
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let validated = orders();
        let rendered = render(&validated);

        let fresh = write(&rendered, &temp.path().join("fresh.py"), WriteOptions::default()).unwrap();
        let mode = fs::metadata(&fresh).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);

        let kept = temp.path().join("kept.py");
        fs::write(&kept, "").unwrap();
        fs::set_permissions(&kept, fs::Permissions::from_mode(0o600)).unwrap();
        let kept = write(&rendered, &kept, WriteOptions { overwrite: true }).unwrap();
        let mode = fs::metadata(&kept).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
