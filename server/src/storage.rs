use {
    anyhow::{Context as _, Result},
    fs_err::tokio::{canonicalize, create_dir_all, read, remove_file},
    securedoc_protocol::{StorageError, StorageId, StorageResult},
    std::{
        io::{ErrorKind, Write},
        path::{Path, PathBuf},
    },
    tempfile::NamedTempFile,
    tokio::task::spawn_blocking,
};

/// Directory tree holding encrypted documents and their metadata sidecars.
///
/// Files are written to `tmp/` first and then moved into place, so a partially
/// written file is never visible under its final name.
#[derive(Debug)]
pub struct Storage {
    root: PathBuf,
    tmp: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPaths {
    pub dir: PathBuf,
    pub data: PathBuf,
    pub metadata: PathBuf,
}

impl Storage {
    /// Creates the root directory if it does not exist. The root is stored as an
    /// absolute path.
    #[inline]
    pub async fn new(root: PathBuf) -> Result<Self> {
        create_dir_all(root.join("tmp"))
            .await
            .context("failed to create storage directory")?;
        let root = canonicalize(&root).await?;
        let tmp = root.join("tmp");
        Ok(Self { root, tmp })
    }

    /// `partition` is a relative `year/month/day` path.
    #[must_use]
    #[inline]
    pub fn document_paths(&self, partition: &str, id: StorageId) -> DocumentPaths {
        let dir = self.root.join(partition);
        DocumentPaths {
            data: dir.join(format!("{id}.bin")),
            metadata: dir.join(format!("{id}_metadata.json")),
            dir,
        }
    }

    /// The temporary file is removed if writing or renaming fails.
    #[inline]
    pub async fn commit_file(&self, path: &Path, data: Vec<u8>) -> Result<()> {
        if let Some(dir) = path.parent() {
            create_dir_all(dir).await?;
        }
        let tmp = self.tmp.clone();
        let path = path.to_owned();
        spawn_blocking(move || -> Result<()> {
            let mut file = NamedTempFile::new_in(&tmp)?;
            file.write_all(&data)?;
            file.flush()?;
            file.persist(&path)
                .with_context(|| format!("failed to move file into {}", path.display()))?;
            Ok(())
        })
        .await?
    }

    /// A missing file is reported as `NotFound`.
    #[inline]
    pub async fn read_file(&self, path: &Path) -> StorageResult<Vec<u8>> {
        match read(path).await {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(format!(
                "file {} does not exist",
                path.display()
            ))),
            Err(err) => Err(anyhow::Error::from(err).into()),
        }
    }

    /// Returns false if the file was already gone.
    #[inline]
    pub async fn remove_file(&self, path: &Path) -> Result<bool> {
        match remove_file(path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
