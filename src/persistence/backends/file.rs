// Copyright © 2024 Pathway

use log::{info, warn};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use glob::Pattern as GlobPattern;
use itertools::Itertools;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{check_monotonic, select_version, Error, SnapshotStore};
use crate::engine::{TimeSpan, Timestamp};
use crate::fs_helpers::ensure_directory;

const SNAPSHOT_SUFFIX: &str = ".snapshot";
const TEMPORARY_OBJECT_SUFFIX: &str = ".tmp";

/// Stores every version in its own file, named after the zero-padded
/// as-of timestamp. Files are written aside and renamed into place, so a
/// reader never observes a partially written version.
#[derive(Debug)]
pub struct FilesystemSnapshotStore<K, V> {
    root_path: PathBuf,
    versions_pattern: GlobPattern,
    write_lock: Mutex<()>,
    _entries: PhantomData<fn() -> (K, V)>,
}

impl<K, V> FilesystemSnapshotStore<K, V> {
    pub fn new(root_path: &Path) -> Result<Self, Error> {
        let root_path_str = root_path.to_str().ok_or(Error::PathIsNotUtf8)?;
        let versions_pattern = GlobPattern::new(&format!(
            "{}/*{SNAPSHOT_SUFFIX}",
            GlobPattern::escape(root_path_str)
        ))?;
        ensure_directory(root_path)?;
        Ok(Self {
            root_path: root_path.to_path_buf(),
            versions_pattern,
            write_lock: Mutex::new(()),
            _entries: PhantomData,
        })
    }

    fn version_path(&self, as_of: Timestamp) -> PathBuf {
        self.root_path
            .join(format!("{:020}{SNAPSHOT_SUFFIX}", as_of.0))
    }

    /// As-of timestamps of all stored versions, oldest first.
    pub fn versions(&self) -> Result<Vec<Timestamp>, Error> {
        let mut versions: Vec<Timestamp> = Vec::new();
        for entry in glob::glob(self.versions_pattern.as_str())? {
            let path = entry?;
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                warn!("The path is not UTF-8 encoded: {path:?}");
                continue;
            };
            let as_of = file_name
                .strip_suffix(SNAPSHOT_SUFFIX)
                .and_then(|stem| stem.parse::<Timestamp>().ok())
                .ok_or_else(|| Error::IncorrectSnapshotName(file_name.to_string()))?;
            versions.push(as_of);
        }
        Ok(versions.into_iter().sorted().collect())
    }

    fn write_file(temp_path: &Path, final_path: &Path, value: &[u8]) -> Result<(), Error> {
        let mut output_file = BufWriter::new(File::create(temp_path)?);
        output_file.write_all(value)?;
        output_file.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        std::fs::rename(temp_path, final_path)?;
        Ok(())
    }
}

impl<K, V> SnapshotStore<K, V> for FilesystemSnapshotStore<K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    fn snapshot(&self, span: &TimeSpan) -> Result<Vec<(K, V)>, Error> {
        let Some(as_of) = select_version(self.versions()?, span)? else {
            return Ok(Vec::new());
        };
        let reader = BufReader::new(File::open(self.version_path(as_of))?);
        Ok(bincode::deserialize_from(reader)?)
    }

    fn persist(&self, span: &TimeSpan, entries: Vec<(K, V)>) -> Result<(), Error> {
        let _guard = self.write_lock.lock().unwrap();
        let as_of = span.end();
        check_monotonic(self.versions()?.last().copied(), as_of)?;

        let serialized = bincode::serialize(&entries)?;
        let final_path = self.version_path(as_of);
        let mut temp_path = final_path.clone().into_os_string();
        temp_path.push(TEMPORARY_OBJECT_SUFFIX);
        Self::write_file(Path::new(&temp_path), &final_path, &serialized)?;
        info!(
            "Persisted snapshot with {} entries as of {as_of} to {}",
            entries.len(),
            final_path.display()
        );
        Ok(())
    }
}
