//! Trajectory cache backends.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::traits::{ResidentId, TrajectoryStore};
use crate::trajectory::RawTrajectory;

/// One JSON document per resident, `traj_<id>.json`, inside a directory.
///
/// The presence of the file is the cache-hit signal. Deleting a file is the
/// only way to force regeneration of that resident.
#[derive(Debug, Clone)]
pub struct FileTrajectoryStore {
    dir: PathBuf,
}

impl FileTrajectoryStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, resident_id: ResidentId) -> PathBuf {
        self.dir.join(format!("traj_{}.json", resident_id))
    }
}

impl TrajectoryStore for FileTrajectoryStore {
    fn exists(&self, resident_id: ResidentId) -> bool {
        self.path_for(resident_id).is_file()
    }

    fn read(&self, resident_id: ResidentId) -> Result<RawTrajectory, StoreError> {
        let content = match fs::read_to_string(self.path_for(resident_id)) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(resident_id));
            }
            Err(err) => return Err(err.into()),
        };

        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt { resident_id, source })
    }

    fn write(&mut self, resident_id: ResidentId, trajectory: &RawTrajectory) -> Result<(), StoreError> {
        let path = self.path_for(resident_id);
        write_json_atomic(&path, trajectory)?;
        tracing::debug!(resident = resident_id, path = %path.display(), "cached trajectory");
        Ok(())
    }
}

/// Writes `value` as pretty JSON through a temp file so a crash never leaves
/// a half-written document at `dest`.
pub(crate) fn write_json_atomic<T: serde::Serialize + ?Sized>(dest: &Path, value: &T) -> io::Result<()> {
    let tmp_path = dest.with_extension("json.tmp");
    let mut writer = BufWriter::new(File::create(&tmp_path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    drop(writer);
    fs::rename(tmp_path, dest)
}

/// In-process store, mainly for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryTrajectoryStore {
    entries: HashMap<ResidentId, RawTrajectory>,
}

impl MemoryTrajectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn remove(&mut self, resident_id: ResidentId) -> Option<RawTrajectory> {
        self.entries.remove(&resident_id)
    }
}

impl TrajectoryStore for MemoryTrajectoryStore {
    fn exists(&self, resident_id: ResidentId) -> bool {
        self.entries.contains_key(&resident_id)
    }

    fn read(&self, resident_id: ResidentId) -> Result<RawTrajectory, StoreError> {
        self.entries
            .get(&resident_id)
            .cloned()
            .ok_or(StoreError::NotFound(resident_id))
    }

    fn write(&mut self, resident_id: ResidentId, trajectory: &RawTrajectory) -> Result<(), StoreError> {
        self.entries.insert(resident_id, trajectory.clone());
        Ok(())
    }
}
