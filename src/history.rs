//! The on-disk sample log: append-only CSV with numbered backups.

use std::{
    ffi::OsString,
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use log::*;

use crate::{
    error::{MonitorError, Result},
    sample::Sample,
};

#[derive(Debug, Clone)]
pub struct SampleLog {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
}

impl SampleLog {
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64, backups: usize) -> Self {
        Self {
            path: path.into(),
            max_bytes,
            backups,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<log>.n`, where `.1` is the most recent backup.
    pub fn backup_path(&self, n: usize) -> PathBuf {
        backup_path(&self.path, n)
    }

    /// Append one row, writing the header first into an empty or new file.
    pub fn append(&self, sample: &Sample) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| MonitorError::write(&self.path, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| MonitorError::write(&self.path, e))?;
        let len = file
            .metadata()
            .map_err(|e| MonitorError::write(&self.path, e))?
            .len();
        let mut writer = csv::WriterBuilder::new()
            .has_headers(len == 0)
            .from_writer(file);
        writer
            .serialize(sample)
            .map_err(|e| MonitorError::write(&self.path, e))?;
        writer
            .flush()
            .map_err(|e| MonitorError::write(&self.path, e))
    }

    /// Rotate once the live log has grown past the ceiling.
    ///
    /// The oldest backup is deleted before anything is renamed, so each rename
    /// lands on a free name. Returns whether a rotation happened.
    pub fn rotate_if_needed(&self) -> Result<bool> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(MonitorError::write(&self.path, e)),
        };
        if size <= self.max_bytes {
            return Ok(false);
        }

        self.remove_stale_backups()?;
        if self.backups == 0 {
            fs::remove_file(&self.path).map_err(|e| MonitorError::write(&self.path, e))?;
            info!(target: "history", "Discarded {} ({} bytes), no backups kept", self.path.display(), size);
            return Ok(true);
        }

        let oldest = self.backup_path(self.backups);
        remove_if_exists(&oldest)?;
        for n in (1..self.backups).rev() {
            let from = self.backup_path(n);
            if from.exists() {
                let to = self.backup_path(n + 1);
                fs::rename(&from, &to).map_err(|e| MonitorError::write(&to, e))?;
            }
        }
        let first = self.backup_path(1);
        fs::rename(&self.path, &first).map_err(|e| MonitorError::write(&first, e))?;
        info!(target: "history", "Rotated {} ({} bytes) to {}", self.path.display(), size, first.display());
        Ok(true)
    }

    /// Delete backups numbered past the retention, left behind when a run
    /// kept more of them.
    fn remove_stale_backups(&self) -> Result<()> {
        let mut n = self.backups + 1;
        loop {
            let stale = self.backup_path(n);
            if !stale.exists() {
                return Ok(());
            }
            remove_if_exists(&stale)?;
            debug!(target: "history", "Removed {} beyond retention of {}", stale.display(), self.backups);
            n += 1;
        }
    }

    /// Every readable file of the log, oldest first: `.N` down to `.1`, then
    /// the live file.
    pub fn files_oldest_first(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = (1..=self.backups)
            .rev()
            .map(|n| self.backup_path(n))
            .filter(|p| p.exists())
            .collect();
        if self.path.exists() {
            files.push(self.path.clone());
        }
        files
    }

    /// Read back every row across backups and the live file. Rows that do not
    /// parse are skipped with a warning.
    pub fn read_all(&self) -> Result<Vec<Sample>> {
        let mut samples = Vec::new();
        for path in self.files_oldest_first() {
            let mut reader = csv::Reader::from_path(&path).map_err(|e| {
                MonitorError::unavailable(path.display().to_string(), e)
            })?;
            for (row, record) in reader.deserialize::<Sample>().enumerate() {
                match record {
                    Ok(sample) => samples.push(sample),
                    Err(e) => {
                        warn!(target: "history", "Skipping {} row {}: {}", path.display(), row + 1, e)
                    }
                }
            }
        }
        Ok(samples)
    }
}

fn backup_path(path: &Path, n: usize) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MonitorError::write(path, e)),
    }
}
