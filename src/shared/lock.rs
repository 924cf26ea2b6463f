use anyhow::{Context, Result};
use fs2::FileExt;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

// Exclusive claim on one GPS serial port, backed by an OS file lock.
// A second tracker process on the same port would interleave UBX commands with ours.
pub struct PortLock {
    file: File,
    path: PathBuf,
}

impl PortLock {
    // Lock `explicit` if given, otherwise a per-port file in the temp directory.
    pub fn for_port(serial_port: &str, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => default_lock_path(serial_port),
        };
        Self::acquire(&path)
    }

    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating lock directory failed: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("opening lock file failed: {}", path.display()))?;

        file.try_lock_exclusive().with_context(|| {
            format!(
                "GPS port is already in use by another tracker: {}",
                path.display()
            )
        })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PortLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

// "/dev/ttyACM0" -> <tmp>/gps-fix-tracker-dev_ttyACM0.lock
pub fn default_lock_path(serial_port: &str) -> PathBuf {
    let name: String = serial_port
        .trim_start_matches(['/', '\\'])
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    env::temp_dir().join(format!("gps-fix-tracker-{name}.lock"))
}
