use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

// Where the reserve-energy voltage comes from on a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveSource {
    Fixed(u32),
    // Text file holding an integer millivolt value, e.g. an ADC export.
    File(PathBuf),
}

impl ReserveSource {
    // A file wins over a fixed value; with neither, the reserve never runs out.
    pub fn from_args(fixed_mv: Option<u32>, file: Option<&Path>) -> Self {
        match (file, fixed_mv) {
            (Some(path), _) => ReserveSource::File(path.to_path_buf()),
            (None, Some(mv)) => ReserveSource::Fixed(mv),
            (None, None) => ReserveSource::Fixed(u32::MAX),
        }
    }

    // A failed read counts as an empty reserve so the session stops drawing power.
    pub fn sample_mv(&self) -> u32 {
        match self {
            ReserveSource::Fixed(mv) => *mv,
            ReserveSource::File(path) => read_millivolts(path).unwrap_or_else(|err| {
                log::warn!("reserve voltage unavailable, assuming 0 mV: {err:#}");
                0
            }),
        }
    }
}

fn read_millivolts(path: &Path) -> Result<u32> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading reserve voltage failed: {}", path.display()))?;
    let value = raw.trim();
    value
        .parse::<u32>()
        .with_context(|| format!("invalid millivolt value in {}: {value:?}", path.display()))
}
