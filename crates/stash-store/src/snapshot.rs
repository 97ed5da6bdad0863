//! Optional on-disk text snapshot for the sorted set. One `score: value`
//! line per member in level-0 (ascending score) order. Not exercised by the
//! network service.

use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use thiserror::Error;
use tracing::{info, warn};

use crate::sorted_set::SortedSet;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot io: {0}")]
    Io(#[from] io::Error),
}

impl SortedSet {
    /// Write every member as `score: value\n` in score order. I/O failures
    /// are hard errors; a partial snapshot is worse than none.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let mut writer = BufWriter::new(File::create(path)?);
        for (score, member) in self.iter_by_score() {
            write!(writer, "{score}: ")?;
            writer.write_all(member)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        info!(?path, entries = self.card(), "stored sorted set snapshot");
        Ok(())
    }

    /// Reload a snapshot into a fresh set. An absent file yields an empty
    /// set; lines without a `": "` delimiter, with an unparsable score, or
    /// colliding with an earlier entry are skipped.
    pub fn load(path: &Path, max_level: usize) -> Result<Self, SnapshotError> {
        let mut set = Self::new(max_level);
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(?path, "no snapshot to load");
                return Ok(set);
            }
            Err(err) => return Err(err.into()),
        };

        for line in BufReader::new(file).split(b'\n') {
            let line = line?;
            let Some((score, member)) = parse_line(&line) else {
                if !line.is_empty() {
                    warn!(len = line.len(), "skipping malformed snapshot line");
                }
                continue;
            };
            if !set.insert(score, member) {
                warn!(score, "skipping duplicate snapshot entry");
            }
        }
        info!(?path, entries = set.card(), "loaded sorted set snapshot");
        Ok(set)
    }
}

/// Split at the first `:` followed by one space; score and value must both
/// be non-empty.
fn parse_line(line: &[u8]) -> Option<(i64, &[u8])> {
    let colon = line.iter().position(|&b| b == b':')?;
    let member = line.get(colon + 2..).filter(|rest| !rest.is_empty())?;
    if line.get(colon + 1) != Some(&b' ') {
        return None;
    }
    let score = std::str::from_utf8(&line[..colon]).ok()?.parse().ok()?;
    Some((score, member))
}
