//! Persistent scan cursor: atomic load/save and wraparound batch iteration.
//! Grounded on `daemon.py::load_cursor`/`iter_batches`; atomicity follows
//! `botctl.py::_write` rather than `daemon.py`'s plain `save_cursor`, since
//! the spec requires the cursor file be written atomically.

use crate::models::ScanCursor;
use anyhow::{Context, Result};
use std::path::Path;

pub fn load_cursor(path: &Path) -> ScanCursor {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or(ScanCursor { cursor: 0, ts: 0 }),
        Err(_) => ScanCursor { cursor: 0, ts: 0 },
    }
}

/// Atomic write-temp-then-rename, so a crash mid-write never corrupts the
/// cursor file.
pub fn save_cursor(path: &Path, cursor: &ScanCursor) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("creating state directory")?;
    }
    let tmp = path.with_extension("tmp");
    let body = serde_json::to_string(cursor)?;
    std::fs::write(&tmp, body).context("writing cursor temp file")?;
    std::fs::rename(&tmp, path).context("renaming cursor temp file into place")?;
    Ok(())
}

/// Slices `items` into a batch of at most `batch_size` starting at `start`,
/// wrapping around modulo `items.len()`, and returns the batch plus the
/// cursor position for the next call.
pub fn iter_batch<'a, T>(items: &'a [T], start: usize, batch_size: usize) -> (Vec<&'a T>, usize) {
    let n = items.len();
    if n == 0 || batch_size == 0 {
        return (Vec::new(), 0);
    }
    let start = start % n;
    let take = batch_size.min(n);
    let mut batch = Vec::with_capacity(take);
    for i in 0..take {
        batch.push(&items[(start + i) % n]);
    }
    let new_cursor = (start + take) % n;
    (batch, new_cursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iter_batch_wraps_around() {
        let items = vec![1, 2, 3, 4, 5];
        let (batch, cursor) = iter_batch(&items, 3, 4);
        assert_eq!(batch, vec![&4, &5, &1, &2]);
        assert_eq!(cursor, 2);
    }

    #[test]
    fn iter_batch_caps_at_universe_size() {
        let items = vec![1, 2, 3];
        let (batch, cursor) = iter_batch(&items, 0, 10);
        assert_eq!(batch.len(), 3);
        assert_eq!(cursor, 0);
    }

    #[test]
    fn iter_batch_empty_universe() {
        let items: Vec<i32> = vec![];
        let (batch, cursor) = iter_batch(&items, 5, 4);
        assert!(batch.is_empty());
        assert_eq!(cursor, 0);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.json");
        let cursor = ScanCursor { cursor: 42, ts: 100 };
        save_cursor(&path, &cursor).unwrap();
        assert_eq!(load_cursor(&path), cursor);
    }

    #[test]
    fn load_missing_file_returns_zero() {
        let dir = tempfile::tempdir().unwrap();
        let cursor = load_cursor(&dir.path().join("nope.json"));
        assert_eq!(cursor.cursor, 0);
    }
}
