// On-disk fare dataset: one live JSON file plus timestamped backups beside it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::{FareError, Result};
use crate::fare_models::{current_timestamp_millis, FareDataset};

const DATASET_FILE: &str = "fare.json";
const BACKUP_PREFIX: &str = "fare_backup_";
const BACKUP_SUFFIX: &str = ".json";

pub struct FareStore {
    data_dir: PathBuf,
    backup_retention: Option<usize>,
    write_lock: Mutex<()>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub backup: Option<PathBuf>,
    pub pruned: usize,
}

impl FareStore {
    pub fn open(data_dir: impl Into<PathBuf>, backup_retention: Option<usize>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(FareStore {
            data_dir,
            backup_retention,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join(DATASET_FILE)
    }

    /// `None` when nothing has been uploaded yet.
    pub fn load(&self) -> Result<Option<FareDataset>> {
        let path = self.dataset_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut dataset: FareDataset = serde_json::from_str(&contents)?;
        dataset.recount();
        Ok(Some(dataset))
    }

    /// The cold-start state is an empty dataset rather than an error.
    pub fn read(&self) -> Result<FareDataset> {
        Ok(self.load()?.unwrap_or_default())
    }

    /// Backs up the live file, then swaps the new dataset in with a rename.
    ///
    /// Nothing is written if the backup copy fails. Calls are serialized.
    pub fn replace(&self, dataset: &FareDataset) -> Result<ReplaceOutcome> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| FareError::internal(format!("Dataset write lock poisoned: {}", e)))?;

        let live = self.dataset_path();
        let backup = if live.exists() {
            let backup_path = self.next_backup_path()?;
            fs::copy(&live, &backup_path)?;
            info!("💾 Backed up previous dataset to {:?}", backup_path);
            Some(backup_path)
        } else {
            None
        };

        let json = serde_json::to_string_pretty(dataset)?;
        let mut staged = NamedTempFile::new_in(&self.data_dir)?;
        staged.write_all(json.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(&live).map_err(|e| FareError::Io(e.error))?;
        info!(
            "✓ Saved dataset: {} routes, {} stops",
            dataset.total_routes, dataset.total_stops
        );

        let pruned = match self.backup_retention {
            Some(keep) => self.prune_backups(keep),
            None => 0,
        };

        Ok(ReplaceOutcome { backup, pruned })
    }

    /// Backup files, oldest first.
    pub fn backups(&self) -> Result<Vec<PathBuf>> {
        let mut stamped: Vec<(i64, PathBuf)> = fs::read_dir(&self.data_dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                let stamp = backup_stamp(&path)?;
                Some((stamp, path))
            })
            .collect();
        stamped.sort();
        Ok(stamped.into_iter().map(|(_, path)| path).collect())
    }

    // Stamps only move forward so name order stays creation order after pruning.
    fn next_backup_path(&self) -> Result<PathBuf> {
        let latest = self
            .backups()?
            .last()
            .and_then(|path| backup_stamp(path));
        let mut stamp = match latest {
            Some(latest) => current_timestamp_millis().max(latest + 1),
            None => current_timestamp_millis(),
        };
        loop {
            let candidate = self
                .data_dir
                .join(format!("{}{}{}", BACKUP_PREFIX, stamp, BACKUP_SUFFIX));
            if !candidate.exists() {
                return Ok(candidate);
            }
            stamp += 1;
        }
    }

    // Best effort: a failed prune is logged and never fails the upload.
    fn prune_backups(&self, keep: usize) -> usize {
        let backups = match self.backups() {
            Ok(backups) => backups,
            Err(e) => {
                warn!("⚠️  Could not list backups for pruning: {}", e);
                return 0;
            }
        };

        let excess = backups.len().saturating_sub(keep);
        let mut removed = 0;
        for old in backups.iter().take(excess) {
            match fs::remove_file(old) {
                Ok(()) => removed += 1,
                Err(e) => warn!("⚠️  Could not remove old backup {:?}: {}", old, e),
            }
        }
        if removed > 0 {
            info!("🧹 Pruned {} old backup(s), keeping {}", removed, keep);
        }
        removed
    }
}

fn backup_stamp(path: &Path) -> Option<i64> {
    path.file_name()?
        .to_str()?
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_SUFFIX)?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fare_models::Route;
    use chrono::Utc;

    fn dataset(pairs: &[(&str, &str, f64)]) -> FareDataset {
        let routes = pairs
            .iter()
            .map(|(from, to, fare)| Route {
                from: from.to_string(),
                to: to.to_string(),
                distance: 1.0,
                fare: *fare,
            })
            .collect();
        FareDataset::from_routes(routes, Utc::now())
    }

    #[test]
    fn cold_start_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FareStore::open(dir.path(), None).unwrap();

        assert!(store.load().unwrap().is_none());
        let empty = store.read().unwrap();
        assert!(empty.routes.is_empty());
        assert!(empty.stops.is_empty());
    }

    #[test]
    fn open_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("data");
        FareStore::open(&nested, None).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn first_replace_makes_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = FareStore::open(dir.path(), None).unwrap();

        let outcome = store.replace(&dataset(&[("A", "B", 10.0)])).unwrap();
        assert!(outcome.backup.is_none());
        assert!(store.backups().unwrap().is_empty());
        assert_eq!(store.read().unwrap().routes.len(), 1);
    }

    #[test]
    fn each_later_replace_makes_exactly_one_backup_of_the_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FareStore::open(dir.path(), None).unwrap();

        store.replace(&dataset(&[("A", "B", 10.0)])).unwrap();
        let before = fs::read(store.dataset_path()).unwrap();

        let outcome = store.replace(&dataset(&[("C", "D", 20.0)])).unwrap();
        let backup = outcome.backup.unwrap();
        assert_eq!(fs::read(&backup).unwrap(), before);
        assert_eq!(store.backups().unwrap(), vec![backup]);

        store.replace(&dataset(&[("E", "F", 30.0)])).unwrap();
        assert_eq!(store.backups().unwrap().len(), 2);
        assert_eq!(store.read().unwrap().routes[0].from, "E");
    }

    #[test]
    fn no_staging_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FareStore::open(dir.path(), None).unwrap();
        store.replace(&dataset(&[("A", "B", 10.0)])).unwrap();
        store.replace(&dataset(&[("A", "B", 11.0)])).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "unexpected files: {:?}", names);
        assert!(names.contains(&DATASET_FILE.to_string()));
    }

    #[test]
    fn retention_keeps_newest_backups() {
        let dir = tempfile::tempdir().unwrap();
        let store = FareStore::open(dir.path(), Some(2)).unwrap();

        for fare in 0..5 {
            store.replace(&dataset(&[("A", "B", fare as f64)])).unwrap();
        }

        let backups = store.backups().unwrap();
        assert_eq!(backups.len(), 2);
        // newest backup holds the dataset written just before the live one
        let newest: FareDataset =
            serde_json::from_str(&fs::read_to_string(&backups[1]).unwrap()).unwrap();
        assert_eq!(newest.routes[0].fare, 3.0);
    }

    #[test]
    fn backup_names_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = FareStore::open(dir.path(), None).unwrap();
        for _ in 0..4 {
            store.replace(&dataset(&[("A", "B", 1.0)])).unwrap();
        }
        assert_eq!(store.backups().unwrap().len(), 3);
    }

    #[test]
    fn corrupt_live_file_is_an_error_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FareStore::open(dir.path(), None).unwrap();
        fs::write(store.dataset_path(), "{ not json").unwrap();
        assert!(matches!(store.read(), Err(FareError::Json(_))));
    }

    #[test]
    fn failed_backup_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FareStore::open(dir.path(), None).unwrap();
        // a directory in place of the live file cannot be copied
        fs::create_dir(store.dataset_path()).unwrap();

        let err = store.replace(&dataset(&[("A", "B", 10.0)])).unwrap_err();

        assert!(matches!(err, FareError::Io(_)));
        assert!(store.dataset_path().is_dir());
        assert!(store.backups().unwrap().is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn concurrent_replaces_each_leave_a_distinct_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = FareStore::open(dir.path(), None).unwrap();
        store.replace(&dataset(&[("A", "B", 0.0)])).unwrap();

        let backups: Vec<PathBuf> = std::thread::scope(|scope| {
            let handles: Vec<_> = (1..=16)
                .map(|fare| {
                    let store = &store;
                    scope.spawn(move || {
                        store.replace(&dataset(&[("A", "B", fare as f64)])).unwrap().backup
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap().unwrap())
                .collect()
        });

        let mut unique = backups.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 16);
        assert_eq!(store.backups().unwrap().len(), 16);
        // every backup is a complete dataset
        for path in &backups {
            let saved: FareDataset =
                serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
            assert_eq!(saved.routes.len(), 1);
        }
    }

    #[test]
    fn load_recounts_totals_missing_from_older_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FareStore::open(dir.path(), None).unwrap();
        fs::write(
            store.dataset_path(),
            r#"{"routes":[{"from":"A","to":"B","distance":1,"fare":10}],"stops":["A","B"]}"#,
        )
        .unwrap();

        let dataset = store.read().unwrap();
        assert_eq!(dataset.total_routes, 1);
        assert_eq!(dataset.total_stops, 2);
    }

    #[test]
    fn unrelated_files_are_not_backups() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("fare_backup_notes.json"), "{}").unwrap();
        fs::write(dir.path().join("other.json"), "{}").unwrap();
        let store = FareStore::open(dir.path(), None).unwrap();
        assert!(store.backups().unwrap().is_empty());
    }
}
