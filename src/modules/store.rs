use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{CustomResult, StoreSnafu};
use crate::modules::models::lap::Lap;
use crate::modules::models::race::Race;

const RACES_FILE: &str = "races.json";
const LAPS_FILE: &str = "laps.json";
const COUNTERS_FILE: &str = "counters.json";

/// Persisted id counters. Stored separately from the data so ids are
/// never reused, not even for races that were deleted before a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterState {
    pub next_race_id: i64,
    pub next_entry_id: i64,
}

/// Full owned copy of the track state as it goes to and comes from the
/// durable store.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSnapshot {
    pub races: Vec<Race>,
    pub laps: Vec<Lap>,
    pub counters: CounterState,
}

/// Where snapshots go between restarts. The server treats this as an
/// external collaborator: it loads once at startup and rewrites the full
/// snapshot after every mutation.
pub trait DurableStore: Send + Sync + 'static {
    /// `None` means nothing was ever saved and the server starts fresh.
    fn load(&self) -> CustomResult<Option<TrackSnapshot>>;

    fn save(&self, snapshot: &TrackSnapshot) -> CustomResult<()>;
}

/// Snapshots as three JSON files in one directory: the races with their
/// rosters, the flat lap log, and the id counters.
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> JsonFileStore {
        JsonFileStore { data_dir: data_dir.into() }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> CustomResult<Option<T>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return StoreSnafu { message: format!("{}: {}", path.display(), error) }.fail()
            }
        };

        match serde_json::from_str(&contents) {
            Ok(value) => Ok(Some(value)),
            Err(error) => {
                StoreSnafu { message: format!("{}: {}", path.display(), error) }.fail()
            }
        }
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> CustomResult<()> {
        let contents = match serde_json::to_string_pretty(value) {
            Ok(contents) => contents,
            Err(error) => {
                return StoreSnafu { message: format!("{}: {}", path.display(), error) }.fail()
            }
        };

        match fs::write(path, contents) {
            Ok(()) => Ok(()),
            Err(error) => {
                StoreSnafu { message: format!("{}: {}", path.display(), error) }.fail()
            }
        }
    }

    /// Counters for snapshots written before the counter file existed:
    /// one past the highest id in use.
    fn derive_counters(races: &[Race]) -> CounterState {
        CounterState {
            next_race_id: races.iter().map(|r| r.id).max().unwrap_or(0) + 1,
            next_entry_id: races
                .iter()
                .flat_map(|r| r.drivers.iter().map(|d| d.id))
                .max()
                .unwrap_or(0)
                + 1,
        }
    }
}

impl DurableStore for JsonFileStore {
    fn load(&self) -> CustomResult<Option<TrackSnapshot>> {
        let races: Vec<Race> = match JsonFileStore::read_json(&self.path(RACES_FILE))? {
            Some(races) => races,
            None => return Ok(None),
        };

        let laps: Vec<Lap> =
            JsonFileStore::read_json(&self.path(LAPS_FILE))?.unwrap_or_default();
        let counters = match JsonFileStore::read_json(&self.path(COUNTERS_FILE))? {
            Some(counters) => counters,
            None => JsonFileStore::derive_counters(&races),
        };

        info!(
            target: "store:load",
            "loaded {} race(s) and {} lap(s) from {}",
            races.len(), laps.len(), self.data_dir.display()
        );

        Ok(Some(TrackSnapshot { races, laps, counters }))
    }

    fn save(&self, snapshot: &TrackSnapshot) -> CustomResult<()> {
        if let Err(error) = fs::create_dir_all(&self.data_dir) {
            return StoreSnafu {
                message: format!("{}: {}", self.data_dir.display(), error),
            }
            .fail();
        }

        JsonFileStore::write_json(&self.path(RACES_FILE), &snapshot.races)?;
        JsonFileStore::write_json(&self.path(LAPS_FILE), &snapshot.laps)?;
        JsonFileStore::write_json(&self.path(COUNTERS_FILE), &snapshot.counters)?;

        debug!(
            target: "store:save",
            "persisted {} race(s) and {} lap(s)",
            snapshot.races.len(), snapshot.laps.len()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;

    use super::*;
    use crate::errors::Error;
    use crate::modules::models::general::TrackState;

    fn sample_snapshot() -> TrackSnapshot {
        let mut state = TrackState::new();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let race = Race::create(&mut state, Some("GP1"), 600).unwrap();
        Race::add_driver(&mut state, race.id, Some("Alice"), Some(7)).unwrap();
        Race::create(&mut state, Some("GP2"), 600).unwrap();
        Race::start(&mut state, race.id, t0).unwrap();
        Lap::register(&mut state, race.id, 7, t0 + Duration::seconds(61)).unwrap();

        state.snapshot()
    }

    #[test]
    fn an_empty_directory_is_a_fresh_start() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn snapshots_round_trip_through_disk() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let snapshot = sample_snapshot();

        store.save(&snapshot).unwrap();
        let loaded = store.load().unwrap().unwrap();

        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.counters.next_race_id, 3);
        assert_eq!(loaded.counters.next_entry_id, 2);
    }

    #[test]
    fn missing_counters_fall_back_to_the_highest_ids() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        store.save(&sample_snapshot()).unwrap();
        fs::remove_file(dir.path().join(COUNTERS_FILE)).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.counters.next_race_id, 3);
        assert_eq!(loaded.counters.next_entry_id, 2);
    }

    #[test]
    fn a_missing_lap_file_means_no_laps() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        store.save(&sample_snapshot()).unwrap();
        fs::remove_file(dir.path().join(LAPS_FILE)).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert!(loaded.laps.is_empty());
        assert_eq!(loaded.races.len(), 2);
    }

    #[test]
    fn a_corrupt_race_file_is_a_store_error() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        fs::write(dir.path().join(RACES_FILE), "not json at all").unwrap();

        assert!(matches!(store.load(), Err(Error::StoreError { .. })));
    }

    #[test]
    fn saving_creates_the_data_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("deeper").join("data");
        let store = JsonFileStore::new(&nested);

        store.save(&sample_snapshot()).unwrap();

        assert!(nested.join(RACES_FILE).exists());
        assert!(nested.join(COUNTERS_FILE).exists());
    }
}
