use crate::modules::models::lap::Lap;
use crate::modules::models::race::Race;
use crate::modules::store::{CounterState, TrackSnapshot};

/// The single owned container for everything the server knows about the
/// track: all races with their rosters, the flat lap ledger, and the two
/// monotonic id counters. Mutated only by the registry/ledger operations,
/// always behind the one lock held in `AppState`.
#[derive(Debug)]
pub struct TrackState {
    pub races: Vec<Race>,
    pub laps: Vec<Lap>,
    next_race_id: i64,
    next_entry_id: i64,
}

impl Default for TrackState {
    fn default() -> Self {
        TrackState::new()
    }
}

impl TrackState {
    pub fn new() -> TrackState {
        TrackState {
            races: Vec::new(),
            laps: Vec::new(),
            next_race_id: 1,
            next_entry_id: 1,
        }
    }

    /// # restore state from a persisted snapshot
    /// counters come back exactly as persisted so ids are never reused
    /// across restarts.
    pub fn from_snapshot(snapshot: TrackSnapshot) -> TrackState {
        TrackState {
            races: snapshot.races,
            laps: snapshot.laps,
            next_race_id: snapshot.counters.next_race_id,
            next_entry_id: snapshot.counters.next_entry_id,
        }
    }

    /// Owned copy of the full state, cheap at track scale, handed to the
    /// durable store after every mutation.
    pub fn snapshot(&self) -> TrackSnapshot {
        TrackSnapshot {
            races: self.races.clone(),
            laps: self.laps.clone(),
            counters: CounterState {
                next_race_id: self.next_race_id,
                next_entry_id: self.next_entry_id,
            },
        }
    }

    /// Claim the next race id. Never reused, also not for deleted races.
    pub fn take_race_id(&mut self) -> i64 {
        let id = self.next_race_id;
        self.next_race_id += 1;
        id
    }

    /// Claim the next driver-entry id, unique across all races.
    pub fn take_entry_id(&mut self) -> i64 {
        let id = self.next_entry_id;
        self.next_entry_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_one_and_increment() {
        let mut state = TrackState::new();
        assert_eq!(state.take_race_id(), 1);
        assert_eq!(state.take_race_id(), 2);
        assert_eq!(state.take_entry_id(), 1);
        assert_eq!(state.take_entry_id(), 2);
    }

    #[test]
    fn snapshot_round_trips_counters() {
        let mut state = TrackState::new();
        state.take_race_id();
        state.take_race_id();
        state.take_entry_id();

        let restored = TrackState::from_snapshot(state.snapshot());
        assert_eq!(restored.snapshot().counters.next_race_id, 3);
        assert_eq!(restored.snapshot().counters.next_entry_id, 2);
    }
}
