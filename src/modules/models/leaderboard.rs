use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::modules::models::general::TrackState;
use crate::modules::models::lap::Lap;
use crate::modules::models::race::{Race, RaceMode, RaceStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub car_number: i32,
    pub driver_name: String,
    /// Completed laps, not the lap in progress. 0 before the first
    /// crossing.
    pub current_lap: i32,
    pub fastest_lap: Option<i64>,
    /// Seconds left on the race clock, identical for every entry of one
    /// computation.
    pub remaining_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub race_id: i64,
    pub entries: Vec<LeaderboardEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RaceMode>,
}

impl Leaderboard {
    /// # compute the standings of a race
    /// pure function of the current races and laps, recomputed on every
    /// call. Unknown and non-RUNNING races yield an empty board so the
    /// displays can always render something.
    ///
    /// Ranking: ascending fastest lap with no-lap-yet drivers last, and
    /// descending completed laps as the tie break. Sorting is stable, so
    /// fully tied drivers stay in roster order.
    ///
    /// ## Arguments
    /// * `state` - the shared track state
    /// * `race_id_in` - the race to rank
    /// * `now_in` - the wall-clock time used for the shared remaining time
    ///
    /// ## Returns
    /// * `Leaderboard` - the ranked standings
    pub fn compute(state: &TrackState, race_id_in: i64, now_in: DateTime<Utc>) -> Leaderboard {
        let race = match Race::find(state, race_id_in) {
            Ok(race) => race,
            Err(_) => {
                return Leaderboard {
                    race_id: race_id_in,
                    entries: Vec::new(),
                    mode: None,
                }
            }
        };

        if race.status != RaceStatus::Running {
            return Leaderboard {
                race_id: race_id_in,
                entries: Vec::new(),
                mode: Some(race.mode),
            };
        }

        let remaining_time = race.remaining_seconds(now_in);

        let mut entries: Vec<LeaderboardEntry> = race
            .drivers
            .iter()
            .map(|driver| {
                let laps = Lap::for_car(state, race_id_in, driver.car_number);
                LeaderboardEntry {
                    car_number: driver.car_number,
                    driver_name: driver.name.clone(),
                    current_lap: laps.len() as i32,
                    fastest_lap: laps.iter().map(|lap| lap.lap_ms).min(),
                    remaining_time,
                }
            })
            .collect();

        entries.sort_by(Leaderboard::rank_order);

        Leaderboard {
            race_id: race_id_in,
            entries,
            mode: Some(race.mode),
        }
    }

    fn rank_order(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
        match (a.fastest_lap, b.fastest_lap) {
            (Some(a_ms), Some(b_ms)) if a_ms != b_ms => a_ms.cmp(&b_ms),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            // tied or both without a lap: more completed laps ranks higher
            _ => b.current_lap.cmp(&a.current_lap),
        }
    }
}
