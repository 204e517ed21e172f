use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::errors::{CustomResult, InvalidStateSnafu, NotFoundSnafu};
use crate::modules::models::general::TrackState;
use crate::modules::models::race::{Race, RaceStatus};

/// One lap crossing as reported by the observer at the lap line. Laps
/// are append-only: nothing ever edits or deletes a stored lap except
/// the cascade of a race deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lap {
    pub race_id: i64,
    pub car_number: i32,
    pub lap_number: i32,
    pub lap_ms: i64,
    pub timestamp: DateTime<Utc>,
}

impl Lap {
    /************ INSERTERS ************/

    /// # register a lap crossing
    /// store a lap for a car in a RUNNING race. The lap duration is
    /// measured from the car's previous crossing, or from the race start
    /// for the car's first lap.
    ///
    /// ## Arguments
    /// * `state` - the shared track state
    /// * `race_id_in` - the race the crossing belongs to
    /// * `car_number_in` - the car as entered on the observer console
    /// * `now_in` - the wall-clock time of the button press
    ///
    /// ## Returns
    /// * `Lap` - the stored lap
    pub fn register(
        state: &mut TrackState,
        race_id_in: i64,
        car_number_in: i32,
        now_in: DateTime<Utc>,
    ) -> CustomResult<Lap> {
        let start_time = {
            let race = Race::find(state, race_id_in)?;

            if race.status != RaceStatus::Running {
                return InvalidStateSnafu {
                    message: "Can only register laps for RUNNING races",
                }
                .fail();
            }

            if !race.drivers.iter().any(|d| d.car_number == car_number_in) {
                return NotFoundSnafu { message: "Car number not found in race" }.fail();
            }

            race.start_time.unwrap_or(now_in)
        };

        let previous = Lap::for_car(state, race_id_in, car_number_in);
        let lap_number = previous.len() as i32 + 1;
        let lap_ms = match previous.last() {
            Some(last) => (now_in - last.timestamp).num_milliseconds(),
            None => (now_in - start_time).num_milliseconds(),
        };

        let lap = Lap {
            race_id: race_id_in,
            car_number: car_number_in,
            lap_number,
            lap_ms,
            timestamp: now_in,
        };

        state.laps.push(lap.clone());
        info!(
            target: "models/lap:register",
            "lap {} for car #{} in race {} ({} ms)",
            lap.lap_number, lap.car_number, lap.race_id, lap.lap_ms
        );

        Ok(lap)
    }

    /************ GETTERS ************/

    /// # laps driven by one car in one race
    /// ordered by lap number ascending. Appends preserve that order, so
    /// this is a plain filter over the ledger.
    pub fn for_car(state: &TrackState, race_id_in: i64, car_number_in: i32) -> Vec<&Lap> {
        state
            .laps
            .iter()
            .filter(|lap| lap.race_id == race_id_in && lap.car_number == car_number_in)
            .collect()
    }

    /// # all laps of a race
    pub fn for_race(state: &TrackState, race_id_in: i64) -> Vec<&Lap> {
        state
            .laps
            .iter()
            .filter(|lap| lap.race_id == race_id_in)
            .collect()
    }
}
