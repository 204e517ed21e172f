use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::errors::{
    CapacitySnafu, ConflictSnafu, CustomResult, InvalidStateSnafu, NotFoundSnafu, ValidationSnafu,
};
use crate::modules::models::general::TrackState;

/// Hard roster limit per race, dictated by the number of karts on track.
pub const MAX_DRIVERS: usize = 8;

/// Lifecycle of a race. Transitions are strictly forward:
/// PLANNED -> RUNNING -> FINISHED, never backward and never skipping
/// RUNNING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RaceStatus {
    Planned,
    Running,
    Finished,
}

impl fmt::Display for RaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RaceStatus::Planned => write!(f, "PLANNED"),
            RaceStatus::Running => write!(f, "RUNNING"),
            RaceStatus::Finished => write!(f, "FINISHED"),
        }
    }
}

impl FromStr for RaceStatus {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PLANNED" => Ok(RaceStatus::Planned),
            "RUNNING" => Ok(RaceStatus::Running),
            "FINISHED" => Ok(RaceStatus::Finished),
            _ => Err(()),
        }
    }
}

/// The safety flag shown on the track displays. Free to change while a
/// race is RUNNING; forced to FINISHING when a race finishes and to
/// DANGER once the session is ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RaceMode {
    Safe,
    Caution,
    Danger,
    Finishing,
}

impl fmt::Display for RaceMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RaceMode::Safe => write!(f, "SAFE"),
            RaceMode::Caution => write!(f, "CAUTION"),
            RaceMode::Danger => write!(f, "DANGER"),
            RaceMode::Finishing => write!(f, "FINISHING"),
        }
    }
}

impl FromStr for RaceMode {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "SAFE" => Ok(RaceMode::Safe),
            "CAUTION" => Ok(RaceMode::Caution),
            "DANGER" => Ok(RaceMode::Danger),
            "FINISHING" => Ok(RaceMode::Finishing),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverEntry {
    pub id: i64,
    pub name: String,
    pub car_number: i32,
}

/// Roster projection for public displays: no entry ids leak out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub name: String,
    pub car_number: i32,
}

impl From<&DriverEntry> for RosterEntry {
    fn from(entry: &DriverEntry) -> RosterEntry {
        RosterEntry {
            name: entry.name.clone(),
            car_number: entry.car_number,
        }
    }
}

/// Public projection of a race for the uncredentialed endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicRace {
    pub id: i64,
    pub name: String,
    pub status: RaceStatus,
    pub mode: RaceMode,
    pub drivers: Vec<RosterEntry>,
}

/// What the "on deck" displays consume: the head of the PLANNED queue,
/// or an explicit empty marker when nothing is planned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextRaceInfo {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub drivers: Vec<RosterEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Race {
    pub id: i64,
    pub name: String,
    pub status: RaceStatus,
    pub mode: RaceMode,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_sec: i64,
    pub drivers: Vec<DriverEntry>,
}

impl Race {
    /**************** LIFECYCLE ****************/

    /// # create a new race
    /// register a new race in PLANNED state with an empty roster.
    ///
    /// ## Arguments
    /// * `state` - the shared track state
    /// * `name_in` - the operator supplied race name, trimmed before storage
    /// * `duration_sec_in` - the allotted session time, fixed for the
    ///   lifetime of the race
    ///
    /// ## Returns
    /// * `Race` - the created race
    pub fn create(
        state: &mut TrackState,
        name_in: Option<&str>,
        duration_sec_in: i64,
    ) -> CustomResult<Race> {
        let name = match name_in.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return ValidationSnafu { message: "Race name is required" }.fail(),
        };

        let race = Race {
            id: state.take_race_id(),
            name,
            status: RaceStatus::Planned,
            mode: RaceMode::Safe,
            start_time: None,
            end_time: None,
            duration_sec: duration_sec_in,
            drivers: Vec::new(),
        };

        state.races.push(race.clone());
        info!(target: "models/race:create", "created race {} ({})", race.id, race.name);

        Ok(race)
    }

    /// # delete a planned race
    /// remove a race that never ran, together with any laps referencing
    /// its id. RUNNING and FINISHED races are kept forever.
    pub fn delete(state: &mut TrackState, race_id_in: i64) -> CustomResult<()> {
        let index = match state.races.iter().position(|r| r.id == race_id_in) {
            Some(index) => index,
            None => return NotFoundSnafu { message: "Race not found" }.fail(),
        };

        if state.races[index].status != RaceStatus::Planned {
            return InvalidStateSnafu { message: "Can only delete PLANNED races" }.fail();
        }

        state.races.remove(index);
        state.laps.retain(|lap| lap.race_id != race_id_in);
        info!(target: "models/race:delete", "deleted race {}", race_id_in);

        Ok(())
    }

    /// # start a race
    /// move a PLANNED race with at least one driver to RUNNING and stamp
    /// its start time. The roster is frozen from here on.
    ///
    /// ## Arguments
    /// * `state` - the shared track state
    /// * `race_id_in` - the race to start
    /// * `now_in` - the wall-clock start time
    ///
    /// ## Returns
    /// * `Race` - the updated race
    pub fn start(
        state: &mut TrackState,
        race_id_in: i64,
        now_in: DateTime<Utc>,
    ) -> CustomResult<Race> {
        let race = Race::find_mut(state, race_id_in)?;

        if race.status != RaceStatus::Planned {
            return InvalidStateSnafu {
                message: "Race can only be started from PLANNED status",
            }
            .fail();
        }

        if race.drivers.is_empty() {
            return ValidationSnafu { message: "Race must have at least one driver" }.fail();
        }

        race.status = RaceStatus::Running;
        race.mode = RaceMode::Safe;
        race.start_time = Some(now_in);
        race.end_time = None;
        info!(target: "models/race:start", "race {} is now RUNNING", race.id);

        Ok(race.clone())
    }

    /// # change the safety flag
    /// only RUNNING races have a live flag; anything else is rejected.
    pub fn set_mode(
        state: &mut TrackState,
        race_id_in: i64,
        mode_in: Option<&str>,
    ) -> CustomResult<Race> {
        let race = Race::find_mut(state, race_id_in)?;

        if race.status != RaceStatus::Running {
            return InvalidStateSnafu {
                message: "Can only change mode for RUNNING races",
            }
            .fail();
        }

        let mode = match mode_in.and_then(|m| RaceMode::from_str(m).ok()) {
            Some(mode) => mode,
            None => {
                return ValidationSnafu {
                    message: "Invalid mode. Must be one of: SAFE, CAUTION, DANGER, FINISHING",
                }
                .fail()
            }
        };

        race.mode = mode;
        info!(target: "models/race:set_mode", "race {} flag changed to {}", race.id, race.mode);

        Ok(race.clone())
    }

    /// # finish a race
    /// move a RUNNING race to FINISHED, freeze the flag at FINISHING and
    /// stamp the end time. Used by the manual control action and by the
    /// countdown scheduler when the clock runs out.
    pub fn finish(
        state: &mut TrackState,
        race_id_in: i64,
        now_in: DateTime<Utc>,
    ) -> CustomResult<Race> {
        let race = Race::find_mut(state, race_id_in)?;

        if race.status != RaceStatus::Running {
            return InvalidStateSnafu {
                message: "Race can only be finished from RUNNING status",
            }
            .fail();
        }

        race.status = RaceStatus::Finished;
        race.mode = RaceMode::Finishing;
        race.end_time = Some(now_in);
        info!(target: "models/race:finish", "race {} is now FINISHED", race.id);

        Ok(race.clone())
    }

    /// # end the session
    /// terminal display transition after a finish: the flag goes to
    /// DANGER so the track screens tell everyone to come in. No further
    /// effect on the data.
    pub fn end_session(state: &mut TrackState, race_id_in: i64) -> CustomResult<Race> {
        let race = Race::find_mut(state, race_id_in)?;

        if race.status != RaceStatus::Finished || race.mode != RaceMode::Finishing {
            return InvalidStateSnafu {
                message: "Can only end the session of a FINISHED race in FINISHING mode",
            }
            .fail();
        }

        race.mode = RaceMode::Danger;
        info!(target: "models/race:end_session", "race {} session ended", race.id);

        Ok(race.clone())
    }

    /**************** ROSTER ****************/

    /// # add a driver to a planned race
    /// failure precedence: unknown race, race not PLANNED, roster full,
    /// invalid name/car number, duplicate name, duplicate car number.
    ///
    /// ## Arguments
    /// * `state` - the shared track state
    /// * `race_id_in` - the race to extend
    /// * `name_in` - driver name, unique per race ignoring case
    /// * `car_number_in` - car number >= 1, unique per race
    ///
    /// ## Returns
    /// * `DriverEntry` - the stored entry with its assigned id
    pub fn add_driver(
        state: &mut TrackState,
        race_id_in: i64,
        name_in: Option<&str>,
        car_number_in: Option<i32>,
    ) -> CustomResult<DriverEntry> {
        {
            let race = Race::find(state, race_id_in)?;

            if race.status != RaceStatus::Planned {
                return InvalidStateSnafu {
                    message: "Can only add drivers to PLANNED races",
                }
                .fail();
            }

            if race.drivers.len() >= MAX_DRIVERS {
                return CapacitySnafu {
                    message: format!(
                        "Maximum of {} drivers can be registered per race",
                        MAX_DRIVERS
                    ),
                }
                .fail();
            }

            Race::validate_roster_entry(race, None, name_in, car_number_in)?;
        }

        let (name, car_number) = Race::normalized_entry(name_in, car_number_in);
        let entry = DriverEntry {
            id: state.take_entry_id(),
            name,
            car_number,
        };

        let race = Race::find_mut(state, race_id_in)?;
        race.drivers.push(entry.clone());
        info!(
            target: "models/race:add_driver",
            "added driver {} (car #{}) to race {}",
            entry.name, entry.car_number, race_id_in
        );

        Ok(entry)
    }

    /// # edit a roster entry
    /// same validations as adding, with the entry itself excluded from
    /// the uniqueness checks.
    pub fn edit_driver(
        state: &mut TrackState,
        race_id_in: i64,
        entry_id_in: i64,
        name_in: Option<&str>,
        car_number_in: Option<i32>,
    ) -> CustomResult<DriverEntry> {
        {
            let race = Race::find(state, race_id_in)?;

            if race.status != RaceStatus::Planned {
                return InvalidStateSnafu {
                    message: "Can only edit drivers in PLANNED races",
                }
                .fail();
            }

            if !race.drivers.iter().any(|d| d.id == entry_id_in) {
                return NotFoundSnafu { message: "Driver entry not found" }.fail();
            }

            Race::validate_roster_entry(race, Some(entry_id_in), name_in, car_number_in)?;
        }

        let (name, car_number) = Race::normalized_entry(name_in, car_number_in);
        let race = Race::find_mut(state, race_id_in)?;
        let entry = race
            .drivers
            .iter_mut()
            .find(|d| d.id == entry_id_in)
            .ok_or_else(|| NotFoundSnafu { message: "Driver entry not found" }.build())?;

        entry.name = name;
        entry.car_number = car_number;

        Ok(entry.clone())
    }

    /// # remove a roster entry
    pub fn remove_driver(
        state: &mut TrackState,
        race_id_in: i64,
        entry_id_in: i64,
    ) -> CustomResult<()> {
        let race = Race::find_mut(state, race_id_in)?;

        if race.status != RaceStatus::Planned {
            return InvalidStateSnafu {
                message: "Can only remove drivers from PLANNED races",
            }
            .fail();
        }

        let index = match race.drivers.iter().position(|d| d.id == entry_id_in) {
            Some(index) => index,
            None => return NotFoundSnafu { message: "Driver entry not found" }.fail(),
        };

        race.drivers.remove(index);

        Ok(())
    }

    /// validate name and car number against a race's current roster.
    /// `exclude_entry_in` skips one entry id so edits do not collide with
    /// themselves. A name collision anywhere in the roster is reported
    /// before any car number collision.
    fn validate_roster_entry(
        race: &Race,
        exclude_entry_in: Option<i64>,
        name_in: Option<&str>,
        car_number_in: Option<i32>,
    ) -> CustomResult<()> {
        let name = match name_in.map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => return ValidationSnafu { message: "Driver name is required" }.fail(),
        };

        let car_number = match car_number_in {
            Some(car_number) => car_number,
            None => return ValidationSnafu { message: "Car number is required" }.fail(),
        };

        if car_number < 1 {
            return ValidationSnafu { message: "Car number must be 1 or higher" }.fail();
        }

        let name_taken = race
            .drivers
            .iter()
            .filter(|d| exclude_entry_in != Some(d.id))
            .any(|d| d.name.to_lowercase() == name.to_lowercase());
        if name_taken {
            return ConflictSnafu { message: "Driver name must be unique" }.fail();
        }

        let car_taken = race
            .drivers
            .iter()
            .filter(|d| exclude_entry_in != Some(d.id))
            .any(|d| d.car_number == car_number);
        if car_taken {
            return ConflictSnafu { message: "Car number must be unique" }.fail();
        }

        Ok(())
    }

    /// trimmed name and car number, only valid after
    /// `validate_roster_entry` accepted the same inputs.
    fn normalized_entry(name_in: Option<&str>, car_number_in: Option<i32>) -> (String, i32) {
        (
            name_in.unwrap_or_default().trim().to_string(),
            car_number_in.unwrap_or_default(),
        )
    }

    /**************** GETTERS ****************/

    /// # find a race by id
    pub fn find(state: &TrackState, race_id_in: i64) -> CustomResult<&Race> {
        state
            .races
            .iter()
            .find(|r| r.id == race_id_in)
            .ok_or_else(|| NotFoundSnafu { message: "Race not found" }.build())
    }

    fn find_mut(state: &mut TrackState, race_id_in: i64) -> CustomResult<&mut Race> {
        state
            .races
            .iter_mut()
            .find(|r| r.id == race_id_in)
            .ok_or_else(|| NotFoundSnafu { message: "Race not found" }.build())
    }

    /// # the race next on deck
    /// the PLANNED race with the lowest id; ascending id is the sole
    /// ordering key of the queue.
    pub fn next_planned(state: &TrackState) -> Option<&Race> {
        state
            .races
            .iter()
            .filter(|r| r.status == RaceStatus::Planned)
            .min_by_key(|r| r.id)
    }

    /// head-of-queue projection for displays and the next-race broadcast.
    pub fn next_planned_info(state: &TrackState) -> NextRaceInfo {
        match Race::next_planned(state) {
            Some(race) => NextRaceInfo {
                id: Some(race.id),
                name: Some(race.name.clone()),
                drivers: race.drivers.iter().map(RosterEntry::from).collect(),
                message: None,
            },
            None => NextRaceInfo {
                id: None,
                name: None,
                drivers: Vec::new(),
                message: Some("No upcoming races".to_string()),
            },
        }
    }

    /// # list races, optionally filtered by status
    pub fn with_status(state: &TrackState, status_in: Option<RaceStatus>) -> Vec<Race> {
        state
            .races
            .iter()
            .filter(|r| status_in.map_or(true, |status| r.status == status))
            .cloned()
            .collect()
    }

    pub fn to_public(&self) -> PublicRace {
        PublicRace {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            mode: self.mode,
            drivers: self.drivers.iter().map(RosterEntry::from).collect(),
        }
    }

    /**************** UTILS ****************/

    /// # seconds left on the clock
    /// floor of the remaining time, clamped at zero. A race that has not
    /// started yet still has its full allotted time.
    pub fn remaining_seconds(&self, now_in: DateTime<Utc>) -> i64 {
        let start = match self.start_time {
            Some(start) => start,
            None => return self.duration_sec,
        };

        let elapsed_ms = (now_in - start).num_milliseconds();
        let remaining_ms = self.duration_sec * 1000 - elapsed_ms;
        (remaining_ms / 1000).max(0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::errors::Error;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn planned_race_with_driver(state: &mut TrackState) -> i64 {
        let race = Race::create(state, Some("GP1"), 600).unwrap();
        Race::add_driver(state, race.id, Some("Alice"), Some(7)).unwrap();
        race.id
    }

    #[test]
    fn create_assigns_ids_and_defaults() {
        let mut state = TrackState::new();

        let first = Race::create(&mut state, Some("Morning Heat"), 600).unwrap();
        let second = Race::create(&mut state, Some("Afternoon Heat"), 600).unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.status, RaceStatus::Planned);
        assert_eq!(first.mode, RaceMode::Safe);
        assert_eq!(first.duration_sec, 600);
        assert!(first.start_time.is_none());
        assert!(first.drivers.is_empty());
    }

    #[test]
    fn create_trims_and_rejects_blank_names() {
        let mut state = TrackState::new();

        let race = Race::create(&mut state, Some("  GP1  "), 600).unwrap();
        assert_eq!(race.name, "GP1");

        assert!(matches!(
            Race::create(&mut state, Some("   "), 600),
            Err(Error::ValidationError { .. })
        ));
        assert!(matches!(
            Race::create(&mut state, None, 600),
            Err(Error::ValidationError { .. })
        ));
    }

    #[test]
    fn lifecycle_runs_forward_only() {
        let mut state = TrackState::new();
        let race_id = planned_race_with_driver(&mut state);

        let started = Race::start(&mut state, race_id, t0()).unwrap();
        assert_eq!(started.status, RaceStatus::Running);
        assert_eq!(started.mode, RaceMode::Safe);
        assert_eq!(started.start_time, Some(t0()));
        assert!(started.end_time.is_none());

        // a second start must not reset the clock
        assert!(matches!(
            Race::start(&mut state, race_id, t0() + Duration::seconds(5)),
            Err(Error::InvalidStateError { .. })
        ));

        let finished = Race::finish(&mut state, race_id, t0() + Duration::seconds(90)).unwrap();
        assert_eq!(finished.status, RaceStatus::Finished);
        assert_eq!(finished.mode, RaceMode::Finishing);
        assert_eq!(finished.end_time, Some(t0() + Duration::seconds(90)));

        assert!(matches!(
            Race::finish(&mut state, race_id, t0()),
            Err(Error::InvalidStateError { .. })
        ));

        let ended = Race::end_session(&mut state, race_id).unwrap();
        assert_eq!(ended.status, RaceStatus::Finished);
        assert_eq!(ended.mode, RaceMode::Danger);

        // session end is terminal
        assert!(matches!(
            Race::end_session(&mut state, race_id),
            Err(Error::InvalidStateError { .. })
        ));
    }

    #[test]
    fn start_skips_are_rejected() {
        let mut state = TrackState::new();
        let race = Race::create(&mut state, Some("GP1"), 600).unwrap();

        // cannot finish a race that never ran
        assert!(matches!(
            Race::finish(&mut state, race.id, t0()),
            Err(Error::InvalidStateError { .. })
        ));
        // cannot end a session before the finish
        assert!(matches!(
            Race::end_session(&mut state, race.id),
            Err(Error::InvalidStateError { .. })
        ));
    }

    #[test]
    fn start_requires_at_least_one_driver() {
        let mut state = TrackState::new();
        let race = Race::create(&mut state, Some("GP1"), 600).unwrap();

        assert!(matches!(
            Race::start(&mut state, race.id, t0()),
            Err(Error::ValidationError { .. })
        ));
    }

    #[test]
    fn mode_changes_only_while_running() {
        let mut state = TrackState::new();
        let race_id = planned_race_with_driver(&mut state);

        assert!(matches!(
            Race::set_mode(&mut state, race_id, Some("CAUTION")),
            Err(Error::InvalidStateError { .. })
        ));

        Race::start(&mut state, race_id, t0()).unwrap();

        let updated = Race::set_mode(&mut state, race_id, Some("DANGER")).unwrap();
        assert_eq!(updated.mode, RaceMode::Danger);

        assert!(matches!(
            Race::set_mode(&mut state, race_id, Some("PURPLE")),
            Err(Error::ValidationError { .. })
        ));
        assert!(matches!(
            Race::set_mode(&mut state, race_id, None),
            Err(Error::ValidationError { .. })
        ));

        Race::finish(&mut state, race_id, t0() + Duration::seconds(10)).unwrap();
        assert!(matches!(
            Race::set_mode(&mut state, race_id, Some("SAFE")),
            Err(Error::InvalidStateError { .. })
        ));
    }

    #[test]
    fn roster_is_capped_at_eight() {
        let mut state = TrackState::new();
        let race = Race::create(&mut state, Some("GP1"), 600).unwrap();

        for i in 1..=MAX_DRIVERS as i32 {
            Race::add_driver(&mut state, race.id, Some(&format!("Driver {}", i)), Some(i))
                .unwrap();
        }

        let result = Race::add_driver(&mut state, race.id, Some("Driver 9"), Some(9));
        assert!(matches!(result, Err(Error::CapacityError { .. })));

        // the capacity check fires before any field validation
        let result = Race::add_driver(&mut state, race.id, Some("   "), None);
        assert!(matches!(result, Err(Error::CapacityError { .. })));

        assert_eq!(Race::find(&state, race.id).unwrap().drivers.len(), MAX_DRIVERS);
    }

    #[test]
    fn duplicate_names_and_cars_are_conflicts() {
        let mut state = TrackState::new();
        let race = Race::create(&mut state, Some("GP1"), 600).unwrap();
        Race::add_driver(&mut state, race.id, Some("Alice"), Some(7)).unwrap();

        assert!(matches!(
            Race::add_driver(&mut state, race.id, Some("  alice "), Some(8)),
            Err(Error::ConflictError { .. })
        ));
        assert!(matches!(
            Race::add_driver(&mut state, race.id, Some("Bob"), Some(7)),
            Err(Error::ConflictError { .. })
        ));

        // the roster is untouched after a rejected add
        assert_eq!(Race::find(&state, race.id).unwrap().drivers.len(), 1);
    }

    #[test]
    fn name_conflicts_are_reported_before_car_conflicts() {
        let mut state = TrackState::new();
        let race = Race::create(&mut state, Some("GP1"), 600).unwrap();
        Race::add_driver(&mut state, race.id, Some("Alice"), Some(7)).unwrap();
        Race::add_driver(&mut state, race.id, Some("Bob"), Some(8)).unwrap();

        // collides with Alice's car and Bob's name; the name wins
        let result = Race::add_driver(&mut state, race.id, Some("Bob"), Some(7));
        assert_eq!(result.unwrap_err().to_string(), "Driver name must be unique");
    }

    #[test]
    fn car_numbers_must_be_positive() {
        let mut state = TrackState::new();
        let race = Race::create(&mut state, Some("GP1"), 600).unwrap();

        assert!(matches!(
            Race::add_driver(&mut state, race.id, Some("Alice"), None),
            Err(Error::ValidationError { .. })
        ));
        assert!(matches!(
            Race::add_driver(&mut state, race.id, Some("Alice"), Some(0)),
            Err(Error::ValidationError { .. })
        ));
        assert!(matches!(
            Race::add_driver(&mut state, race.id, Some("Alice"), Some(-4)),
            Err(Error::ValidationError { .. })
        ));
    }

    #[test]
    fn edit_excludes_the_entry_itself_from_uniqueness() {
        let mut state = TrackState::new();
        let race = Race::create(&mut state, Some("GP1"), 600).unwrap();
        let alice = Race::add_driver(&mut state, race.id, Some("Alice"), Some(7)).unwrap();
        Race::add_driver(&mut state, race.id, Some("Bob"), Some(8)).unwrap();

        // keeping your own name and car is not a conflict
        let updated =
            Race::edit_driver(&mut state, race.id, alice.id, Some("Alice"), Some(7)).unwrap();
        assert_eq!(updated.car_number, 7);

        // taking Bob's car is
        assert!(matches!(
            Race::edit_driver(&mut state, race.id, alice.id, Some("Alice"), Some(8)),
            Err(Error::ConflictError { .. })
        ));

        assert!(matches!(
            Race::edit_driver(&mut state, race.id, 999, Some("Carol"), Some(9)),
            Err(Error::NotFoundError { .. })
        ));
    }

    #[test]
    fn remove_driver_shrinks_the_roster() {
        let mut state = TrackState::new();
        let race = Race::create(&mut state, Some("GP1"), 600).unwrap();
        let alice = Race::add_driver(&mut state, race.id, Some("Alice"), Some(7)).unwrap();

        Race::remove_driver(&mut state, race.id, alice.id).unwrap();
        assert!(Race::find(&state, race.id).unwrap().drivers.is_empty());

        assert!(matches!(
            Race::remove_driver(&mut state, race.id, alice.id),
            Err(Error::NotFoundError { .. })
        ));
    }

    #[test]
    fn roster_is_frozen_once_running() {
        let mut state = TrackState::new();
        let race_id = planned_race_with_driver(&mut state);
        let entry_id = Race::find(&state, race_id).unwrap().drivers[0].id;
        Race::start(&mut state, race_id, t0()).unwrap();

        assert!(matches!(
            Race::add_driver(&mut state, race_id, Some("Bob"), Some(8)),
            Err(Error::InvalidStateError { .. })
        ));
        assert!(matches!(
            Race::edit_driver(&mut state, race_id, entry_id, Some("Alicia"), Some(7)),
            Err(Error::InvalidStateError { .. })
        ));
        assert!(matches!(
            Race::remove_driver(&mut state, race_id, entry_id),
            Err(Error::InvalidStateError { .. })
        ));
        assert_eq!(Race::find(&state, race_id).unwrap().drivers.len(), 1);
    }

    #[test]
    fn delete_is_limited_to_planned_races() {
        let mut state = TrackState::new();
        let race_id = planned_race_with_driver(&mut state);
        Race::start(&mut state, race_id, t0()).unwrap();
        crate::modules::models::lap::Lap::register(
            &mut state,
            race_id,
            7,
            t0() + Duration::seconds(61),
        )
        .unwrap();

        assert!(matches!(
            Race::delete(&mut state, race_id),
            Err(Error::InvalidStateError { .. })
        ));
        assert!(Race::find(&state, race_id).is_ok());
        assert_eq!(state.laps.len(), 1);

        assert!(matches!(
            Race::delete(&mut state, 999),
            Err(Error::NotFoundError { .. })
        ));
    }

    #[test]
    fn next_planned_is_the_lowest_id() {
        let mut state = TrackState::new();
        let first = Race::create(&mut state, Some("First"), 600).unwrap();
        let second = Race::create(&mut state, Some("Second"), 600).unwrap();
        Race::create(&mut state, Some("Third"), 600).unwrap();

        assert_eq!(Race::next_planned(&state).unwrap().id, first.id);

        Race::delete(&mut state, first.id).unwrap();
        assert_eq!(Race::next_planned(&state).unwrap().id, second.id);

        Race::add_driver(&mut state, second.id, Some("Alice"), Some(7)).unwrap();
        Race::start(&mut state, second.id, t0()).unwrap();
        let info = Race::next_planned_info(&state);
        assert_eq!(info.name.as_deref(), Some("Third"));
        assert!(info.message.is_none());
    }

    #[test]
    fn next_planned_info_reports_an_empty_queue() {
        let state = TrackState::new();
        let info = Race::next_planned_info(&state);

        assert!(info.id.is_none());
        assert!(info.drivers.is_empty());
        assert_eq!(info.message.as_deref(), Some("No upcoming races"));
    }

    #[test]
    fn remaining_seconds_floors_and_clamps() {
        let mut state = TrackState::new();
        let race_id = planned_race_with_driver(&mut state);
        Race::start(&mut state, race_id, t0()).unwrap();
        let race = Race::find(&state, race_id).unwrap();

        assert_eq!(race.remaining_seconds(t0()), 600);
        assert_eq!(race.remaining_seconds(t0() + Duration::milliseconds(1500)), 598);
        assert_eq!(race.remaining_seconds(t0() + Duration::seconds(600)), 0);
        assert_eq!(race.remaining_seconds(t0() + Duration::seconds(605)), 0);
    }

    #[test]
    fn public_projection_hides_entry_ids() {
        let mut state = TrackState::new();
        let race_id = planned_race_with_driver(&mut state);
        let public = Race::find(&state, race_id).unwrap().to_public();

        assert_eq!(public.drivers.len(), 1);
        assert_eq!(public.drivers[0].name, "Alice");
        assert_eq!(public.drivers[0].car_number, 7);

        let as_json = serde_json::to_value(&public).unwrap();
        assert!(as_json["drivers"][0].get("id").is_none());
        assert_eq!(as_json["drivers"][0]["carNumber"], 7);
    }
}
