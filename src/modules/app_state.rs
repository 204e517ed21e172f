use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use tokio::sync::broadcast::Receiver;
use tokio::sync::RwLock;
use tokio::time::{self, Duration};

use crate::config::AppConfig;
use crate::errors::CustomResult;
use crate::modules::broadcast::{BroadcastEvent, BroadcastHub};
use crate::modules::models::general::TrackState;
use crate::modules::models::lap::Lap;
use crate::modules::models::leaderboard::Leaderboard;
use crate::modules::models::race::{
    DriverEntry, NextRaceInfo, PublicRace, Race, RaceMode, RaceStatus,
};
use crate::modules::scheduler::CountdownScheduler;
use crate::modules::store::{DurableStore, JsonFileStore};

/// What one countdown tick did to its race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still running; carries the announced remaining seconds.
    Running(i64),
    /// The clock hit zero and the race was finished by this tick.
    Finished,
    /// The race is gone or no longer RUNNING; nothing was announced.
    Stopped,
}

/// The one shared handle behind every route and timer task. Owns the
/// track state, the broadcast hub, the durable store and the countdown
/// scheduler, and wires each mutation to its events and its snapshot
/// write.
///
/// Every mutation takes the write guard, runs to completion and captures
/// its broadcast payloads before the guard drops, so operations are
/// atomic relative to each other and viewers never observe torn state.
#[derive(Clone)]
pub struct AppState {
    track: Arc<RwLock<TrackState>>,
    hub: Arc<BroadcastHub>,
    store: Arc<dyn DurableStore>,
    scheduler: CountdownScheduler,
    pub default_duration_sec: i64,
}

impl AppState {
    /**************** STARTUP ****************/

    /// # bring up the state from the configured data directory
    pub fn initialize(config: &AppConfig) -> CustomResult<AppState> {
        AppState::with_store(
            Arc::new(JsonFileStore::new(config.data_dir.clone())),
            config.default_duration_sec,
        )
    }

    /// # bring up the state from a specific store
    /// loads the persisted snapshot (if any) and reconciles races that
    /// ran out while the server was down. A corrupt store aborts startup;
    /// a missing one means first boot.
    pub fn with_store(
        store: Arc<dyn DurableStore>,
        default_duration_sec: i64,
    ) -> CustomResult<AppState> {
        let mut state = match store.load()? {
            Some(snapshot) => TrackState::from_snapshot(snapshot),
            None => {
                info!(target: "state:initialize", "no saved snapshot, starting fresh");
                TrackState::new()
            }
        };

        let overdue = reconcile_overdue(&mut state, Utc::now());
        if overdue > 0 {
            // write the reconciled snapshot back before serving anything
            if let Err(save_error) = store.save(&state.snapshot()) {
                error!(
                    target: "state:initialize",
                    "could not persist reconciled snapshot: {}", save_error
                );
            }
        }

        Ok(AppState {
            track: Arc::new(RwLock::new(state)),
            hub: Arc::new(BroadcastHub::new()),
            store,
            scheduler: CountdownScheduler::new(),
            default_duration_sec,
        })
    }

    /// # resume countdowns for races still running
    /// called once on launch, after reconciliation: every race persisted
    /// as RUNNING with time left gets its timer back.
    pub async fn resume_running_races(&self) {
        let running: Vec<i64> = {
            let track = self.track.read().await;
            track
                .races
                .iter()
                .filter(|r| r.status == RaceStatus::Running)
                .map(|r| r.id)
                .collect()
        };

        for race_id in running {
            info!(target: "state:resume", "resuming countdown for race {}", race_id);
            self.schedule_countdown(race_id);
        }
    }

    /**************** RACE LIFECYCLE ****************/

    pub async fn create_race(&self, name: Option<&str>) -> CustomResult<Race> {
        let mut track = self.track.write().await;
        let race = Race::create(&mut track, name, self.default_duration_sec)?;

        self.hub.publish(BroadcastEvent::RaceUpdated(race.clone()));
        self.hub
            .publish(BroadcastEvent::NextRaceChanged(Race::next_planned_info(&track)));
        self.persist(&track);

        Ok(race)
    }

    pub async fn delete_race(&self, race_id: i64) -> CustomResult<()> {
        let mut track = self.track.write().await;
        Race::delete(&mut track, race_id)?;

        self.hub.publish(BroadcastEvent::RaceDeleted { race_id });
        self.hub
            .publish(BroadcastEvent::NextRaceChanged(Race::next_planned_info(&track)));
        self.persist(&track);

        Ok(())
    }

    /// # start a race and its countdown
    /// the full clock is announced here, before the timer's first tick a
    /// second later.
    pub async fn start_race(&self, race_id: i64, now: DateTime<Utc>) -> CustomResult<Race> {
        let race = {
            let mut track = self.track.write().await;
            let race = Race::start(&mut track, race_id, now)?;

            self.hub.publish(BroadcastEvent::RaceUpdated(race.clone()));
            self.hub
                .publish(BroadcastEvent::FlagUpdated { race_id, mode: race.mode });
            self.hub
                .publish(BroadcastEvent::NextRaceChanged(Race::next_planned_info(&track)));
            self.hub.publish(BroadcastEvent::CountdownTick {
                race_id,
                remaining_seconds: race.duration_sec,
                is_running: true,
            });
            self.persist(&track);
            race
        };

        self.schedule_countdown(race_id);

        Ok(race)
    }

    pub async fn finish_race(&self, race_id: i64, now: DateTime<Utc>) -> CustomResult<Race> {
        let mut track = self.track.write().await;
        let race = Race::finish(&mut track, race_id, now)?;
        self.scheduler.deschedule(race_id);

        self.hub.publish(BroadcastEvent::RaceUpdated(race.clone()));
        self.hub
            .publish(BroadcastEvent::FlagUpdated { race_id, mode: race.mode });
        self.hub.publish(BroadcastEvent::CountdownTick {
            race_id,
            remaining_seconds: 0,
            is_running: false,
        });
        self.hub
            .publish(BroadcastEvent::NextRaceChanged(Race::next_planned_info(&track)));
        self.persist(&track);

        Ok(race)
    }

    pub async fn set_mode(&self, race_id: i64, mode: Option<&str>) -> CustomResult<Race> {
        let mut track = self.track.write().await;
        let race = Race::set_mode(&mut track, race_id, mode)?;

        self.hub.publish(BroadcastEvent::RaceUpdated(race.clone()));
        self.hub
            .publish(BroadcastEvent::FlagUpdated { race_id, mode: race.mode });
        self.persist(&track);

        Ok(race)
    }

    pub async fn end_session(&self, race_id: i64) -> CustomResult<Race> {
        let mut track = self.track.write().await;
        let race = Race::end_session(&mut track, race_id)?;

        self.hub.publish(BroadcastEvent::RaceUpdated(race.clone()));
        self.hub
            .publish(BroadcastEvent::FlagUpdated { race_id, mode: race.mode });
        self.hub
            .publish(BroadcastEvent::NextRaceChanged(Race::next_planned_info(&track)));
        self.persist(&track);

        Ok(race)
    }

    /**************** ROSTER ****************/

    pub async fn add_driver(
        &self,
        race_id: i64,
        name: Option<&str>,
        car_number: Option<i32>,
    ) -> CustomResult<DriverEntry> {
        let mut track = self.track.write().await;
        let entry = Race::add_driver(&mut track, race_id, name, car_number)?;

        self.publish_roster_change(&track, race_id)?;
        self.persist(&track);

        Ok(entry)
    }

    pub async fn edit_driver(
        &self,
        race_id: i64,
        entry_id: i64,
        name: Option<&str>,
        car_number: Option<i32>,
    ) -> CustomResult<DriverEntry> {
        let mut track = self.track.write().await;
        let entry = Race::edit_driver(&mut track, race_id, entry_id, name, car_number)?;

        self.publish_roster_change(&track, race_id)?;
        self.persist(&track);

        Ok(entry)
    }

    pub async fn remove_driver(&self, race_id: i64, entry_id: i64) -> CustomResult<()> {
        let mut track = self.track.write().await;
        Race::remove_driver(&mut track, race_id, entry_id)?;

        self.publish_roster_change(&track, race_id)?;
        self.persist(&track);

        Ok(())
    }

    fn publish_roster_change(&self, track: &TrackState, race_id: i64) -> CustomResult<()> {
        let race = Race::find(track, race_id)?.clone();
        self.hub.publish(BroadcastEvent::RaceUpdated(race));
        self.hub
            .publish(BroadcastEvent::NextRaceChanged(Race::next_planned_info(track)));
        Ok(())
    }

    /**************** LAPS ****************/

    pub async fn register_lap(
        &self,
        race_id: i64,
        car_number: i32,
        now: DateTime<Utc>,
    ) -> CustomResult<Lap> {
        let mut track = self.track.write().await;
        let lap = Lap::register(&mut track, race_id, car_number, now)?;

        self.hub.publish(BroadcastEvent::LeaderboardUpdated(Leaderboard::compute(
            &track, race_id, now,
        )));
        self.hub.publish(BroadcastEvent::LapRegistered(lap.clone()));
        self.persist(&track);

        Ok(lap)
    }

    /**************** VIEWS ****************/

    pub async fn races_with_status(&self, status: Option<RaceStatus>) -> Vec<Race> {
        Race::with_status(&*self.track.read().await, status)
    }

    pub async fn next_race_info(&self) -> NextRaceInfo {
        Race::next_planned_info(&*self.track.read().await)
    }

    pub async fn running_races(&self) -> Vec<PublicRace> {
        Race::with_status(&*self.track.read().await, Some(RaceStatus::Running))
            .iter()
            .map(Race::to_public)
            .collect()
    }

    /// Races a spectator can still care about: on deck or on track.
    pub async fn available_races(&self) -> Vec<PublicRace> {
        self.track
            .read()
            .await
            .races
            .iter()
            .filter(|r| r.status != RaceStatus::Finished)
            .map(Race::to_public)
            .collect()
    }

    pub async fn leaderboard(&self, race_id: i64, now: DateTime<Utc>) -> Leaderboard {
        Leaderboard::compute(&*self.track.read().await, race_id, now)
    }

    pub async fn race_flag(&self, race_id: i64) -> CustomResult<RaceMode> {
        Ok(Race::find(&*self.track.read().await, race_id)?.mode)
    }

    /// Countdown snapshot for a late joiner: PLANNED races report their
    /// full allotted time, FINISHED ones a stopped zero.
    pub async fn countdown_state(
        &self,
        race_id: i64,
        now: DateTime<Utc>,
    ) -> CustomResult<(i64, bool)> {
        let track = self.track.read().await;
        let race = Race::find(&track, race_id)?;

        Ok(match race.status {
            RaceStatus::Planned => (race.duration_sec, false),
            RaceStatus::Running => (race.remaining_seconds(now), true),
            RaceStatus::Finished => (0, false),
        })
    }

    /// New live viewer; sees every event published from now on.
    pub fn subscribe(&self) -> Receiver<BroadcastEvent> {
        self.hub.subscribe()
    }

    /**************** COUNTDOWN ****************/

    /// # advance one race's countdown
    /// announces the remaining time while it lasts; the tick that finds
    /// the clock at zero applies the same transition as a manual finish
    /// and announces it exactly once. Later ticks see a FINISHED race and
    /// report `Stopped` so the timer loop can clear itself.
    pub async fn countdown_tick(&self, race_id: i64, now: DateTime<Utc>) -> TickOutcome {
        let mut track = self.track.write().await;

        let (status, remaining) = match Race::find(&track, race_id) {
            Ok(race) => (race.status, race.remaining_seconds(now)),
            Err(_) => return TickOutcome::Stopped,
        };

        if status != RaceStatus::Running {
            return TickOutcome::Stopped;
        }

        if remaining > 0 {
            self.hub.publish(BroadcastEvent::CountdownTick {
                race_id,
                remaining_seconds: remaining,
                is_running: true,
            });
            return TickOutcome::Running(remaining);
        }

        match Race::finish(&mut track, race_id, now) {
            Ok(race) => {
                info!(target: "state:countdown", "race {} ran out of time", race_id);
                self.hub.publish(BroadcastEvent::RaceUpdated(race.clone()));
                self.hub
                    .publish(BroadcastEvent::FlagUpdated { race_id, mode: race.mode });
                self.hub.publish(BroadcastEvent::CountdownTick {
                    race_id,
                    remaining_seconds: 0,
                    is_running: false,
                });
                self.persist(&track);
                TickOutcome::Finished
            }
            Err(finish_error) => {
                error!(
                    target: "state:countdown",
                    "auto-finish of race {} failed: {}", race_id, finish_error
                );
                TickOutcome::Stopped
            }
        }
    }

    fn schedule_countdown(&self, race_id: i64) {
        let app = self.clone();
        self.scheduler.schedule(race_id, async move {
            let mut ticker = time::interval(Duration::from_secs(1));
            // the immediate first tick is skipped; starting the race
            // already announced the full clock
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match app.countdown_tick(race_id, Utc::now()).await {
                    TickOutcome::Running(_) => {}
                    TickOutcome::Finished | TickOutcome::Stopped => {
                        app.scheduler.deschedule(race_id);
                        break;
                    }
                }
            }
        });
    }

    #[cfg(test)]
    fn countdown_active(&self, race_id: i64) -> bool {
        self.scheduler.is_scheduled(race_id)
    }

    /**************** PERSISTENCE ****************/

    /// Fire-and-forget snapshot write: captured under the lock, written
    /// on the blocking pool. A failed write is logged and never rolls
    /// back the in-memory transition.
    fn persist(&self, track: &TrackState) {
        let snapshot = track.snapshot();
        let store = self.store.clone();

        tokio::task::spawn_blocking(move || {
            if let Err(save_error) = store.save(&snapshot) {
                error!(target: "state:persist", "snapshot write failed: {}", save_error);
            }
        });
    }
}

/// Finish races whose clock fully ran out while the process was down.
/// Runs before the state is shared, so no events are published for it.
fn reconcile_overdue(state: &mut TrackState, now: DateTime<Utc>) -> usize {
    let overdue: Vec<i64> = state
        .races
        .iter()
        .filter(|r| r.status == RaceStatus::Running && r.remaining_seconds(now) == 0)
        .map(|r| r.id)
        .collect();

    for race_id in &overdue {
        match Race::finish(state, *race_id, now) {
            Ok(race) => warn!(
                target: "state:reconcile",
                "race {} ran out while the server was down, marked FINISHED", race.id
            ),
            Err(finish_error) => error!(
                target: "state:reconcile",
                "could not reconcile race {}: {}", race_id, finish_error
            ),
        }
    }

    overdue.len()
}
