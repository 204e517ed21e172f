use log::debug;
use serde_json::{json, Value};
use tokio::sync::broadcast::{self, Receiver, Sender};

use crate::modules::models::lap::Lap;
use crate::modules::models::leaderboard::Leaderboard;
use crate::modules::models::race::{NextRaceInfo, Race, RaceMode};

/// Events kept for a viewer that is slow to drain its stream; older
/// ones are dropped and the stream route skips over the gap.
const EVENT_BUFFER: usize = 64;

/// Everything the server pushes to connected viewers. Each variant maps
/// to one named wire event; every viewer receives every event and
/// filters by race id on its own side.
#[derive(Debug, Clone, PartialEq)]
pub enum BroadcastEvent {
    RaceUpdated(Race),
    RaceDeleted { race_id: i64 },
    NextRaceChanged(NextRaceInfo),
    LeaderboardUpdated(Leaderboard),
    CountdownTick { race_id: i64, remaining_seconds: i64, is_running: bool },
    FlagUpdated { race_id: i64, mode: RaceMode },
    LapRegistered(Lap),
}

impl BroadcastEvent {
    /// The event name viewers subscribe on.
    pub fn name(&self) -> &'static str {
        match self {
            BroadcastEvent::RaceUpdated(_) | BroadcastEvent::RaceDeleted { .. } => "race-updated",
            BroadcastEvent::NextRaceChanged(_) => "next-race-changed",
            BroadcastEvent::LeaderboardUpdated(_) => "leaderboard-updated",
            BroadcastEvent::CountdownTick { .. } => "countdown-tick",
            BroadcastEvent::FlagUpdated { .. } => "flag-updated",
            BroadcastEvent::LapRegistered(_) => "lap-registered",
        }
    }

    /// The JSON body sent with the event.
    pub fn payload(&self) -> Value {
        match self {
            BroadcastEvent::RaceUpdated(race) => json!(race),
            BroadcastEvent::RaceDeleted { race_id } => json!({ "id": race_id, "deleted": true }),
            BroadcastEvent::NextRaceChanged(info) => json!(info),
            BroadcastEvent::LeaderboardUpdated(board) => json!(board),
            BroadcastEvent::CountdownTick { race_id, remaining_seconds, is_running } => json!({
                "raceId": race_id,
                "remainingSeconds": remaining_seconds,
                "isRunning": is_running,
            }),
            BroadcastEvent::FlagUpdated { race_id, mode } => json!({
                "raceId": race_id,
                "mode": mode,
            }),
            BroadcastEvent::LapRegistered(lap) => json!({
                "raceId": lap.race_id,
                "lap": lap,
            }),
        }
    }
}

/// Fan-out point for all server pushes. One channel feeds every
/// connected viewer; subscriptions are handed out per stream request.
pub struct BroadcastHub {
    sender: Sender<BroadcastEvent>,
}

impl BroadcastHub {
    pub fn new() -> BroadcastHub {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        BroadcastHub { sender }
    }

    /// # subscribe a new viewer
    /// the receiver only sees events published after this call; current
    /// state is pulled through the snapshot endpoints instead.
    pub fn subscribe(&self) -> Receiver<BroadcastEvent> {
        self.sender.subscribe()
    }

    /// # publish an event to all viewers
    /// sending with zero viewers connected is not an error, the event is
    /// simply gone.
    pub fn publish(&self, event: BroadcastEvent) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(viewers) => {
                debug!(target: "broadcast:publish", "{} -> {} viewer(s)", name, viewers)
            }
            Err(_) => debug!(target: "broadcast:publish", "{} -> no viewers", name),
        }
    }

    pub fn viewer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        BroadcastHub::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_the_wire_protocol() {
        let tick = BroadcastEvent::CountdownTick {
            race_id: 1,
            remaining_seconds: 599,
            is_running: true,
        };
        let flag = BroadcastEvent::FlagUpdated { race_id: 1, mode: RaceMode::Caution };
        let deleted = BroadcastEvent::RaceDeleted { race_id: 3 };

        assert_eq!(tick.name(), "countdown-tick");
        assert_eq!(flag.name(), "flag-updated");
        assert_eq!(deleted.name(), "race-updated");
    }

    #[test]
    fn deletion_marker_carries_id_and_flag() {
        let payload = BroadcastEvent::RaceDeleted { race_id: 3 }.payload();

        assert_eq!(payload, json!({ "id": 3, "deleted": true }));
    }

    #[test]
    fn countdown_payload_uses_wire_field_names() {
        let payload = BroadcastEvent::CountdownTick {
            race_id: 2,
            remaining_seconds: 0,
            is_running: false,
        }
        .payload();

        assert_eq!(payload["raceId"], 2);
        assert_eq!(payload["remainingSeconds"], 0);
        assert_eq!(payload["isRunning"], false);
    }

    #[test]
    fn publishing_without_viewers_is_silent() {
        let hub = BroadcastHub::new();

        assert_eq!(hub.viewer_count(), 0);
        hub.publish(BroadcastEvent::RaceDeleted { race_id: 1 });
    }

    #[tokio::test]
    async fn viewers_receive_published_events() {
        let hub = BroadcastHub::new();
        let mut viewer = hub.subscribe();

        let event = BroadcastEvent::FlagUpdated { race_id: 4, mode: RaceMode::Danger };
        hub.publish(event.clone());

        assert_eq!(viewer.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn late_viewers_only_see_later_events() {
        let hub = BroadcastHub::new();
        hub.publish(BroadcastEvent::RaceDeleted { race_id: 1 });

        let mut viewer = hub.subscribe();
        hub.publish(BroadcastEvent::RaceDeleted { race_id: 2 });

        assert_eq!(
            viewer.recv().await.unwrap(),
            BroadcastEvent::RaceDeleted { race_id: 2 }
        );
        assert!(viewer.try_recv().is_err());
    }
}
