use chrono::Utc;
use rocket::serde::json::Json;
use rocket::{get, State};
use serde_json::Value;

use crate::errors::CustomResult;
use crate::modules::app_state::AppState;
use crate::modules::broadcast::BroadcastEvent;
use crate::modules::models::leaderboard::Leaderboard;
use crate::modules::models::race::{NextRaceInfo, PublicRace};

/**************************************************************************************************/
/**************** PUBLIC DISPLAY ROUTES ***********************************************************/
/**************************************************************************************************/

/// # get the next race
/// the lowest-id PLANNED race, or a placeholder when nothing is scheduled.
#[get("/public/next-race")]
pub async fn next_race(app: &State<AppState>) -> Json<NextRaceInfo> {
    Json(app.next_race_info().await)
}

#[get("/public/running-races")]
pub async fn running_races(app: &State<AppState>) -> Json<Vec<PublicRace>> {
    Json(app.running_races().await)
}

#[get("/public/available-races")]
pub async fn available_races(app: &State<AppState>) -> Json<Vec<PublicRace>> {
    Json(app.available_races().await)
}

/// # get the leaderboard of a race
/// an unknown or not-yet-started race yields an empty board rather than
/// an error so display consoles can poll without special cases.
#[get("/public/leaderboard/<race_id>")]
pub async fn leaderboard(race_id: i64, app: &State<AppState>) -> Json<Leaderboard> {
    Json(app.leaderboard(race_id, Utc::now()).await)
}

/// # get the current flag of a race
#[get("/public/flags/<race_id>")]
pub async fn flags(race_id: i64, app: &State<AppState>) -> CustomResult<Json<Value>> {
    let mode = app.race_flag(race_id).await?;
    Ok(Json(BroadcastEvent::FlagUpdated { race_id, mode }.payload()))
}

/// # get the countdown snapshot of a race
/// the same shape the live stream pushes, so a display that missed the
/// ticks can catch up with one request.
#[get("/public/countdown/<race_id>")]
pub async fn countdown(race_id: i64, app: &State<AppState>) -> CustomResult<Json<Value>> {
    let (remaining_seconds, is_running) = app.countdown_state(race_id, Utc::now()).await?;
    let event = BroadcastEvent::CountdownTick { race_id, remaining_seconds, is_running };
    Ok(Json(event.payload()))
}
