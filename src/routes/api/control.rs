use chrono::Utc;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{post, State};
use serde::Deserialize;

use crate::errors::CustomResult;
use crate::modules::app_state::AppState;
use crate::modules::helpers::guards::SafetyOfficialKey;

#[derive(Debug, Deserialize)]
pub struct ModeForm {
    pub mode: Option<String>,
}

/**************************************************************************************************/
/**************** RACE CONTROL ROUTES *************************************************************/
/**************************************************************************************************/

/// # start a planned race
/// the countdown begins immediately and the roster is frozen.
#[post("/control/<race_id>/start")]
pub async fn start(
    _key: SafetyOfficialKey,
    race_id: i64,
    app: &State<AppState>,
) -> CustomResult<Status> {
    app.start_race(race_id, Utc::now()).await?;
    Ok(Status::NoContent)
}

/// # finish a running race early
#[post("/control/<race_id>/finish")]
pub async fn finish(
    _key: SafetyOfficialKey,
    race_id: i64,
    app: &State<AppState>,
) -> CustomResult<Status> {
    app.finish_race(race_id, Utc::now()).await?;
    Ok(Status::NoContent)
}

/// # raise a different safety flag
#[post("/control/<race_id>/mode", data = "<mode>")]
pub async fn set_mode(
    _key: SafetyOfficialKey,
    race_id: i64,
    mode: Json<ModeForm>,
    app: &State<AppState>,
) -> CustomResult<Status> {
    app.set_mode(race_id, mode.mode.as_deref()).await?;
    Ok(Status::NoContent)
}

/// # close the session after a finish
/// flips the displays to DANGER so the drivers come in.
#[post("/control/<race_id>/end-session")]
pub async fn end_session(
    _key: SafetyOfficialKey,
    race_id: i64,
    app: &State<AppState>,
) -> CustomResult<Status> {
    app.end_session(race_id).await?;
    Ok(Status::NoContent)
}
