use chrono::Utc;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{post, State};
use serde::Deserialize;

use crate::errors::CustomResult;
use crate::modules::app_state::AppState;
use crate::modules::helpers::guards::LapObserverKey;
use crate::modules::models::lap::Lap;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LapForm {
    pub race_id: Option<i64>,
    pub car_number: Option<i32>,
}

/**************************************************************************************************/
/**************** LAP LINE ROUTES *****************************************************************/
/**************************************************************************************************/

/// # register a lap crossing
/// accepted with 202: the press is recorded and the new standings go out
/// to the viewers. A missing race or car reads as unknown, the same as a
/// wrong one.
#[post("/laps", data = "<lap>")]
pub async fn register(
    _key: LapObserverKey,
    lap: Json<LapForm>,
    app: &State<AppState>,
) -> CustomResult<(Status, Json<Lap>)> {
    let form = lap.into_inner();

    // absent fields take the same lookup path as unknown ids: no race
    // ever has id 0 and no roster admits car 0
    let race_id = form.race_id.unwrap_or(0);
    let car_number = form.car_number.unwrap_or(0);

    let lap = app.register_lap(race_id, car_number, Utc::now()).await?;
    Ok((Status::Accepted, Json(lap)))
}
