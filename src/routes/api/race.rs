use std::str::FromStr;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{delete, get, post, put, State};
use serde::Deserialize;

use crate::errors::{CustomResult, ValidationSnafu};
use crate::modules::app_state::AppState;
use crate::modules::helpers::guards::FrontDeskKey;
use crate::modules::models::race::{DriverEntry, Race, RaceStatus};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceForm {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverForm {
    pub name: Option<String>,
    pub car_number: Option<i32>,
}

/**************************************************************************************************/
/**************** FRONT DESK ROUTES ***************************************************************/
/**************************************************************************************************/

/***** RACES *****/

/// # plan a new race
#[post("/races", data = "<race>")]
pub async fn create(
    _key: FrontDeskKey,
    race: Json<RaceForm>,
    app: &State<AppState>,
) -> CustomResult<(Status, Json<Race>)> {
    let created = app.create_race(race.name.as_deref()).await?;
    Ok((Status::Created, Json(created)))
}

/// # list races, optionally filtered by status
#[get("/races?<status>")]
pub async fn list(
    _key: FrontDeskKey,
    status: Option<String>,
    app: &State<AppState>,
) -> CustomResult<Json<Vec<Race>>> {
    let filter = match status.as_deref() {
        Some(value) => match RaceStatus::from_str(value) {
            Ok(status) => Some(status),
            Err(_) => {
                return ValidationSnafu {
                    message: format!("Invalid status filter: {}", value),
                }
                .fail()
            }
        },
        None => None,
    };

    Ok(Json(app.races_with_status(filter).await))
}

#[delete("/races/<race_id>")]
pub async fn delete(
    _key: FrontDeskKey,
    race_id: i64,
    app: &State<AppState>,
) -> CustomResult<Status> {
    app.delete_race(race_id).await?;
    Ok(Status::NoContent)
}

/***** ROSTER *****/

#[post("/races/<race_id>/drivers", data = "<driver>")]
pub async fn add_driver(
    _key: FrontDeskKey,
    race_id: i64,
    driver: Json<DriverForm>,
    app: &State<AppState>,
) -> CustomResult<(Status, Json<DriverEntry>)> {
    let entry = app
        .add_driver(race_id, driver.name.as_deref(), driver.car_number)
        .await?;
    Ok((Status::Created, Json(entry)))
}

#[put("/races/<race_id>/drivers/<entry_id>", data = "<driver>")]
pub async fn edit_driver(
    _key: FrontDeskKey,
    race_id: i64,
    entry_id: i64,
    driver: Json<DriverForm>,
    app: &State<AppState>,
) -> CustomResult<Json<DriverEntry>> {
    let entry = app
        .edit_driver(race_id, entry_id, driver.name.as_deref(), driver.car_number)
        .await?;
    Ok(Json(entry))
}

#[delete("/races/<race_id>/drivers/<entry_id>")]
pub async fn remove_driver(
    _key: FrontDeskKey,
    race_id: i64,
    entry_id: i64,
    app: &State<AppState>,
) -> CustomResult<Status> {
    app.remove_driver(race_id, entry_id).await?;
    Ok(Status::NoContent)
}
