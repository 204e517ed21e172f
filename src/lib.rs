use rocket::fairing::AdHoc;
use rocket::{catchers, routes, Build, Rocket};

use crate::config::AppConfig;
use crate::modules::app_state::AppState;
use crate::modules::helpers::fairings::cors;
use crate::modules::helpers::fairings::cors::CORS;
use crate::routes::api;

pub mod config;
pub mod errors;
pub mod modules;

pub mod routes {
    pub mod api {
        pub mod control;
        pub mod lap;
        pub mod public;
        pub mod race;
        pub mod stream;
    }
}

/// # assemble the webserver
/// mounts every console surface under /api and registers the error
/// catchers. Launching is left to the caller so tests can drive the
/// same rocket through a local client.
///
/// ## Arguments
/// * `config` - the environment configuration to manage
/// * `app` - the shared application state to manage
///
/// ## Returns
/// * `Rocket<Build>` - the configured rocket, ready to launch
pub fn build_rocket(config: AppConfig, app: AppState) -> Rocket<Build> {
    rocket::build()
        .attach(CORS)
        .attach(AdHoc::on_ignite("resume running countdowns", |rocket| async {
            if let Some(app) = rocket.state::<AppState>() {
                app.resume_running_races().await;
            }
            rocket
        }))
        .manage(config)
        .manage(app)
        .mount(
            "/api",
            routes![
                // front desk
                api::race::create,
                api::race::list,
                api::race::delete,
                api::race::add_driver,
                api::race::edit_driver,
                api::race::remove_driver,
                // race control
                api::control::start,
                api::control::finish,
                api::control::set_mode,
                api::control::end_session,
                // lap line
                api::lap::register,
                // public displays
                api::public::next_race,
                api::public::running_races,
                api::public::available_races,
                api::public::leaderboard,
                api::public::flags,
                api::public::countdown,
                // live stream
                api::stream::events,
                // cors preflight
                cors::all_options,
            ],
        )
        .register(
            "/",
            catchers![errors::unauthorized, errors::not_found, errors::unprocessable],
        )
}
