use rocket::{launch, Build, Rocket};

use trackside::build_rocket;
use trackside::config::AppConfig;
use trackside::modules::app_state::AppState;
use trackside::modules::helpers::logging::setup_logging;

#[launch]
async fn rocket() -> Rocket<Build> {
    setup_logging().expect("Failed to setup logging");

    let config = AppConfig::from_env();

    // reload the snapshot the previous run left behind. A store that
    // exists but cannot be read is a hard failure: racing on from an
    // empty slate would silently drop the day's schedule.
    let app = AppState::initialize(&config).expect("Failed to load the durable store");

    // start the webserver
    build_rocket(config, app)
}
