use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;

/// Runtime configuration, read once at startup and managed by rocket.
///
/// The three role keys gate the operator endpoints; displays and the event
/// stream stay public. `DEV_MODE` shortens every new race to one minute so
/// the full lifecycle can be exercised without waiting out a real session.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub front_desk_key: String,
    pub safety_official_key: String,
    pub lap_observer_key: String,
    pub default_duration_sec: i64,
    pub data_dir: PathBuf,
}

const STANDARD_DURATION_SEC: i64 = 600;
const DEV_DURATION_SEC: i64 = 60;

impl AppConfig {
    pub fn from_env() -> AppConfig {
        dotenv().ok();

        let dev_mode = matches!(env::var("DEV_MODE").as_deref(), Ok("true") | Ok("1"));

        AppConfig {
            front_desk_key: env::var("RECEPTIONIST_KEY")
                .unwrap_or_else(|_| "8ded6076".to_string()),
            safety_official_key: env::var("SAFETY_OFFICIAL_KEY")
                .unwrap_or_else(|_| "a2d393bc".to_string()),
            lap_observer_key: env::var("LAP_LINE_OBSERVER_KEY")
                .unwrap_or_else(|_| "662e0f6c".to_string()),
            default_duration_sec: if dev_mode {
                DEV_DURATION_SEC
            } else {
                STANDARD_DURATION_SEC
            },
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
        }
    }
}
