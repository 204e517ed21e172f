use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use tokio::time::{sleep, Duration};

use crate::config::AppConfig;
use crate::errors::{AuthorizationSnafu, Error};

pub const ACCESS_KEY_HEADER: &str = "x-access-key";

/// Flat response tax on a wrong or missing key, to blunt brute-force
/// probing of the shared secrets.
const INVALID_KEY_DELAY: Duration = Duration::from_millis(500);

/// Credential of the front-desk console (race and roster management).
pub struct FrontDeskKey;

/// Credential of the safety official (start/finish/flag control).
pub struct SafetyOfficialKey;

/// Credential of the observer at the lap line.
pub struct LapObserverKey;

macro_rules! role_guard {
    ($guard:ident, $key_field:ident) => {
        #[rocket::async_trait]
        impl<'r> FromRequest<'r> for $guard {
            type Error = Error;

            async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
                let config = match request.rocket().state::<AppConfig>() {
                    Some(config) => config,
                    None => return Outcome::Forward(Status::InternalServerError),
                };

                match request.headers().get_one(ACCESS_KEY_HEADER) {
                    Some(key) if key == config.$key_field => Outcome::Success($guard),
                    _ => {
                        sleep(INVALID_KEY_DELAY).await;
                        Outcome::Error((
                            Status::Unauthorized,
                            AuthorizationSnafu { message: "Invalid access key" }.build(),
                        ))
                    }
                }
            }
        }
    };
}

role_guard!(FrontDeskKey, front_desk_key);
role_guard!(SafetyOfficialKey, safety_official_key);
role_guard!(LapObserverKey, lap_observer_key);
