use rocket::response::stream::{Event, EventStream};
use rocket::tokio::select;
use rocket::tokio::sync::broadcast::error::RecvError;
use rocket::{get, Shutdown, State};

use crate::modules::app_state::AppState;

/**************************************************************************************************/
/**************** LIVE STREAM ROUTE ***************************************************************/
/**************************************************************************************************/

/// # subscribe to the live event stream
/// every broadcast goes out as a named server-sent event with a json
/// payload. A viewer that falls behind the buffer skips the missed
/// events and picks the stream back up.
#[get("/stream")]
pub async fn events(app: &State<AppState>, mut end: Shutdown) -> EventStream![] {
    let mut viewer = app.subscribe();

    EventStream! {
        loop {
            let event = select! {
                received = viewer.recv() => match received {
                    Ok(event) => event,
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
                _ = &mut end => break,
            };

            yield Event::json(&event.payload()).event(event.name());
        }
    }
}
