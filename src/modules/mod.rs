pub mod app_state;
pub mod broadcast;
pub mod scheduler;
pub mod store;

pub mod models {
    pub mod race;
    pub mod lap;
    pub mod leaderboard;

    pub mod general;
}

pub mod helpers {
    pub mod guards;
    pub mod logging;

    pub mod fairings {
        pub mod cors;
    }
}
