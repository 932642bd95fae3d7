pub mod client {
    pub mod models {
        pub mod listing;
    }
    pub mod client;
    pub mod error;
}

pub mod de;
pub mod logger;
pub mod models;
pub mod retry;
pub mod utils;
