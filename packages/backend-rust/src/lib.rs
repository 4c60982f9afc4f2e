pub mod config;
pub mod db;
pub mod logging;
pub mod seed;
pub mod services;
pub mod state;
pub mod workers;

pub use state::AppContext;
