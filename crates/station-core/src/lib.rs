pub mod calendar;
pub mod chat;
pub mod cms;
pub mod config;
pub mod error;
pub mod lookup;
pub mod model;
pub mod platform;
pub mod protocol;
pub mod schedule;
pub mod search;
pub mod state;
pub mod text;

pub use error::StationError;
