pub mod api;
pub mod availability;
pub mod clock;
pub mod config;
pub mod engine;
pub mod entities;
pub mod error;
pub mod history;
pub mod notify;
pub mod registry;
pub mod store;
pub mod timeslot;
