pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod inference;
pub mod jobs;
pub mod key;
pub mod prompt;
pub mod routes;
pub mod store;
pub mod submitter;
pub mod telemetry;
