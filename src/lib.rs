pub mod accounts;
pub mod config;
pub mod db;
pub mod error;
pub mod invite_email;
pub mod matches;
pub mod model;
pub mod rivals;
pub mod stats;
