pub mod admin;
pub mod api;
pub mod cli;
pub mod config;
pub mod contacts;
pub mod error;
pub mod report;
pub mod routes;
pub mod session;
pub mod validation;

pub use error::ClientError;
