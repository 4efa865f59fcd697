pub mod auth;
pub mod config;
pub mod error;
pub mod limits;
pub mod middleware;
pub mod routes;
pub mod state;
