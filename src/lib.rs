pub mod auth;
pub mod config;
pub mod constants;
pub mod explanations;
pub mod extractors;
pub mod logging;
pub mod middleware;
pub mod practice;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod validation;
pub mod workers;
