pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod repositories;
pub mod services;
pub mod state;
pub mod tenant;
pub mod validation;
pub mod wizard;
