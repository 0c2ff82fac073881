pub mod app;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod recipes;
pub mod state;
