// src/lib.rs

pub mod aggregation;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod mail;
pub mod models;
pub mod permissions;
pub mod routes;
pub mod state;
pub mod utils;

pub use routes::create_router;
