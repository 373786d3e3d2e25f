// src/handlers/mod.rs

pub mod auth;
pub mod invite;
pub mod question;
pub mod quiz;
pub mod submission;
