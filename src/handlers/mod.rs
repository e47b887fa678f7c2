// src/handlers/mod.rs

pub mod announcement;
pub mod auth;
pub mod classroom;
pub mod performance;
pub mod quiz;
pub mod session;
