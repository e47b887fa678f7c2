// src/models/mod.rs

pub mod announcement;
pub mod attempt;
pub mod classroom;
pub mod quiz;
pub mod user;
