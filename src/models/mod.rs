// src/models/mod.rs

pub mod answer;
pub mod attempt;
pub mod catalog;
pub mod exam;
pub mod question;
pub mod result;
pub mod student;
pub mod user;
