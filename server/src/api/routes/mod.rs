//! API route handlers

pub mod entries;
pub mod health;
