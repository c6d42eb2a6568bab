// src/cfg/mod.rs

pub mod config;
pub mod label;
pub mod secure;
