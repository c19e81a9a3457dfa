//! Inventory Service - per-branch stock levels with an audited movement log.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
