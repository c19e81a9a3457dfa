//! Invoicing Service - invoice and payment ledger for repair shops.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
