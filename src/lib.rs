pub mod config;
pub mod database;
pub mod error;
pub mod identity;
pub mod models;
pub mod services;
pub mod web;
