//! Core domain types and logic.

pub mod account;
pub mod backtest;
pub mod bar;
pub mod commission;
pub mod config;
pub mod config_validation;
pub mod error;
pub mod market;
pub mod metrics;
pub mod opening_range;
pub mod risk;
pub mod risk_levels;
pub mod session;
pub mod simulator;
pub mod sizing;
pub mod trade;
pub mod universe;
