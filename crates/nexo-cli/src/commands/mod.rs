//! Command handlers

pub mod config;
pub mod library;
pub mod remote;
pub mod review;
pub mod status;
