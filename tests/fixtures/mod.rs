//! Test fixtures for mission-planner.
//!
//! Provides:
//! - Real Moroccan city and warehouse coordinates
//! - Builders for sources, destinations, vehicles and problems
//! - Scripted HTTP stubs for the road and AI services

#![allow(dead_code)]

pub mod morocco;
pub mod stub_server;

pub use morocco::*;
pub use stub_server::*;
