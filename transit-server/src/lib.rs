//! NYC real-time transit arrivals server.
//!
//! Answers "what is arriving near me?" for subway and bus by combining the
//! MTA real-time feeds with static station and zip code data.

pub mod cache;
pub mod config;
pub mod location;
pub mod transit;
pub mod web;
