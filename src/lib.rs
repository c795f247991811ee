//! RO-DBT - a small personal journaling and self-reflection web application
//!
//! Accepted members keep private journals and questions that link back to
//! them. New accounts wait for a moderator before they can see any content.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod policy;
pub mod services;
pub mod theme;
