//! DevFlow - question and tag service
//!
//! This library provides the core of the DevFlow Q&A backend: asking and
//! editing questions, resolving free-form labels to shared tags, and the
//! storage layer that keeps questions, tags and their links consistent.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
