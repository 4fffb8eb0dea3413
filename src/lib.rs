// ABOUTME: Library crate for manifold exposing the coordinator, sessions, and journal for hosts and tests

pub mod app;
pub mod config;
pub mod conversation;
pub mod journal;
pub mod models;
pub mod session;
pub mod tools;
