//! Core of the parley chat client: conversations, streaming replies,
//! persistence and markdown rendering, independent of any front end.

pub mod controllers;
pub mod models;
pub mod render;
pub mod repositories;
pub mod services;
pub mod settings;

pub use controllers::{ChatController, SendOutcome};
