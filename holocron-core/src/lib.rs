//! Core library for Holocron WoW character data aggregation.

pub mod campaign;
pub mod database;
pub mod datastore;
pub mod error;
pub mod file_utils;
pub mod lua;
pub mod models;
pub mod quest;

pub use error::{HolocronError, Result};
pub use lua::{LuaKey, LuaValue};
pub use quest::{Blocker, QuestId, QuestSource, Resolution, resolve};
