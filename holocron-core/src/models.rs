//! Data models for Holocron character data.

use serde::{Deserialize, Serialize};

/// One faction standing for one character, extracted from
/// DataStore_Reputations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationRecord {
    /// Character key as the addon stores it, usually "Account.Realm.Name".
    pub character: String,
    pub faction_id: i64,
    pub earned: i64,
}

/// Per-character summary extracted from a SavedInstances Toons entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToonRecord {
    pub name: String,
    pub realm: String,
    pub class: String,
    pub race: String,
    pub level: i64,
    pub zone: String,
}

/// Quest id and display title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestDefinition {
    pub quest_id: i64,
    pub title: String,
}

/// One prerequisite edge: `quest_id` requires `required_quest_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestDependency {
    pub quest_id: i64,
    pub required_quest_id: i64,
}
