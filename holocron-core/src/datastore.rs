//! Typed views over parsed SavedVariables data.
//!
//! DataStore_Reputations lays standings out as
//! `global.Characters[key].Factions[faction_id]`; SavedInstances keeps
//! per-character summaries under `DB.Toons["Realm - Name"]`. Both shapes
//! vary between addon versions, so extraction is lenient: entries that
//! do not match are skipped, never errors.

use crate::lua::LuaValue;
use crate::models::{ReputationRecord, ToonRecord};

/// Extract faction standings from a parsed DataStore_Reputations file.
///
/// Accepts the value returned by [`crate::lua::parse`], i.e. including
/// the top-level variable wrapper. A faction entry is either a map with
/// an `earned` field or a positional tuple with the earned amount in the
/// second slot, depending on the addon version.
pub fn extract_reputations(parsed: &LuaValue) -> Vec<ReputationRecord> {
    let mut records = Vec::new();
    let Some(top) = parsed.as_map() else {
        return records;
    };

    for root in top.values() {
        let Some(characters) = root
            .get("global")
            .and_then(|g| g.get("Characters"))
            .and_then(|c| c.as_map())
        else {
            continue;
        };

        for (character_key, character) in characters {
            let Some(factions) = character.get("Factions").and_then(|f| f.as_map()) else {
                continue;
            };

            for (faction_key, standing) in factions {
                let Some(faction_id) = faction_key.as_i64() else {
                    continue;
                };
                let earned = earned_amount(standing);
                records.push(ReputationRecord {
                    character: character_key.to_text(),
                    faction_id,
                    earned,
                });
            }
        }
    }

    records
}

fn earned_amount(standing: &LuaValue) -> i64 {
    match standing {
        LuaValue::Map(_) => standing.get("earned").and_then(|v| v.as_i64()).unwrap_or(0),
        LuaValue::Seq(_) => standing
            .get_index(2)
            .and_then(|v| v.as_i64())
            .unwrap_or(0),
        other => other.as_i64().unwrap_or(0),
    }
}

/// Extract per-character summaries from a parsed SavedInstances file.
///
/// A toon key of the form "Realm - Name" splits into realm and name;
/// anything else keeps the whole key as the name with an "Unknown" realm.
pub fn extract_toons(parsed: &LuaValue) -> Vec<ToonRecord> {
    let mut records = Vec::new();
    let Some(top) = parsed.as_map() else {
        return records;
    };

    for root in top.values() {
        let toons = root
            .get("DB")
            .and_then(|db| db.get("Toons"))
            .or_else(|| root.get("Toons"));
        let Some(toons) = toons.and_then(|t| t.as_map()) else {
            continue;
        };

        for (toon_key, info) in toons {
            let key = toon_key.to_text();
            let (realm, name) = match key.split_once(" - ") {
                Some((realm, name)) => (realm.to_string(), name.to_string()),
                None => ("Unknown".to_string(), key),
            };

            records.push(ToonRecord {
                name,
                realm,
                class: text_field(info, "Class"),
                race: text_field(info, "Race"),
                level: info.get("Level").and_then(|v| v.as_i64()).unwrap_or(0),
                zone: info
                    .get("Zone")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Unknown")
                    .to_string(),
            });
        }
    }

    records
}

fn text_field(info: &LuaValue, key: &str) -> String {
    info.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lua::parse;

    #[test]
    fn test_extract_reputations_map_shape() {
        let source = r#"
            DataStore_ReputationsDB = {
                ["global"] = {
                    ["Characters"] = {
                        ["Default.Dornogal.Mainmage"] = {
                            ["Factions"] = {
                                [87] = { earned = 8350 },
                                ["2600"] = { earned = 21000 },
                            },
                        },
                    },
                },
            }
        "#;
        let mut records = extract_reputations(&parse(source));
        records.sort_by_key(|r| r.faction_id);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].character, "Default.Dornogal.Mainmage");
        assert_eq!(records[0].faction_id, 87);
        assert_eq!(records[0].earned, 8350);
        assert_eq!(records[1].faction_id, 2600);
        assert_eq!(records[1].earned, 21000);
    }

    #[test]
    fn test_extract_reputations_positional_shape() {
        // Older addon versions store a tuple with earned in slot 2.
        let source = r#"
            DataStore_ReputationsDB = {
                ["global"] = {
                    ["Characters"] = {
                        ["Default.Dornogal.Altdruid"] = {
                            ["Factions"] = {
                                [942] = {4, 11250},
                            },
                        },
                    },
                },
            }
        "#;
        let records = extract_reputations(&parse(source));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].faction_id, 942);
        assert_eq!(records[0].earned, 11250);
    }

    #[test]
    fn test_extract_reputations_skips_non_numeric_faction_keys() {
        let source = r#"
            DataStore_ReputationsDB = {
                ["global"] = {
                    ["Characters"] = {
                        ["Default.Dornogal.Mainmage"] = {
                            ["Factions"] = {
                                ["lastScan"] = 1700000000,
                                [87] = { earned = 100 },
                            },
                        },
                    },
                },
            }
        "#;
        let records = extract_reputations(&parse(source));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].faction_id, 87);
    }

    #[test]
    fn test_extract_reputations_from_unrelated_file_is_empty() {
        assert!(extract_reputations(&parse("SomeOtherDB = { a = 1 }")).is_empty());
        assert!(extract_reputations(&parse("no assignment here")).is_empty());
    }

    #[test]
    fn test_extract_toons() {
        let source = r#"
            SavedInstancesDB = {
                ["DB"] = {
                    ["Toons"] = {
                        ["Dornogal - Mainmage"] = {
                            ["Zone"] = "The Ringing Deeps",
                            ["Level"] = 80,
                            ["Race"] = "Gnome",
                            ["Class"] = "MAGE",
                        },
                        ["Oddkey"] = {
                            ["Level"] = 12,
                        },
                    },
                },
            }
        "#;
        let mut records = extract_toons(&parse(source));
        records.sort_by_key(|r| r.level);

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "Mainmage");
        assert_eq!(records[1].realm, "Dornogal");
        assert_eq!(records[1].zone, "The Ringing Deeps");
        assert_eq!(records[1].level, 80);
        assert_eq!(records[1].class, "MAGE");

        // No "Realm - Name" separator: whole key becomes the name.
        assert_eq!(records[0].name, "Oddkey");
        assert_eq!(records[0].realm, "Unknown");
        assert_eq!(records[0].zone, "Unknown");
        assert_eq!(records[0].class, "");
    }

    #[test]
    fn test_extract_toons_without_db_wrapper() {
        let source = r#"
            SavedInstancesDB = {
                ["Toons"] = {
                    ["Dornogal - Altdruid"] = { ["Level"] = 70 },
                },
            }
        "#;
        let records = extract_toons(&parse(source));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Altdruid");
        assert_eq!(records[0].level, 70);
    }
}
