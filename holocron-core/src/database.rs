use crate::error::{HolocronError, Result};
use crate::models::{QuestDefinition, QuestDependency, ReputationRecord, ToonRecord};
use crate::quest::{QuestId, QuestSource};
use chrono::Utc;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    pub fn new(path: &Path) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        });
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(HolocronError::Pool)?;

        let db = Self { pool };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(HolocronError::Pool)
    }

    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        tx.execute_batch(
            r#"
            -- Character roster, keyed by (name, realm) since SavedInstances
            -- does not expose GUIDs
            CREATE TABLE IF NOT EXISTS characters (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                realm TEXT NOT NULL,
                class TEXT,
                race TEXT,
                level INTEGER NOT NULL DEFAULT 0,
                last_seen_zone TEXT,
                last_updated TIMESTAMP,
                UNIQUE(name, realm)
            );

            -- Append-only reputation snapshots per ingest
            CREATE TABLE IF NOT EXISTS reputation_history (
                id INTEGER PRIMARY KEY,
                character_key TEXT NOT NULL,
                faction_id INTEGER NOT NULL,
                earned INTEGER NOT NULL,
                recorded_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_reputation_history_character
                ON reputation_history(character_key);

            -- Completed quests per character
            CREATE TABLE IF NOT EXISTS character_quest_history (
                id INTEGER PRIMARY KEY,
                guid TEXT NOT NULL,
                quest_id INTEGER NOT NULL,
                UNIQUE(guid, quest_id)
            );

            -- Quest graph
            CREATE TABLE IF NOT EXISTS quest_definitions (
                quest_id INTEGER PRIMARY KEY,
                title TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS quest_dependencies (
                id INTEGER PRIMARY KEY,
                quest_id INTEGER NOT NULL,
                required_quest_id INTEGER NOT NULL,
                UNIQUE(quest_id, required_quest_id)
            );

            CREATE INDEX IF NOT EXISTS idx_quest_dependencies_quest
                ON quest_dependencies(quest_id);
            "#,
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Append one reputation snapshot row per record.
    pub fn ingest_reputations(&self, records: &[ReputationRecord]) -> Result<usize> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO reputation_history (character_key, faction_id, earned, recorded_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            let now = Utc::now().to_rfc3339();
            for record in records {
                stmt.execute(params![
                    record.character,
                    record.faction_id,
                    record.earned,
                    now
                ])?;
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Upsert character summaries keyed by (name, realm).
    pub fn ingest_toons(&self, records: &[ToonRecord]) -> Result<usize> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let mut upserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO characters (name, realm, class, race, level, last_seen_zone, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(name, realm) DO UPDATE SET
                     class = excluded.class,
                     race = excluded.race,
                     level = excluded.level,
                     last_seen_zone = excluded.last_seen_zone,
                     last_updated = excluded.last_updated",
            )?;
            let now = Utc::now().to_rfc3339();
            for record in records {
                stmt.execute(params![
                    record.name,
                    record.realm,
                    record.class,
                    record.race,
                    record.level,
                    record.zone,
                    now
                ])?;
                upserted += 1;
            }
        }
        tx.commit()?;
        Ok(upserted)
    }

    /// Record completed quest ids for a character; duplicates are ignored.
    pub fn record_quest_completions(&self, guid: &str, quests: &[QuestId]) -> Result<usize> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let mut recorded = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO character_quest_history (guid, quest_id) VALUES (?1, ?2)",
            )?;
            for quest in quests {
                recorded += stmt.execute(params![guid, quest])?;
            }
        }
        tx.commit()?;
        Ok(recorded)
    }

    pub fn load_quest_definitions(&self, definitions: &[QuestDefinition]) -> Result<usize> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO quest_definitions (quest_id, title) VALUES (?1, ?2)",
            )?;
            for def in definitions {
                stmt.execute(params![def.quest_id, def.title])?;
            }
        }
        tx.commit()?;
        Ok(definitions.len())
    }

    pub fn load_quest_dependencies(&self, dependencies: &[QuestDependency]) -> Result<usize> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let mut loaded = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO quest_dependencies (quest_id, required_quest_id)
                 VALUES (?1, ?2)",
            )?;
            for dep in dependencies {
                loaded += stmt.execute(params![dep.quest_id, dep.required_quest_id])?;
            }
        }
        tx.commit()?;
        Ok(loaded)
    }

    /// Completed quest ids for one character key.
    pub fn completed_quests_for(&self, guid: &str) -> Result<HashSet<QuestId>> {
        let conn = self.connection()?;
        let mut stmt =
            conn.prepare("SELECT quest_id FROM character_quest_history WHERE guid = ?1")?;
        let rows = stmt.query_map(params![guid], |row| row.get::<_, i64>(0))?;

        let mut completed = HashSet::new();
        for row in rows {
            completed.insert(row?);
        }
        Ok(completed)
    }

    /// Resolve a quest reference given as a numeric id or a title
    /// fragment (case-insensitive substring, first match wins).
    pub fn lookup_quest_id(&self, target: &str) -> Result<Option<QuestId>> {
        let target = target.trim();
        if target.is_empty() {
            return Ok(None);
        }
        if target.chars().all(|c| c.is_ascii_digit()) {
            return Ok(target.parse().ok());
        }

        let conn = self.connection()?;
        let pattern = format!("%{}%", target);
        let id = conn
            .query_row(
                "SELECT quest_id FROM quest_definitions
                 WHERE title LIKE ?1 COLLATE NOCASE
                 ORDER BY quest_id LIMIT 1",
                params![pattern],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn fetch_prerequisites(&self, quest: QuestId) -> Result<Vec<QuestId>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT required_quest_id FROM quest_dependencies
             WHERE quest_id = ?1 ORDER BY required_quest_id",
        )?;
        let rows = stmt.query_map(params![quest], |row| row.get::<_, i64>(0))?;

        let mut prereqs = Vec::new();
        for row in rows {
            prereqs.push(row?);
        }
        Ok(prereqs)
    }

    fn fetch_title(&self, quest: QuestId) -> Result<Option<String>> {
        let conn = self.connection()?;
        let title = conn
            .query_row(
                "SELECT title FROM quest_definitions WHERE quest_id = ?1",
                params![quest],
                |row| row.get(0),
            )
            .optional()?;
        Ok(title)
    }
}

/// Quest lookups degrade to empty results on database errors, matching
/// the resolver's contract that collaborator failures mean "no data".
impl QuestSource for Database {
    fn prerequisites(&self, quest: QuestId) -> Vec<QuestId> {
        match self.fetch_prerequisites(quest) {
            Ok(prereqs) => prereqs,
            Err(e) => {
                warn!("prerequisite lookup failed for quest {}: {}", quest, e);
                Vec::new()
            }
        }
    }

    fn title(&self, quest: QuestId) -> Option<String> {
        match self.fetch_title(quest) {
            Ok(title) => title,
            Err(e) => {
                warn!("title lookup failed for quest {}: {}", quest, e);
                None
            }
        }
    }
}
