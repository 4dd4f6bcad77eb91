use crate::i18n::LanguageCode;
use crate::processor::{BatchSelection, EntityId, FieldSnapshot, PersistError, TranslatableEntity};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Opaque handle to a stored selection, returned by phase one of the
/// two-phase workflow and consumed by phase two.
pub type SelectionHandle = i64;

/// SQLite-backed store for entities, their translation revisions, and
/// pending selections.
///
/// Cloning shares the underlying connection.
#[derive(Clone)]
pub struct EntityStore {
    conn: Arc<Mutex<Connection>>,
}

impl EntityStore {
    /// Open the database and create tables.
    pub fn new(database_path: &str) -> Result<Self> {
        let conn = Connection::open(database_path)
            .context(format!("Failed to open database at {}", database_path))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS entities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                label TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create entities table")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS translations (
                entity_id INTEGER NOT NULL,
                language TEXT NOT NULL,
                fields TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (entity_id, language)
            )",
            [],
        )
        .context("Failed to create translations table")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS selections (
                handle INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create selections table")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS selection_entities (
                handle INTEGER NOT NULL,
                entity_id INTEGER NOT NULL,
                PRIMARY KEY (handle, entity_id)
            )",
            [],
        )
        .context("Failed to create selection_entities table")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an entity with its initial language revision.
    pub fn create_entity(
        &self,
        label: &str,
        language: &LanguageCode,
        fields: &FieldSnapshot,
    ) -> Result<EntityId> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO entities (label, created_at) VALUES (?1, ?2)",
            params![label, now],
        )
        .context("Failed to create entity")?;
        let id = conn.last_insert_rowid();

        let json = serde_json::to_string(fields).context("Failed to serialize field snapshot")?;
        conn.execute(
            "INSERT INTO translations (entity_id, language, fields, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, language.as_str(), json, now],
        )
        .context("Failed to create initial translation")?;

        Ok(id)
    }

    /// All entity ids, ascending.
    pub fn list_entity_ids(&self) -> Result<Vec<EntityId>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id FROM entities ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn entity_count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT COUNT(*) FROM entities")?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Load one entity with all of its translation revisions.
    pub fn load_entity(&self, id: EntityId) -> Result<Option<StoredEntity>> {
        let conn = self.conn.lock().unwrap();

        let label: Option<String> = conn
            .query_row(
                "SELECT label FROM entities WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(label) = label else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT language, fields FROM translations WHERE entity_id = ?1 ORDER BY language",
        )?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut translations = BTreeMap::new();
        for (language, json) in rows {
            let fields: FieldSnapshot = serde_json::from_str(&json)
                .context(format!("Corrupt field snapshot for entity {id} ({language})"))?;
            translations.insert(LanguageCode::new(language), fields);
        }

        Ok(Some(StoredEntity {
            store: self.clone(),
            id,
            label,
            translations,
            staged: Vec::new(),
        }))
    }

    /// Build a batch from a list of entity ids.
    ///
    /// De-duplicates by id; ids that no longer resolve are dropped.
    pub fn load_batch(&self, ids: &[EntityId]) -> Result<BatchSelection<StoredEntity>> {
        let mut batch = BatchSelection::new();
        for &id in ids {
            if let Some(entity) = self.load_entity(id)? {
                batch.insert(id, entity);
            }
        }
        Ok(batch)
    }

    // ==================== Selections ====================

    /// Phase one: stash a set of selected entity ids under a fresh handle.
    ///
    /// Duplicate ids collapse. The handle stays until its owner confirms it
    /// (which clears it) or deletes it; there is no expiry.
    pub fn create_selection(&self, owner: &str, ids: &[EntityId]) -> Result<SelectionHandle> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO selections (owner, created_at) VALUES (?1, ?2)",
            params![owner, now],
        )
        .context("Failed to create selection")?;
        let handle = conn.last_insert_rowid();

        for &id in ids {
            conn.execute(
                "INSERT OR IGNORE INTO selection_entities (handle, entity_id) VALUES (?1, ?2)",
                params![handle, id],
            )
            .context("Failed to add entity to selection")?;
        }

        Ok(handle)
    }

    /// Number of distinct entities stashed under a handle.
    pub fn selection_size(&self, handle: SelectionHandle) -> Result<Option<usize>> {
        let conn = self.conn.lock().unwrap();

        let exists: bool = conn.query_row(
            "SELECT COUNT(*) FROM selections WHERE handle = ?1",
            params![handle],
            |row| row.get::<_, i64>(0).map(|count| count > 0),
        )?;
        if !exists {
            return Ok(None);
        }

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM selection_entities WHERE handle = ?1",
            params![handle],
            |row| row.get(0),
        )?;
        Ok(Some(count as usize))
    }

    /// Phase two: resolve a handle into a batch of live entities.
    ///
    /// Returns `None` for an unknown handle. Entities deleted since phase
    /// one are silently dropped from the batch.
    pub fn load_selection(
        &self,
        handle: SelectionHandle,
    ) -> Result<Option<BatchSelection<StoredEntity>>> {
        let ids = {
            let conn = self.conn.lock().unwrap();

            let exists: bool = conn.query_row(
                "SELECT COUNT(*) FROM selections WHERE handle = ?1",
                params![handle],
                |row| row.get::<_, i64>(0).map(|count| count > 0),
            )?;
            if !exists {
                return Ok(None);
            }

            let mut stmt = conn.prepare(
                "SELECT entity_id FROM selection_entities WHERE handle = ?1 ORDER BY entity_id",
            )?;
            let ids = stmt
                .query_map(params![handle], |row| row.get::<_, i64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        Ok(Some(self.load_batch(&ids)?))
    }

    /// Drop a selection and its members. Returns false for an unknown handle.
    pub fn clear_selection(&self, handle: SelectionHandle) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM selection_entities WHERE handle = ?1",
            params![handle],
        )
        .context("Failed to clear selection members")?;
        let rows = conn
            .execute("DELETE FROM selections WHERE handle = ?1", params![handle])
            .context("Failed to clear selection")?;
        Ok(rows > 0)
    }

    // ==================== Revision writes ====================

    fn upsert_translation(
        &self,
        entity_id: EntityId,
        language: &LanguageCode,
        fields: &FieldSnapshot,
    ) -> Result<(), PersistError> {
        let json = serde_json::to_string(fields).map_err(|e| PersistError(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO translations (entity_id, language, fields, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![entity_id, language.as_str(), json, now],
        )
        .map_err(|e| PersistError(e.to_string()))?;
        Ok(())
    }

    fn delete_translation(
        &self,
        entity_id: EntityId,
        language: &LanguageCode,
    ) -> Result<(), PersistError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM translations WHERE entity_id = ?1 AND language = ?2",
            params![entity_id, language.as_str()],
        )
        .map_err(|e| PersistError(e.to_string()))?;
        Ok(())
    }
}

/// A content entity loaded from the store, with all of its revisions.
///
/// Owned by the persistence layer: the processor reads and conditionally
/// mutates it, but never creates or destroys entities.
#[derive(Clone)]
pub struct StoredEntity {
    store: EntityStore,
    id: EntityId,
    label: String,
    translations: BTreeMap<LanguageCode, FieldSnapshot>,
    /// Languages added since the last save, pending persistence.
    staged: Vec<LanguageCode>,
}

impl StoredEntity {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Language codes of the revisions this entity currently holds.
    pub fn languages(&self) -> Vec<&LanguageCode> {
        self.translations.keys().collect()
    }

    pub fn translations(&self) -> &BTreeMap<LanguageCode, FieldSnapshot> {
        &self.translations
    }
}

impl TranslatableEntity for StoredEntity {
    fn id(&self) -> EntityId {
        self.id
    }

    fn has_translation(&self, language: &LanguageCode) -> bool {
        self.translations.contains_key(language)
    }

    fn translation(&self, language: &LanguageCode) -> Option<&FieldSnapshot> {
        self.translations.get(language)
    }

    fn add_translation(&mut self, language: &LanguageCode, fields: FieldSnapshot) {
        self.translations.insert(language.clone(), fields);
        self.staged.push(language.clone());
    }

    /// Deletes the stored revision immediately; this is a persistence write.
    fn remove_translation(&mut self, language: &LanguageCode) -> Result<(), PersistError> {
        self.store.delete_translation(self.id, language)?;
        self.translations.remove(language);
        Ok(())
    }

    /// Persist revisions staged by `add_translation`.
    fn save(&mut self) -> Result<(), PersistError> {
        for language in std::mem::take(&mut self.staged) {
            let fields = self
                .translations
                .get(&language)
                .ok_or_else(|| PersistError(format!("staged revision {language} vanished")))?;
            self.store.upsert_translation(self.id, &language, fields)?;
        }
        Ok(())
    }
}
