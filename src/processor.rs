//! Bulk-translation processor.
//!
//! The one piece of this service with nontrivial rules: given a selection
//! of entities, a source language, a target language, and a force flag,
//! decide per entity whether to create, skip, or overwrite a translation,
//! and tally the outcomes.
//!
//! The processor is synchronous and owns no state. Entities reach it
//! through the [`TranslatableEntity`] capability trait, so it runs the same
//! against the SQLite-backed store and against in-memory test doubles.

use crate::i18n::LanguageCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// Stable entity identifier, unique within a batch.
pub type EntityId = i64;

/// Failure to remove or persist a translation revision.
///
/// Caught at the per-entity boundary: one entity failing never aborts the
/// rest of the batch.
#[derive(Debug, Clone, Error)]
#[error("storage backend rejected the write: {0}")]
pub struct PersistError(pub String);

/// The full field content of one language revision at a point in time.
///
/// An ordered mapping of field name to field value, immutable once read.
/// `clone()` is a deep copy; the processor always hands the store a copy,
/// never a shared reference, so later edits to either revision stay
/// independent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSnapshot(BTreeMap<String, Value>);

impl FieldSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for FieldSnapshot {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Capability set the processor needs from a content entity.
///
/// Mutating calls map to persistence writes: `remove_translation` deletes
/// the stored revision immediately, `add_translation` stages a revision in
/// memory, and `save` persists what was staged.
pub trait TranslatableEntity {
    fn id(&self) -> EntityId;

    fn has_translation(&self, language: &LanguageCode) -> bool;

    /// The field snapshot of the revision in `language`, if one exists.
    fn translation(&self, language: &LanguageCode) -> Option<&FieldSnapshot>;

    fn add_translation(&mut self, language: &LanguageCode, fields: FieldSnapshot);

    fn remove_translation(&mut self, language: &LanguageCode) -> Result<(), PersistError>;

    fn save(&mut self) -> Result<(), PersistError>;
}

/// The entities selected for one batch run, keyed and de-duplicated by id.
///
/// A `BTreeMap` keeps iteration in ascending id order, which makes the
/// sequence of save side effects reproducible. The mapping itself is never
/// mutated during processing; the entities inside it are.
pub type BatchSelection<E> = BTreeMap<EntityId, E>;

/// Per-entity outcome of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// A new target-language revision was created and saved.
    Created,
    /// The target language already existed and `force` was off.
    AlreadyExists,
    /// The entity has no revision in the source language.
    SourceMissing,
    /// The storage backend rejected the removal or the save.
    Failed,
}

/// Aggregated outcome counts for one batch run.
///
/// Created fresh per invocation, mutated only by the processor, read once
/// at the end to drive reporting. The counts always sum to the number of
/// entities processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeTally {
    pub created: usize,
    pub already_exists: usize,
    pub source_missing: usize,
    pub failed: usize,
}

impl OutcomeTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::AlreadyExists => self.already_exists += 1,
            Outcome::SourceMissing => self.source_missing += 1,
            Outcome::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.already_exists + self.source_missing + self.failed
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Run the bulk-translation decision over a selection.
///
/// For each entity, in ascending id order: skip it when the source revision
/// is missing, skip it when the target exists and `force` is off, otherwise
/// copy the source snapshot into a new target revision and save. With
/// `force` on, an existing target revision is removed first; a save failure
/// after that removal leaves the entity with neither revision (the removal
/// is not rolled back).
///
/// Precondition, enforced by [`crate::i18n::validate_language_choice`]
/// before this is called: `from != to`. An empty selection yields a zero
/// tally.
pub fn process_batch<E: TranslatableEntity>(
    selection: &mut BatchSelection<E>,
    from: &LanguageCode,
    to: &LanguageCode,
    force: bool,
) -> OutcomeTally {
    let mut tally = OutcomeTally::new();

    for entity in selection.values_mut() {
        tally.record(translate_entity(entity, from, to, force));
    }

    tally
}

/// Decide and apply the translation for a single entity.
fn translate_entity<E: TranslatableEntity>(
    entity: &mut E,
    from: &LanguageCode,
    to: &LanguageCode,
    force: bool,
) -> Outcome {
    if !entity.has_translation(from) {
        return Outcome::SourceMissing;
    }

    if entity.has_translation(to) {
        if !force {
            return Outcome::AlreadyExists;
        }
        if let Err(e) = entity.remove_translation(to) {
            warn!(
                entity_id = entity.id(),
                language = %to,
                "failed to remove existing translation: {e}"
            );
            return Outcome::Failed;
        }
    }

    let snapshot = match entity.translation(from) {
        Some(snapshot) => snapshot.clone(),
        // has_translation was true above; a store that loses the revision
        // mid-entity still tallies as a missing source rather than a panic.
        None => return Outcome::SourceMissing,
    };

    entity.add_translation(to, snapshot);

    match entity.save() {
        Ok(()) => Outcome::Created,
        Err(e) => {
            warn!(
                entity_id = entity.id(),
                language = %to,
                "failed to save translation: {e}"
            );
            Outcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ==================== Test Double ====================

    /// In-memory entity with injectable persistence failures.
    #[derive(Debug, Clone)]
    struct MemoryEntity {
        id: EntityId,
        translations: BTreeMap<LanguageCode, FieldSnapshot>,
        staged: Vec<(LanguageCode, FieldSnapshot)>,
        fail_save: bool,
        fail_remove: bool,
        saves: usize,
        removals: usize,
    }

    impl MemoryEntity {
        fn new(id: EntityId, languages: &[&str]) -> Self {
            let translations = languages
                .iter()
                .map(|lang| {
                    let mut fields = FieldSnapshot::new();
                    fields.set("title", json!(format!("title-{lang}-{id}")));
                    fields.set("body", json!(format!("body in {lang}")));
                    (LanguageCode::new(*lang), fields)
                })
                .collect();

            Self {
                id,
                translations,
                staged: Vec::new(),
                fail_save: false,
                fail_remove: false,
                saves: 0,
                removals: 0,
            }
        }

        fn with_failing_save(mut self) -> Self {
            self.fail_save = true;
            self
        }

        fn with_failing_remove(mut self) -> Self {
            self.fail_remove = true;
            self
        }
    }

    impl TranslatableEntity for MemoryEntity {
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
            self.staged.push((language.clone(), fields));
        }

        fn remove_translation(&mut self, language: &LanguageCode) -> Result<(), PersistError> {
            if self.fail_remove {
                return Err(PersistError("remove rejected".to_string()));
            }
            self.removals += 1;
            self.translations.remove(language);
            Ok(())
        }

        fn save(&mut self) -> Result<(), PersistError> {
            if self.fail_save {
                return Err(PersistError("save rejected".to_string()));
            }
            self.saves += 1;
            for (language, fields) in self.staged.drain(..) {
                self.translations.insert(language, fields);
            }
            Ok(())
        }
    }

    fn selection(entities: Vec<MemoryEntity>) -> BatchSelection<MemoryEntity> {
        entities.into_iter().map(|e| (e.id(), e)).collect()
    }

    fn en() -> LanguageCode {
        LanguageCode::new("en")
    }

    fn fr() -> LanguageCode {
        LanguageCode::new("fr")
    }

    // ==================== Decision Tests ====================

    #[test]
    fn test_source_missing_is_skipped_without_writes() {
        let mut batch = selection(vec![MemoryEntity::new(1, &["fr"])]);

        let tally = process_batch(&mut batch, &en(), &fr(), false);

        assert_eq!(tally.source_missing, 1);
        assert_eq!(tally.created, 0);

        let entity = &batch[&1];
        assert_eq!(entity.saves, 0);
        assert_eq!(entity.removals, 0);
        // The unrelated fr revision is untouched
        assert!(entity.has_translation(&fr()));
    }

    #[test]
    fn test_existing_target_skipped_without_force() {
        let mut batch = selection(vec![MemoryEntity::new(1, &["en", "fr"])]);
        let original = batch[&1].translation(&fr()).cloned().expect("fr exists");

        let tally = process_batch(&mut batch, &en(), &fr(), false);

        assert_eq!(tally.already_exists, 1);
        let entity = &batch[&1];
        assert_eq!(entity.saves, 0);
        assert_eq!(entity.removals, 0);
        // Existing target revision is byte-for-byte unchanged
        assert_eq!(entity.translation(&fr()), Some(&original));
    }

    #[test]
    fn test_created_copies_source_snapshot() {
        let mut batch = selection(vec![MemoryEntity::new(1, &["en"])]);

        let tally = process_batch(&mut batch, &en(), &fr(), false);

        assert_eq!(tally.created, 1);
        let entity = &batch[&1];
        assert_eq!(entity.saves, 1);
        assert_eq!(entity.translation(&fr()), entity.translation(&en()));
    }

    #[test]
    fn test_created_is_a_copy_not_a_reference() {
        let mut batch = selection(vec![MemoryEntity::new(1, &["en"])]);
        process_batch(&mut batch, &en(), &fr(), false);

        // Edit the source after the run; the target must not move with it.
        let entity = batch.get_mut(&1).expect("entity");
        let before = entity.translation(&fr()).cloned().expect("fr created");
        entity
            .translations
            .get_mut(&en())
            .expect("en exists")
            .set("title", json!("edited afterwards"));

        assert_eq!(entity.translation(&fr()), Some(&before));
        assert_ne!(entity.translation(&fr()), entity.translation(&en()));
    }

    #[test]
    fn test_force_overwrites_existing_target() {
        let mut entity = MemoryEntity::new(1, &["en", "fr"]);
        entity
            .translations
            .get_mut(&fr())
            .expect("fr exists")
            .set("title", json!("stale translation"));
        let mut batch = selection(vec![entity]);

        let tally = process_batch(&mut batch, &en(), &fr(), true);

        assert_eq!(tally.created, 1);
        assert_eq!(tally.already_exists, 0);
        let entity = &batch[&1];
        assert_eq!(entity.removals, 1);
        assert_eq!(entity.saves, 1);
        // New target equals the source snapshot at call time
        assert_eq!(entity.translation(&fr()), entity.translation(&en()));
    }

    #[test]
    fn test_force_without_existing_target_does_not_remove() {
        let mut batch = selection(vec![MemoryEntity::new(1, &["en"])]);

        let tally = process_batch(&mut batch, &en(), &fr(), true);

        assert_eq!(tally.created, 1);
        assert_eq!(batch[&1].removals, 0);
    }

    // ==================== Failure Tests ====================

    #[test]
    fn test_save_failure_counts_as_failed() {
        let mut batch = selection(vec![MemoryEntity::new(1, &["en"]).with_failing_save()]);

        let tally = process_batch(&mut batch, &en(), &fr(), false);

        assert_eq!(tally.failed, 1);
        assert_eq!(tally.created, 0);
        assert_eq!(tally.total(), 1);
    }

    #[test]
    fn test_remove_failure_counts_as_failed_and_skips_save() {
        let mut batch = selection(vec![
            MemoryEntity::new(1, &["en", "fr"]).with_failing_remove()
        ]);
        let original = batch[&1].translation(&fr()).cloned().expect("fr exists");

        let tally = process_batch(&mut batch, &en(), &fr(), true);

        assert_eq!(tally.failed, 1);
        let entity = &batch[&1];
        assert_eq!(entity.saves, 0);
        // The removal was rejected, so the old target survives
        assert_eq!(entity.translation(&fr()), Some(&original));
    }

    #[test]
    fn test_forced_overwrite_save_failure_leaves_no_target() {
        // Accepted data-loss semantics: the removal in the force branch is
        // not rolled back when the subsequent save fails.
        let mut batch = selection(vec![
            MemoryEntity::new(1, &["en", "fr"]).with_failing_save()
        ]);

        let tally = process_batch(&mut batch, &en(), &fr(), true);

        assert_eq!(tally.failed, 1);
        let entity = &batch[&1];
        assert_eq!(entity.removals, 1);
        assert!(!entity.has_translation(&fr()));
        assert!(entity.has_translation(&en()));
    }

    #[test]
    fn test_one_failure_does_not_abort_the_batch() {
        let mut batch = selection(vec![
            MemoryEntity::new(1, &["en"]),
            MemoryEntity::new(2, &["en"]).with_failing_save(),
            MemoryEntity::new(3, &["en"]),
        ]);

        let tally = process_batch(&mut batch, &en(), &fr(), false);

        assert_eq!(tally.created, 2);
        assert_eq!(tally.failed, 1);
        assert!(batch[&3].has_translation(&fr()));
    }

    // ==================== Batch Tests ====================

    #[test]
    fn test_empty_selection_is_a_noop() {
        let mut batch: BatchSelection<MemoryEntity> = BatchSelection::new();

        let tally = process_batch(&mut batch, &en(), &fr(), false);

        assert_eq!(tally, OutcomeTally::default());
        assert!(tally.is_empty());
    }

    #[test]
    fn test_mixed_batch_without_force() {
        // E1 has en+fr, E2 has en only, E3 has fr only
        let mut batch = selection(vec![
            MemoryEntity::new(1, &["en", "fr"]),
            MemoryEntity::new(2, &["en"]),
            MemoryEntity::new(3, &["fr"]),
        ]);

        let tally = process_batch(&mut batch, &en(), &fr(), false);

        assert_eq!(tally.created, 1);
        assert_eq!(tally.already_exists, 1);
        assert_eq!(tally.source_missing, 1);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn test_mixed_batch_with_force() {
        let mut batch = selection(vec![
            MemoryEntity::new(1, &["en", "fr"]),
            MemoryEntity::new(2, &["en"]),
            MemoryEntity::new(3, &["fr"]),
        ]);

        let tally = process_batch(&mut batch, &en(), &fr(), true);

        assert_eq!(tally.created, 2);
        assert_eq!(tally.already_exists, 0);
        assert_eq!(tally.source_missing, 1);
    }

    #[test]
    fn test_second_run_without_force_reports_already_exists() {
        let mut batch = selection(vec![
            MemoryEntity::new(1, &["en"]),
            MemoryEntity::new(2, &["en"]),
        ]);

        let first = process_batch(&mut batch, &en(), &fr(), false);
        assert_eq!(first.created, 2);

        let second = process_batch(&mut batch, &en(), &fr(), false);
        assert_eq!(second.already_exists, 2);
        assert_eq!(second.created, 0);
    }

    #[test]
    fn test_repeated_force_runs_keep_creating() {
        let mut batch = selection(vec![MemoryEntity::new(1, &["en"])]);

        let first = process_batch(&mut batch, &en(), &fr(), true);
        let second = process_batch(&mut batch, &en(), &fr(), true);

        assert_eq!(first.created, 1);
        assert_eq!(second.created, 1);
        // Second run removed the revision the first run created
        assert_eq!(batch[&1].removals, 1);
    }

    #[test]
    fn test_entities_processed_in_ascending_id_order() {
        let mut batch = selection(vec![
            MemoryEntity::new(30, &["en"]),
            MemoryEntity::new(10, &["en"]),
            MemoryEntity::new(20, &["en"]),
        ]);

        process_batch(&mut batch, &en(), &fr(), false);

        let ids: Vec<EntityId> = batch.keys().copied().collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    // ==================== Tally Tests ====================

    #[test]
    fn test_tally_record_and_total() {
        let mut tally = OutcomeTally::new();
        tally.record(Outcome::Created);
        tally.record(Outcome::Created);
        tally.record(Outcome::AlreadyExists);
        tally.record(Outcome::SourceMissing);
        tally.record(Outcome::Failed);

        assert_eq!(tally.created, 2);
        assert_eq!(tally.already_exists, 1);
        assert_eq!(tally.source_missing, 1);
        assert_eq!(tally.failed, 1);
        assert_eq!(tally.total(), 5);
    }

    #[test]
    fn test_tally_serializes_with_named_buckets() {
        let mut tally = OutcomeTally::new();
        tally.record(Outcome::Created);

        let json = serde_json::to_value(tally).expect("serialize");
        assert_eq!(json["created"], 1);
        assert_eq!(json["already_exists"], 0);
    }

    // ==================== Property Tests ====================

    mod properties {
        use super::*;
        use proptest::prelude::*;

        /// Shorthand for a generated entity: which revisions it has and
        /// whether its save is rejected.
        #[derive(Debug, Clone)]
        struct Shape {
            has_en: bool,
            has_fr: bool,
            fail_save: bool,
        }

        fn entity_from(id: EntityId, shape: &Shape) -> MemoryEntity {
            let mut languages = Vec::new();
            if shape.has_en {
                languages.push("en");
            }
            if shape.has_fr {
                languages.push("fr");
            }
            let entity = MemoryEntity::new(id, &languages);
            if shape.fail_save {
                entity.with_failing_save()
            } else {
                entity
            }
        }

        fn shape_strategy() -> impl Strategy<Value = Shape> {
            (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(has_en, has_fr, fail_save)| {
                Shape {
                    has_en,
                    has_fr,
                    fail_save,
                }
            })
        }

        proptest! {
            #[test]
            fn every_entity_yields_exactly_one_outcome(
                shapes in proptest::collection::vec(shape_strategy(), 0..40),
                force in any::<bool>(),
            ) {
                let mut batch: BatchSelection<MemoryEntity> = shapes
                    .iter()
                    .enumerate()
                    .map(|(i, shape)| (i as EntityId, entity_from(i as EntityId, shape)))
                    .collect();
                let size = batch.len();

                let tally = process_batch(&mut batch, &en(), &fr(), force);

                prop_assert_eq!(tally.total(), size);
            }

            #[test]
            fn source_missing_count_matches_entities_without_source(
                shapes in proptest::collection::vec(shape_strategy(), 0..40),
                force in any::<bool>(),
            ) {
                let expected = shapes.iter().filter(|s| !s.has_en).count();
                let mut batch: BatchSelection<MemoryEntity> = shapes
                    .iter()
                    .enumerate()
                    .map(|(i, shape)| (i as EntityId, entity_from(i as EntityId, shape)))
                    .collect();

                let tally = process_batch(&mut batch, &en(), &fr(), force);

                prop_assert_eq!(tally.source_missing, expected);
            }
        }
    }
}
