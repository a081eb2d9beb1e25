//! In-memory storage implementation
//!
//! Reference backend over `Arc<RwLock<HashMap>>`, shared freely across
//! threads. Every trait method locks one map at a time, so there is no
//! lock-ordering concern.

use crate::{ColonyStore, ExperimentFilter, ExperimentUpdate};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;
use vivarium_core::{
    Animal, AnimalId, AnimalStatus, Cohort, CohortId, ColonyResult, ExperimentId,
    ExperimentRecord, StoreError, StoreResult, Timepoint,
};

/// In-memory colony store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    timepoints: Arc<RwLock<HashMap<Uuid, Timepoint>>>,
    cohorts: Arc<RwLock<HashMap<Uuid, Cohort>>>,
    animals: Arc<RwLock<HashMap<Uuid, Animal>>>,
    experiments: Arc<RwLock<HashMap<Uuid, ExperimentRecord>>>,
    results: Arc<RwLock<HashMap<Uuid, ColonyResult>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        if let Ok(mut m) = self.timepoints.write() {
            m.clear();
        }
        if let Ok(mut m) = self.cohorts.write() {
            m.clear();
        }
        if let Ok(mut m) = self.animals.write() {
            m.clear();
        }
        if let Ok(mut m) = self.experiments.write() {
            m.clear();
        }
        if let Ok(mut m) = self.results.write() {
            m.clear();
        }
    }

    pub fn insert_timepoint(&self, tp: Timepoint) -> StoreResult<()> {
        self.timepoints
            .write()
            .map_err(|_| StoreError::LockPoisoned)?
            .insert(tp.id, tp);
        Ok(())
    }

    pub fn insert_cohort(&self, cohort: Cohort) -> StoreResult<()> {
        self.cohorts
            .write()
            .map_err(|_| StoreError::LockPoisoned)?
            .insert(cohort.id, cohort);
        Ok(())
    }

    pub fn insert_animal(&self, animal: Animal) -> StoreResult<()> {
        self.animals
            .write()
            .map_err(|_| StoreError::LockPoisoned)?
            .insert(animal.id, animal);
        Ok(())
    }

    pub fn insert_result(&self, result: ColonyResult) -> StoreResult<()> {
        self.results
            .write()
            .map_err(|_| StoreError::LockPoisoned)?
            .insert(result.id, result);
        Ok(())
    }

    /// Get one experiment record by id.
    pub fn experiment_get(&self, id: ExperimentId) -> StoreResult<Option<ExperimentRecord>> {
        Ok(self
            .experiments
            .read()
            .map_err(|_| StoreError::LockPoisoned)?
            .get(&id)
            .cloned())
    }

    /// All result rows, for test assertions.
    pub fn result_list(&self) -> StoreResult<Vec<ColonyResult>> {
        Ok(self
            .results
            .read()
            .map_err(|_| StoreError::LockPoisoned)?
            .values()
            .cloned()
            .collect())
    }

    /// Count of stored experiment records.
    pub fn experiment_count(&self) -> usize {
        self.experiments.read().map(|m| m.len()).unwrap_or(0)
    }
}

impl ColonyStore for MemoryStore {
    fn timepoint_list(&self) -> StoreResult<Vec<Timepoint>> {
        let map = self.timepoints.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut all: Vec<Timepoint> = map.values().cloned().collect();
        all.sort_by_key(|tp| (tp.sort_order, tp.age_days));
        Ok(all)
    }

    fn timepoint_by_age(&self, age_days: i64) -> StoreResult<Option<Timepoint>> {
        let map = self.timepoints.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.values().find(|tp| tp.age_days == age_days).cloned())
    }

    fn cohort_get(&self, id: CohortId) -> StoreResult<Option<Cohort>> {
        let map = self.cohorts.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.get(&id).cloned())
    }

    fn animal_get(&self, id: AnimalId) -> StoreResult<Option<Animal>> {
        let map = self.animals.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.get(&id).cloned())
    }

    fn animal_list_by_cohort(
        &self,
        cohort_id: CohortId,
        status: Option<AnimalStatus>,
    ) -> StoreResult<Vec<Animal>> {
        let map = self.animals.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut animals: Vec<Animal> = map
            .values()
            .filter(|a| a.cohort_id == Some(cohort_id))
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        animals.sort_by_key(|a| a.id);
        Ok(animals)
    }

    fn animal_list_by_ids(&self, ids: &[AnimalId]) -> StoreResult<Vec<Animal>> {
        let map = self.animals.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(ids.iter().filter_map(|id| map.get(id).cloned()).collect())
    }

    fn experiment_list_by_animal(&self, animal_id: AnimalId) -> StoreResult<Vec<ExperimentRecord>> {
        let map = self.experiments.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut records: Vec<ExperimentRecord> = map
            .values()
            .filter(|r| r.animal_id == animal_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    fn experiment_page(
        &self,
        filter: &ExperimentFilter,
        after: Option<ExperimentId>,
        limit: usize,
    ) -> StoreResult<Vec<ExperimentRecord>> {
        let map = self.experiments.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut matching: Vec<ExperimentRecord> = map
            .values()
            .filter(|r| filter.matches(r))
            .filter(|r| after.map_or(true, |cursor| r.id > cursor))
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.id);
        matching.truncate(limit);
        Ok(matching)
    }

    fn experiment_insert_batch(&self, rows: &[ExperimentRecord]) -> StoreResult<()> {
        let mut map = self.experiments.write().map_err(|_| StoreError::LockPoisoned)?;
        for row in rows {
            map.insert(row.id, row.clone());
        }
        Ok(())
    }

    fn experiment_update_batch(
        &self,
        updates: &[(ExperimentId, ExperimentUpdate)],
    ) -> StoreResult<()> {
        let mut map = self.experiments.write().map_err(|_| StoreError::LockPoisoned)?;
        for (id, update) in updates {
            let record = map.get_mut(id).ok_or_else(|| StoreError::UpdateFailed {
                table: "animal_experiments".to_string(),
                reason: format!("no row with id {}", id),
            })?;
            update.apply(record);
        }
        Ok(())
    }

    fn experiment_delete_batch(&self, ids: &[ExperimentId]) -> StoreResult<()> {
        let mut map = self.experiments.write().map_err(|_| StoreError::LockPoisoned)?;
        for id in ids {
            map.remove(id);
        }
        Ok(())
    }

    fn result_update_age(&self, old_age: i64, new_age: i64) -> StoreResult<usize> {
        let mut map = self.results.write().map_err(|_| StoreError::LockPoisoned)?;
        let mut touched = 0;
        for result in map.values_mut() {
            if result.timepoint_age_days == old_age {
                result.timepoint_age_days = new_age;
                touched += 1;
            }
        }
        Ok(touched)
    }
}
