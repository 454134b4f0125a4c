use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

/// Cross-scene memory for one entity.
///
/// `disabled` is the only field the built-in kinds read; anything else a
/// collaborator stores rides along in `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub disabled: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PersistedState {
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            extra: Map::new(),
        }
    }
}

/// Key-value memory keyed by `(scene id, entity name)` that outlives a scene.
pub trait PersistenceGateway {
    fn get(&self, scene_id: &str, entity_name: &str) -> Option<PersistedState>;
    fn set(&mut self, scene_id: &str, entity_name: &str, state: PersistedState);
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to encode persisted states: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode persisted states: {0}")]
    Decode(#[source] serde_json::Error),
}

/// One entry of the JSON snapshot. Scene ids and names are kept as
/// separate fields so neither needs escaping.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedRecord {
    scene: String,
    name: String,
    state: PersistedState,
}

/// Session-lifetime gateway. Entries vanish with the session unless a
/// collaborator exports them with [`InMemoryPersistence::to_json`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryPersistence {
    entries: BTreeMap<(String, String), PersistedState>,
}

impl InMemoryPersistence {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Snapshot as a JSON array of `{scene, name, state}` records.
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        let records = self
            .entries
            .iter()
            .map(|((scene, name), state)| PersistedRecord {
                scene: scene.clone(),
                name: name.clone(),
                state: state.clone(),
            })
            .collect::<Vec<_>>();
        serde_json::to_string_pretty(&records).map_err(PersistenceError::Encode)
    }

    /// Later records win when the same `(scene, name)` appears twice.
    pub fn from_json(raw: &str) -> Result<Self, PersistenceError> {
        let records: Vec<PersistedRecord> =
            serde_json::from_str(raw).map_err(PersistenceError::Decode)?;
        let entries = records
            .into_iter()
            .map(|record| ((record.scene, record.name), record.state))
            .collect();
        Ok(Self { entries })
    }
}

impl PersistenceGateway for InMemoryPersistence {
    fn get(&self, scene_id: &str, entity_name: &str) -> Option<PersistedState> {
        self.entries
            .get(&(scene_id.to_string(), entity_name.to_string()))
            .cloned()
    }

    fn set(&mut self, scene_id: &str, entity_name: &str, state: PersistedState) {
        info!(
            scene = scene_id,
            entity = entity_name,
            disabled = state.disabled,
            "state_persisted"
        );
        self.entries
            .insert((scene_id.to_string(), entity_name.to_string()), state);
    }
}
