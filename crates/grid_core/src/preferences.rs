use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};
use shared::{
    error::GridError,
    protocol::{PreferenceKey, PreferenceKind},
};
use storage::PreferencesStore;

/// One persisted preference of a grid (sorting or hidden columns). A disabled
/// slot never touches the store.
#[derive(Debug, Clone)]
pub struct PreferenceSlot<T> {
    key: PreferenceKey,
    enabled: bool,
    _value: PhantomData<fn() -> T>,
}

impl<T> PreferenceSlot<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(grid_id: &str, kind: PreferenceKind, enabled: bool) -> Self {
        Self {
            key: PreferenceKey::new(grid_id, kind),
            enabled,
            _value: PhantomData,
        }
    }

    pub fn key(&self) -> &PreferenceKey {
        &self.key
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Reads the stored value. `None` when disabled or when nothing was stored.
    pub async fn restore(&self, store: &dyn PreferencesStore) -> Result<Option<T>, GridError> {
        if !self.enabled {
            return Ok(None);
        }
        let raw = store
            .load_preference(&self.key)
            .await
            .map_err(|source| GridError::Preferences {
                key: self.key.clone(),
                source,
            })?;
        raw.map(serde_json::from_value)
            .transpose()
            .map_err(|source| GridError::PreferenceDecode {
                key: self.key.clone(),
                source,
            })
    }

    /// Writes `value` back. Returns whether a write happened.
    pub async fn persist(&self, store: &dyn PreferencesStore, value: &T) -> Result<bool, GridError> {
        if !self.enabled {
            return Ok(false);
        }
        let raw = serde_json::to_value(value).map_err(|source| GridError::PreferenceDecode {
            key: self.key.clone(),
            source,
        })?;
        store
            .save_preference(&self.key, &raw)
            .await
            .map_err(|source| GridError::Preferences {
                key: self.key.clone(),
                source,
            })?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::domain::{HiddenColumns, SortSpec, Sorting};
    use storage::MemoryPreferences;

    #[tokio::test]
    async fn disabled_slot_neither_reads_nor_writes() {
        let store = MemoryPreferences::new();
        store
            .save_preference(
                &PreferenceKey::new("users", PreferenceKind::Sorting),
                &json!([{"columnName": "name", "direction": "asc"}]),
            )
            .await
            .expect("seed");

        let slot = PreferenceSlot::<SortSpec>::new("users", PreferenceKind::Sorting, false);
        assert_eq!(slot.restore(&store).await.expect("restore"), None);
        assert!(!slot
            .persist(&store, &vec![Sorting::desc("email")])
            .await
            .expect("persist"));
        assert_eq!(
            store
                .load_preference(slot.key())
                .await
                .expect("load"),
            Some(json!([{"columnName": "name", "direction": "asc"}]))
        );
    }

    #[tokio::test]
    async fn enabled_slot_round_trips_through_store() {
        let store = MemoryPreferences::new();
        let slot =
            PreferenceSlot::<HiddenColumns>::new("users", PreferenceKind::HiddenColumnsNames, true);
        assert_eq!(slot.restore(&store).await.expect("restore"), None);

        let hidden: HiddenColumns = ["email".to_string()].into_iter().collect();
        assert!(slot.persist(&store, &hidden).await.expect("persist"));
        assert_eq!(
            store.load_preference(slot.key()).await.expect("load"),
            Some(json!(["email"]))
        );
        assert_eq!(slot.restore(&store).await.expect("restore"), Some(hidden));
    }

    #[tokio::test]
    async fn malformed_stored_value_is_a_decode_error() {
        let store = MemoryPreferences::new();
        let key = PreferenceKey::new("users", PreferenceKind::Sorting);
        store
            .save_preference(&key, &json!({"not": "a list"}))
            .await
            .expect("seed");

        let slot = PreferenceSlot::<SortSpec>::new("users", PreferenceKind::Sorting, true);
        let err = slot.restore(&store).await.expect_err("should fail");
        assert!(matches!(err, GridError::PreferenceDecode { .. }));
    }
}
