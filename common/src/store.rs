use std::collections::HashMap;

use tracing::warn;

use crate::{error::StoreError, types::OperatingMode};

pub trait PreferenceBackend {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PreferenceBackend for MemoryBackend {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// One f32 per climate-controlling mode, stored as 4 little-endian bytes.
#[derive(Debug)]
pub struct SetpointStore<B> {
    backend: B,
}

impl<B: PreferenceBackend> SetpointStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn load(&self, mode: OperatingMode) -> Option<f32> {
        let key = mode.storage_key()?;

        let raw = match self.backend.load(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!("failed to read stored setpoint {key}: {err}");
                return None;
            }
        };

        let Ok(bytes) = <[u8; 4]>::try_from(raw.as_slice()) else {
            warn!("ignoring stored setpoint {key}: expected 4 bytes, found {}", raw.len());
            return None;
        };

        let value = f32::from_le_bytes(bytes);
        if !value.is_finite() {
            warn!("ignoring non-finite stored setpoint {key}");
            return None;
        }
        Some(value)
    }

    /// Non-climate modes have no slot and are never written.
    pub fn save(&mut self, mode: OperatingMode, value: f32) -> Result<(), StoreError> {
        let Some(key) = mode.storage_key() else {
            return Ok(());
        };
        self.backend.save(key, &value.to_le_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_returns_value() {
        let mut store = SetpointStore::new(MemoryBackend::new());

        store.save(OperatingMode::Cool, 22.5).unwrap();

        assert_eq!(store.load(OperatingMode::Cool), Some(22.5));
        assert_eq!(store.load(OperatingMode::Heat), None);
    }

    #[test]
    fn non_climate_modes_are_not_written() {
        let mut store = SetpointStore::new(MemoryBackend::new());

        store.save(OperatingMode::Dry, 20.0).unwrap();
        store.save(OperatingMode::Fan, 20.0).unwrap();
        store.save(OperatingMode::Off, 20.0).unwrap();

        assert!(store.backend().is_empty());
        assert_eq!(store.load(OperatingMode::Dry), None);
    }

    #[test]
    fn corrupt_entries_read_as_absent() {
        let mut backend = MemoryBackend::new();
        backend.save("setpoint_heat", &[1, 2, 3]).unwrap();
        backend
            .save("setpoint_auto", &f32::NAN.to_le_bytes())
            .unwrap();
        let store = SetpointStore::new(backend);

        assert_eq!(store.load(OperatingMode::Heat), None);
        assert_eq!(store.load(OperatingMode::Auto), None);
    }

    #[test]
    fn unreadable_backend_reads_as_absent() {
        struct Broken;

        impl PreferenceBackend for Broken {
            fn load(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
                Err(StoreError::Io("flash read failed".to_string()))
            }

            fn save(&mut self, _key: &str, _bytes: &[u8]) -> Result<(), StoreError> {
                Err(StoreError::Io("flash write failed".to_string()))
            }
        }

        let mut store = SetpointStore::new(Broken);

        assert_eq!(store.load(OperatingMode::Heat), None);
        assert!(store.save(OperatingMode::Heat, 20.0).is_err());
    }
}
