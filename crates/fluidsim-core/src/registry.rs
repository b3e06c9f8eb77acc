//! Registry of active simulation volumes.

use crate::volume::VolumeHandle;

/// Ordered collection of registered volumes.
///
/// Volumes are compared by handle identity. Registering the same handle
/// twice stores it twice, and each deregistration removes one entry.
pub struct VolumeRegistry<T> {
    volumes: Vec<VolumeHandle<T>>,
}

impl<T> Default for VolumeRegistry<T> {
    fn default() -> Self {
        Self {
            volumes: Vec::new(),
        }
    }
}

impl<T> VolumeRegistry<T> {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a volume.
    pub fn register(&mut self, volume: VolumeHandle<T>) {
        self.volumes.push(volume);
    }

    /// Removes one entry for `volume`. Returns whether anything was removed.
    pub fn deregister(&mut self, volume: &VolumeHandle<T>) -> bool {
        match self.volumes.iter().position(|v| v.ptr_eq(volume)) {
            Some(index) => {
                self.volumes.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, volume: &VolumeHandle<T>) -> bool {
        self.volumes.iter().any(|v| v.ptr_eq(volume))
    }

    /// Copies the current entries. Later registry changes do not affect it.
    pub fn snapshot(&self) -> Vec<VolumeHandle<T>> {
        self.volumes.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VolumeHandle<T>> {
        self.volumes.iter()
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Removes every volume.
    pub fn clear(&mut self) {
        self.volumes.clear();
    }
}
