use std::collections::HashSet;

use crate::device::types::DeviceId;

/// Tracks which devices were discovered, are being connected to, and are connected.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    discovered: HashSet<DeviceId>,
    connecting: HashSet<DeviceId>,
    connected: HashSet<DeviceId>,
}

impl DeviceRegistry {
    /// Returns true if the id was not known before.
    pub fn discover(&mut self, id: &DeviceId) -> bool {
        if self.discovered.contains(id) {
            return false;
        }
        self.discovered.insert(id.clone())
    }

    /// Returns false if a connect attempt is running or the device is already connected.
    pub fn begin_connect(&mut self, id: &DeviceId) -> bool {
        if self.connecting.contains(id) || self.connected.contains(id) {
            return false;
        }
        self.connecting.insert(id.clone())
    }

    pub fn connect_succeeded(&mut self, id: &DeviceId) {
        self.connecting.remove(id);
        self.connected.insert(id.clone());
    }

    pub fn connect_failed(&mut self, id: &DeviceId) {
        self.connecting.remove(id);
        self.connected.remove(id);
    }

    pub fn disconnected(&mut self, id: &DeviceId) {
        self.connected.remove(id);
    }

    pub fn is_connecting(&self, id: &DeviceId) -> bool {
        self.connecting.contains(id)
    }

    pub fn is_connected(&self, id: &DeviceId) -> bool {
        self.connected.contains(id)
    }

    pub fn discovered_count(&self) -> usize {
        self.discovered.len()
    }

    pub fn connected(&self) -> impl Iterator<Item = &DeviceId> {
        self.connected.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovered_id_is_added_once() {
        let mut registry = DeviceRegistry::default();
        let id = DeviceId::from("car-1");

        assert!(registry.discover(&id));
        assert!(!registry.discover(&id));
        assert!(!registry.discover(&DeviceId::from("car-1")));
        assert_eq!(registry.discovered_count(), 1);
    }

    #[test]
    fn second_connect_is_refused_while_connecting() {
        let mut registry = DeviceRegistry::default();
        let id = DeviceId::from("car-1");

        assert!(registry.begin_connect(&id));
        assert!(!registry.begin_connect(&id));
        assert!(registry.is_connecting(&id));
    }

    #[test]
    fn second_connect_is_refused_while_connected() {
        let mut registry = DeviceRegistry::default();
        let id = DeviceId::from("car-1");

        assert!(registry.begin_connect(&id));
        registry.connect_succeeded(&id);
        assert!(!registry.is_connecting(&id));
        assert!(registry.is_connected(&id));
        assert!(!registry.begin_connect(&id));
    }

    #[test]
    fn device_is_selectable_again_after_disconnect_or_failure() {
        let mut registry = DeviceRegistry::default();
        let id = DeviceId::from("car-1");

        registry.begin_connect(&id);
        registry.connect_succeeded(&id);
        registry.disconnected(&id);
        assert!(registry.begin_connect(&id));

        registry.connect_failed(&id);
        assert!(!registry.is_connecting(&id));
        assert!(!registry.is_connected(&id));
        assert!(registry.begin_connect(&id));
    }
}
