//! Persisted preference order of input devices.

use std::rc::Rc;

use serde_json::Value;

use crate::settings::{device_priority_key, SettingsStore};

use super::{InputDeviceInfo, MediaKind};

/// Ordered preference of input device IDs per [`MediaKind`], most preferred
/// first.
///
/// Lists are read from the [`SettingsStore`] on every access, and changed
/// only by an explicit device selection.
pub struct DevicePriority {
    store: Rc<dyn SettingsStore>,
}

impl std::fmt::Debug for DevicePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevicePriority").finish()
    }
}

impl DevicePriority {
    /// Creates a new [`DevicePriority`] persisted in the provided `store`.
    #[inline]
    #[must_use]
    pub fn new(store: Rc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Returns the preferred device IDs of the provided `kind`.
    #[must_use]
    pub fn list(&self, kind: MediaKind) -> Vec<String> {
        let key = device_priority_key(kind);
        match self.store.get(&key) {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                log::warn!("Ignoring malformed `{}` setting: {}", key, e);
                Vec::new()
            }),
        }
    }

    /// Makes the provided `device_id` the most preferred one of its `kind`.
    pub fn prefer(&self, kind: MediaKind, device_id: &str) {
        let mut list = self.list(kind);
        list.retain(|id| id != device_id);
        list.insert(0, device_id.to_owned());

        let key = device_priority_key(kind);
        if let Err(e) = self.store.set(&key, Value::from(list)) {
            log::error!("Failed to persist `{}` setting: {}", key, e);
        }
    }

    /// Orders the provided `devices` of the `kind` by preference: listed
    /// devices first in the list order, then the rest in enumeration order.
    ///
    /// Devices of other kinds are filtered out.
    #[must_use]
    pub fn order(
        &self,
        kind: MediaKind,
        devices: Vec<InputDeviceInfo>,
    ) -> Vec<InputDeviceInfo> {
        let list = self.list(kind);
        let mut devices: Vec<_> =
            devices.into_iter().filter(|d| d.kind() == kind).collect();
        devices.sort_by_key(|d| {
            list.iter()
                .position(|id| id == d.device_id())
                .unwrap_or(list.len())
        });
        devices
    }
}

#[cfg(test)]
mod spec {
    use std::rc::Rc;

    use serde_json::json;

    use crate::{
        media::{InputDeviceInfo, MediaKind},
        settings::{MemoryStore, MockSettingsStore, SettingsStore as _},
    };

    use super::DevicePriority;

    fn device(id: &str, kind: MediaKind) -> InputDeviceInfo {
        InputDeviceInfo::new(id, kind, id.to_uppercase(), "group")
    }

    #[test]
    fn empty_by_default() {
        let priority = DevicePriority::new(Rc::new(MemoryStore::new()));
        assert!(priority.list(MediaKind::Video).is_empty());
    }

    #[test]
    fn prefer_moves_device_to_front() {
        let store = Rc::new(MemoryStore::new());
        store
            .set("device-priority-videoinput", json!(["cam-a", "cam-b"]))
            .unwrap();
        let priority = DevicePriority::new(store.clone());

        priority.prefer(MediaKind::Video, "cam-b");
        assert_eq!(priority.list(MediaKind::Video), vec!["cam-b", "cam-a"]);

        priority.prefer(MediaKind::Video, "cam-c");
        assert_eq!(
            priority.list(MediaKind::Video),
            vec!["cam-c", "cam-b", "cam-a"],
        );
        assert!(priority.list(MediaKind::Audio).is_empty());
    }

    #[test]
    fn prefer_persists_list() {
        let mut store = MockSettingsStore::new();
        store
            .expect_get()
            .withf(|key| key == "device-priority-audioinput")
            .return_const(Some(json!(["mic-a"])));
        store
            .expect_set()
            .withf(|key, value| {
                key == "device-priority-audioinput"
                    && value == &json!(["mic-b", "mic-a"])
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let priority = DevicePriority::new(Rc::new(store));

        priority.prefer(MediaKind::Audio, "mic-b");
    }

    #[test]
    fn malformed_list_is_ignored() {
        let mut store = MockSettingsStore::new();
        store.expect_get().return_const(Some(json!({"not": "a list"})));
        let priority = DevicePriority::new(Rc::new(store));

        assert!(priority.list(MediaKind::Video).is_empty());
    }

    #[test]
    fn orders_preferred_devices_first() {
        let store = Rc::new(MemoryStore::new());
        let priority = DevicePriority::new(store);
        priority.prefer(MediaKind::Video, "cam-a");
        priority.prefer(MediaKind::Video, "cam-c");

        let ordered = priority.order(
            MediaKind::Video,
            vec![
                device("cam-a", MediaKind::Video),
                device("mic-a", MediaKind::Audio),
                device("cam-b", MediaKind::Video),
                device("cam-c", MediaKind::Video),
            ],
        );
        let ids: Vec<_> = ordered.iter().map(|d| d.device_id()).collect();
        assert_eq!(ids, vec!["cam-c", "cam-a", "cam-b"]);
    }
}
