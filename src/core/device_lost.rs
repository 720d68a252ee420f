use log::debug;
use parking_lot::{const_mutex, Mutex};

use super::completion::{EventPump, WaitPolicy};

pub const DEVICE_LOST_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    device: usize,
    reason: u32,
}

/// Last observed loss reason per device handle.
///
/// Fixed capacity: events for untracked devices are dropped once full.
pub struct DeviceLostRegistry {
    entries: Mutex<Vec<Entry>>,
}

impl Default for DeviceLostRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceLostRegistry {
    pub const fn new() -> Self {
        DeviceLostRegistry {
            entries: const_mutex(Vec::new()),
        }
    }

    pub fn upsert(&self, device: usize, reason: u32) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.iter_mut().find(|e| e.device == device) {
            entry.reason = reason;
            return;
        }
        if entries.len() < DEVICE_LOST_CAPACITY {
            entries.push(Entry { device, reason });
        } else {
            debug!("device-lost registry full, dropping event for {device:#x}");
        }
    }

    /// Removes and returns the recorded reason for `device`.
    pub fn take(&self, device: usize) -> Option<u32> {
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|e| e.device == device)?;
        Some(entries.swap_remove(index).reason)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pumps until a reason for `device` shows up or `policy` runs out.
    pub fn wait_for(&self, pump: &impl EventPump, device: usize, policy: WaitPolicy) -> Option<u32> {
        profiling::scope!("DeviceLostRegistry::wait_for");
        let (max_iters, quantum) = match policy {
            WaitPolicy::Bounded { max_iters, quantum } => (Some(max_iters), quantum),
            WaitPolicy::Unbounded => (None, Default::default()),
        };
        let mut iters = 0u32;
        loop {
            if let Some(reason) = self.take(device) {
                return Some(reason);
            }
            if max_iters.map_or(false, |max| iters >= max) {
                return None;
            }
            pump.process_events();
            iters = iters.saturating_add(1);
            std::thread::sleep(quantum);
        }
    }
}

static DEVICE_LOST: DeviceLostRegistry = DeviceLostRegistry::new();

pub fn device_lost_registry() -> &'static DeviceLostRegistry {
    &DEVICE_LOST
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, time::Duration};

    use super::*;
    use crate::core::native::DEVICE_LOST_REASON_DESTROYED;

    #[test]
    fn upsert_then_take_once() {
        let registry = DeviceLostRegistry::new();
        registry.upsert(0x10, 1);
        registry.upsert(0x10, DEVICE_LOST_REASON_DESTROYED);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.take(0x10), Some(DEVICE_LOST_REASON_DESTROYED));
        assert_eq!(registry.take(0x10), None);
    }

    #[test]
    fn overflow_keeps_existing_entries() {
        let registry = DeviceLostRegistry::new();
        for i in 0..DEVICE_LOST_CAPACITY + 8 {
            registry.upsert(0x100 + i, i as u32 + 1);
        }
        assert_eq!(registry.len(), DEVICE_LOST_CAPACITY);
        for i in 0..DEVICE_LOST_CAPACITY {
            assert_eq!(registry.take(0x100 + i), Some(i as u32 + 1));
        }
        for i in DEVICE_LOST_CAPACITY..DEVICE_LOST_CAPACITY + 8 {
            assert_eq!(registry.take(0x100 + i), None);
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn full_registry_still_updates_tracked_devices() {
        let registry = DeviceLostRegistry::new();
        for i in 0..DEVICE_LOST_CAPACITY {
            registry.upsert(i, 1);
        }
        registry.upsert(3, 4);
        assert_eq!(registry.take(3), Some(4));
    }

    #[test]
    fn wait_sees_reason_recorded_by_pump() {
        let registry = DeviceLostRegistry::new();
        let pumps = Cell::new(0);
        let pump = || {
            pumps.set(pumps.get() + 1);
            if pumps.get() == 2 {
                registry.upsert(0x20, 3);
            }
        };
        assert_eq!(
            registry.wait_for(&pump, 0x20, WaitPolicy::OPTIONAL_API),
            Some(3)
        );
    }

    #[test]
    fn wait_gives_up() {
        let registry = DeviceLostRegistry::new();
        let policy = WaitPolicy::Bounded {
            max_iters: 10,
            quantum: Duration::from_millis(1),
        };
        assert_eq!(registry.wait_for(&|| {}, 0x30, policy), None);
    }
}
