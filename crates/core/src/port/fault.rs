// Device Fault Port

use crate::domain::{DeviceFault, Store};
use std::sync::Mutex;
use tracing::{error, info};

/// Sink for device-level error flags consumed by health reporting
pub trait FaultReporter: Send + Sync {
    /// Raise a fault (replaces any fault already raised for the same store)
    fn raise(&self, fault: DeviceFault);

    /// Clear faults raised for a store
    fn clear(&self, store: Store);

    /// Faults currently raised
    fn active(&self) -> Vec<DeviceFault>;
}

/// In-memory fault flags (production default)
#[derive(Default)]
pub struct DeviceFaultFlags {
    faults: Mutex<Vec<DeviceFault>>,
}

impl DeviceFaultFlags {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_faults<T>(&self, f: impl FnOnce(&mut Vec<DeviceFault>) -> T) -> T {
        // Poison ignored: every critical section leaves the Vec consistent
        let mut faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut faults)
    }
}

impl FaultReporter for DeviceFaultFlags {
    fn raise(&self, fault: DeviceFault) {
        error!(store = %fault.store(), fault = %fault, "Device fault raised");
        self.with_faults(|faults| {
            faults.retain(|f| f.store() != fault.store());
            faults.push(fault);
        });
    }

    fn clear(&self, store: Store) {
        let cleared = self.with_faults(|faults| {
            let before = faults.len();
            faults.retain(|f| f.store() != store);
            before - faults.len()
        });
        if cleared > 0 {
            info!(store = %store, "Device fault cleared");
        }
    }

    fn active(&self) -> Vec<DeviceFault> {
        self.with_faults(|faults| faults.clone())
    }
}
