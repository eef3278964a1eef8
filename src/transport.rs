//! Seam between the engine and whatever forwards beacons off-process.

use std::sync::Arc;

use parking_lot::Mutex;
use screenperf_event_bus::{forward_to_channel, BusError, EventBus, InMemoryBus};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::beacon::Beacon;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("beacon rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Fire-and-forget delivery. Errors are reported back to the registry, which
/// logs and counts them; they never reach session state.
pub trait BeaconTransport: Send + Sync {
    fn dispatch(&self, beacon: &Beacon) -> Result<(), TransportError>;
}

impl<F> BeaconTransport for F
where
    F: Fn(&Beacon) -> Result<(), TransportError> + Send + Sync,
{
    fn dispatch(&self, beacon: &Beacon) -> Result<(), TransportError> {
        self(beacon)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullTransport;

impl BeaconTransport for NullTransport {
    fn dispatch(&self, _beacon: &Beacon) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Publishes beacons on an in-process broadcast bus.
pub struct BusTransport {
    bus: Arc<InMemoryBus<Beacon>>,
}

impl BusTransport {
    pub fn new(capacity: usize) -> Self {
        Self {
            bus: InMemoryBus::new(capacity),
        }
    }

    pub fn with_bus(bus: Arc<InMemoryBus<Beacon>>) -> Self {
        Self { bus }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Beacon> {
        self.bus.subscribe()
    }

    /// Bounded channel fed from the bus; needs a tokio runtime.
    pub fn channel(&self, capacity: usize) -> mpsc::Receiver<Beacon> {
        forward_to_channel(&self.bus, capacity)
    }

    pub fn bus(&self) -> Arc<InMemoryBus<Beacon>> {
        Arc::clone(&self.bus)
    }
}

impl BeaconTransport for BusTransport {
    fn dispatch(&self, beacon: &Beacon) -> Result<(), TransportError> {
        self.bus.publish(beacon.clone())?;
        Ok(())
    }
}

/// Keeps every dispatched beacon in memory.
#[derive(Default)]
pub struct CollectingTransport {
    beacons: Mutex<Vec<Beacon>>,
}

impl CollectingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn beacons(&self) -> Vec<Beacon> {
        self.beacons.lock().clone()
    }

    pub fn take(&self) -> Vec<Beacon> {
        std::mem::take(&mut *self.beacons.lock())
    }

    pub fn len(&self) -> usize {
        self.beacons.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.beacons.lock().is_empty()
    }
}

impl BeaconTransport for CollectingTransport {
    fn dispatch(&self, beacon: &Beacon) -> Result<(), TransportError> {
        self.beacons.lock().push(beacon.clone());
        Ok(())
    }
}
