use serde::Serialize;

use crate::device::DeviceId;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SeatId(pub u32);

/// A master pointer and keyboard pair, with the physical devices behind them.
#[derive(Debug, Clone)]
pub struct Seat {
    pub id: SeatId,
    pub pointer: DeviceId,
    pub keyboard: DeviceId,
    slaves: Vec<DeviceId>,
}

impl Seat {
    pub fn new(id: SeatId, pointer: DeviceId, keyboard: DeviceId) -> Self {
        Self {
            id,
            pointer,
            keyboard,
            slaves: Vec::new(),
        }
    }

    pub fn add_slave(&mut self, device: DeviceId) {
        if !self.slaves.contains(&device) {
            self.slaves.push(device);
        }
    }

    pub fn slaves(&self) -> &[DeviceId] {
        &self.slaves
    }

    pub fn contains(&self, device: DeviceId) -> bool {
        self.pointer == device || self.keyboard == device || self.slaves.contains(&device)
    }
}
