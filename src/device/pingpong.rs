/// Two slots used alternately as "read from previous pass" and "write for current pass".
///
/// Roles are an index over a fixed array, so swapping never moves or aliases the slot values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PingPong<T> {
    slots: [T; 2],
    current: usize,
}

impl<T> PingPong<T> {
    /// Slot 0 starts as the current (write) slot.
    pub fn new(slots: [T; 2]) -> Self {
        Self { slots, current: 0 }
    }

    /// Slot written by the current pass.
    pub fn current(&self) -> &T {
        &self.slots[self.current]
    }

    /// Slot written by the previous pass, readable by the current one.
    pub fn previous(&self) -> &T {
        &self.slots[1 - self.current]
    }

    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }
}
