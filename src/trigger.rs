// State shared between the trigger interrupt and the main loop.
// The interrupt only ever calls arm()/disarm(). Everything else belongs to the main loop.

use core::cell::Cell;
use critical_section::Mutex;

pub struct TriggerFlag {
    armed: Mutex<Cell<bool>>,
    // Edges that arrived while the flag was already set and were merged into the pending arm
    coalesced: Mutex<Cell<u16>>,
}

impl TriggerFlag {
    pub const fn new() -> Self {
        TriggerFlag { armed: Mutex::new(Cell::new(false)), coalesced: Mutex::new(Cell::new(0)) }
    }

    /// Called from the trigger interrupt on the active edge.
    pub fn arm(&self) {
        critical_section::with(|cs| {
            let armed = self.armed.borrow(cs);
            if armed.get() {
                let coalesced = self.coalesced.borrow(cs);
                coalesced.set(coalesced.get().saturating_add(1));
            }
            armed.set(true);
        });
    }

    pub fn disarm(&self) {
        critical_section::with(|cs| self.armed.borrow(cs).set(false));
    }

    /// Read and clear in one critical section, so an edge landing between the two can't be lost or counted twice.
    pub fn take(&self) -> bool {
        critical_section::with(|cs| self.armed.borrow(cs).replace(false))
    }

    /// Level read. Does not consume the arm.
    pub fn is_armed(&self) -> bool {
        critical_section::with(|cs| self.armed.borrow(cs).get())
    }

    /// Number of edges merged into an already pending arm since the last call. Resets the count.
    pub fn take_coalesced(&self) -> u16 {
        critical_section::with(|cs| self.coalesced.borrow(cs).replace(0))
    }
}

impl Default for TriggerFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disarmed() {
        let flag = TriggerFlag::new();
        assert!(!flag.is_armed());
        assert!(!flag.take());
    }

    #[test]
    fn take_consumes_a_single_arm() {
        let flag = TriggerFlag::new();
        flag.arm();
        assert!(flag.is_armed());
        assert!(flag.take());
        assert!(!flag.take());
        assert!(!flag.is_armed());
    }

    #[test]
    fn level_read_does_not_consume() {
        let flag = TriggerFlag::new();
        flag.arm();
        assert!(flag.is_armed());
        assert!(flag.is_armed());
        flag.disarm();
        assert!(!flag.is_armed());
    }

    #[test]
    fn repeated_edges_before_take_are_counted_as_coalesced() {
        let flag = TriggerFlag::new();
        flag.arm();
        flag.arm();
        flag.arm();
        assert!(flag.take());
        assert!(!flag.take());
        assert_eq!(flag.take_coalesced(), 2);
        assert_eq!(flag.take_coalesced(), 0);
    }
}
