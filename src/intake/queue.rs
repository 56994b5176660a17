//! Bounded spawn-request queue between a producer thread and the simulation
//!
//! Producers never touch the simulation. The simulation thread drains a
//! bounded number of requests per frame, so bursts are spread over frames.

use crossbeam::channel::{Receiver, Sender, TrySendError};

use crate::sim::{ColorTag, Simulation};

/// Result of feeding requests into the simulation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub spawned: usize,
    /// Requests consumed but refused by the capacity policy
    pub rejected: usize,
}

impl DrainReport {
    pub fn merge(&mut self, other: DrainReport) {
        self.spawned += other.spawned;
        self.rejected += other.rejected;
    }

    pub fn total(&self) -> usize {
        self.spawned + self.rejected
    }
}

/// Producer half; owned by the feed worker
#[derive(Debug, Clone)]
pub struct SpawnSender {
    tx: Sender<ColorTag>,
}

impl SpawnSender {
    /// Enqueue without blocking; returns false if the request was dropped
    pub fn push(&self, color: ColorTag) -> bool {
        match self.tx.try_send(color) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("Spawn queue full, dropping {color} request");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Consumer half; owned by the simulation thread
#[derive(Debug)]
pub struct SpawnQueue {
    rx: Receiver<ColorTag>,
}

/// Create a bounded queue holding at most `capacity` pending requests
pub fn spawn_queue(capacity: usize) -> (SpawnSender, SpawnQueue) {
    let (tx, rx) = crossbeam::channel::bounded(capacity.max(1));
    (SpawnSender { tx }, SpawnQueue { rx })
}

impl SpawnQueue {
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Pop up to `max` requests without blocking
    pub fn drain(&self, max: usize) -> Vec<ColorTag> {
        self.rx.try_iter().take(max).collect()
    }

    /// Spawn up to `max` queued requests; rejected ones are consumed anyway
    pub fn drain_into(&self, sim: &mut Simulation, max: usize) -> DrainReport {
        let mut report = DrainReport::default();
        for color in self.rx.try_iter().take(max) {
            match sim.spawn(color) {
                Ok(_) => report.spawned += 1,
                Err(_) => report.rejected += 1,
            }
        }
        report
    }

    /// Throw away everything pending
    pub fn discard(&self) -> usize {
        self.rx.try_iter().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_is_bounded() {
        let (tx, queue) = spawn_queue(64);
        for _ in 0..20 {
            assert!(tx.push(ColorTag::Red));
        }
        let mut sim = Simulation::with_defaults(1);
        let report = queue.drain_into(&mut sim, 6);
        assert_eq!(report.spawned, 6);
        assert_eq!(queue.pending(), 14);
        assert_eq!(sim.len(), 6);
    }

    #[test]
    fn test_full_queue_drops() {
        let (tx, queue) = spawn_queue(2);
        assert!(tx.push(ColorTag::Red));
        assert!(tx.push(ColorTag::Blue));
        assert!(!tx.push(ColorTag::Green));
        assert_eq!(queue.drain(10), vec![ColorTag::Red, ColorTag::Blue]);
    }

    #[test]
    fn test_rejected_requests_are_consumed() {
        let (tx, queue) = spawn_queue(16);
        let mut sim = Simulation::with_defaults(1);
        while sim.spawn(ColorTag::Black).is_ok() {}
        for _ in 0..4 {
            tx.push(ColorTag::White);
        }
        let report = queue.drain_into(&mut sim, 6);
        assert_eq!(report, DrainReport { spawned: 0, rejected: 4 });
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_discard_and_disconnect() {
        let (tx, queue) = spawn_queue(8);
        tx.push(ColorTag::Red);
        tx.push(ColorTag::Red);
        assert_eq!(queue.discard(), 2);
        drop(queue);
        assert!(!tx.push(ColorTag::Red));
    }
}
