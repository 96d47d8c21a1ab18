//! Bounded queue of packets awaiting a flush.

use lego_ir_protocol::Packet;

use crate::error::{ControllerError, ControllerResult};

#[derive(Debug, Clone)]
pub struct CommandQueue {
    packets: Vec<Packet>,
    capacity: usize,
}

impl CommandQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            packets: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.packets.len())
    }

    /// Appends every packet in order, or none of them if they do not all fit.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::QueueFull`] when the append would exceed the
    /// queue capacity.
    pub fn try_extend(&mut self, packets: &[Packet]) -> ControllerResult<()> {
        if packets.len() > self.remaining() {
            return Err(ControllerError::queue_full(
                self.capacity,
                self.packets.len(),
                packets.len(),
            ));
        }
        self.packets.extend_from_slice(packets);
        Ok(())
    }

    /// Empties the queue, returning its packets moved onto `channel`.
    pub fn take_batch(&mut self, channel: u8) -> Vec<Packet> {
        let mut batch = std::mem::replace(&mut self.packets, Vec::with_capacity(self.capacity));
        for packet in &mut batch {
            *packet = packet.with_channel(channel);
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lego_ir_protocol::KeyMask;

    #[test]
    fn test_extend_is_all_or_nothing() {
        let mut queue = CommandQueue::with_capacity(3);
        assert!(queue.try_extend(&[Packet::stop(0); 2]).is_ok());

        let err = queue.try_extend(&[Packet::stop(0); 2]);
        assert_eq!(err, Err(ControllerError::queue_full(3, 2, 2)));
        assert_eq!(queue.len(), 2);

        assert!(queue.try_extend(&[Packet::stop(0)]).is_ok());
        assert_eq!(queue.remaining(), 0);
    }

    #[test]
    fn test_take_batch_rewrites_channel() {
        let mut queue = CommandQueue::with_capacity(8);
        let appended = [
            Packet::new(KeyMask::LEFT_FORWARD, 0),
            Packet::new(KeyMask::BACKWARD, 5),
        ];
        assert!(queue.try_extend(&appended).is_ok());

        let batch = queue.take_batch(1);
        assert!(queue.is_empty());
        assert_eq!(
            batch,
            vec![
                Packet::new(KeyMask::LEFT_FORWARD, 1),
                Packet::new(KeyMask::BACKWARD, 1),
            ]
        );
        assert!(batch.iter().all(|p| p.is_well_formed()));
    }

    #[test]
    fn test_take_batch_on_empty_queue() {
        let mut queue = CommandQueue::with_capacity(4);
        assert!(queue.take_batch(2).is_empty());
        assert_eq!(queue.capacity(), 4);
    }
}
