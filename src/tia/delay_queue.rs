/*!
Delay queue for TIA register writes.

Sixteen slots, one per color clock. A write with delay `d` lands in slot
`(index + d) % 16`; `execute` drains the slot under `index` in insertion order
and then advances. A write to a register that is still pending removes the
pending entry first, so the newest value wins.

Because `execute` runs at the start of every color clock, a write with
delay `d` takes effect on the `(d + 1)`-th clock after the poke.
*/

use crate::error::StateError;
use crate::serializer::Serializer;

pub const LENGTH: usize = 16;
const CAPACITY: usize = 16;
const NOT_QUEUED: u8 = 0xFF;

#[derive(Debug, Clone, Copy)]
struct Slot {
    entries: [(u8, u8); CAPACITY],
    size: u8,
}

impl Slot {
    const EMPTY: Slot = Slot {
        entries: [(0, 0); CAPACITY],
        size: 0,
    };

    fn push(&mut self, address: u8, value: u8) {
        if (self.size as usize) < CAPACITY {
            self.entries[self.size as usize] = (address, value);
            self.size += 1;
        }
    }

    fn remove(&mut self, address: u8) {
        let n = self.size as usize;
        if let Some(i) = self.entries[..n].iter().position(|&(a, _)| a == address) {
            self.entries.copy_within(i + 1..n, i);
            self.size -= 1;
        }
    }
}

/// Writes drained from one slot.
pub struct Due {
    slot: Slot,
    pos: u8,
}

impl Iterator for Due {
    type Item = (u8, u8);

    fn next(&mut self) -> Option<(u8, u8)> {
        if self.pos < self.slot.size {
            let entry = self.slot.entries[self.pos as usize];
            self.pos += 1;
            Some(entry)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct DelayQueue {
    slots: [Slot; LENGTH],
    index: u8,
    /// Slot holding the pending write for each address, or `NOT_QUEUED`.
    indices: [u8; 256],
}

impl Default for DelayQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayQueue {
    pub fn new() -> Self {
        Self {
            slots: [Slot::EMPTY; LENGTH],
            index: 0,
            indices: [NOT_QUEUED; 256],
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Queue `value` for `address`, replacing any pending write to it.
    pub fn push(&mut self, address: u8, value: u8, delay: u8) {
        let delay = (delay as usize).min(LENGTH - 1);
        let current = self.indices[address as usize];
        if current != NOT_QUEUED {
            self.slots[current as usize].remove(address);
        }
        let slot = (self.index as usize + delay) % LENGTH;
        self.slots[slot].push(address, value);
        self.indices[address as usize] = slot as u8;
    }

    /// Take the writes due this clock (in insertion order) and advance.
    pub fn execute(&mut self) -> Due {
        let slot = self.slots[self.index as usize];
        self.slots[self.index as usize].size = 0;
        for &(address, _) in &slot.entries[..slot.size as usize] {
            self.indices[address as usize] = NOT_QUEUED;
        }
        self.index = ((self.index as usize + 1) % LENGTH) as u8;
        Due { slot, pos: 0 }
    }

    pub fn save_state(&self, out: &mut Serializer) -> Result<(), StateError> {
        out.put_byte(self.index);
        for slot in &self.slots {
            out.put_byte(slot.size);
            for &(address, value) in &slot.entries[..slot.size as usize] {
                out.put_byte(address);
                out.put_byte(value);
            }
        }
        Ok(())
    }

    pub fn load_state(&mut self, input: &mut Serializer) -> Result<(), StateError> {
        let mut queue = DelayQueue::new();
        queue.index = input.get_byte()?;
        if queue.index as usize >= LENGTH {
            return Err(StateError::InvalidValue {
                field: "delay queue index",
                value: queue.index as u64,
            });
        }
        for i in 0..LENGTH {
            let size = input.get_byte()?;
            if size as usize > CAPACITY {
                return Err(StateError::InvalidValue {
                    field: "delay queue slot size",
                    value: size as u64,
                });
            }
            for _ in 0..size {
                let address = input.get_byte()?;
                let value = input.get_byte()?;
                queue.slots[i].push(address, value);
                queue.indices[address as usize] = i as u8;
            }
        }
        *self = queue;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(q: &mut DelayQueue, clocks: usize) -> Vec<(usize, u8, u8)> {
        let mut fired = Vec::new();
        for clock in 0..clocks {
            fired.extend(q.execute().map(|(a, v)| (clock, a, v)));
        }
        fired
    }

    #[test]
    fn delay_fires_on_clock_index_d() {
        let mut q = DelayQueue::new();
        q.push(0x0D, 0xAA, 2);
        q.push(0x2A, 0x00, 6);
        assert_eq!(run(&mut q, 8), vec![(2, 0x0D, 0xAA), (6, 0x2A, 0x00)]);
    }

    #[test]
    fn newest_write_replaces_pending() {
        let mut q = DelayQueue::new();
        q.push(0x0E, 1, 2);
        q.push(0x0E, 2, 1);
        assert_eq!(run(&mut q, 4), vec![(1, 0x0E, 2)]);
    }

    #[test]
    fn same_slot_keeps_insertion_order() {
        let mut q = DelayQueue::new();
        q.push(0x1B, 5, 1);
        q.push(0xF1, 0, 1);
        assert_eq!(run(&mut q, 2), vec![(1, 0x1B, 5), (1, 0xF1, 0)]);
    }

    #[test]
    fn state_round_trip_preserves_pending() {
        let mut q = DelayQueue::new();
        assert_eq!(q.execute().count(), 0);
        q.push(0x0F, 0x33, 3);
        let mut s = Serializer::new();
        q.save_state(&mut s).expect("save");
        let mut r = DelayQueue::new();
        r.load_state(&mut s).expect("load");
        assert_eq!(run(&mut r, 5), vec![(3, 0x0F, 0x33)]);
    }
}
