/*!
audio_queue.rs - Fixed-capacity fragment ring shared between the emulation
thread (producer) and an audio output thread (consumer).

Overview
========
Fragments are `Vec<i16>` buffers of `fragment_size * channels` samples. The
queue never allocates after construction: both sides trade buffers. The
producer hands in a full fragment and receives an empty one to fill next;
the consumer hands in the fragment it finished playing and receives the
oldest queued one.

Each side starts without a buffer of its own, so the queue holds one extra
"bootstrap" fragment per side, each handed out exactly once (call with
`None`). The two bootstrap buffers are distinct allocations.

Overflow
========
When the ring is full, enqueueing overwrites the oldest fragment (the read
index advances) and bumps the overflow counter. Dequeueing from an empty ring
returns immediately with the caller's spare fragment.

Every operation holds a single `Mutex` for its whole duration and never
waits for data.
*/

use std::sync::{Mutex, MutexGuard};

use crate::error::CoreError;

pub type Fragment = Vec<i16>;

/// Result of `AudioQueue::dequeue`.
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeued {
    Fragment(Fragment),
    /// Nothing queued; the caller's spare fragment (if any) is handed back.
    Empty(Option<Fragment>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStatistics {
    pub enqueued: u64,
    pub dequeued: u64,
    pub overflows: u64,
}

struct Ring {
    slots: Vec<Fragment>,
    next: usize,
    size: usize,
    first_for_enqueue: Option<Fragment>,
    first_for_dequeue: Option<Fragment>,
    stats: QueueStatistics,
    ignore_overflows: bool,
}

pub struct AudioQueue {
    fragment_size: usize,
    capacity: usize,
    stereo: bool,
    sample_rate: u32,
    ring: Mutex<Ring>,
}

impl AudioQueue {
    /// Fails when `fragment_size` or `capacity` is zero.
    pub fn new(
        fragment_size: usize,
        capacity: usize,
        stereo: bool,
        sample_rate: u32,
    ) -> Result<Self, CoreError> {
        if fragment_size == 0 || capacity == 0 {
            return Err(CoreError::Config(format!(
                "audio queue needs a non-zero fragment size and capacity (got {fragment_size}, {capacity})"
            )));
        }
        let samples = fragment_size * if stereo { 2 } else { 1 };
        let slots = (0..capacity).map(|_| vec![0i16; samples]).collect();
        Ok(Self {
            fragment_size,
            capacity,
            stereo,
            sample_rate,
            ring: Mutex::new(Ring {
                slots,
                next: 0,
                size: 0,
                first_for_enqueue: Some(vec![0i16; samples]),
                first_for_dequeue: Some(vec![0i16; samples]),
                stats: QueueStatistics::default(),
                ignore_overflows: true,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Ring> {
        // A panicking peer leaves the ring structurally intact.
        self.ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[inline]
    pub fn fragment_size(&self) -> usize {
        self.fragment_size
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_stereo(&self) -> bool {
        self.stereo
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples per fragment across all channels.
    #[inline]
    pub fn fragment_len(&self) -> usize {
        self.fragment_size * if self.stereo { 2 } else { 1 }
    }

    pub fn size(&self) -> usize {
        self.lock().size
    }

    pub fn statistics(&self) -> QueueStatistics {
        self.lock().stats
    }

    /// Log overflows with `warn!` instead of counting them silently.
    pub fn set_ignore_overflows(&self, ignore: bool) {
        self.lock().ignore_overflows = ignore;
    }

    /// Producer side. `None` claims the bootstrap fragment (once); `Some`
    /// queues a full fragment and returns an empty one to fill next.
    pub fn enqueue(&self, fragment: Option<Fragment>) -> Result<Fragment, CoreError> {
        let mut ring = self.lock();

        let Some(fragment) = fragment else {
            return ring
                .first_for_enqueue
                .take()
                .ok_or(CoreError::BootstrapSpent { side: "enqueue" });
        };
        self.check_len(&fragment)?;

        let index = (ring.next + ring.size) % self.capacity;
        let recycled = std::mem::replace(&mut ring.slots[index], fragment);

        if ring.size < self.capacity {
            ring.size += 1;
        } else {
            ring.next = (ring.next + 1) % self.capacity;
            ring.stats.overflows += 1;
            if !ring.ignore_overflows {
                log::warn!("audio queue overflow, oldest fragment dropped");
            }
        }
        ring.stats.enqueued += 1;
        Ok(recycled)
    }

    /// Consumer side. `spare` is the fragment just played; `None` uses the
    /// bootstrap fragment (once).
    pub fn dequeue(&self, spare: Option<Fragment>) -> Result<Dequeued, CoreError> {
        let mut ring = self.lock();

        if ring.size == 0 {
            return Ok(Dequeued::Empty(spare));
        }

        let spare = match spare {
            Some(f) => {
                self.check_len(&f)?;
                f
            }
            None => ring
                .first_for_dequeue
                .take()
                .ok_or(CoreError::BootstrapSpent { side: "dequeue" })?,
        };

        let index = ring.next;
        let out = std::mem::replace(&mut ring.slots[index], spare);
        ring.size -= 1;
        ring.next = (ring.next + 1) % self.capacity;
        ring.stats.dequeued += 1;
        Ok(Dequeued::Fragment(out))
    }

    fn check_len(&self, f: &Fragment) -> Result<(), CoreError> {
        if f.len() != self.fragment_len() {
            return Err(CoreError::FragmentSize {
                expected: self.fragment_len(),
                actual: f.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn marked(q: &AudioQueue, mut f: Fragment, tag: i16) -> Fragment {
        assert_eq!(f.len(), q.fragment_len());
        f[0] = tag;
        f
    }

    #[test]
    fn bootstrap_fragments_are_distinct_and_single_use() {
        let q = AudioQueue::new(4, 1, false, 31_400).expect("queue");
        let a = q.enqueue(None).expect("enqueue bootstrap");
        let a_ptr = a.as_ptr();
        let recycled = q.enqueue(Some(a)).expect("queue one");
        let played = match q.dequeue(None).expect("dequeue bootstrap path") {
            Dequeued::Fragment(f) => f,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(played.as_ptr(), a_ptr);
        // The single slot now holds the dequeue bootstrap; the next enqueue hands it out.
        let d = q.enqueue(Some(recycled)).expect("queue again");
        assert_ne!(d.as_ptr(), a_ptr);
        assert_ne!(d.as_ptr(), played.as_ptr());

        assert_eq!(
            q.enqueue(None),
            Err(CoreError::BootstrapSpent { side: "enqueue" })
        );
        assert_eq!(
            q.dequeue(None),
            Err(CoreError::BootstrapSpent { side: "dequeue" })
        );
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(matches!(AudioQueue::new(4, 0, false, 31_400), Err(CoreError::Config(_))));
        assert!(matches!(AudioQueue::new(0, 4, true, 31_400), Err(CoreError::Config(_))));
    }

    #[test]
    fn overflow_drops_oldest() {
        let cap = 3;
        let q = AudioQueue::new(2, cap, false, 31_400).expect("queue");
        let mut f = q.enqueue(None).expect("bootstrap");
        for tag in 1..=(cap as i16 + 1) {
            f = q.enqueue(Some(marked(&q, f, tag))).expect("enqueue");
        }
        assert_eq!(q.size(), cap);
        assert_eq!(q.statistics().overflows, 1);

        let mut spare = None;
        let mut seen = Vec::new();
        while let Dequeued::Fragment(got) = q.dequeue(spare.take()).expect("dequeue") {
            seen.push(got[0]);
            spare = Some(got);
        }
        assert_eq!(seen, vec![2, 3, 4]);
    }

    #[test]
    fn empty_dequeue_returns_spare() {
        let q = AudioQueue::new(2, 2, true, 44_100).expect("queue");
        let spare = vec![7i16; 4];
        match q.dequeue(Some(spare)).expect("dequeue") {
            Dequeued::Empty(Some(back)) => assert_eq!(back, vec![7i16; 4]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wrong_length_rejected() {
        let q = AudioQueue::new(8, 2, false, 44_100).expect("queue");
        assert_eq!(
            q.enqueue(Some(vec![0; 3])),
            Err(CoreError::FragmentSize {
                expected: 8,
                actual: 3
            })
        );
    }

    #[test]
    fn shared_between_threads() {
        let q = Arc::new(AudioQueue::new(16, 4, false, 31_400).expect("queue"));
        let producer = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || {
                let mut f = q.enqueue(None).expect("bootstrap");
                for i in 0..100 {
                    f[0] = i;
                    f = q.enqueue(Some(f)).expect("enqueue");
                }
            })
        };
        producer.join().expect("producer");
        let stats = q.statistics();
        assert_eq!(stats.enqueued, 100);
        assert_eq!(stats.overflows, 96);
        assert_eq!(q.size(), 4);
    }
}
