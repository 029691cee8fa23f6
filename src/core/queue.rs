use crate::error::{Error, Result};
use ordered_float::NotNan;
use std::cmp::Ordering;

/// Next scheduled event of one subvolume.
///
/// - `time`: when the subvolume next fires; `+inf` for a subvolume that
///   cannot fire.
/// - `subvolume`: which subvolume; also the tie-breaker at equal times.
/// - `sampled_at`: simulation time at which `time` was drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    pub time: NotNan<f64>,
    pub subvolume: usize,
    pub sampled_at: NotNan<f64>,
}

impl QueueEntry {
    /// Create a new entry. Times may be infinite but not NaN.
    pub fn new(time: f64, subvolume: usize, sampled_at: f64) -> Result<Self> {
        let time = NotNan::new(time)
            .map_err(|_| Error::MathError(format!("event time for subvolume {subvolume} is NaN")))?;
        let sampled_at = NotNan::new(sampled_at)
            .map_err(|_| Error::MathError(format!("sample time for subvolume {subvolume} is NaN")))?;
        Ok(Self {
            time,
            subvolume,
            sampled_at,
        })
    }

    #[inline]
    pub fn time_f64(&self) -> f64 {
        self.time.into_inner()
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.cmp(&other.time) {
            Ordering::Equal => self.subvolume.cmp(&other.subvolume),
            o => o,
        }
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Binary min-heap holding exactly one entry per subvolume, with an index
/// from subvolume to heap slot so an entry can be re-keyed in O(log n).
#[derive(Debug, Clone, Default)]
pub struct SubvolumeQueue {
    heap: Vec<QueueEntry>,
    slots: Vec<usize>,
}

impl SubvolumeQueue {
    /// Queue with every subvolume scheduled at `time`.
    pub fn new(num_subvolumes: usize, time: f64, now: f64) -> Result<Self> {
        let heap = (0..num_subvolumes)
            .map(|i| QueueEntry::new(time, i, now))
            .collect::<Result<Vec<_>>>()?;
        // Equal times ordered by subvolume already form a valid heap.
        Ok(Self {
            heap,
            slots: (0..num_subvolumes).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Earliest entry.
    pub fn top(&self) -> Option<&QueueEntry> {
        self.heap.first()
    }

    pub fn get(&self, subvolume: usize) -> Option<&QueueEntry> {
        self.slots.get(subvolume).map(|&s| &self.heap[s])
    }

    /// Re-key the entry of `entry.subvolume`, moving it up or down as needed.
    pub fn update(&mut self, entry: QueueEntry) -> Result<()> {
        let slot = *self.slots.get(entry.subvolume).ok_or_else(|| {
            Error::InvalidParam(format!("subvolume {} not in queue", entry.subvolume))
        })?;
        let old = std::mem::replace(&mut self.heap[slot], entry);
        if entry < old {
            self.sift_up(slot);
        } else {
            self.sift_down(slot);
        }
        Ok(())
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.slots[self.heap[a].subvolume] = a;
        self.slots[self.heap[b].subvolume] = b;
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.heap[slot] >= self.heap[parent] {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        let n = self.heap.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut smallest = slot;
            if left < n && self.heap[left] < self.heap[smallest] {
                smallest = left;
            }
            if right < n && self.heap[right] < self.heap[smallest] {
                smallest = right;
            }
            if smallest == slot {
                break;
            }
            self.swap(slot, smallest);
            slot = smallest;
        }
    }
}
