//! Fixed-capacity tile slots with intrusive index lists.
//!
//! Every allocated slot is on exactly one of two lists: `used` (doubly
//! linked, most recently touched at the head) or `free` (singly linked).
//! Slots are addressed by index, never by reference, so a stale handle
//! can at worst name a recycled slot, not dangling memory.

/// Accumulation planes of one in-memory tile.
#[derive(Debug, Clone)]
pub struct TileBuffer {
    /// Σ weight·value (weighted kernels) or the winning tap value (nearest).
    pub sum: Vec<f64>,
    /// Σ weight of the non-fill taps seen. Cubic partials can be negative.
    pub weight: Vec<f64>,
    /// Highest single tap weight seen (nearest kernels only).
    pub nn_weight: Vec<f64>,
    /// Set while a pixel is marked fill by the majority rule.
    pub marked_fill: Vec<bool>,
}

impl TileBuffer {
    fn new(len: usize) -> Self {
        Self {
            sum: vec![0.0; len],
            weight: vec![0.0; len],
            nn_weight: vec![0.0; len],
            marked_fill: vec![false; len],
        }
    }

    fn clear(&mut self) {
        self.sum.fill(0.0);
        self.weight.fill(0.0);
        self.nn_weight.fill(0.0);
        self.marked_fill.fill(false);
    }

    pub fn len(&self) -> usize {
        self.sum.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sum.is_empty()
    }

    /// Whether pixel `index` is currently marked fill.
    pub fn is_marked_fill(&self, index: usize) -> bool {
        self.marked_fill[index]
    }

    /// A contribution arriving at a marked pixel starts it over.
    fn restart_if_marked(&mut self, index: usize) {
        if self.marked_fill[index] {
            self.sum[index] = 0.0;
            self.weight[index] = 0.0;
            self.nn_weight[index] = 0.0;
            self.marked_fill[index] = false;
        }
    }

    /// Add a weighted-average contribution.
    pub fn add_weighted(&mut self, index: usize, weighted_sum: f64, weight: f64) {
        self.restart_if_marked(index);
        self.sum[index] += weighted_sum;
        self.weight[index] += weight;
    }

    /// Offer a nearest-neighbor candidate: it replaces the stored value
    /// only when its weight is strictly greater than the best seen so far,
    /// so the first of two equal-weight candidates wins.
    pub fn offer_nearest(&mut self, index: usize, value: f64, weight: f64, coverage: f64) {
        self.restart_if_marked(index);
        if weight > self.nn_weight[index] {
            self.sum[index] = value;
            self.nn_weight[index] = weight;
        }
        self.weight[index] += coverage;
    }

    /// Mark pixel `index` as fill.
    pub fn mark_fill(&mut self, index: usize, fill_value: f64) {
        self.sum[index] = fill_value;
        self.weight[index] = 0.0;
        self.nn_weight[index] = 0.0;
        self.marked_fill[index] = true;
    }

    /// Final value of pixel `index` in source units, or `None` when the
    /// pixel has too little weight to be valid.
    pub fn resolve(&self, index: usize, nearest: bool, min_weight: f64) -> Option<f64> {
        let weight = self.weight[index];
        if self.marked_fill[index] || weight <= min_weight {
            return None;
        }
        let value = if nearest {
            self.sum[index]
        } else {
            self.sum[index] / weight
        };
        value.is_finite().then_some(value)
    }
}

#[derive(Debug)]
pub(crate) struct TileSlot {
    pub(crate) tile_row: usize,
    pub(crate) tile_col: usize,
    pub(crate) touch: i32,
    pub(crate) touched_this_scan: bool,
    pub(crate) buffer: TileBuffer,
}

#[derive(Debug)]
pub(crate) struct TileArena {
    slots: Vec<TileSlot>,
    prev_used: Vec<Option<usize>>,
    next_used: Vec<Option<usize>>,
    next_free: Vec<Option<usize>>,
    used_head: Option<usize>,
    free_head: Option<usize>,
    n_used: usize,
    n_free: usize,
    tile_len: usize,
    max_slots: usize,
    growth_batch: usize,
}

impl TileArena {
    pub(crate) fn new(tile_len: usize, max_slots: usize, growth_batch: usize) -> Self {
        Self {
            slots: Vec::new(),
            prev_used: Vec::new(),
            next_used: Vec::new(),
            next_free: Vec::new(),
            used_head: None,
            free_head: None,
            n_used: 0,
            n_free: 0,
            tile_len,
            max_slots,
            growth_batch: growth_batch.max(1),
        }
    }

    /// Slots allocated so far (used + free).
    pub(crate) fn n_in_memory(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn n_used(&self) -> usize {
        self.n_used
    }

    pub(crate) fn n_free(&self) -> usize {
        self.n_free
    }

    pub(crate) fn max_slots(&self) -> usize {
        self.max_slots
    }

    pub(crate) fn slot(&self, index: usize) -> &TileSlot {
        &self.slots[index]
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut TileSlot {
        &mut self.slots[index]
    }

    /// Allocate the next batch of slots onto the free list. Returns
    /// `false` when the cap is reached.
    fn grow(&mut self) -> bool {
        let room = self.max_slots.saturating_sub(self.slots.len());
        let batch = self.growth_batch.min(room);
        if batch == 0 {
            return false;
        }
        for _ in 0..batch {
            let index = self.slots.len();
            self.slots.push(TileSlot {
                tile_row: 0,
                tile_col: 0,
                touch: 0,
                touched_this_scan: false,
                buffer: TileBuffer::new(self.tile_len),
            });
            self.prev_used.push(None);
            self.next_used.push(None);
            self.next_free.push(None);
            self.push_free(index);
        }
        true
    }

    /// Take a cleared slot off the free list, growing if needed.
    pub(crate) fn take_free(&mut self) -> Option<usize> {
        if self.free_head.is_none() && !self.grow() {
            return None;
        }
        let index = self.free_head?;
        self.free_head = self.next_free[index];
        self.next_free[index] = None;
        self.n_free -= 1;
        self.slots[index].buffer.clear();
        Some(index)
    }

    pub(crate) fn push_free(&mut self, index: usize) {
        self.next_free[index] = self.free_head;
        self.free_head = Some(index);
        self.n_free += 1;
    }

    pub(crate) fn push_used_front(&mut self, index: usize) {
        self.prev_used[index] = None;
        self.next_used[index] = self.used_head;
        if let Some(head) = self.used_head {
            self.prev_used[head] = Some(index);
        }
        self.used_head = Some(index);
        self.n_used += 1;
    }

    pub(crate) fn unlink_used(&mut self, index: usize) {
        let prev = self.prev_used[index].take();
        let next = self.next_used[index].take();
        match prev {
            Some(p) => self.next_used[p] = next,
            None => self.used_head = next,
        }
        if let Some(n) = next {
            self.prev_used[n] = prev;
        }
        self.n_used -= 1;
    }

    pub(crate) fn move_to_front(&mut self, index: usize) {
        if self.used_head == Some(index) {
            return;
        }
        self.unlink_used(index);
        self.push_used_front(index);
    }

    /// Used slots from most to least recently touched.
    pub(crate) fn used(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.n_used);
        let mut cursor = self.used_head;
        while let Some(index) = cursor {
            out.push(index);
            cursor = self.next_used[index];
        }
        out
    }
}
