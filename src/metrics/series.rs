use std::fmt;

/// A plotted sample: the sample index and its value.
pub type SeriesPoint = (u64, f64);

/// Fixed-capacity history of one plotted series.
///
/// Every appended value gets the next sample index; once `capacity` points are
/// held the oldest one is overwritten, so the buffer always contains the most
/// recent `capacity` samples in chronological order.
#[derive(Clone)]
pub struct RollingSeriesBuffer {
    buffer: Vec<SeriesPoint>,
    write_pos: usize,
    capacity: usize,
    next_index: u64,
}

impl RollingSeriesBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Vec::with_capacity(capacity),
            write_pos: 0,
            capacity,
            next_index: 0,
        }
    }

    pub fn append(&mut self, value: f64) {
        let point = (self.next_index, value);
        if self.buffer.len() < self.capacity {
            self.buffer.push(point);
        } else {
            self.buffer[self.write_pos] = point;
        }
        self.write_pos = (self.write_pos + 1) % self.capacity;
        self.next_index += 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeriesPoint> {
        let head = if self.buffer.len() < self.capacity {
            0
        } else {
            self.write_pos
        };

        self.buffer[head..].iter().chain(&self.buffer[..head])
    }

    /// Owned copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<SeriesPoint> {
        self.iter().copied().collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.iter().map(|(_, value)| *value).collect()
    }

    /// Scrolling x-axis range `[next_index - capacity, next_index]`.
    pub fn window_bounds(&self) -> (u64, u64) {
        (
            self.next_index.saturating_sub(self.capacity as u64),
            self.next_index,
        )
    }

    pub fn last(&self) -> Option<f64> {
        if self.buffer.is_empty() {
            return None;
        }
        let pos = (self.write_pos + self.capacity - 1) % self.capacity;
        self.buffer.get(pos).map(|(_, value)| *value)
    }

    pub fn max_value(&self) -> Option<f64> {
        self.iter().map(|(_, value)| *value).reduce(f64::max)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Drops the points but keeps counting indices, so the x-axis keeps scrolling.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.write_pos = 0;
    }
}

impl fmt::Debug for RollingSeriesBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollingSeriesBuffer")
            .field("capacity", &self.capacity)
            .field("next_index", &self.next_index)
            .field("points", &self.buffer.len())
            .finish()
    }
}
