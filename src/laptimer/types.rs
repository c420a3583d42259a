use heapless::Vec;

pub const SAMPLE_HISTORY_LEN: usize = 100;
pub const LAP_HISTORY_LEN: usize = 50;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(u8)]
pub enum TimerState {
    #[default]
    Stopped = 0,
    /// Armed, waiting for the hole shot.
    Waiting = 1,
    Running = 2,
}

impl TimerState {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Highest amplitude seen since the last reset and when it was seen.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CrossingCandidate {
    pub peak: u8,
    pub peak_at_ms: u32,
}

impl CrossingCandidate {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimerAction {
    Armed { racing: bool },
    Stopped,
    LapStarted { at_ms: u32 },
    LapFinished { lap_ms: u32 },
}

/// Actions produced by a single dispatch. A lap finish plus the next lap
/// start is the most one sample can emit.
pub type ActionBuffer = Vec<TimerAction, 4>;

/// Fixed-capacity history with a wrapping write cursor.
///
/// Writing past capacity silently overwrites the oldest slot.
#[derive(Clone, Debug)]
pub struct History<T, const N: usize> {
    slots: [T; N],
    cursor: usize,
    filled: usize,
}

pub type SampleHistory = History<u8, SAMPLE_HISTORY_LEN>;
pub type LapHistory = History<u32, LAP_HISTORY_LEN>;

impl<T: Copy + Default, const N: usize> History<T, N> {
    pub fn new() -> Self {
        Self {
            slots: [T::default(); N],
            cursor: 0,
            filled: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn clear(&mut self) {
        self.slots = [T::default(); N];
        self.cursor = 0;
        self.filled = 0;
    }

    /// Writes the slot under the cursor without moving it.
    pub fn store(&mut self, value: T) {
        self.slots[self.cursor] = value;
    }

    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % N;
        self.filled = (self.filled + 1).min(N);
    }

    pub fn push(&mut self, value: T) {
        self.store(value);
        self.advance();
    }

    /// Slot written by the last `advance`; the zero value before any write.
    pub fn latest(&self) -> T {
        self.slots[(self.cursor + N - 1) % N]
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        let start = (self.cursor + N - self.filled) % N;
        (0..self.filled).map(move |i| self.slots[(start + i) % N])
    }
}

impl<T: Copy + Default, const N: usize> Default for History<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
