use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Frequency value before the first successful write, or after a failed one.
pub const UNTUNED_MHZ: u16 = 0;

/// Tuned-frequency state shared between the housekeeping task and the
/// sampling loop.
///
/// Only [`super::Rx5808`] writes it. Readers load the settling flag with
/// `Acquire`, so a cleared flag is never observed before the frequency it
/// was verified against.
pub struct TuningState {
    frequency_mhz: AtomicU32,
    settling: AtomicBool,
}

impl TuningState {
    pub const fn new() -> Self {
        Self {
            frequency_mhz: AtomicU32::new(UNTUNED_MHZ as u32),
            settling: AtomicBool::new(false),
        }
    }

    pub fn frequency_mhz(&self) -> u16 {
        self.frequency_mhz.load(Ordering::Acquire) as u16
    }

    /// True while the last programmed channel has not been verified.
    pub fn is_settling(&self) -> bool {
        self.settling.load(Ordering::Acquire)
    }

    pub(super) fn begin_retune(&self, freq_mhz: u16) {
        self.settling.store(true, Ordering::Release);
        self.frequency_mhz.store(u32::from(freq_mhz), Ordering::Release);
    }

    pub(super) fn mark_powered_down(&self, freq_mhz: u16) {
        self.frequency_mhz.store(u32::from(freq_mhz), Ordering::Release);
        self.settling.store(false, Ordering::Release);
    }

    pub(super) fn mark_settled(&self) {
        self.settling.store(false, Ordering::Release);
    }

    /// Forces the next housekeeping pass to rewrite the channel.
    pub(super) fn invalidate(&self) {
        self.settling.store(true, Ordering::Release);
        self.frequency_mhz
            .store(u32::from(UNTUNED_MHZ), Ordering::Release);
    }
}

impl Default for TuningState {
    fn default() -> Self {
        Self::new()
    }
}
