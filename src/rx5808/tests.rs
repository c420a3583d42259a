use core::convert::Infallible;

use super::protocol::FRAME_SETTLE_MS;
use super::*;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Frame {
    address: u8,
    write: bool,
    data: u32,
    driven_bits: Vec<bool>,
}

/// Emulates the receiver's register file on the three bus lines.
#[derive(Default)]
struct FakeRx5808 {
    selected: bool,
    data_level: bool,
    released: bool,
    driven_bits: Vec<bool>,
    read_index: usize,
    read_value: u32,
    registers: [u32; 16],
    frames: Vec<Frame>,
    corrupt_reads: usize,
    settled_ms: Vec<u32>,
}

impl FakeRx5808 {
    fn frame_address(&self) -> u8 {
        self.driven_bits
            .iter()
            .take(4)
            .enumerate()
            .fold(0u8, |acc, (i, bit)| acc | (u8::from(*bit) << i))
    }

    fn frequency_writes(&self) -> Vec<u32> {
        self.frames
            .iter()
            .filter(|f| f.write && f.address == REG_FREQUENCY)
            .map(|f| f.data)
            .collect()
    }

    fn reads(&self) -> usize {
        self.frames.iter().filter(|f| !f.write).count()
    }
}

impl BitTransport for FakeRx5808 {
    type Error = Infallible;

    fn select_high(&mut self) -> Result<(), Self::Error> {
        if self.selected {
            let address = self.frame_address();
            let write = self.driven_bits.get(4).copied().unwrap_or(false);
            let data = if write {
                let data = self.driven_bits[5..]
                    .iter()
                    .enumerate()
                    .fold(0u32, |acc, (i, bit)| acc | (u32::from(*bit) << i));
                self.registers[address as usize] = data;
                data
            } else {
                self.read_value
            };
            self.frames.push(Frame {
                address,
                write,
                data,
                driven_bits: core::mem::take(&mut self.driven_bits),
            });
        }
        self.selected = false;
        Ok(())
    }

    fn select_low(&mut self) -> Result<(), Self::Error> {
        self.selected = true;
        self.released = false;
        self.driven_bits.clear();
        self.read_index = 0;
        Ok(())
    }

    fn set_bit(&mut self, bit: bool) -> Result<(), Self::Error> {
        self.data_level = bit;
        self.released = false;
        Ok(())
    }

    fn pulse_clock(&mut self) -> Result<(), Self::Error> {
        if !self.selected {
            return Ok(());
        }
        if self.released {
            self.read_index += 1;
        } else {
            self.driven_bits.push(self.data_level);
        }
        Ok(())
    }

    fn release_data(&mut self) -> Result<(), Self::Error> {
        self.released = true;
        self.read_index = 0;
        let mut value = self.registers[self.frame_address() as usize];
        if self.corrupt_reads > 0 {
            self.corrupt_reads -= 1;
            value ^= 0x1;
        }
        self.read_value = value;
        Ok(())
    }

    fn sample_data(&mut self) -> Result<bool, Self::Error> {
        // D16..D19 float high on the pull-up.
        if self.read_index >= 16 {
            return Ok(true);
        }
        Ok((self.read_value >> self.read_index) & 0x1 == 1)
    }

    fn idle(&mut self) -> Result<(), Self::Error> {
        self.released = false;
        self.data_level = false;
        Ok(())
    }

    fn settle_ms(&mut self, millis: u32) {
        self.settled_ms.push(millis);
    }
}

/// Fails every operation once armed.
struct BrokenBus {
    armed: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct BusFault;

impl BitTransport for BrokenBus {
    type Error = BusFault;

    fn select_high(&mut self) -> Result<(), Self::Error> {
        if self.armed {
            Err(BusFault)
        } else {
            Ok(())
        }
    }

    fn select_low(&mut self) -> Result<(), Self::Error> {
        self.select_high()
    }

    fn set_bit(&mut self, _bit: bool) -> Result<(), Self::Error> {
        self.select_high()
    }

    fn pulse_clock(&mut self) -> Result<(), Self::Error> {
        self.select_high()
    }

    fn release_data(&mut self) -> Result<(), Self::Error> {
        self.select_high()
    }

    fn sample_data(&mut self) -> Result<bool, Self::Error> {
        self.select_high().map(|()| false)
    }

    fn idle(&mut self) -> Result<(), Self::Error> {
        self.select_high()
    }

    fn settle_ms(&mut self, _millis: u32) {}
}

struct FixedAdc(u16);

impl AnalogSource for FixedAdc {
    fn read_raw(&mut self) -> u16 {
        self.0
    }
}

fn bits_lsb_first(value: u32, count: usize) -> Vec<bool> {
    (0..count).map(|i| (value >> i) & 0x1 == 1).collect()
}

fn tuned_driver(tuning: &TuningState, freq_mhz: u16) -> Rx5808<'_, FakeRx5808> {
    let mut rx = Rx5808::new(FakeRx5808::default(), tuning, 0);
    rx.init().unwrap();
    rx.handle_frequency_change(100, freq_mhz).unwrap();
    rx.handle_frequency_change(200, freq_mhz).unwrap();
    assert!(!rx.is_settling());
    rx.transport_mut().frames.clear();
    rx.transport_mut().settled_ms.clear();
    rx
}

#[test]
fn frequency_register_matches_known_channels() {
    assert_eq!(frequency_to_register(5800), 0x2984);
    assert_eq!(frequency_to_register(5658), (80 << 7) | 29);
    assert_eq!(frequency_to_register(5917), (84 << 7) | 31);
}

#[test]
fn register_encoding_is_stable_across_the_band() {
    for freq in BAND_MIN_MHZ..=BAND_MAX_MHZ {
        let encoded = frequency_to_register(freq);
        let decoded = register_to_frequency(encoded);
        assert_eq!(frequency_to_register(decoded), encoded, "freq {freq}");
        assert!(freq - decoded <= 1, "freq {freq} decoded to {decoded}");
    }
}

#[test]
fn write_frame_clocks_address_write_bit_and_twenty_data_bits() {
    let mut bus = RegisterBus::new(FakeRx5808::default());
    bus.write_register(REG_FREQUENCY, 0x2984).unwrap();

    let frame = &bus.transport().frames[0];
    let mut expected = bits_lsb_first(u32::from(REG_FREQUENCY), 4);
    expected.push(true);
    expected.extend(bits_lsb_first(0x2984, 16));
    expected.extend([false; 4]);
    assert_eq!(frame.driven_bits, expected);
    assert_eq!(frame.address, REG_FREQUENCY);
    assert!(frame.write);
    assert_eq!(frame.data, 0x2984);
}

#[test]
fn read_frame_keeps_sixteen_bits_and_drops_the_tail() {
    let mut bus = RegisterBus::new(FakeRx5808::default());
    bus.transport_mut().registers[REG_FREQUENCY as usize] = 0xA5C3;

    assert_eq!(bus.read_register(REG_FREQUENCY).unwrap(), 0xA5C3);

    let frame = &bus.transport().frames[0];
    let mut expected = bits_lsb_first(u32::from(REG_FREQUENCY), 4);
    expected.push(false);
    assert_eq!(frame.driven_bits, expected);
    assert!(!frame.write);
}

#[test]
fn init_resets_then_powers_down() {
    let tuning = TuningState::new();
    let mut rx = Rx5808::new(FakeRx5808::default(), &tuning, 0);
    rx.init().unwrap();

    let frames: Vec<(u8, u32)> = rx
        .transport()
        .frames
        .iter()
        .map(|f| (f.address, f.data))
        .collect();
    assert_eq!(
        frames,
        vec![
            (REG_STATE, 0),
            (REG_POWER, POWER_NORMAL_MASK),
            (REG_POWER, POWER_DOWN_MASK),
        ]
    );
    assert!(rx.is_powered_down());
    assert!(!rx.is_settling());
    assert_eq!(rx.current_frequency(), POWER_DOWN_FREQ_MHZ);
}

#[test]
fn tuning_from_power_down_wakes_the_module_first() {
    let tuning = TuningState::new();
    let mut rx = Rx5808::new(FakeRx5808::default(), &tuning, 0);
    rx.init().unwrap();
    rx.transport_mut().frames.clear();

    rx.set_frequency(5800).unwrap();

    let frames: Vec<(u8, u32)> = rx
        .transport()
        .frames
        .iter()
        .map(|f| (f.address, f.data))
        .collect();
    assert_eq!(
        frames,
        vec![
            (REG_STATE, 0),
            (REG_POWER, POWER_NORMAL_MASK),
            (REG_FREQUENCY, 0x2984),
        ]
    );
    assert_eq!(rx.transport().settled_ms, vec![WAKE_SETTLE_MS, FRAME_SETTLE_MS]);
    assert!(!rx.is_powered_down());
    assert!(rx.is_settling());
}

#[test]
fn same_frequency_is_a_no_op() {
    let tuning = TuningState::new();
    let mut rx = tuned_driver(&tuning, 5800);

    rx.set_frequency(5800).unwrap();

    assert!(rx.transport().frames.is_empty());
    assert!(!rx.is_settling());
}

#[test]
fn change_waits_for_bus_time_then_verifies_after_tune_time() {
    let tuning = TuningState::new();
    let mut rx = Rx5808::new(FakeRx5808::default(), &tuning, 0);
    rx.init().unwrap();

    rx.handle_frequency_change(10, 5800).unwrap();
    assert_eq!(rx.current_frequency(), POWER_DOWN_FREQ_MHZ);

    rx.handle_frequency_change(30, 5800).unwrap();
    assert_eq!(rx.current_frequency(), 5800);
    assert!(rx.is_settling());
    assert_eq!(rx.transport().reads(), 0);

    rx.handle_frequency_change(64, 5800).unwrap();
    assert!(rx.is_settling());
    assert_eq!(rx.transport().reads(), 0);

    rx.handle_frequency_change(65, 5800).unwrap();
    assert_eq!(rx.transport().reads(), 1);
    assert!(!rx.is_settling());
}

#[test]
fn verification_mismatch_retries_every_tune_interval() {
    let tuning = TuningState::new();
    let mut rx = Rx5808::new(FakeRx5808::default(), &tuning, 0);
    rx.init().unwrap();
    rx.transport_mut().corrupt_reads = 2;

    rx.handle_frequency_change(100, 5732).unwrap();
    rx.handle_frequency_change(135, 5732).unwrap();
    assert!(rx.is_settling());
    assert_eq!(rx.last_write_ms(), 135);

    rx.handle_frequency_change(150, 5732).unwrap();
    assert_eq!(rx.transport().reads(), 1);

    rx.handle_frequency_change(170, 5732).unwrap();
    assert!(rx.is_settling());
    assert_eq!(rx.transport().reads(), 2);

    rx.handle_frequency_change(205, 5732).unwrap();
    assert!(!rx.is_settling());
    assert_eq!(rx.transport().reads(), 3);
    assert_eq!(rx.transport().frequency_writes().len(), 1);
}

#[test]
fn new_request_supersedes_pending_verification() {
    let tuning = TuningState::new();
    let mut rx = tuned_driver(&tuning, 5800);
    rx.transport_mut().corrupt_reads = usize::MAX;

    rx.handle_frequency_change(300, 5740).unwrap();
    rx.handle_frequency_change(335, 5740).unwrap();
    assert!(rx.is_settling());

    rx.transport_mut().corrupt_reads = 0;
    rx.handle_frequency_change(400, 5880).unwrap();
    assert_eq!(rx.current_frequency(), 5880);
    rx.handle_frequency_change(435, 5880).unwrap();

    assert!(!rx.is_settling());
    assert_eq!(
        rx.transport().frequency_writes(),
        vec![
            u32::from(frequency_to_register(5740)),
            u32::from(frequency_to_register(5880))
        ]
    );
}

#[test]
fn power_down_request_clears_settling() {
    let tuning = TuningState::new();
    let mut rx = tuned_driver(&tuning, 5800);
    rx.set_frequency(5760).unwrap();
    assert!(rx.is_settling());

    rx.set_frequency(POWER_DOWN_FREQ_MHZ).unwrap();

    assert!(rx.is_powered_down());
    assert!(!rx.is_settling());
    let last = rx.transport().frames.last().unwrap();
    assert_eq!((last.address, last.data), (REG_POWER, POWER_DOWN_MASK));
}

#[test]
fn failed_write_leaves_the_driver_untuned() {
    let tuning = TuningState::new();
    let mut rx = Rx5808::new(BrokenBus { armed: false }, &tuning, 0);
    rx.init().unwrap();
    rx.transport_mut().armed = true;

    assert_eq!(rx.handle_frequency_change(100, 5800), Err(BusFault));
    assert_eq!(rx.current_frequency(), UNTUNED_MHZ);
    assert!(rx.is_settling());

    rx.transport_mut().armed = false;
    rx.handle_frequency_change(130, 5800).unwrap();
    assert_eq!(rx.current_frequency(), 5800);
}

#[test]
fn rssi_reads_zero_while_settling() {
    let tuning = TuningState::new();
    let mut rx = Rx5808::new(FakeRx5808::default(), &tuning, 0);
    rx.init().unwrap();
    rx.set_frequency(5800).unwrap();

    for raw in [0u16, 600, 2047, 4095] {
        let mut input = RssiInput::new(FixedAdc(raw), &tuning);
        assert_eq!(input.read_rssi(), 0);
    }

    rx.handle_frequency_change(100, 5800).unwrap();
    assert!(!tuning.is_settling());
    let mut input = RssiInput::new(FixedAdc(800), &tuning);
    assert_eq!(input.read_rssi(), 100);
}

#[test]
fn rssi_is_clamped_then_rescaled() {
    assert_eq!(scale_rssi(0), 0);
    assert_eq!(scale_rssi(7), 0);
    assert_eq!(scale_rssi(8), 1);
    assert_eq!(scale_rssi(2047), 255);
    assert_eq!(scale_rssi(4095), 255);
}

#[test]
fn driver_works_through_a_borrowed_transport() {
    let tuning = TuningState::new();
    let mut fake = FakeRx5808::default();
    {
        let mut rx = Rx5808::new(&mut fake, &tuning, 0);
        rx.init().unwrap();
    }
    assert_eq!(fake.frames.len(), 3);
}
