//! Line commands accepted on the firmware's serial console.
//!
//! ```text
//! START | STOP
//! FREQ <mhz>             1111 powers the receiver down
//! NOISECAL START|STOP
//! CROSSCAL START|STOP
//! STATUS
//! ```

use crate::rx5808::{BAND_MAX_MHZ, BAND_MIN_MHZ, POWER_DOWN_FREQ_MHZ};

pub const LINE_BUF_LEN: usize = 64;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConsoleCommand {
    Start,
    Stop,
    Frequency(u16),
    NoiseCalibration { active: bool },
    CrossingCalibration { active: bool },
    Status,
}

pub fn parse_command(line: &[u8]) -> Option<ConsoleCommand> {
    let line = trim_ascii_whitespace(line);
    let (verb, rest) = split_word(line);
    let (argument, tail) = split_word(rest);
    if !tail.is_empty() {
        return None;
    }

    match (verb, argument) {
        (b"START", b"") => Some(ConsoleCommand::Start),
        (b"STOP", b"") => Some(ConsoleCommand::Stop),
        (b"STATUS", b"") => Some(ConsoleCommand::Status),
        (b"FREQ", mhz) => parse_frequency(mhz).map(ConsoleCommand::Frequency),
        (b"NOISECAL", toggle) => {
            parse_toggle(toggle).map(|active| ConsoleCommand::NoiseCalibration { active })
        }
        (b"CROSSCAL", toggle) => {
            parse_toggle(toggle).map(|active| ConsoleCommand::CrossingCalibration { active })
        }
        _ => None,
    }
}

fn parse_frequency(bytes: &[u8]) -> Option<u16> {
    let mhz = parse_u16_ascii(bytes)?;
    let valid = mhz == POWER_DOWN_FREQ_MHZ || (BAND_MIN_MHZ..=BAND_MAX_MHZ).contains(&mhz);
    valid.then_some(mhz)
}

fn parse_toggle(bytes: &[u8]) -> Option<bool> {
    match bytes {
        b"START" => Some(true),
        b"STOP" => Some(false),
        _ => None,
    }
}

fn split_word(line: &[u8]) -> (&[u8], &[u8]) {
    let end = line
        .iter()
        .position(u8::is_ascii_whitespace)
        .unwrap_or(line.len());
    (&line[..end], trim_ascii_whitespace(&line[end..]))
}

fn trim_ascii_whitespace(line: &[u8]) -> &[u8] {
    let mut start = 0usize;
    let mut end = line.len();
    while start < end && line[start].is_ascii_whitespace() {
        start += 1;
    }
    while end > start && line[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    &line[start..end]
}

fn parse_u16_ascii(bytes: &[u8]) -> Option<u16> {
    if bytes.is_empty() {
        return None;
    }
    let mut value = 0u16;
    for byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }
        value = value.checked_mul(10)?.checked_add(u16::from(byte - b'0'))?;
    }
    Some(value)
}

/// Accumulates bytes into CR/LF terminated lines. Overlong lines are dropped.
pub struct LineBuffer {
    buf: [u8; LINE_BUF_LEN],
    len: usize,
    overflowed: bool,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            buf: [0; LINE_BUF_LEN],
            len: 0,
            overflowed: false,
        }
    }

    /// Returns the finished line when `byte` terminates one.
    pub fn push(&mut self, byte: u8) -> Option<&[u8]> {
        if byte == b'\r' || byte == b'\n' {
            let len = core::mem::take(&mut self.len);
            let overflowed = core::mem::take(&mut self.overflowed);
            if len == 0 || overflowed {
                return None;
            }
            return Some(&self.buf[..len]);
        }

        if self.len < self.buf.len() {
            self.buf[self.len] = byte;
            self.len += 1;
        } else {
            self.overflowed = true;
        }
        None
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}
