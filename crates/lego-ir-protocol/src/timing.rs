//! Pulse timing alphabet.
//!
//! Every symbol is a carrier-on mark followed by a carrier-off space; only
//! the space length carries information.

use core::ops::Range;

/// Carrier frequency of the IR LED.
pub const CARRIER_FREQUENCY_HZ: u32 = 38_000;

/// Carrier duty cycle, in percent.
pub const CARRIER_DUTY_PERCENT: u8 = 33;

/// Tick resolution the symbol durations are expressed in (1 tick = 1 µs).
pub const TICK_RESOLUTION_HZ: u32 = 1_000_000;

/// Mark length shared by every symbol.
pub const MARK_US: u16 = 158;

/// Start, 16 data bits, end.
pub const SYMBOLS_PER_FRAME: usize = 18;

/// Spaces in this window are recognized as a start symbol.
pub const START_WINDOW_US: Range<u16> = 800..1100;

/// Data spaces at or above this length decode as a one bit.
pub const BIT_ONE_THRESHOLD_US: u16 = 320;

/// One mark/space pair, durations in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Symbol {
    pub mark_us: u16,
    pub space_us: u16,
}

impl Symbol {
    pub const fn new(mark_us: u16, space_us: u16) -> Self {
        Self { mark_us, space_us }
    }

    /// Data symbol for one bit.
    pub const fn bit(value: bool) -> Self {
        if value { BIT_1 } else { BIT_0 }
    }

    pub const fn duration_us(self) -> u32 {
        self.mark_us as u32 + self.space_us as u32
    }

    /// Whether a received symbol falls in the start window.
    pub fn is_start(self) -> bool {
        START_WINDOW_US.contains(&self.space_us)
    }

    /// Bit value of a received data symbol.
    pub const fn bit_value(self) -> bool {
        self.space_us >= BIT_ONE_THRESHOLD_US
    }
}

pub const START: Symbol = Symbol::new(MARK_US, 950);
pub const BIT_0: Symbol = Symbol::new(MARK_US, 263);
pub const BIT_1: Symbol = Symbol::new(MARK_US, 553);
pub const END: Symbol = Symbol::new(MARK_US, 30_000);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_classification() {
        assert!(START.is_start());
        assert!(!BIT_0.is_start());
        assert!(!BIT_1.is_start());
        assert!(!END.is_start());
        assert!(BIT_1.bit_value());
        assert!(!BIT_0.bit_value());
    }

    #[test]
    fn test_window_edges() {
        assert!(Symbol::new(MARK_US, 800).is_start());
        assert!(Symbol::new(MARK_US, 1099).is_start());
        assert!(!Symbol::new(MARK_US, 1100).is_start());
        assert!(!Symbol::new(MARK_US, 799).is_start());
        assert!(Symbol::new(MARK_US, 320).bit_value());
        assert!(!Symbol::new(MARK_US, 319).bit_value());
    }

    #[test]
    fn test_frame_duration_bounds() {
        // all-zero and all-one frames bracket every packet's airtime
        let fixed = START.duration_us() + END.duration_us();
        assert_eq!(fixed + 16 * BIT_0.duration_us(), 38_002);
        assert_eq!(fixed + 16 * BIT_1.duration_us(), 42_642);
    }
}
