//! System clock configuration types.

use super::ClockError;

/// The main user-provided clock configuration.
///
/// Targets of this part are statically clocked, so the intended way to
/// build one is a `const`:
///
/// ```
/// use lm3s6965_hal::clocks::config::{ClockConfig, Crystal, Oscillator, SysDiv};
///
/// const CLOCK: ClockConfig = ClockConfig::new(
///     Oscillator::Main(Crystal::Mhz8),
///     true,
///     SysDiv::from_divisor(4).unwrap(),
/// );
/// ```
///
/// [`ClockConfig::new`] panics during constant evaluation on a
/// configuration the hardware cannot run, so an invalid static
/// configuration fails the build rather than the board.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    /// Oscillator used as the timing reference.
    pub osc: Oscillator,
    /// Multiply the reference up through the PLL. Requires a main
    /// oscillator crystal and a divider of at least 4.
    pub use_pll: bool,
    /// Post-multiplier system clock divider.
    pub sysdiv: SysDiv,
}

/// Selected oscillator source.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oscillator {
    /// Internal 12MHz RC oscillator.
    Internal,
    /// Main oscillator with the given external crystal.
    Main(Crystal),
}

/// Supported main-oscillator crystal frequencies.
///
/// Discriminants are the 4-bit XTAL encoding of the RCC register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Crystal {
    /// 1.0000MHz
    Mhz1 = 0x0,
    /// 1.8432MHz
    Mhz1_8432 = 0x1,
    /// 2.0000MHz
    Mhz2 = 0x2,
    /// 2.4576MHz
    Mhz2_4576 = 0x3,
    /// 3.579545MHz
    Mhz3_5795 = 0x4,
    /// 3.6864MHz
    Mhz3_6864 = 0x5,
    /// 4.0000MHz
    Mhz4 = 0x6,
    /// 4.0960MHz
    Mhz4_096 = 0x7,
    /// 4.9152MHz
    Mhz4_9152 = 0x8,
    /// 5.0000MHz
    Mhz5 = 0x9,
    /// 5.1200MHz
    Mhz5_12 = 0xA,
    /// 6.0000MHz
    Mhz6 = 0xB,
    /// 6.1440MHz
    Mhz6_144 = 0xC,
    /// 7.3728MHz
    Mhz7_3728 = 0xD,
    /// 8.0000MHz
    Mhz8 = 0xE,
    /// 8.1920MHz
    Mhz8_192 = 0xF,
}

/// System clock divider in the range 1..=16.
///
/// At a hardware level this is a 4-bit field holding `divisor - 1`; a
/// divisor of 1 leaves the divider disabled entirely.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SysDiv(u8);

impl ClockConfig {
    /// Build a configuration, panicking if the PLL preconditions are
    /// violated. In a `const` context the panic is a compile error.
    pub const fn new(osc: Oscillator, use_pll: bool, sysdiv: SysDiv) -> Self {
        if use_pll {
            assert!(
                matches!(osc, Oscillator::Main(_)),
                "the PLL requires the main oscillator with an external crystal"
            );
            assert!(
                sysdiv.into_divisor() >= 4,
                "the PLL output must be divided by at least 4"
            );
        }
        Self { osc, use_pll, sysdiv }
    }

    /// Fallible twin of [`ClockConfig::new`] for configurations built at
    /// run time.
    pub const fn try_new(osc: Oscillator, use_pll: bool, sysdiv: SysDiv) -> Result<Self, ClockError> {
        if use_pll {
            if !matches!(osc, Oscillator::Main(_)) {
                return Err(ClockError::bad_config(
                    "the PLL requires the main oscillator with an external crystal",
                ));
            }
            if sysdiv.into_divisor() < 4 {
                return Err(ClockError::bad_config("the PLL output must be divided by at least 4"));
            }
        }
        Ok(Self { osc, use_pll, sysdiv })
    }
}

impl Default for ClockConfig {
    /// Internal oscillator, no PLL, no divider: the configuration closest
    /// to the power-on state.
    fn default() -> Self {
        Self::new(Oscillator::Internal, false, SysDiv::UNITY)
    }
}

impl Crystal {
    /// Crystal frequency in Hz.
    pub const fn frequency(&self) -> u32 {
        match self {
            Crystal::Mhz1 => 1_000_000,
            Crystal::Mhz1_8432 => 1_843_200,
            Crystal::Mhz2 => 2_000_000,
            Crystal::Mhz2_4576 => 2_457_600,
            Crystal::Mhz3_5795 => 3_579_545,
            Crystal::Mhz3_6864 => 3_686_400,
            Crystal::Mhz4 => 4_000_000,
            Crystal::Mhz4_096 => 4_096_000,
            Crystal::Mhz4_9152 => 4_915_200,
            Crystal::Mhz5 => 5_000_000,
            Crystal::Mhz5_12 => 5_120_000,
            Crystal::Mhz6 => 6_000_000,
            Crystal::Mhz6_144 => 6_144_000,
            Crystal::Mhz7_3728 => 7_372_800,
            Crystal::Mhz8 => 8_000_000,
            Crystal::Mhz8_192 => 8_192_000,
        }
    }

    /// RCC XTAL field encoding.
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    /// Decode an RCC XTAL field value. Only the low 4 bits are
    /// significant; every encoding maps to a crystal.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0xF {
            0x0 => Crystal::Mhz1,
            0x1 => Crystal::Mhz1_8432,
            0x2 => Crystal::Mhz2,
            0x3 => Crystal::Mhz2_4576,
            0x4 => Crystal::Mhz3_5795,
            0x5 => Crystal::Mhz3_6864,
            0x6 => Crystal::Mhz4,
            0x7 => Crystal::Mhz4_096,
            0x8 => Crystal::Mhz4_9152,
            0x9 => Crystal::Mhz5,
            0xA => Crystal::Mhz5_12,
            0xB => Crystal::Mhz6,
            0xC => Crystal::Mhz6_144,
            0xD => Crystal::Mhz7_3728,
            0xE => Crystal::Mhz8,
            _ => Crystal::Mhz8_192,
        }
    }
}

impl SysDiv {
    /// Divide by 1, i.e. leave the system clock divider disabled.
    pub const UNITY: Self = Self(1);

    /// Store a divisor value that will divide the system clock by `n`.
    ///
    /// Returns `None` if `n` is not in the range `1..=16`.
    pub const fn from_divisor(n: u8) -> Option<Self> {
        if n == 0 || n > 16 {
            return None;
        }
        Some(Self(n))
    }

    /// `true` for divide-by-1, where the divider stays disabled.
    pub const fn is_unity(&self) -> bool {
        self.0 == 1
    }

    /// Raw RCC SYSDIV field value (`divisor - 1`).
    pub const fn into_bits(self) -> u8 {
        self.0 - 1
    }

    /// Divisor value, as a `u32` for convenient frequency math.
    pub const fn into_divisor(self) -> u32 {
        self.0 as u32
    }
}
