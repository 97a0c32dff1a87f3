//! System clock configuration.
//!
//! The LM3S6965 clock tree is small: one internal RC oscillator, one main
//! oscillator fed by an external crystal, a PLL that multiplies the main
//! oscillator up to a fixed 200MHz time base, and a 4-bit post divider.
//! [`apply_clock_config`] walks the hardware through the documented
//! switch-over sequence; [`current_clock_frequency`] derives the resulting
//! frequency back out of live register state.
//!
//! Nothing here caches: the frequency query re-reads RCC every time, so it
//! stays correct even if something outside this crate reconfigured the
//! clock tree.

use config::{ClockConfig, Crystal, Oscillator};

use crate::pac::sysctl::{
    MISC_PLLLMIS, RCC_BYPASS, RCC_IOSCDIS, RCC_MOSCDIS, RCC_OSCSRC_INT, RCC_OSCSRC_MAIN, RCC_OSCSRC_MASK, RCC_PWRDN,
    RCC_SYSDIV_MASK, RCC_SYSDIV_SHIFT, RCC_USESYSDIV, RCC_XTAL_MASK, RCC_XTAL_SHIFT, RIS_PLLLRIS,
};
use crate::pac::SysctlRegisters;

pub mod config;

//
// Consts
//

/// Internal RC oscillator frequency.
pub const INTERNAL_OSC_HZ: u32 = 12_000_000;

/// PLL time base (after its internal /2), with the multiplier ratio left
/// at its reset default.
pub const PLL_OUTPUT_HZ: u32 = 200_000_000;

/// Settle time after powering an oscillator, in core cycles. Conservative
/// enough for any of the supported crystals.
pub const OSC_SETTLE_CYCLES: u32 = 524_288;

/// Settle time after a clock-source switch, in core cycles.
pub const SWITCH_SETTLE_CYCLES: u32 = 16;

/// Iteration budget for the PLL lock poll. A timeout is not an error:
/// the part keeps running from the unmultiplied source.
pub const PLL_LOCK_POLL_BUDGET: u32 = 32_768;

//
// Structs + Enums
//

/// Clock configuration related error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockError {
    /// The requested configuration was impossible or conflicting.
    BadConfiguration {
        /// Explanation of error
        reason: &'static str,
    },
}

impl ClockError {
    pub(crate) const fn bad_config(reason: &'static str) -> Self {
        Self::BadConfiguration { reason }
    }
}

/// Busy-wait for a number of core cycles.
///
/// The sequencing code takes this as a parameter rather than calling the
/// core delay directly so tests can inject a fake that merely records the
/// requested settle times.
pub trait CycleDelay {
    /// Spin for at least `cycles` core cycles.
    fn delay_cycles(&mut self, cycles: u32);
}

/// [`CycleDelay`] over the Cortex-M cycle-counted delay loop.
pub struct CortexDelay;

impl CycleDelay for CortexDelay {
    fn delay_cycles(&mut self, cycles: u32) {
        cortex_m::asm::delay(cycles);
    }
}

//
// Free functions
//

/// Bring the system clock to `config`.
///
/// The register writes follow a strict order; reordering them glitches or
/// hangs the part mid-switch:
///
/// 1. bypass the PLL and disable the divider, so the switch-over always
///    runs from a known-good unmultiplied path;
/// 2. power up the target oscillator if it is currently disabled, and give
///    it the long settle time;
/// 3. select the oscillator source (and crystal encoding), short settle;
/// 4. if the PLL is wanted: power it up, clear the stale lock status, poll
///    for lock with a bounded budget, then stage (but do not commit) the
///    bypass-clear;
/// 5. stage the divider, if any;
/// 6. stage the disable of the now-unused oscillator;
/// 7. commit everything staged in one final RCC write (these fields latch
///    together), short settle.
///
/// There is no failure path: a PLL that never locks within budget leaves
/// the part running unmultiplied, which this layer cannot report or
/// recover without a reset.
///
/// May be called again at any later point to re-sequence the clock tree to
/// a new configuration.
pub fn apply_clock_config<S: SysctlRegisters>(sysctl: &S, delay: &mut impl CycleDelay, config: &ClockConfig) {
    let mut rcc = sysctl.rcc();

    // Step 1: known-good unmultiplied path during the transition.
    rcc &= !RCC_USESYSDIV;
    rcc |= RCC_BYPASS;
    sysctl.write_rcc(rcc);

    // Step 2: power the oscillator we are switching to, if it is down.
    let powered_down = match config.osc {
        Oscillator::Internal => rcc & RCC_IOSCDIS != 0,
        Oscillator::Main(_) => rcc & RCC_MOSCDIS != 0,
    };
    if powered_down {
        rcc &= match config.osc {
            Oscillator::Internal => !RCC_IOSCDIS,
            Oscillator::Main(_) => !RCC_MOSCDIS,
        };
        sysctl.write_rcc(rcc);
        delay.delay_cycles(OSC_SETTLE_CYCLES);
    }

    // Step 3: select the source, and the crystal encoding if external.
    rcc &= !(RCC_OSCSRC_MASK | RCC_XTAL_MASK);
    match config.osc {
        Oscillator::Internal => rcc |= RCC_OSCSRC_INT,
        Oscillator::Main(xtal) => {
            rcc |= RCC_OSCSRC_MAIN;
            rcc |= u32::from(xtal.into_bits()) << RCC_XTAL_SHIFT;
        }
    }
    sysctl.write_rcc(rcc);
    delay.delay_cycles(SWITCH_SETTLE_CYCLES);

    // Step 4: power the PLL and wait for lock, bounded.
    if config.use_pll {
        rcc &= !RCC_PWRDN;
        // clear the stale lock status before powering up, so the poll
        // below cannot see a leftover from a previous lock
        sysctl.write_misc(MISC_PLLLMIS);
        sysctl.write_rcc(rcc);

        let mut budget = PLL_LOCK_POLL_BUDGET;
        while budget > 0 {
            if sysctl.ris() & RIS_PLLLRIS != 0 {
                break;
            }
            budget -= 1;
        }

        // Stage the switch onto the PLL; committed below.
        rcc &= !RCC_BYPASS;
    }

    // Step 5: stage the divider.
    if !config.sysdiv.is_unity() {
        rcc &= !RCC_SYSDIV_MASK;
        rcc |= u32::from(config.sysdiv.into_bits()) << RCC_SYSDIV_SHIFT;
        rcc |= RCC_USESYSDIV;
    }

    // Step 6: exactly one oscillator stays powered at steady state.
    rcc |= match config.osc {
        Oscillator::Internal => RCC_MOSCDIS,
        Oscillator::Main(_) => RCC_IOSCDIS,
    };

    // Step 7: single committing write.
    sysctl.write_rcc(rcc);
    delay.delay_cycles(SWITCH_SETTLE_CYCLES);
}

/// Derive the current system clock frequency from live register state.
///
/// Safe to call at any time, including before [`apply_clock_config`]: the
/// power-on RCC value reports the internal oscillator.
pub fn current_clock_frequency<S: SysctlRegisters>(sysctl: &S) -> u32 {
    let rcc = sysctl.rcc();

    let mut sysclk = if rcc & RCC_BYPASS != 0 {
        // Not multiplied: frequency is whatever the selected oscillator
        // runs at.
        if rcc & RCC_OSCSRC_MASK == RCC_OSCSRC_MAIN {
            let bits = ((rcc & RCC_XTAL_MASK) >> RCC_XTAL_SHIFT) as u8;
            Crystal::from_bits(bits).frequency()
        } else {
            INTERNAL_OSC_HZ
        }
    } else {
        PLL_OUTPUT_HZ
    };

    if rcc & RCC_USESYSDIV != 0 {
        let raw = (rcc & RCC_SYSDIV_MASK) >> RCC_SYSDIV_SHIFT;
        // field holds divisor - 1, except that the two smallest
        // encodings both mean divide-by-2
        let divisor = if raw == 0 { 2 } else { raw + 1 };
        sysclk /= divisor;
    }

    sysclk
}
