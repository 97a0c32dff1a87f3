//! Interrupt-dispatch capability consumed by the UART driver.
//!
//! The driver never talks to the NVIC directly; it asks an
//! [`InterruptCtl`] implementation to mask, unmask and clear its line, and
//! signals end-of-handler through the same trait. [`Nvic`] is the bare-metal
//! implementation; an OS port substitutes its own (hooking its scheduler
//! into [`InterruptCtl::complete`]), and tests substitute a recording fake.

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;

/// Interrupt lines used by this HAL.
///
/// Values are the LM3S6965 NVIC interrupt numbers (exception number − 16).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum Interrupt {
    /// UART0
    Uart0 = 5,
    /// UART1
    Uart1 = 6,
    /// UART2
    Uart2 = 33,
}

// SAFETY: the discriminants above are the interrupt numbers documented in
// the LM3S6965 datasheet vector table.
unsafe impl InterruptNumber for Interrupt {
    fn number(self) -> u16 {
        self as u16
    }
}

/// Interrupt controller capability.
pub trait InterruptCtl {
    /// Disable delivery of `line`.
    fn mask(&self, line: Interrupt);

    /// Enable delivery of `line`.
    fn unmask(&self, line: Interrupt);

    /// Drop any pending occurrence of `line`.
    fn clear_pending(&self, line: Interrupt);

    /// Handler epilogue, called once per dispatched interrupt.
    fn complete(&self);
}

/// [`InterruptCtl`] over the Cortex-M NVIC.
pub struct Nvic;

impl InterruptCtl for Nvic {
    fn mask(&self, line: Interrupt) {
        NVIC::mask(line);
    }

    fn unmask(&self, line: Interrupt) {
        // SAFETY: unmasking is only unsound in the presence of
        // mask-based critical sections; this HAL masks the peripheral's
        // own interrupt sources instead (see uart.rs).
        unsafe { NVIC::unmask(line) };
    }

    fn clear_pending(&self, line: Interrupt) {
        NVIC::unpend(line);
    }

    fn complete(&self) {
        // The plain NVIC needs no end-of-interrupt acknowledgement. OS
        // ports hook their scheduler here.
    }
}
