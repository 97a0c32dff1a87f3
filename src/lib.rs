#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
//! Hardware Abstraction Layer (HAL) for the TI Stellaris LM3S6965 microcontroller.
//!
//! Two subsystems make up this crate:
//!
//! - [`clocks`]: sequencing of the oscillator / PLL / system-divider clock
//!   tree, plus derivation of the current system clock frequency from live
//!   register state.
//! - [`uart`]: an interrupt-driven UART transport with a per-unit transmit
//!   ring buffer drained from interrupt context and synchronous dispatch of
//!   received bytes to a registered callback.
//!
//! Pin multiplexing and interrupt routing are deliberately kept behind the
//! [`gpio::GpioCtl`] and [`interrupt::InterruptCtl`] capability traits so
//! that board bring-up code (or a surrounding OS) supplies them, and so the
//! drivers can be exercised against simulated hardware in tests. The same
//! applies to the register surfaces themselves: all register access goes
//! through the traits in [`pac`], with the memory-mapped blocks of the real
//! part implementing them.
//!
//! The crate provides no startup or vector-table code; binding the UART
//! interrupt lines to [`uart::Uart::on_interrupt`] is the board's job.
//!
//! ## Feature flags
#![doc = document_features::document_features!()]

pub mod clocks;
pub mod gpio;
pub mod interrupt;
pub mod pac;
pub mod ringbuffer;
pub mod uart;
