//! GPIO capability consumed by the UART driver.
//!
//! Pin-direction and pull-up register pokes are table-driven assignments
//! with no ordering hazards, so they live outside this crate. The driver
//! only needs the small [`GpioCtl`] surface below; board code implements it
//! on top of whatever GPIO driver it carries.

/// GPIO port banks of the LM3S6965.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    /// Port A
    A,
    /// Port B
    B,
    /// Port C
    C,
    /// Port D
    D,
    /// Port E
    E,
    /// Port F
    F,
    /// Port G
    G,
}

/// A single pin, identified by port bank and pin index (0..=7).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pin {
    port: Port,
    index: u8,
}

impl Pin {
    /// Create a pin identifier.
    ///
    /// Panics (at compile time for const pin tables) if `index` is not a
    /// valid pin number for this part.
    pub const fn new(port: Port, index: u8) -> Self {
        assert!(index < 8, "LM3S6965 ports have 8 pins");
        Self { port, index }
    }

    /// Port bank this pin belongs to.
    pub const fn port(&self) -> Port {
        self.port
    }

    /// Pin index within the port bank.
    pub const fn index(&self) -> u8 {
        self.index
    }
}

/// Signal direction of a pin.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Input
    Input,
    /// Output
    Output,
}

/// Internal pull resistor configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    /// No pull resistor
    None,
    /// Pull-up
    Up,
    /// Pull-down
    Down,
}

/// Pin configuration capability.
///
/// The UART driver routes its rx/tx pairs through this trait during
/// [`init`](crate::uart::Uart::init); tests substitute a recording fake.
pub trait GpioCtl {
    /// Configure `pin` with the given direction and pull resistor.
    fn configure(&mut self, pin: Pin, direction: Direction, pull: Pull);

    /// Route `pin` to (or away from) its peripheral alternate function.
    fn set_alternate_function(&mut self, pin: Pin, enabled: bool);
}
