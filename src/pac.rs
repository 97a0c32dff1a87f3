//! Register surface for the system control block and the UART units.
//!
//! No svd2rust PAC is published for the LM3S6965, so the blocks this crate
//! touches are maintained by hand: `#[repr(C)]` layouts over
//! [`vcell::VolatileCell`], plus the bitfield constants the drivers need.
//!
//! Drivers do not use the blocks directly. They go through the
//! [`SysctlRegisters`] and [`UartRegisters`] traits, for which the
//! memory-mapped blocks here are the hardware implementations; tests
//! implement the same traits over simulated registers with recorded
//! side effects. Register state is always re-read through these traits,
//! never cached.

use vcell::VolatileCell;

/// Read/write access to the system control (SYSCTL) block.
pub trait SysctlRegisters {
    /// Read the run-mode clock configuration register.
    fn rcc(&self) -> u32;
    /// Write the run-mode clock configuration register.
    fn write_rcc(&self, value: u32);
    /// Read the raw interrupt status register.
    fn ris(&self) -> u32;
    /// Write the interrupt clear register.
    fn write_misc(&self, value: u32);
    /// Read run-mode clock gating control register 1.
    fn rcgc1(&self) -> u32;
    /// Write run-mode clock gating control register 1.
    fn write_rcgc1(&self, value: u32);
}

/// Read/write access to one UART unit's registers.
pub trait UartRegisters {
    /// Read the data register, popping the receive FIFO.
    fn read_dr(&self) -> u32;
    /// Write the data register, pushing the transmit FIFO.
    fn write_dr(&self, value: u32);
    /// Read the flag register.
    fn fr(&self) -> u32;
    /// Write the integer baud-rate divisor.
    fn write_ibrd(&self, value: u32);
    /// Write the fractional baud-rate divisor.
    fn write_fbrd(&self, value: u32);
    /// Write the line control register.
    fn write_lcrh(&self, value: u32);
    /// Read the control register.
    fn ctl(&self) -> u32;
    /// Write the control register.
    fn write_ctl(&self, value: u32);
    /// Write the FIFO interrupt level select register.
    fn write_ifls(&self, value: u32);
    /// Read the interrupt mask register.
    fn im(&self) -> u32;
    /// Write the interrupt mask register.
    fn write_im(&self, value: u32);
    /// Read the masked interrupt status register.
    fn mis(&self) -> u32;
    /// Write the interrupt clear register.
    fn write_icr(&self, value: u32);
}

/// System control block.
pub mod sysctl {
    use super::*;

    /// SYSCTL base address.
    pub const BASE: usize = 0x400F_E000;

    /// SYSCTL register block (the subset this HAL touches).
    #[repr(C)]
    pub struct RegisterBlock {
        _reserved0: [u32; 20],
        /// 0x050: raw interrupt status
        pub ris: VolatileCell<u32>,
        /// 0x054: interrupt mask control
        pub imc: VolatileCell<u32>,
        /// 0x058: masked interrupt status and clear
        pub misc: VolatileCell<u32>,
        _reserved1: [u32; 1],
        /// 0x060: run-mode clock configuration
        pub rcc: VolatileCell<u32>,
        _reserved2: [u32; 40],
        /// 0x104: run-mode clock gating control 1
        pub rcgc1: VolatileCell<u32>,
    }

    // SAFETY: shared access is sound, all register accesses are volatile
    // single-word reads and writes.
    unsafe impl Sync for RegisterBlock {}

    impl SysctlRegisters for RegisterBlock {
        fn rcc(&self) -> u32 {
            self.rcc.get()
        }

        fn write_rcc(&self, value: u32) {
            self.rcc.set(value);
        }

        fn ris(&self) -> u32 {
            self.ris.get()
        }

        fn write_misc(&self, value: u32) {
            self.misc.set(value);
        }

        fn rcgc1(&self) -> u32 {
            self.rcgc1.get()
        }

        fn write_rcgc1(&self, value: u32) {
            self.rcgc1.set(value);
        }
    }

    /// RCC: main oscillator disable
    pub const RCC_MOSCDIS: u32 = 1 << 0;
    /// RCC: internal oscillator disable
    pub const RCC_IOSCDIS: u32 = 1 << 1;
    /// RCC: oscillator source field mask
    pub const RCC_OSCSRC_MASK: u32 = 0x0000_0030;
    /// RCC: oscillator source = main oscillator
    pub const RCC_OSCSRC_MAIN: u32 = 0x0000_0000;
    /// RCC: oscillator source = internal oscillator
    pub const RCC_OSCSRC_INT: u32 = 0x0000_0010;
    /// RCC: crystal selection field mask
    pub const RCC_XTAL_MASK: u32 = 0x0000_03C0;
    /// RCC: crystal selection field shift
    pub const RCC_XTAL_SHIFT: u32 = 6;
    /// RCC: PLL bypass
    pub const RCC_BYPASS: u32 = 1 << 11;
    /// RCC: PLL power down
    pub const RCC_PWRDN: u32 = 1 << 13;
    /// RCC: enable the system clock divider
    pub const RCC_USESYSDIV: u32 = 1 << 22;
    /// RCC: system clock divider field mask
    pub const RCC_SYSDIV_MASK: u32 = 0x0780_0000;
    /// RCC: system clock divider field shift
    pub const RCC_SYSDIV_SHIFT: u32 = 23;
    /// RIS: PLL lock raw interrupt status
    pub const RIS_PLLLRIS: u32 = 1 << 6;
    /// MISC: PLL lock masked interrupt status (write 1 to clear)
    pub const MISC_PLLLMIS: u32 = 1 << 6;
}

/// UART unit registers.
pub mod uart {
    use super::*;

    /// UART register block (PL011-derived).
    #[repr(C)]
    pub struct RegisterBlock {
        /// 0x000: data
        pub dr: VolatileCell<u32>,
        /// 0x004: receive status / error clear
        pub rsr: VolatileCell<u32>,
        _reserved0: [u32; 4],
        /// 0x018: flags
        pub fr: VolatileCell<u32>,
        _reserved1: [u32; 1],
        /// 0x020: IrDA low-power register
        pub ilpr: VolatileCell<u32>,
        /// 0x024: integer baud-rate divisor
        pub ibrd: VolatileCell<u32>,
        /// 0x028: fractional baud-rate divisor
        pub fbrd: VolatileCell<u32>,
        /// 0x02C: line control
        pub lcrh: VolatileCell<u32>,
        /// 0x030: control
        pub ctl: VolatileCell<u32>,
        /// 0x034: FIFO interrupt level select
        pub ifls: VolatileCell<u32>,
        /// 0x038: interrupt mask
        pub im: VolatileCell<u32>,
        /// 0x03C: raw interrupt status
        pub ris: VolatileCell<u32>,
        /// 0x040: masked interrupt status
        pub mis: VolatileCell<u32>,
        /// 0x044: interrupt clear
        pub icr: VolatileCell<u32>,
    }

    // SAFETY: shared access is sound, all register accesses are volatile
    // single-word reads and writes.
    unsafe impl Sync for RegisterBlock {}

    impl UartRegisters for RegisterBlock {
        fn read_dr(&self) -> u32 {
            self.dr.get()
        }

        fn write_dr(&self, value: u32) {
            self.dr.set(value);
        }

        fn fr(&self) -> u32 {
            self.fr.get()
        }

        fn write_ibrd(&self, value: u32) {
            self.ibrd.set(value);
        }

        fn write_fbrd(&self, value: u32) {
            self.fbrd.set(value);
        }

        fn write_lcrh(&self, value: u32) {
            self.lcrh.set(value);
        }

        fn ctl(&self) -> u32 {
            self.ctl.get()
        }

        fn write_ctl(&self, value: u32) {
            self.ctl.set(value);
        }

        fn write_ifls(&self, value: u32) {
            self.ifls.set(value);
        }

        fn im(&self) -> u32 {
            self.im.get()
        }

        fn write_im(&self, value: u32) {
            self.im.set(value);
        }

        fn mis(&self) -> u32 {
            self.mis.get()
        }

        fn write_icr(&self, value: u32) {
            self.icr.set(value);
        }
    }

    /// FR: UART busy (transmit shifter active)
    pub const FR_BUSY: u32 = 1 << 3;
    /// FR: receive FIFO empty
    pub const FR_RXFE: u32 = 1 << 4;
    /// FR: transmit FIFO full
    pub const FR_TXFF: u32 = 1 << 5;
    /// LCRH: enable FIFOs
    pub const LCRH_FEN: u32 = 1 << 4;
    /// LCRH: 8-bit word length
    pub const LCRH_WLEN_8: u32 = 0x0000_0060;
    /// CTL: UART enable
    pub const CTL_UARTEN: u32 = 1 << 0;
    /// IFLS: transmit FIFO trigger at half full
    pub const IFLS_TX4_8: u32 = 0x0000_0002;
    /// IFLS: receive FIFO trigger at half full
    pub const IFLS_RX4_8: u32 = 0x0000_0010;
    /// IM/MIS/ICR: receive
    pub const IM_RXIM: u32 = 1 << 4;
    /// IM/MIS/ICR: transmit
    pub const IM_TXIM: u32 = 1 << 5;
    /// IM/MIS/ICR: receive timeout
    pub const IM_RTIM: u32 = 1 << 6;
    /// MIS: receive
    pub const MIS_RXMIS: u32 = IM_RXIM;
    /// MIS: transmit
    pub const MIS_TXMIS: u32 = IM_TXIM;
    /// MIS: receive timeout
    pub const MIS_RTMIS: u32 = IM_RTIM;
}

/// SYSCTL block of the part.
///
/// # Safety
///
/// The caller must ensure it does not alias another live handle to the
/// same block in a conflicting way.
pub unsafe fn sysctl() -> &'static sysctl::RegisterBlock {
    &*(sysctl::BASE as *const sysctl::RegisterBlock)
}

macro_rules! impl_uart_block {
    ($($n:literal => $base:literal),* $(,)?) => {
        paste::paste! {
            $(
                #[doc = concat!("UART", stringify!($n), " base address.")]
                pub const [<UART $n _BASE>]: usize = $base;

                #[doc = concat!("UART", stringify!($n), " register block.")]
                ///
                /// # Safety
                ///
                /// The caller must ensure it does not alias another live
                /// handle to the same block in a conflicting way.
                pub unsafe fn [<uart $n>]() -> &'static uart::RegisterBlock {
                    &*([<UART $n _BASE>] as *const uart::RegisterBlock)
                }
            )*
        }
    };
}

impl_uart_block! {
    0 => 0x4000_C000,
    1 => 0x4000_D000,
    2 => 0x4000_E000,
}
