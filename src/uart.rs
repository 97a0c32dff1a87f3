//! Interrupt-driven UART transport.
//!
//! Each of the three units transmits through a 64-byte software ring
//! drained into the 16-byte hardware FIFO by the transmit interrupt, and
//! dispatches received bytes to a per-unit callback from the receive and
//! receive-timeout interrupts.
//!
//! The driver is bank-shaped: one [`Uart`] value holds every unit, and all
//! operations take the unit index so a single shared handle can serve both
//! foreground code and the interrupt handlers. Board or OS code binds the
//! UART vectors to [`Uart::on_interrupt`] through whatever static storage
//! it uses for the bank.
//!
//! Critical sections never disable interrupts globally. The only shared
//! mutable structure is the transmit ring, and the only contended side is
//! its consumer, so masking the unit's own transmit source (the `TXIM` bit
//! in the interrupt mask register) is sufficient and keeps every other
//! interrupt in the system live.

use core::cell::Cell;
use core::hint::spin_loop;

use crate::clocks;
use crate::gpio::{Direction, GpioCtl, Pin, Pull};
use crate::interrupt::{Interrupt, InterruptCtl};
use crate::pac::uart::{
    CTL_UARTEN, FR_BUSY, FR_RXFE, FR_TXFF, IFLS_RX4_8, IFLS_TX4_8, IM_RTIM, IM_RXIM, IM_TXIM, LCRH_FEN, LCRH_WLEN_8,
    MIS_RTMIS, MIS_RXMIS, MIS_TXMIS,
};
use crate::pac::{SysctlRegisters, UartRegisters};

/// Number of UART units on the part.
pub const UART_COUNT: usize = 3;

/// Capacity of the per-unit software transmit ring.
pub const TX_BUFFER_SIZE: usize = 64;

/// Depth of the hardware FIFOs.
pub const FIFO_DEPTH: usize = 16;

/// Receive callback, invoked from interrupt context once per byte.
///
/// Context travels in the closure's captures, so it must be shareable with
/// the interrupt handler.
pub type RxCallback<'a> = &'a (dyn Fn(u8) + Sync);

/// UART transport error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The unit index does not name a UART on this part.
    NoSuchDevice,
}

impl embedded_io::Error for Error {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Error::NoSuchDevice => embedded_io::ErrorKind::NotFound,
        }
    }
}

impl embedded_hal_nb::serial::Error for Error {
    fn kind(&self) -> embedded_hal_nb::serial::ErrorKind {
        embedded_hal_nb::serial::ErrorKind::Other
    }
}

/// One UART unit: its registers, interrupt line, pin routing and transmit
/// ring.
pub struct Unit<'a, R: UartRegisters> {
    regs: &'a R,
    line: Interrupt,
    rx_pin: Pin,
    tx_pin: Pin,
    tx_ring: crate::ringbuffer::RingBuffer<TX_BUFFER_SIZE>,
    rx_callback: critical_section::Mutex<Cell<Option<RxCallback<'a>>>>,
}

impl<'a, R: UartRegisters> Unit<'a, R> {
    /// Describe a unit for [`Uart::new`].
    pub const fn new(regs: &'a R, line: Interrupt, rx_pin: Pin, tx_pin: Pin) -> Self {
        Self {
            regs,
            line,
            rx_pin,
            tx_pin,
            tx_ring: crate::ringbuffer::RingBuffer::new(),
            rx_callback: critical_section::Mutex::new(Cell::new(None)),
        }
    }

    /// Move ring bytes into the hardware FIFO with the transmit interrupt
    /// held off, so this side and the handler never both consume the ring.
    fn prime(&self) {
        let im = self.regs.im();
        self.regs.write_im(im & !IM_TXIM);
        while self.regs.fr() & FR_TXFF == 0 {
            match self.tx_ring.pop() {
                Some(byte) => self.regs.write_dr(byte.into()),
                None => break,
            }
        }
        self.regs.write_im(im | IM_TXIM);
    }
}

/// The UART bank. Units are indexed by hardware unit number.
pub struct Uart<'a, S: SysctlRegisters, R: UartRegisters, const N: usize> {
    sysctl: &'a S,
    units: [Unit<'a, R>; N],
}

impl<'a, S: SysctlRegisters, R: UartRegisters, const N: usize> Uart<'a, S, R, N> {
    /// Build a bank over the given units.
    pub const fn new(sysctl: &'a S, units: [Unit<'a, R>; N]) -> Self {
        Self { sysctl, units }
    }

    /// Look up a unit by index.
    pub fn unit(&self, unit: usize) -> Result<&Unit<'a, R>, Error> {
        self.units.get(unit).ok_or(Error::NoSuchDevice)
    }

    /// Bring up (or reconfigure) a unit at the given baud rate.
    ///
    /// May be called again on a live unit: the new baud rate and callback
    /// replace the previous ones. The divisor is derived from the current
    /// system clock, so the unit must be re-initialized after a clock
    /// reconfiguration.
    ///
    /// Fails without touching any register if `unit` is out of range.
    pub fn init(
        &self,
        unit: usize,
        baudrate: u32,
        rx_callback: Option<RxCallback<'a>>,
        gpio: &mut impl GpioCtl,
        irq: &impl InterruptCtl,
    ) -> Result<(), Error> {
        let u = self.unit(unit)?;

        // Gate the unit's clock on first; its registers do not respond
        // until this bit is set.
        self.sysctl.write_rcgc1(self.sysctl.rcgc1() | (1u32 << unit));

        gpio.configure(u.rx_pin, Direction::Input, Pull::None);
        gpio.set_alternate_function(u.rx_pin, true);
        gpio.configure(u.tx_pin, Direction::Output, Pull::None);
        gpio.set_alternate_function(u.tx_pin, true);

        // No handler runs while the unit is half-configured.
        irq.mask(u.line);

        let sysclk = clocks::current_clock_frequency(self.sysctl);

        u.regs.write_ctl(u.regs.ctl() & !CTL_UARTEN);

        // Divisor in 1/64ths of the bit period, rounded to the nearest
        // half-step. The integer part goes in IBRD, the remainder in FBRD.
        let bdiv = (sysclk * 8 / baudrate + 1) / 2;
        u.regs.write_ibrd(bdiv / 64);
        u.regs.write_fbrd(bdiv % 64);

        u.regs.write_lcrh(LCRH_WLEN_8 | LCRH_FEN);
        u.regs.write_ifls(IFLS_TX4_8 | IFLS_RX4_8);

        // Drop anything pended while reconfiguring, then arm all three
        // sources this driver services.
        u.regs.write_icr(!0);
        u.regs.write_im(IM_RXIM | IM_RTIM | IM_TXIM);

        critical_section::with(|cs| u.rx_callback.borrow(cs).set(rx_callback));

        irq.clear_pending(u.line);
        irq.unmask(u.line);

        u.regs.write_ctl(u.regs.ctl() | CTL_UARTEN);
        Ok(())
    }

    /// Enqueue `buf` for interrupt-driven transmission.
    ///
    /// Returns once every byte is queued (in the ring or the FIFO), which
    /// may be well before it is on the wire. Blocks by spinning when the
    /// ring is full, so from interrupt context prefer
    /// [`blocking_write`](Uart::blocking_write).
    pub fn write(&self, unit: usize, buf: &[u8]) -> Result<(), Error> {
        let u = self.unit(unit)?;
        for &byte in buf {
            while u.tx_ring.is_full() {
                // An empty FIFO raises no transmit interrupt, so a full
                // ring can only start draining if we seed the FIFO here.
                u.prime();
                spin_loop();
            }
            let im = u.regs.im();
            u.regs.write_im(im & !IM_TXIM);
            let pushed = u.tx_ring.push(byte);
            debug_assert!(pushed);
            u.regs.write_im(im | IM_TXIM);
        }
        // Seed the FIFO so the drain interrupt chain starts.
        u.prime();
        Ok(())
    }

    /// Transmit `buf` synchronously, bypassing the ring.
    ///
    /// Spins on FIFO space for each byte. Usable from any context,
    /// including before interrupts are live and from fault handlers.
    pub fn blocking_write(&self, unit: usize, buf: &[u8]) -> Result<(), Error> {
        let u = self.unit(unit)?;
        for &byte in buf {
            while u.regs.fr() & FR_TXFF != 0 {
                spin_loop();
            }
            u.regs.write_dr(byte.into());
        }
        Ok(())
    }

    /// Service one interrupt for `unit`. Bind the unit's vector to this.
    ///
    /// Out-of-range indices are ignored apart from the completion
    /// epilogue, so a misrouted vector cannot fault.
    pub fn on_interrupt(&self, unit: usize, irq: &impl InterruptCtl) {
        if let Ok(u) = self.unit(unit) {
            let causes = u.regs.mis();
            u.regs.write_icr(causes);

            if causes & (MIS_RXMIS | MIS_RTMIS) != 0 {
                let callback = critical_section::with(|cs| u.rx_callback.borrow(cs).get());
                // Drain the whole FIFO: the receive interrupt fires at the
                // half-full mark and the timeout covers the stragglers,
                // but bytes below the trigger level must not be left for
                // the next interrupt.
                while u.regs.fr() & FR_RXFE == 0 {
                    let byte = (u.regs.read_dr() & 0xFF) as u8;
                    if let Some(callback) = callback {
                        callback(byte);
                    }
                }
            }

            if causes & MIS_TXMIS != 0 {
                if u.tx_ring.is_empty() {
                    // Nothing left: quiesce the transmit source until the
                    // next write re-arms it.
                    u.regs.write_im(u.regs.im() & !IM_TXIM);
                } else {
                    while u.regs.fr() & FR_TXFF == 0 {
                        match u.tx_ring.pop() {
                            Some(byte) => u.regs.write_dr(byte.into()),
                            None => {
                                u.regs.write_im(u.regs.im() & !IM_TXIM);
                                break;
                            }
                        }
                    }
                }
            }
        }
        irq.complete();
    }

    /// An [`embedded_io::Write`] / [`embedded_hal_nb::serial::Write`] view
    /// of one unit.
    pub fn writer(&self, unit: usize) -> Result<UartWriter<'_, 'a, S, R, N>, Error> {
        self.unit(unit)?;
        Ok(UartWriter { uart: self, unit })
    }
}

/// Byte-sink adapter over one unit of a [`Uart`] bank.
pub struct UartWriter<'u, 'a, S: SysctlRegisters, R: UartRegisters, const N: usize> {
    uart: &'u Uart<'a, S, R, N>,
    unit: usize,
}

impl<S: SysctlRegisters, R: UartRegisters, const N: usize> embedded_io::ErrorType for UartWriter<'_, '_, S, R, N> {
    type Error = Error;
}

impl<S: SysctlRegisters, R: UartRegisters, const N: usize> embedded_io::Write for UartWriter<'_, '_, S, R, N> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.uart.write(self.unit, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        let u = self.uart.unit(self.unit)?;
        while !u.tx_ring.is_empty() || u.regs.fr() & FR_BUSY != 0 {
            spin_loop();
        }
        Ok(())
    }
}

impl<S: SysctlRegisters, R: UartRegisters, const N: usize> embedded_hal_nb::serial::ErrorType
    for UartWriter<'_, '_, S, R, N>
{
    type Error = Error;
}

impl<S: SysctlRegisters, R: UartRegisters, const N: usize> embedded_hal_nb::serial::Write
    for UartWriter<'_, '_, S, R, N>
{
    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        let u = self.uart.unit(self.unit).map_err(nb::Error::Other)?;
        if u.tx_ring.is_full() {
            return Err(nb::Error::WouldBlock);
        }
        let im = u.regs.im();
        u.regs.write_im(im & !IM_TXIM);
        let pushed = u.tx_ring.push(word);
        debug_assert!(pushed);
        u.regs.write_im(im | IM_TXIM);
        u.prime();
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        let u = self.uart.unit(self.unit).map_err(nb::Error::Other)?;
        if !u.tx_ring.is_empty() || u.regs.fr() & FR_BUSY != 0 {
            return Err(nb::Error::WouldBlock);
        }
        Ok(())
    }
}

/// The hardware bank: all three units with their fixed pin routing.
///
/// # Safety
///
/// Creates a fresh handle to live hardware. The caller must ensure exactly
/// one driver owns each unit at a time.
pub unsafe fn steal() -> Uart<'static, crate::pac::sysctl::RegisterBlock, crate::pac::uart::RegisterBlock, UART_COUNT> {
    use crate::gpio::Port;

    Uart::new(
        crate::pac::sysctl(),
        [
            Unit::new(
                crate::pac::uart0(),
                Interrupt::Uart0,
                Pin::new(Port::A, 0),
                Pin::new(Port::A, 1),
            ),
            Unit::new(
                crate::pac::uart1(),
                Interrupt::Uart1,
                Pin::new(Port::D, 2),
                Pin::new(Port::D, 3),
            ),
            Unit::new(
                crate::pac::uart2(),
                Interrupt::Uart2,
                Pin::new(Port::G, 0),
                Pin::new(Port::G, 1),
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Condvar, Mutex as StdMutex};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::gpio::Port;
    use crate::pac::sysctl::{RCC_BYPASS, RCC_OSCSRC_INT};

    /// SYSCTL fake pinned to the 12MHz internal oscillator.
    struct FakeSysctl {
        rcc: u32,
        rcgc1: AtomicU32,
        writes: AtomicU32,
    }

    impl FakeSysctl {
        fn internal_12mhz() -> Self {
            Self {
                rcc: RCC_BYPASS | RCC_OSCSRC_INT,
                rcgc1: AtomicU32::new(0),
                writes: AtomicU32::new(0),
            }
        }
    }

    impl SysctlRegisters for FakeSysctl {
        fn rcc(&self) -> u32 {
            self.rcc
        }

        fn write_rcc(&self, _value: u32) {
            self.writes.fetch_add(1, Ordering::Relaxed);
        }

        fn ris(&self) -> u32 {
            0
        }

        fn write_misc(&self, _value: u32) {
            self.writes.fetch_add(1, Ordering::Relaxed);
        }

        fn rcgc1(&self) -> u32 {
            self.rcgc1.load(Ordering::Relaxed)
        }

        fn write_rcgc1(&self, value: u32) {
            self.rcgc1.store(value, Ordering::Relaxed);
            self.writes.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[derive(Default)]
    struct FakeRegisterFile {
        ibrd: u32,
        fbrd: u32,
        lcrh: u32,
        ctl: u32,
        ifls: u32,
        im: u32,
        /// Raw pending causes; `mis` shows them through `im`.
        pending: u32,
        tx_fifo: VecDeque<u8>,
        rx_fifo: VecDeque<u8>,
        /// Bytes the simulated shifter has put on the wire.
        wire: Vec<u8>,
        writes: u32,
    }

    /// Models single-core mask semantics for the threaded test: a masked
    /// transmit source cannot begin dispatch, and masking waits out a
    /// handler already running (unless the handler itself masks).
    struct Gate {
        state: StdMutex<GateState>,
        cv: Condvar,
    }

    struct GateState {
        tx_masked: bool,
        in_isr: bool,
        isr_thread: Option<thread::ThreadId>,
    }

    impl Gate {
        fn new() -> Self {
            Self {
                // reset value of the interrupt mask register is 0
                state: StdMutex::new(GateState {
                    tx_masked: true,
                    in_isr: false,
                    isr_thread: None,
                }),
                cv: Condvar::new(),
            }
        }

        fn on_im_write(&self, masked: bool) {
            let mut s = self.state.lock().unwrap();
            if masked {
                while s.in_isr && s.isr_thread != Some(thread::current().id()) {
                    s = self.cv.wait(s).unwrap();
                }
            }
            s.tx_masked = masked;
            drop(s);
            self.cv.notify_all();
        }

        fn enter_isr(&self) -> bool {
            let mut s = self.state.lock().unwrap();
            if s.tx_masked {
                return false;
            }
            s.in_isr = true;
            s.isr_thread = Some(thread::current().id());
            true
        }

        fn exit_isr(&self) {
            let mut s = self.state.lock().unwrap();
            s.in_isr = false;
            s.isr_thread = None;
            drop(s);
            self.cv.notify_all();
        }
    }

    struct FakeUart {
        state: StdMutex<FakeRegisterFile>,
        /// Shift one byte onto the wire per flag-register read, so
        /// busy-wait loops make progress without an interrupt pump.
        auto_drain: bool,
        gate: Option<Gate>,
    }

    impl FakeUart {
        fn new() -> Self {
            Self {
                state: StdMutex::new(FakeRegisterFile::default()),
                auto_drain: false,
                gate: None,
            }
        }

        fn free_running() -> Self {
            Self {
                auto_drain: true,
                ..Self::new()
            }
        }

        fn gated() -> Self {
            Self {
                gate: Some(Gate::new()),
                ..Self::new()
            }
        }

        fn raise(&self, causes: u32) {
            self.state.lock().unwrap().pending |= causes;
        }

        fn feed_rx(&self, bytes: &[u8]) {
            self.state.lock().unwrap().rx_fifo.extend(bytes);
        }

        /// Hardware shifter: move the whole FIFO onto the wire.
        fn shift_out(&self) {
            let mut s = self.state.lock().unwrap();
            while let Some(byte) = s.tx_fifo.pop_front() {
                s.wire.push(byte);
            }
        }

        fn wire(&self) -> Vec<u8> {
            self.state.lock().unwrap().wire.clone()
        }
    }

    impl UartRegisters for FakeUart {
        fn read_dr(&self) -> u32 {
            self.state.lock().unwrap().rx_fifo.pop_front().unwrap_or(0).into()
        }

        fn write_dr(&self, value: u32) {
            let mut s = self.state.lock().unwrap();
            s.tx_fifo.push_back(value as u8);
            s.writes += 1;
        }

        fn fr(&self) -> u32 {
            let mut s = self.state.lock().unwrap();
            if self.auto_drain {
                if let Some(byte) = s.tx_fifo.pop_front() {
                    s.wire.push(byte);
                }
            }
            let mut fr = 0;
            if s.tx_fifo.len() >= FIFO_DEPTH {
                fr |= FR_TXFF;
            }
            if !s.tx_fifo.is_empty() {
                fr |= FR_BUSY;
            }
            if s.rx_fifo.is_empty() {
                fr |= FR_RXFE;
            }
            fr
        }

        fn write_ibrd(&self, value: u32) {
            let mut s = self.state.lock().unwrap();
            s.ibrd = value;
            s.writes += 1;
        }

        fn write_fbrd(&self, value: u32) {
            let mut s = self.state.lock().unwrap();
            s.fbrd = value;
            s.writes += 1;
        }

        fn write_lcrh(&self, value: u32) {
            let mut s = self.state.lock().unwrap();
            s.lcrh = value;
            s.writes += 1;
        }

        fn ctl(&self) -> u32 {
            self.state.lock().unwrap().ctl
        }

        fn write_ctl(&self, value: u32) {
            let mut s = self.state.lock().unwrap();
            s.ctl = value;
            s.writes += 1;
        }

        fn write_ifls(&self, value: u32) {
            let mut s = self.state.lock().unwrap();
            s.ifls = value;
            s.writes += 1;
        }

        fn im(&self) -> u32 {
            self.state.lock().unwrap().im
        }

        fn write_im(&self, value: u32) {
            {
                let mut s = self.state.lock().unwrap();
                s.im = value;
                s.writes += 1;
            }
            if let Some(gate) = &self.gate {
                gate.on_im_write(value & IM_TXIM == 0);
            }
        }

        fn mis(&self) -> u32 {
            let s = self.state.lock().unwrap();
            s.pending & s.im
        }

        fn write_icr(&self, value: u32) {
            let mut s = self.state.lock().unwrap();
            s.pending &= !value;
            s.writes += 1;
        }
    }

    #[derive(Default)]
    struct FakeGpio {
        configured: Vec<(Pin, Direction, Pull)>,
        alt: Vec<(Pin, bool)>,
    }

    impl GpioCtl for FakeGpio {
        fn configure(&mut self, pin: Pin, direction: Direction, pull: Pull) {
            self.configured.push((pin, direction, pull));
        }

        fn set_alternate_function(&mut self, pin: Pin, enabled: bool) {
            self.alt.push((pin, enabled));
        }
    }

    #[derive(Default)]
    struct FakeIrq {
        events: StdMutex<Vec<String>>,
    }

    impl FakeIrq {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl InterruptCtl for FakeIrq {
        fn mask(&self, line: Interrupt) {
            self.events.lock().unwrap().push(format!("mask {line:?}"));
        }

        fn unmask(&self, line: Interrupt) {
            self.events.lock().unwrap().push(format!("unmask {line:?}"));
        }

        fn clear_pending(&self, line: Interrupt) {
            self.events.lock().unwrap().push(format!("clear_pending {line:?}"));
        }

        fn complete(&self) {
            self.events.lock().unwrap().push("complete".into());
        }
    }

    fn single_unit_bank<'a>(sysctl: &'a FakeSysctl, regs: &'a FakeUart) -> Uart<'a, FakeSysctl, FakeUart, 1> {
        Uart::new(
            sysctl,
            [Unit::new(regs, Interrupt::Uart0, Pin::new(Port::A, 0), Pin::new(Port::A, 1))],
        )
    }

    /// Simulate one transmit interrupt: the shifter empties the FIFO, the
    /// level drop raises the transmit cause, the handler runs (unless the
    /// source is gated off).
    fn pump_tx(uart: &Uart<'_, FakeSysctl, FakeUart, 1>, regs: &FakeUart, irq: &FakeIrq) {
        regs.shift_out();
        regs.raise(MIS_TXMIS);
        if let Some(gate) = &regs.gate {
            if !gate.enter_isr() {
                return;
            }
            uart.on_interrupt(0, irq);
            gate.exit_isr();
        } else {
            uart.on_interrupt(0, irq);
        }
    }

    #[test]
    fn init_rejects_unknown_unit() {
        let sysctl = FakeSysctl::internal_12mhz();
        let regs = FakeUart::new();
        let uart = single_unit_bank(&sysctl, &regs);
        let mut gpio = FakeGpio::default();
        let irq = FakeIrq::default();

        assert_eq!(uart.init(1, 115_200, None, &mut gpio, &irq), Err(Error::NoSuchDevice));

        // no side effects at all
        assert_eq!(sysctl.writes.load(Ordering::Relaxed), 0);
        assert_eq!(regs.state.lock().unwrap().writes, 0);
        assert!(gpio.configured.is_empty());
        assert!(irq.events().is_empty());

        assert_eq!(uart.write(1, b"x"), Err(Error::NoSuchDevice));
        assert_eq!(uart.blocking_write(1, b"x"), Err(Error::NoSuchDevice));
        assert!(uart.writer(1).is_err());
    }

    #[test]
    fn init_programs_unit() {
        let sysctl = FakeSysctl::internal_12mhz();
        let regs = FakeUart::new();
        let uart = single_unit_bank(&sysctl, &regs);
        let mut gpio = FakeGpio::default();
        let irq = FakeIrq::default();

        uart.init(0, 115_200, None, &mut gpio, &irq).unwrap();

        // 12MHz / 115200 in 1/64ths of a bit period is 417.1
        let s = regs.state.lock().unwrap();
        assert_eq!(s.ibrd, 6);
        assert_eq!(s.fbrd, 33);
        assert_eq!(s.lcrh, LCRH_WLEN_8 | LCRH_FEN);
        assert_eq!(s.ifls, IFLS_TX4_8 | IFLS_RX4_8);
        assert_eq!(s.im, IM_RXIM | IM_RTIM | IM_TXIM);
        assert_ne!(s.ctl & CTL_UARTEN, 0);
        assert_eq!(s.pending, 0);
        drop(s);

        assert_eq!(sysctl.rcgc1.load(Ordering::Relaxed), 1 << 0);

        let rx = Pin::new(Port::A, 0);
        let tx = Pin::new(Port::A, 1);
        assert_eq!(
            gpio.configured,
            vec![(rx, Direction::Input, Pull::None), (tx, Direction::Output, Pull::None)]
        );
        assert_eq!(gpio.alt, vec![(rx, true), (tx, true)]);

        assert_eq!(
            irq.events(),
            vec!["mask Uart0", "clear_pending Uart0", "unmask Uart0"]
        );
    }

    #[test]
    fn reinit_replaces_baud_and_callback() {
        let sysctl = FakeSysctl::internal_12mhz();
        let regs = FakeUart::new();
        let uart = single_unit_bank(&sysctl, &regs);
        let mut gpio = FakeGpio::default();
        let irq = FakeIrq::default();

        let first: StdMutex<Vec<u8>> = StdMutex::new(Vec::new());
        let second: StdMutex<Vec<u8>> = StdMutex::new(Vec::new());
        let first_cb = |byte: u8| first.lock().unwrap().push(byte);
        let second_cb = |byte: u8| second.lock().unwrap().push(byte);

        uart.init(0, 115_200, Some(&first_cb), &mut gpio, &irq).unwrap();
        uart.init(0, 9_600, Some(&second_cb), &mut gpio, &irq).unwrap();

        // 12MHz / 9600 -> 5000 sixty-fourths
        let s = regs.state.lock().unwrap();
        assert_eq!(s.ibrd, 78);
        assert_eq!(s.fbrd, 8);
        drop(s);

        regs.feed_rx(b"z");
        regs.raise(MIS_RXMIS);
        uart.on_interrupt(0, &irq);

        assert!(first.lock().unwrap().is_empty());
        assert_eq!(*second.lock().unwrap(), b"z");
    }

    #[test]
    fn write_drains_to_wire_in_order() {
        let sysctl = FakeSysctl::internal_12mhz();
        let regs = FakeUart::new();
        let uart = single_unit_bank(&sysctl, &regs);
        let mut gpio = FakeGpio::default();
        let irq = FakeIrq::default();
        uart.init(0, 115_200, None, &mut gpio, &irq).unwrap();

        let data: Vec<u8> = (0..64).collect();
        uart.write(0, &data).unwrap();

        // bytes are queued, the transmit source is armed
        assert_ne!(regs.state.lock().unwrap().im & IM_TXIM, 0);

        let mut pumps = 0;
        while regs.wire().len() < data.len() {
            pump_tx(&uart, &regs, &irq);
            pumps += 1;
            assert!(pumps < 64, "wire never completed");
        }
        assert_eq!(regs.wire(), data);

        // one more interrupt with an empty ring quiesces the source
        pump_tx(&uart, &regs, &irq);
        assert_eq!(regs.state.lock().unwrap().im & IM_TXIM, 0);
        assert!(uart.unit(0).unwrap().tx_ring.is_empty());
    }

    #[test]
    fn write_blocks_until_interrupts_drain() {
        let sysctl = FakeSysctl::internal_12mhz();
        let regs = FakeUart::gated();
        let uart = single_unit_bank(&sysctl, &regs);
        let mut gpio = FakeGpio::default();
        let irq = FakeIrq::default();
        uart.init(0, 115_200, None, &mut gpio, &irq).unwrap();

        // more than ring + FIFO capacity, so the writer must block on the
        // interrupt drain to finish
        let data: Vec<u8> = (0..200u32).map(|i| (i % 251) as u8).collect();
        let done = AtomicBool::new(false);

        thread::scope(|scope| {
            scope.spawn(|| {
                uart.write(0, &data).unwrap();
                done.store(true, Ordering::Release);
            });

            // with no interrupts running the writer saturates ring + FIFO
            // and stays blocked
            thread::sleep(Duration::from_millis(50));
            assert!(!done.load(Ordering::Acquire));

            let mut pumps = 0;
            while regs.wire().len() < data.len() {
                pump_tx(&uart, &regs, &irq);
                thread::sleep(Duration::from_millis(1));
                pumps += 1;
                assert!(pumps < 10_000, "drain never completed");
            }
        });

        assert!(done.load(Ordering::Acquire));
        assert_eq!(regs.wire(), data);
    }

    #[test]
    fn rx_bytes_reach_callback_in_order() {
        let sysctl = FakeSysctl::internal_12mhz();
        let regs = FakeUart::new();
        let uart = single_unit_bank(&sysctl, &regs);
        let mut gpio = FakeGpio::default();
        let irq = FakeIrq::default();

        let received: StdMutex<Vec<u8>> = StdMutex::new(Vec::new());
        let callback = |byte: u8| received.lock().unwrap().push(byte);
        uart.init(0, 115_200, Some(&callback), &mut gpio, &irq).unwrap();

        regs.feed_rx(b"hello");
        regs.raise(MIS_RXMIS);
        uart.on_interrupt(0, &irq);

        assert_eq!(*received.lock().unwrap(), b"hello");
        assert!(regs.state.lock().unwrap().rx_fifo.is_empty());
        // the cause was acknowledged and the handler completed
        assert_eq!(regs.state.lock().unwrap().pending, 0);
        assert_eq!(irq.events().last().map(String::as_str), Some("complete"));
    }

    #[test]
    fn rx_timeout_also_drains() {
        let sysctl = FakeSysctl::internal_12mhz();
        let regs = FakeUart::new();
        let uart = single_unit_bank(&sysctl, &regs);
        let mut gpio = FakeGpio::default();
        let irq = FakeIrq::default();

        let received: StdMutex<Vec<u8>> = StdMutex::new(Vec::new());
        let callback = |byte: u8| received.lock().unwrap().push(byte);
        uart.init(0, 115_200, Some(&callback), &mut gpio, &irq).unwrap();

        // fewer bytes than the receive trigger level: only the timeout
        // cause fires
        regs.feed_rx(b"ok");
        regs.raise(MIS_RTMIS);
        uart.on_interrupt(0, &irq);

        assert_eq!(*received.lock().unwrap(), b"ok");
    }

    #[test]
    fn rx_without_callback_discards() {
        let sysctl = FakeSysctl::internal_12mhz();
        let regs = FakeUart::new();
        let uart = single_unit_bank(&sysctl, &regs);
        let mut gpio = FakeGpio::default();
        let irq = FakeIrq::default();
        uart.init(0, 115_200, None, &mut gpio, &irq).unwrap();

        regs.feed_rx(b"dropped");
        regs.raise(MIS_RXMIS);
        uart.on_interrupt(0, &irq);

        // the FIFO still empties so the interrupt does not refire forever
        assert!(regs.state.lock().unwrap().rx_fifo.is_empty());
    }

    #[test]
    fn misrouted_interrupt_only_completes() {
        let sysctl = FakeSysctl::internal_12mhz();
        let regs = FakeUart::new();
        let uart = single_unit_bank(&sysctl, &regs);
        let irq = FakeIrq::default();

        uart.on_interrupt(7, &irq);

        assert_eq!(irq.events(), vec!["complete"]);
        assert_eq!(regs.state.lock().unwrap().writes, 0);
    }

    #[test]
    fn blocking_write_bypasses_ring() {
        let sysctl = FakeSysctl::internal_12mhz();
        let regs = FakeUart::free_running();
        let uart = single_unit_bank(&sysctl, &regs);
        let mut gpio = FakeGpio::default();
        let irq = FakeIrq::default();
        uart.init(0, 115_200, None, &mut gpio, &irq).unwrap();

        // longer than the FIFO, so the inner busy-wait must run
        let data: Vec<u8> = (0..40).collect();
        uart.blocking_write(0, &data).unwrap();

        regs.shift_out();
        assert_eq!(regs.wire(), data);
        assert!(uart.unit(0).unwrap().tx_ring.is_empty());
    }

    #[test]
    fn writer_write_and_flush() {
        use embedded_io::Write;

        let sysctl = FakeSysctl::internal_12mhz();
        let regs = FakeUart::free_running();
        let uart = single_unit_bank(&sysctl, &regs);
        let mut gpio = FakeGpio::default();
        let irq = FakeIrq::default();
        uart.init(0, 115_200, None, &mut gpio, &irq).unwrap();

        let mut writer = uart.writer(0).unwrap();
        assert_eq!(writer.write(b"hi"), Ok(2));
        writer.flush().unwrap();

        assert_eq!(regs.wire(), b"hi");
    }

    #[test]
    fn nb_write_reports_backpressure() {
        use embedded_hal_nb::serial::Write;

        let sysctl = FakeSysctl::internal_12mhz();
        let regs = FakeUart::new();
        let uart = single_unit_bank(&sysctl, &regs);
        let mut gpio = FakeGpio::default();
        let irq = FakeIrq::default();
        uart.init(0, 115_200, None, &mut gpio, &irq).unwrap();

        // exactly saturate FIFO + ring
        let fill = vec![0u8; FIFO_DEPTH + TX_BUFFER_SIZE];
        uart.write(0, &fill).unwrap();

        let mut writer = uart.writer(0).unwrap();
        assert_eq!(writer.write(1), Err(nb::Error::WouldBlock));
        assert_eq!(writer.flush(), Err(nb::Error::WouldBlock));

        // one interrupt worth of drain frees ring space
        pump_tx(&uart, &regs, &irq);
        assert_eq!(writer.write(1), Ok(()));
    }
}
