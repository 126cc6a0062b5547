// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! USB function controller driver.
//!
//! `Usbf` owns the state the hardware does not keep itself: the endpoint stall
//! table and the attached/addressed/configured lifecycle flags. It implements
//! the endpoint primitives of `hil::usb::UsbFunction` and turns controller
//! interrupts into `hil::usb::Client` and `hil::usb::EndpointClient` events.
//!
//! Typical setup:
//!
//! ```rust,ignore
//! let usbf = static_init!(
//!     Usbf<'static, MmioBus>,
//!     Usbf::new(MmioBus::new(OPENUSB_BASE))
//! );
//! usbf.init();
//! usbf.set_client(ctrl);
//! usbf.attach();
//! usbf.enable_interrupts(true, false);
//! ```
//!
//! Until `enable_interrupts(true, _)` arms reset processing, the board's main
//! loop is expected to call `service_pending_reset` so that a reset latched
//! during attach does not leave stale data in the FIFOs.

use core::cell::Cell;
use core::cmp::min;

use kernel::hil;
use kernel::utilities::cells::OptionalCell;
use kernel::utilities::registers::LocalRegisterCopy;
use kernel::utilities::spin::{spin_until, RetryBudget};
use kernel::{debug, usb_trace, ErrorCode};

use crate::registers::{
    EndpointInterrupts, FunctionStatus, Register, RegisterBus, EP_CFG, EP_INTSTS, EP_RX_CTRL,
    EP_STS, EP_TX_CTRL, FUNC_ADDR, FUNC_CTRL, FUNC_STAT, MAX_PACKET_SIZE, N_ENDPOINTS,
};

/// Number of `TX_BUSY` polls `transmit` spends before flushing the FIFO.
pub const TX_BUSY_RETRIES: usize = 1000;

const CONTROL_ENDPOINT: usize = 0;

pub struct Usbf<'a, B: RegisterBus> {
    bus: B,
    client: OptionalCell<&'a dyn hil::usb::Client>,
    endpoint_client: OptionalCell<&'a dyn hil::usb::EndpointClient>,
    stalled: [Cell<bool>; N_ENDPOINTS],
    attached: Cell<bool>,
    addressed: Cell<bool>,
    configured: Cell<bool>,
    reset_processing: Cell<bool>,
}

impl<'a, B: RegisterBus> Usbf<'a, B> {
    pub fn new(bus: B) -> Self {
        Usbf {
            bus,
            client: OptionalCell::empty(),
            endpoint_client: OptionalCell::empty(),
            stalled: Default::default(),
            attached: Cell::new(false),
            addressed: Cell::new(false),
            configured: Cell::new(false),
            reset_processing: Cell::new(false),
        }
    }

    /// The register bus the driver was created with.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn set_endpoint_client(&self, client: &'a dyn hil::usb::EndpointClient) {
        self.endpoint_client.set(client);
    }

    /// Bring the controller into a known state: flush every endpoint FIFO and
    /// forget stalls and lifecycle flags.
    pub fn init(&self) {
        debug!("OpenUSB: init");
        for ep in 0..N_ENDPOINTS {
            self.flush_endpoint(ep);
            self.stalled[ep].set(false);
        }
        self.addressed.set(false);
        self.configured.set(false);
        self.attached.set(false);
        self.reset_processing.set(false);
    }

    /// Enable the PHY termination so the host sees the device.
    pub fn attach(&self) {
        let mut ctrl = self.func_ctrl();
        ctrl.modify(
            FUNC_CTRL::PHY_OPMODE::Normal
                + FUNC_CTRL::PHY_XCVRSELECT::FullSpeed
                + FUNC_CTRL::PHY_TERMSELECT::SET
                + FUNC_CTRL::PHY_DPPULLDOWN::CLEAR
                + FUNC_CTRL::PHY_DMPULLDOWN::CLEAR,
        );
        self.bus.write(Register::FuncCtrl, ctrl.get());
        self.discard_latched_reset();
        self.attached.set(true);
        debug!("OpenUSB: attach");
    }

    /// Put the PHY into non-driving mode, disconnecting from the host.
    pub fn detach(&self) {
        let mut ctrl = self.func_ctrl();
        ctrl.modify(
            FUNC_CTRL::PHY_OPMODE::NonDriving
                + FUNC_CTRL::PHY_XCVRSELECT::HighSpeed
                + FUNC_CTRL::PHY_TERMSELECT::CLEAR
                + FUNC_CTRL::PHY_DPPULLDOWN::CLEAR
                + FUNC_CTRL::PHY_DMPULLDOWN::CLEAR,
        );
        self.bus.write(Register::FuncCtrl, ctrl.get());
        self.discard_latched_reset();
        self.attached.set(false);
        debug!("OpenUSB: detach");
    }

    /// Enable endpoint interrupts (RX and TX on the data endpoints, RX only on
    /// the control endpoint) and the function-level reset/SOF interrupts.
    ///
    /// Enabling the reset interrupt also arms bus reset processing in
    /// `handle_interrupt`.
    pub fn enable_interrupts(&self, reset: bool, sof: bool) {
        for ep in 0..N_ENDPOINTS {
            let mut cfg = self.ep_cfg(ep);
            if ep == CONTROL_ENDPOINT {
                cfg.modify(EP_CFG::INT_RX::SET + EP_CFG::INT_TX::CLEAR);
            } else {
                cfg.modify(EP_CFG::INT_RX::SET + EP_CFG::INT_TX::SET);
            }
            self.bus.write(Register::EpCfg(ep), cfg.get());
        }

        let mut ctrl = self.func_ctrl();
        ctrl.modify(
            FUNC_CTRL::INT_EN_RST.val(reset as u32) + FUNC_CTRL::INT_EN_SOF.val(sof as u32),
        );
        self.bus.write(Register::FuncCtrl, ctrl.get());
        self.reset_processing.set(reset);
    }

    /// Interrupt service routine.
    ///
    /// Latches both status registers, services them, hands data endpoint
    /// events to the endpoint client and finally acknowledges everything that
    /// was latched by writing it back.
    pub fn handle_interrupt(&self) {
        let func_stat = FunctionStatus::new(self.bus.read(Register::FuncStat));
        let ep_intsts = EndpointInterrupts::new(self.bus.read(Register::EpIntSts));
        usb_trace!(
            "OpenUSB: irq stat={:#x} intsts={:#x}",
            func_stat.get(),
            ep_intsts.get()
        );

        self.service(func_stat, ep_intsts, self.reset_processing.get());

        let rx_ready = ep_intsts.read(EP_INTSTS::RX_READY);
        let tx_complete = ep_intsts.read(EP_INTSTS::TX_COMPLETE);
        for ep in 1..N_ENDPOINTS {
            if rx_ready & (1 << ep) != 0 {
                self.endpoint_client.map(|client| client.packet_received(ep));
            }
            if tx_complete & (1 << ep) != 0 {
                self.endpoint_client
                    .map(|client| client.packet_transmitted(ep));
            }
        }

        self.bus.write(Register::EpIntSts, ep_intsts.get());
        self.bus.write(Register::FuncStat, func_stat.get());
    }

    /// Service one latched interrupt snapshot.
    ///
    /// With `process_reset` set, a latched bus reset clears the lifecycle
    /// flags and the stall table, flushes all FIFOs, notifies the client and
    /// acknowledges the reset. An RX-ready control endpoint is dispatched to
    /// the client as a SETUP or OUT packet.
    pub fn service(
        &self,
        func_stat: FunctionStatus,
        ep_intsts: EndpointInterrupts,
        process_reset: bool,
    ) {
        if func_stat.is_set(FUNC_STAT::RST) && process_reset {
            self.configured.set(false);
            self.addressed.set(false);
            for stalled in self.stalled.iter() {
                stalled.set(false);
            }
            for ep in 0..N_ENDPOINTS {
                self.flush_endpoint(ep);
            }
            self.client.map(|client| client.bus_reset());
            self.bus.write(Register::FuncStat, func_stat.get());
            debug!("OpenUSB: bus reset");
        }

        if func_stat.is_set(FUNC_STAT::SOF) {
            usb_trace!("OpenUSB: SOF {}", func_stat.read(FUNC_STAT::FRAME));
        }

        if ep_intsts.read(EP_INTSTS::RX_READY) & (1 << CONTROL_ENDPOINT) != 0 {
            if self.ep_sts(CONTROL_ENDPOINT).is_set(EP_STS::RX_SETUP) {
                usb_trace!("OpenUSB: SETUP received");
                self.client.map(|client| client.ctrl_setup());
            } else {
                usb_trace!("OpenUSB: OUT received on ep0");
                self.client.map(|client| client.ctrl_out());
            }
        }
    }

    /// Reset handling for the main loop, while reset interrupts are not armed.
    ///
    /// Returns whether a reset was pending.
    pub fn service_pending_reset(&self) -> bool {
        let func_stat = FunctionStatus::new(self.bus.read(Register::FuncStat));
        if !func_stat.is_set(FUNC_STAT::RST) {
            return false;
        }
        for ep in 0..N_ENDPOINTS {
            self.flush_endpoint(ep);
        }
        self.bus.write(Register::FuncStat, func_stat.get());
        debug!("OpenUSB: reset done");
        true
    }

    fn discard_latched_reset(&self) {
        let mut stat = FunctionStatus::new(0);
        stat.write(FUNC_STAT::RST::SET);
        self.bus.write(Register::FuncStat, stat.get());
    }

    fn flush_endpoint(&self, ep: usize) {
        let mut tx: LocalRegisterCopy<u32, EP_TX_CTRL::Register> = LocalRegisterCopy::new(0);
        tx.write(EP_TX_CTRL::TX_FLUSH::SET);
        let mut rx: LocalRegisterCopy<u32, EP_RX_CTRL::Register> = LocalRegisterCopy::new(0);
        rx.write(EP_RX_CTRL::RX_FLUSH::SET);
        self.bus.write(Register::EpTxCtrl(ep), tx.get());
        self.bus.write(Register::EpRxCtrl(ep), rx.get());
    }

    fn flush_tx(&self, ep: usize) {
        let mut tx: LocalRegisterCopy<u32, EP_TX_CTRL::Register> = LocalRegisterCopy::new(0);
        tx.write(EP_TX_CTRL::TX_FLUSH::SET);
        self.bus.write(Register::EpTxCtrl(ep), tx.get());
    }

    fn func_ctrl(&self) -> LocalRegisterCopy<u32, FUNC_CTRL::Register> {
        LocalRegisterCopy::new(self.bus.read(Register::FuncCtrl))
    }

    fn ep_cfg(&self, ep: usize) -> LocalRegisterCopy<u32, EP_CFG::Register> {
        LocalRegisterCopy::new(self.bus.read(Register::EpCfg(ep)))
    }

    fn ep_sts(&self, ep: usize) -> LocalRegisterCopy<u32, EP_STS::Register> {
        LocalRegisterCopy::new(self.bus.read(Register::EpSts(ep)))
    }

    fn write_stall(&self, ep: usize, stall: bool) -> Result<(), ErrorCode> {
        if ep >= N_ENDPOINTS {
            return Err(ErrorCode::INVAL);
        }
        let mut cfg = self.ep_cfg(ep);
        cfg.modify(EP_CFG::STALL_EP.val(stall as u32));
        self.bus.write(Register::EpCfg(ep), cfg.get());
        self.stalled[ep].set(stall);
        Ok(())
    }
}

impl<'a, B: RegisterBus> hil::usb::UsbFunction<'a> for Usbf<'a, B> {
    fn set_client(&self, client: &'a dyn hil::usb::Client) {
        self.client.set(client);
    }

    fn is_rx_ready(&self, ep: usize) -> bool {
        self.ep_sts(ep).is_set(EP_STS::RX_READY)
    }

    fn is_rx_setup(&self, ep: usize) -> bool {
        self.ep_sts(ep).is_set(EP_STS::RX_SETUP)
    }

    fn rx_byte_count(&self, ep: usize) -> usize {
        self.ep_sts(ep).read(EP_STS::RX_COUNT) as usize
    }

    fn read_rx_byte(&self, ep: usize) -> u8 {
        self.bus.read(Register::EpData(ep)) as u8
    }

    fn read_rx_block(&self, ep: usize, buf: &mut [u8]) -> usize {
        let count = min(self.rx_byte_count(ep), buf.len());
        for byte in buf[..count].iter_mut() {
            *byte = self.read_rx_byte(ep);
        }
        count
    }

    fn clear_rx_ready(&self, ep: usize) {
        let mut rx: LocalRegisterCopy<u32, EP_RX_CTRL::Register> = LocalRegisterCopy::new(0);
        rx.write(EP_RX_CTRL::RX_ACCEPT::SET);
        self.bus.write(Register::EpRxCtrl(ep), rx.get());
    }

    fn transmit(&self, ep: usize, buf: &[u8]) {
        let len = min(buf.len(), MAX_PACKET_SIZE);
        let mut budget = RetryBudget::new(TX_BUSY_RETRIES);

        for &byte in buf[..len].iter() {
            // Wait for the previous packet to leave the FIFO. Once the budget
            // is spent the FIFO is flushed and the rest of the packet is
            // loaded without waiting.
            while !budget.is_exhausted() && self.ep_sts(ep).is_set(EP_STS::TX_BUSY) {
                usb_trace!("OpenUSB: ep{} tx busy", ep);
                budget.consume();
                if budget.is_exhausted() {
                    debug!("OpenUSB: ep{} tx stuck, flushing", ep);
                    self.flush_tx(ep);
                }
            }
            self.bus.write(Register::EpData(ep), byte as u32);
        }

        let mut tx: LocalRegisterCopy<u32, EP_TX_CTRL::Register> = LocalRegisterCopy::new(0);
        tx.write(EP_TX_CTRL::TX_LEN.val(len as u32) + EP_TX_CTRL::TX_START::SET);
        self.bus.write(Register::EpTxCtrl(ep), tx.get());
        usb_trace!("OpenUSB: ep{} tx {} bytes", ep, len);
    }

    fn is_tx_complete(&self, ep: usize) -> bool {
        !self.ep_sts(ep).is_set(EP_STS::TX_BUSY)
    }

    fn set_rx_interrupt(&self, ep: usize, enabled: bool) {
        let mut cfg = self.ep_cfg(ep);
        cfg.modify(EP_CFG::INT_RX.val(enabled as u32));
        self.bus.write(Register::EpCfg(ep), cfg.get());
    }

    fn set_stall(&self, ep: usize) -> Result<(), ErrorCode> {
        self.write_stall(ep, true)
    }

    fn clear_stall(&self, ep: usize) -> Result<(), ErrorCode> {
        self.write_stall(ep, false)
    }

    fn is_stalled(&self, ep: usize) -> bool {
        self.stalled.get(ep).map_or(false, Cell::get)
    }

    fn send_status_zlp(&self) {
        usb_trace!("OpenUSB: send ZLP");
        self.transmit(CONTROL_ENDPOINT, &[]);
        // Unbounded: the host must take the packet for the transfer to finish.
        spin_until(|| self.is_tx_complete(CONTROL_ENDPOINT));
    }

    fn set_address(&self, addr: u8) {
        let mut reg: LocalRegisterCopy<u32, FUNC_ADDR::Register> = LocalRegisterCopy::new(0);
        reg.write(FUNC_ADDR::DEV_ADDR.val(addr as u32));
        self.bus.write(Register::FuncAddr, reg.get());
        self.addressed.set(true);
    }

    fn is_addressed(&self) -> bool {
        self.addressed.get()
    }

    fn set_configured(&self, configured: bool) {
        self.configured.set(configured);
    }

    fn is_configured(&self) -> bool {
        self.configured.get()
    }

    fn is_attached(&self) -> bool {
        self.attached.get()
    }
}
