// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Simulated OpenUSB function controller.
//!
//! `SimBus` implements `RegisterBus` on top of a behavioural model of the
//! controller instead of memory. The host side of the bus is driven through
//! the methods on `SimBus`: queue SETUP and OUT packets, raise a bus reset,
//! and inspect the packets the device transmitted.
//!
//! Modelled behaviour:
//!
//! - Each endpoint has a queue of received packets. `EP_STS` reports the
//!   packet at the head: `RX_READY`, `RX_SETUP` and the bytes left to read in
//!   `RX_COUNT`. `EP_INTSTS.RX_READY` is set while a queue is non-empty.
//! - Reads of `EP_DATA` pop bytes from the head packet; `RX_ACCEPT` drops the
//!   head packet and `RX_FLUSH` empties the queue.
//! - Writes of `EP_DATA` fill the transmit FIFO. `TX_START` sends `TX_LEN`
//!   bytes of it and latches `EP_INTSTS.TX_COMPLETE`; `TX_FLUSH` empties it
//!   and clears a stuck `TX_BUSY`. An endpoint can be made to report
//!   `TX_BUSY` for a while after every `TX_START`, and the host can be told
//!   to acknowledge a control read after a given number of IN packets.
//! - `FUNC_STAT.RST`, `FUNC_STAT.SOF` and `EP_INTSTS.TX_COMPLETE` are cleared
//!   by writing 1.

use std::cell::RefCell;
use std::cmp::min;
use std::collections::VecDeque;

use kernel::utilities::registers::LocalRegisterCopy;
use openusb::registers::{
    Register, RegisterBus, EP_INTSTS, EP_RX_CTRL, EP_STS, EP_TX_CTRL, FUNC_ADDR, FUNC_STAT,
    N_ENDPOINTS,
};

/// `TX_BUSY` never clears by itself.
pub const STUCK: usize = usize::MAX;

struct Packet {
    setup: bool,
    data: VecDeque<u8>,
}

#[derive(Default)]
struct Endpoint {
    cfg: u32,
    rx: VecDeque<Packet>,
    tx_fifo: Vec<u8>,
    sent: Vec<Vec<u8>>,
    /// Number of `EP_STS` reads that still report `TX_BUSY`
    busy_polls: usize,
    /// `busy_polls` loaded by each `TX_START`
    busy_after_start: usize,
    /// IN packets left until the host queues its zero-length STATUS packet
    ack_after: Option<usize>,
    tx_flushes: usize,
    rx_flushes: usize,
}

#[derive(Default)]
struct Controller {
    func_ctrl: u32,
    func_addr: u32,
    frame: u32,
    reset: bool,
    sof: bool,
    tx_complete: u32,
    ep: [Endpoint; N_ENDPOINTS],
    writes: Vec<(Register, u32)>,
}

impl Controller {
    fn rx_ready_mask(&self) -> u32 {
        self.ep
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.rx.is_empty())
            .fold(0, |mask, (n, _)| mask | (1 << n))
    }
}

pub struct SimBus {
    state: RefCell<Controller>,
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBus {
    pub fn new() -> SimBus {
        SimBus {
            state: RefCell::new(Controller::default()),
        }
    }

    fn queue(&self, ep: usize, setup: bool, data: &[u8]) {
        self.state.borrow_mut().ep[ep].rx.push_back(Packet {
            setup,
            data: data.iter().copied().collect(),
        });
    }

    /// The host sends a SETUP packet to the control endpoint.
    pub fn host_setup(&self, packet: [u8; 8]) {
        self.queue(0, true, &packet);
    }

    /// The host sends an OUT packet to `ep`.
    pub fn host_out(&self, ep: usize, data: &[u8]) {
        self.queue(ep, false, data);
    }

    /// The host acknowledges an IN control transfer.
    pub fn host_status(&self) {
        self.queue(0, false, &[]);
    }

    /// The host drives a bus reset.
    pub fn host_reset(&self) {
        self.state.borrow_mut().reset = true;
    }

    pub fn start_of_frame(&self, frame: u32) {
        let mut state = self.state.borrow_mut();
        state.frame = frame & 0x7ff;
        state.sof = true;
    }

    /// Report `TX_BUSY` on `ep` for the next `polls` status reads.
    pub fn set_tx_busy(&self, ep: usize, polls: usize) {
        self.state.borrow_mut().ep[ep].busy_polls = polls;
    }

    /// Report `TX_BUSY` on `ep` for `polls` status reads after every
    /// `TX_START`.
    pub fn set_tx_busy_after_start(&self, ep: usize, polls: usize) {
        self.state.borrow_mut().ep[ep].busy_after_start = polls;
    }

    /// The host sends a zero-length OUT packet on `ep` once `packets` more
    /// packets were transmitted on it.
    pub fn host_status_after(&self, ep: usize, packets: usize) {
        self.state.borrow_mut().ep[ep].ack_after = Some(packets);
    }

    /// Whether the controller would raise an interrupt.
    pub fn interrupt_pending(&self) -> bool {
        let state = self.state.borrow();
        state.reset || state.sof || state.tx_complete != 0 || state.rx_ready_mask() != 0
    }

    pub fn reset_pending(&self) -> bool {
        self.state.borrow().reset
    }

    /// Packets transmitted on `ep` since the last call.
    pub fn take_sent(&self, ep: usize) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.state.borrow_mut().ep[ep].sent)
    }

    /// Packets still waiting in the receive queue of `ep`.
    pub fn rx_queued(&self, ep: usize) -> usize {
        self.state.borrow().ep[ep].rx.len()
    }

    pub fn tx_fifo_len(&self, ep: usize) -> usize {
        self.state.borrow().ep[ep].tx_fifo.len()
    }

    pub fn tx_flushes(&self, ep: usize) -> usize {
        self.state.borrow().ep[ep].tx_flushes
    }

    pub fn rx_flushes(&self, ep: usize) -> usize {
        self.state.borrow().ep[ep].rx_flushes
    }

    pub fn endpoint_config(&self, ep: usize) -> u32 {
        self.state.borrow().ep[ep].cfg
    }

    pub fn function_control(&self) -> u32 {
        self.state.borrow().func_ctrl
    }

    pub fn device_address(&self) -> u32 {
        self.state.borrow().func_addr
    }

    /// Values written to `reg`, in order.
    pub fn writes_to(&self, reg: Register) -> Vec<u32> {
        self.state
            .borrow()
            .writes
            .iter()
            .filter(|(r, _)| *r == reg)
            .map(|(_, v)| *v)
            .collect()
    }

    fn endpoint_status(state: &mut Controller, ep: usize) -> u32 {
        let e = match state.ep.get_mut(ep) {
            Some(e) => e,
            None => return 0,
        };
        let mut sts: LocalRegisterCopy<u32, EP_STS::Register> = LocalRegisterCopy::new(0);
        if let Some(packet) = e.rx.front() {
            sts.modify(
                EP_STS::RX_READY::SET
                    + EP_STS::RX_SETUP.val(packet.setup as u32)
                    + EP_STS::RX_COUNT.val(packet.data.len() as u32),
            );
        }
        if e.busy_polls > 0 {
            sts.modify(EP_STS::TX_BUSY::SET);
            if e.busy_polls != STUCK {
                e.busy_polls -= 1;
            }
        }
        sts.get()
    }

    fn tx_control(state: &mut Controller, ep: usize, value: u32) {
        let ctrl: LocalRegisterCopy<u32, EP_TX_CTRL::Register> = LocalRegisterCopy::new(value);
        let e = &mut state.ep[ep];
        if ctrl.is_set(EP_TX_CTRL::TX_FLUSH) {
            e.tx_fifo.clear();
            e.busy_polls = 0;
            e.tx_flushes += 1;
        }
        if ctrl.is_set(EP_TX_CTRL::TX_START) {
            let len = min(ctrl.read(EP_TX_CTRL::TX_LEN) as usize, e.tx_fifo.len());
            let packet: Vec<u8> = e.tx_fifo.drain(..len).collect();
            e.tx_fifo.clear();
            e.sent.push(packet);
            e.busy_polls = e.busy_after_start;
            match e.ack_after {
                Some(n) if n <= 1 => {
                    e.ack_after = None;
                    e.rx.push_back(Packet {
                        setup: false,
                        data: VecDeque::new(),
                    });
                }
                Some(n) => e.ack_after = Some(n - 1),
                None => {}
            }
            state.tx_complete |= 1 << ep;
        }
    }

    fn rx_control(state: &mut Controller, ep: usize, value: u32) {
        let ctrl: LocalRegisterCopy<u32, EP_RX_CTRL::Register> = LocalRegisterCopy::new(value);
        let e = &mut state.ep[ep];
        if ctrl.is_set(EP_RX_CTRL::RX_ACCEPT) {
            e.rx.pop_front();
        }
        if ctrl.is_set(EP_RX_CTRL::RX_FLUSH) {
            e.rx.clear();
            e.rx_flushes += 1;
        }
    }
}

impl RegisterBus for SimBus {
    fn read(&self, reg: Register) -> u32 {
        let mut state = self.state.borrow_mut();
        match reg {
            Register::FuncCtrl => state.func_ctrl,
            Register::FuncStat => {
                let mut stat: LocalRegisterCopy<u32, FUNC_STAT::Register> =
                    LocalRegisterCopy::new(0);
                stat.modify(
                    FUNC_STAT::FRAME.val(state.frame)
                        + FUNC_STAT::RST.val(state.reset as u32)
                        + FUNC_STAT::SOF.val(state.sof as u32),
                );
                stat.get()
            }
            Register::FuncAddr => state.func_addr,
            Register::EpIntSts => {
                let mut ints: LocalRegisterCopy<u32, EP_INTSTS::Register> =
                    LocalRegisterCopy::new(0);
                ints.modify(
                    EP_INTSTS::RX_READY.val(state.rx_ready_mask())
                        + EP_INTSTS::TX_COMPLETE.val(state.tx_complete),
                );
                ints.get()
            }
            Register::EpCfg(ep) => state.ep.get(ep).map_or(0, |e| e.cfg),
            // Strobes read back as zero.
            Register::EpTxCtrl(_) | Register::EpRxCtrl(_) => 0,
            Register::EpSts(ep) => SimBus::endpoint_status(&mut state, ep),
            Register::EpData(ep) => state
                .ep
                .get_mut(ep)
                .and_then(|e| e.rx.front_mut())
                .and_then(|packet| packet.data.pop_front())
                .map_or(0, u32::from),
        }
    }

    fn write(&self, reg: Register, value: u32) {
        let mut state = self.state.borrow_mut();
        state.writes.push((reg, value));
        if reg.endpoint().map_or(false, |ep| ep >= N_ENDPOINTS) {
            return;
        }
        match reg {
            Register::FuncCtrl => state.func_ctrl = value,
            Register::FuncStat => {
                let stat: LocalRegisterCopy<u32, FUNC_STAT::Register> =
                    LocalRegisterCopy::new(value);
                if stat.is_set(FUNC_STAT::RST) {
                    state.reset = false;
                }
                if stat.is_set(FUNC_STAT::SOF) {
                    state.sof = false;
                }
            }
            Register::FuncAddr => {
                let addr: LocalRegisterCopy<u32, FUNC_ADDR::Register> =
                    LocalRegisterCopy::new(value);
                state.func_addr = addr.read(FUNC_ADDR::DEV_ADDR);
            }
            Register::EpIntSts => {
                let ints: LocalRegisterCopy<u32, EP_INTSTS::Register> =
                    LocalRegisterCopy::new(value);
                state.tx_complete &= !ints.read(EP_INTSTS::TX_COMPLETE);
            }
            Register::EpCfg(ep) => state.ep[ep].cfg = value,
            Register::EpTxCtrl(ep) => SimBus::tx_control(&mut state, ep, value),
            Register::EpRxCtrl(ep) => SimBus::rx_control(&mut state, ep, value),
            Register::EpSts(_) => {}
            Register::EpData(ep) => state.ep[ep].tx_fifo.push(value as u8),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rx_packets_drive_status() {
        let bus = SimBus::new();
        bus.host_setup([0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x12, 0x00]);
        bus.host_out(0, &[1, 2, 3]);

        assert_eq!(bus.read(Register::EpIntSts), 1);
        assert_eq!(bus.read(Register::EpSts(0)), (1 << 16) | (1 << 17) | 8);
        assert_eq!(bus.read(Register::EpData(0)), 0x80);
        assert_eq!(bus.read(Register::EpSts(0)) & 0x7ff, 7);

        bus.write(Register::EpRxCtrl(0), 1);
        assert_eq!(bus.read(Register::EpSts(0)), (1 << 16) | 3);

        bus.write(Register::EpRxCtrl(0), 1 << 1);
        assert_eq!(bus.read(Register::EpSts(0)), 0);
        assert_eq!(bus.read(Register::EpIntSts), 0);
        assert_eq!(bus.rx_flushes(0), 1);
    }

    #[test]
    fn tx_start_sends_fifo_and_latches_completion() {
        let bus = SimBus::new();
        for byte in [0xaa, 0xbb, 0xcc] {
            bus.write(Register::EpData(2), byte);
        }
        bus.write(Register::EpTxCtrl(2), (1 << 16) | 2);

        assert_eq!(bus.take_sent(2), [vec![0xaa, 0xbb]]);
        assert_eq!(bus.tx_fifo_len(2), 0);
        assert_eq!(bus.read(Register::EpIntSts), 1 << 18);
        assert!(bus.interrupt_pending());

        bus.write(Register::EpIntSts, 1 << 18);
        assert!(!bus.interrupt_pending());
    }

    #[test]
    fn busy_countdown_and_flush() {
        let bus = SimBus::new();
        bus.set_tx_busy(1, 2);
        assert_ne!(bus.read(Register::EpSts(1)) & (1 << 19), 0);
        assert_ne!(bus.read(Register::EpSts(1)) & (1 << 19), 0);
        assert_eq!(bus.read(Register::EpSts(1)) & (1 << 19), 0);

        bus.set_tx_busy(1, STUCK);
        for _ in 0..10 {
            assert_ne!(bus.read(Register::EpSts(1)) & (1 << 19), 0);
        }
        bus.write(Register::EpTxCtrl(1), 1 << 17);
        assert_eq!(bus.read(Register::EpSts(1)) & (1 << 19), 0);
        assert_eq!(bus.tx_flushes(1), 1);
    }

    #[test]
    fn busy_after_start_and_delayed_status() {
        let bus = SimBus::new();
        bus.set_tx_busy_after_start(0, 2);
        bus.host_status_after(0, 2);

        bus.write(Register::EpTxCtrl(0), 1 << 16);
        assert_ne!(bus.read(Register::EpSts(0)) & (1 << 19), 0);
        assert_ne!(bus.read(Register::EpSts(0)) & (1 << 19), 0);
        assert_eq!(bus.read(Register::EpSts(0)) & (1 << 19), 0);
        assert_eq!(bus.rx_queued(0), 0);

        bus.write(Register::EpTxCtrl(0), 1 << 16);
        assert_eq!(bus.rx_queued(0), 1);
        assert_eq!(bus.read(Register::EpSts(0)), (1 << 16) | (1 << 19));
        assert_eq!(bus.take_sent(0), [Vec::<u8>::new(), Vec::new()]);
    }

    #[test]
    fn function_status_is_write_one_to_clear() {
        let bus = SimBus::new();
        bus.host_reset();
        bus.start_of_frame(0x123);
        assert_eq!(bus.read(Register::FuncStat), (1 << 13) | (1 << 14) | 0x123);

        bus.write(Register::FuncStat, 1 << 14);
        assert_eq!(bus.read(Register::FuncStat), (1 << 13) | 0x123);
        bus.write(Register::FuncStat, 1 << 13);
        assert!(!bus.reset_pending());

        bus.write(Register::FuncAddr, 0xff);
        assert_eq!(bus.device_address(), 0x7f);
    }
}
