// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! OpenUSB function controller register map.
//!
//! The block starts with four function-level registers, followed by one
//! 0x20-byte register block per endpoint:
//!
//! ```text
//! 0x00  FUNC_CTRL   PHY control and interrupt enables
//! 0x04  FUNC_STAT   frame number, line state, reset/SOF (write 1 to clear)
//! 0x08  FUNC_ADDR   device address
//! 0x0c  EP_INTSTS   per endpoint rx ready / tx complete (write 1 to clear)
//! 0x20 + n * 0x20   endpoint n: CFG, TX_CTRL, RX_CTRL, STS, DATA
//! ```
//!
//! The driver never touches the MMIO structs directly. It goes through the
//! [`RegisterBus`] trait, which moves raw 32-bit values and lets the driver
//! decode them with [`LocalRegisterCopy`]. [`MmioBus`] is the implementation
//! used on hardware.

use kernel::utilities::registers::interfaces::{Readable, Writeable};
use kernel::utilities::registers::{
    register_bitfields, register_structs, LocalRegisterCopy, ReadOnly, ReadWrite,
};
use kernel::utilities::StaticRef;

/// Number of endpoints implemented by the controller.
pub const N_ENDPOINTS: usize = 4;

/// Largest packet any endpoint FIFO holds.
pub const MAX_PACKET_SIZE: usize = 64;

/// Distance between two endpoint register blocks.
pub const EP_STRIDE: usize = 0x20;

const EP_BLOCK_OFFSET: usize = 0x20;

register_structs! {
    pub EndpointRegisters {
        /// Endpoint configuration: stall and interrupt enables
        /// - Address: 0x00 from the endpoint block
        (0x00 => cfg: ReadWrite<u32, EP_CFG::Register>),
        /// Transmit control: length, start and flush strobes
        /// - Address: 0x04 from the endpoint block
        (0x04 => tx_ctrl: ReadWrite<u32, EP_TX_CTRL::Register>),
        /// Receive control: accept and flush strobes
        /// - Address: 0x08 from the endpoint block
        (0x08 => rx_ctrl: ReadWrite<u32, EP_RX_CTRL::Register>),
        /// Endpoint status
        /// - Address: 0x0c from the endpoint block
        (0x0c => sts: ReadOnly<u32, EP_STS::Register>),
        /// Byte-wide FIFO port. Reads pop from the receive FIFO, writes push
        /// into the transmit FIFO.
        /// - Address: 0x10 from the endpoint block
        (0x10 => data: ReadWrite<u32, EP_DATA::Register>),
        (0x14 => _reserved),
        (0x20 => @END),
    }
}

register_structs! {
    pub UsbfRegisters {
        /// Function control
        /// - Address: 0x00
        (0x00 => func_ctrl: ReadWrite<u32, FUNC_CTRL::Register>),
        /// Function status
        /// - Address: 0x04
        (0x04 => func_stat: ReadWrite<u32, FUNC_STAT::Register>),
        /// Device address
        /// - Address: 0x08
        (0x08 => func_addr: ReadWrite<u32, FUNC_ADDR::Register>),
        /// Endpoint interrupt status
        /// - Address: 0x0c
        (0x0c => ep_intsts: ReadWrite<u32, EP_INTSTS::Register>),
        (0x10 => _reserved0),
        /// Endpoint register blocks
        /// - Address: 0x20 + n * 0x20
        (0x20 => ep: [EndpointRegisters; N_ENDPOINTS]),
        (0xa0 => @END),
    }
}

register_bitfields![u32,
    pub FUNC_CTRL [
        INT_EN_SOF OFFSET(0) NUMBITS(1) [],
        PHY_OPMODE OFFSET(1) NUMBITS(2) [
            Normal = 0,
            NonDriving = 1,
            DisableBitStuff = 2
        ],
        PHY_XCVRSELECT OFFSET(3) NUMBITS(2) [
            HighSpeed = 0,
            FullSpeed = 1
        ],
        PHY_TERMSELECT OFFSET(5) NUMBITS(1) [],
        PHY_DPPULLDOWN OFFSET(6) NUMBITS(1) [],
        PHY_DMPULLDOWN OFFSET(7) NUMBITS(1) [],
        HS_CHIRP_EN OFFSET(8) NUMBITS(1) [],
        INT_EN_RST OFFSET(9) NUMBITS(1) []
    ],
    pub FUNC_STAT [
        FRAME OFFSET(0) NUMBITS(11) [],
        LINESTATE OFFSET(11) NUMBITS(2) [],
        RST OFFSET(13) NUMBITS(1) [],
        SOF OFFSET(14) NUMBITS(1) []
    ],
    pub FUNC_ADDR [
        DEV_ADDR OFFSET(0) NUMBITS(7) []
    ],
    pub EP_INTSTS [
        RX_READY OFFSET(0) NUMBITS(4) [],
        TX_COMPLETE OFFSET(16) NUMBITS(4) []
    ],
    pub EP_CFG [
        ISO OFFSET(0) NUMBITS(1) [],
        STALL_EP OFFSET(1) NUMBITS(1) [],
        INT_TX OFFSET(2) NUMBITS(1) [],
        INT_RX OFFSET(3) NUMBITS(1) []
    ],
    pub EP_TX_CTRL [
        TX_LEN OFFSET(0) NUMBITS(11) [],
        TX_START OFFSET(16) NUMBITS(1) [],
        TX_FLUSH OFFSET(17) NUMBITS(1) []
    ],
    pub EP_RX_CTRL [
        RX_ACCEPT OFFSET(0) NUMBITS(1) [],
        RX_FLUSH OFFSET(1) NUMBITS(1) []
    ],
    pub EP_STS [
        RX_COUNT OFFSET(0) NUMBITS(11) [],
        RX_READY OFFSET(16) NUMBITS(1) [],
        RX_SETUP OFFSET(17) NUMBITS(1) [],
        RX_ERR OFFSET(18) NUMBITS(1) [],
        TX_BUSY OFFSET(19) NUMBITS(1) [],
        TX_ERR OFFSET(20) NUMBITS(1) []
    ],
    pub EP_DATA [
        DATA OFFSET(0) NUMBITS(8) []
    ]
];

/// Latched copy of `FUNC_STAT`, as handed to the service routine.
pub type FunctionStatus = LocalRegisterCopy<u32, FUNC_STAT::Register>;

/// Latched copy of `EP_INTSTS`, as handed to the service routine.
pub type EndpointInterrupts = LocalRegisterCopy<u32, EP_INTSTS::Register>;

/// Default location of the controller.
pub const OPENUSB_BASE: StaticRef<UsbfRegisters> =
    unsafe { StaticRef::new(0x1004_2000 as *const UsbfRegisters) };

/// A register of the controller, endpoint registers carry their endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Register {
    FuncCtrl,
    FuncStat,
    FuncAddr,
    EpIntSts,
    EpCfg(usize),
    EpTxCtrl(usize),
    EpRxCtrl(usize),
    EpSts(usize),
    EpData(usize),
}

impl Register {
    /// Byte offset of the register from the start of the block.
    pub fn offset(self) -> usize {
        let ep_block = |ep: usize| EP_BLOCK_OFFSET + ep * EP_STRIDE;
        match self {
            Register::FuncCtrl => 0x00,
            Register::FuncStat => 0x04,
            Register::FuncAddr => 0x08,
            Register::EpIntSts => 0x0c,
            Register::EpCfg(ep) => ep_block(ep),
            Register::EpTxCtrl(ep) => ep_block(ep) + 0x04,
            Register::EpRxCtrl(ep) => ep_block(ep) + 0x08,
            Register::EpSts(ep) => ep_block(ep) + 0x0c,
            Register::EpData(ep) => ep_block(ep) + 0x10,
        }
    }

    /// The endpoint an endpoint register belongs to.
    pub fn endpoint(self) -> Option<usize> {
        match self {
            Register::EpCfg(ep)
            | Register::EpTxCtrl(ep)
            | Register::EpRxCtrl(ep)
            | Register::EpSts(ep)
            | Register::EpData(ep) => Some(ep),
            _ => None,
        }
    }
}

/// 32-bit access to the controller registers.
///
/// Reads of `EpData` pop the receive FIFO and writes of `FuncStat` and
/// `EpIntSts` clear the bits written as 1, so implementations must perform
/// exactly one access per call.
pub trait RegisterBus {
    fn read(&self, reg: Register) -> u32;
    fn write(&self, reg: Register, value: u32);
}

/// Register access through the memory mapped block.
pub struct MmioBus {
    registers: StaticRef<UsbfRegisters>,
}

impl MmioBus {
    pub const fn new(registers: StaticRef<UsbfRegisters>) -> MmioBus {
        MmioBus { registers }
    }

    fn endpoint(&self, ep: usize) -> Option<&EndpointRegisters> {
        self.registers.ep.get(ep)
    }
}

impl RegisterBus for MmioBus {
    fn read(&self, reg: Register) -> u32 {
        let regs = &*self.registers;
        match reg {
            Register::FuncCtrl => regs.func_ctrl.get(),
            Register::FuncStat => regs.func_stat.get(),
            Register::FuncAddr => regs.func_addr.get(),
            Register::EpIntSts => regs.ep_intsts.get(),
            Register::EpCfg(ep) => self.endpoint(ep).map_or(0, |e| e.cfg.get()),
            Register::EpTxCtrl(ep) => self.endpoint(ep).map_or(0, |e| e.tx_ctrl.get()),
            Register::EpRxCtrl(ep) => self.endpoint(ep).map_or(0, |e| e.rx_ctrl.get()),
            Register::EpSts(ep) => self.endpoint(ep).map_or(0, |e| e.sts.get()),
            Register::EpData(ep) => self.endpoint(ep).map_or(0, |e| e.data.get()),
        }
    }

    fn write(&self, reg: Register, value: u32) {
        let regs = &*self.registers;
        match reg {
            Register::FuncCtrl => regs.func_ctrl.set(value),
            Register::FuncStat => regs.func_stat.set(value),
            Register::FuncAddr => regs.func_addr.set(value),
            Register::EpIntSts => regs.ep_intsts.set(value),
            Register::EpCfg(ep) => {
                if let Some(e) = self.endpoint(ep) {
                    e.cfg.set(value);
                }
            }
            Register::EpTxCtrl(ep) => {
                if let Some(e) = self.endpoint(ep) {
                    e.tx_ctrl.set(value);
                }
            }
            Register::EpRxCtrl(ep) => {
                if let Some(e) = self.endpoint(ep) {
                    e.rx_ctrl.set(value);
                }
            }
            // Status is read-only.
            Register::EpSts(_) => {}
            Register::EpData(ep) => {
                if let Some(e) = self.endpoint(ep) {
                    e.data.set(value);
                }
            }
        }
    }
}
