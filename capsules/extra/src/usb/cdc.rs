// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! CDC-ACM class requests and descriptors for a USB serial device.
//!
//! `Cdc` answers the class requests of the Abstract Control Model on the
//! control pipe. It keeps the line coding the host configured and the DTR/RTS
//! state, but does not act on them: the data plane is a plain pair of bulk
//! endpoints.
//!
//! `CdcDescriptors` describes a device with one configuration holding the
//! communication interface (interrupt IN endpoint 3) and the data interface
//! (bulk OUT endpoint 1, bulk IN endpoint 2).

use core::cell::Cell;

use kernel::usb_trace;

use super::descriptors::{DescriptorSource, DescriptorType, SetupData};
use super::usbc_client_ctrl::{ClassRequestHandler, ControlPipe};

pub const CDC_ENDPOINT_BULK_OUT: usize = 1;
pub const CDC_ENDPOINT_BULK_IN: usize = 2;
pub const CDC_ENDPOINT_INTR_IN: usize = 3;

const CDC_SEND_ENCAPSULATED_COMMAND: u8 = 0x00;
const CDC_GET_ENCAPSULATED_RESPONSE: u8 = 0x01;
const CDC_SET_LINE_CODING: u8 = 0x20;
const CDC_GET_LINE_CODING: u8 = 0x21;
const CDC_SET_CONTROL_LINE_STATE: u8 = 0x22;
const CDC_SEND_BREAK: u8 = 0x23;

pub const LINE_CODING_LENGTH: usize = 7;

/// 115200 baud, 1 stop bit, no parity, 8 data bits.
const DEFAULT_LINE_CODING: [u8; LINE_CODING_LENGTH] = [0x00, 0xc2, 0x01, 0x00, 0, 0, 8];

const CONTROL_LINE_DTR: u16 = 1 << 0;
const CONTROL_LINE_RTS: u16 = 1 << 1;

/// Decoded form of the 7-byte line coding structure.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LineCoding {
    pub baud_rate: u32,
    /// 0: 1 stop bit, 1: 1.5 stop bits, 2: 2 stop bits
    pub stop_bits: u8,
    /// 0: none, 1: odd, 2: even, 3: mark, 4: space
    pub parity: u8,
    pub data_bits: u8,
}

impl LineCoding {
    pub fn decode(raw: &[u8; LINE_CODING_LENGTH]) -> LineCoding {
        LineCoding {
            baud_rate: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            stop_bits: raw[4],
            parity: raw[5],
            data_bits: raw[6],
        }
    }
}

pub struct Cdc {
    line_coding: Cell<[u8; LINE_CODING_LENGTH]>,
    dtr: Cell<bool>,
    rts: Cell<bool>,
}

impl Cdc {
    pub const fn new() -> Cdc {
        Cdc {
            line_coding: Cell::new(DEFAULT_LINE_CODING),
            dtr: Cell::new(false),
            rts: Cell::new(false),
        }
    }

    pub fn line_coding(&self) -> LineCoding {
        LineCoding::decode(&self.line_coding.get())
    }

    /// Whether the host has signalled that a terminal is present.
    pub fn dtr(&self) -> bool {
        self.dtr.get()
    }

    pub fn rts(&self) -> bool {
        self.rts.get()
    }
}

impl Default for Cdc {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRequestHandler for Cdc {
    fn class_request(&self, pipe: &dyn ControlPipe, setup: SetupData, data: &[u8]) {
        match setup.request_code {
            CDC_SEND_ENCAPSULATED_COMMAND => {
                usb_trace!("CDC: Send encap");
            }
            CDC_GET_ENCAPSULATED_RESPONSE => {
                usb_trace!("CDC: Get encap");
                pipe.stall();
            }
            CDC_SET_LINE_CODING => {
                // The STATUS stage was acknowledged with the data stage.
                match data.get(..LINE_CODING_LENGTH) {
                    Some(raw) => {
                        let mut coding = [0; LINE_CODING_LENGTH];
                        coding.copy_from_slice(raw);
                        self.line_coding.set(coding);
                        usb_trace!("CDC: Set line coding {:?}", self.line_coding());
                    }
                    None => pipe.stall(),
                }
            }
            CDC_GET_LINE_CODING => {
                usb_trace!("CDC: Get line coding");
                if pipe
                    .control_send(&self.line_coding.get(), setup.length)
                    .is_err()
                {
                    pipe.stall();
                }
            }
            CDC_SET_CONTROL_LINE_STATE => {
                self.dtr.set(setup.value & CONTROL_LINE_DTR != 0);
                self.rts.set(setup.value & CONTROL_LINE_RTS != 0);
                usb_trace!("CDC: Set line state {:#x}", setup.value);
                pipe.send_status();
            }
            CDC_SEND_BREAK => {
                usb_trace!("CDC: Send break");
                pipe.send_status();
            }
            _ => {
                usb_trace!("CDC: Unknown command {:#x}", setup.request_code);
                pipe.stall();
            }
        }
    }

    fn bus_reset(&self) {
        self.dtr.set(false);
        self.rts.set(false);
    }
}

/// Build a string descriptor from an ASCII string. `N` must be
/// `2 + 2 * s.len()`.
const fn string_descriptor<const N: usize>(s: &str) -> [u8; N] {
    let bytes = s.as_bytes();
    let mut desc = [0u8; N];
    desc[0] = N as u8;
    desc[1] = DescriptorType::String as u8;
    let mut i = 0;
    while i < bytes.len() && 2 + 2 * i + 1 < N {
        desc[2 + 2 * i] = bytes[i];
        i += 1;
    }
    desc
}

#[rustfmt::skip]
static DEVICE_DESCRIPTOR: [u8; 18] = [
    18,                             // bLength
    DescriptorType::Device as u8,   // bDescriptorType
    0x00, 0x02,                     // bcdUSB 2.00
    0x02,                           // bDeviceClass: communications
    0x00,                           // bDeviceSubClass
    0x00,                           // bDeviceProtocol
    8,                              // bMaxPacketSize0
    0x67, 0x66,                     // idVendor
    0xcd, 0xab,                     // idProduct
    0x00, 0x01,                     // bcdDevice 1.00
    1,                              // iManufacturer
    2,                              // iProduct
    3,                              // iSerialNumber
    1,                              // bNumConfigurations
];

const CONFIGURATION_LENGTH: usize = 67;

#[rustfmt::skip]
static CONFIGURATION_DESCRIPTOR: [u8; CONFIGURATION_LENGTH] = [
    // Configuration
    9, DescriptorType::Configuration as u8,
    CONFIGURATION_LENGTH as u8, 0x00,   // wTotalLength
    2,                                  // bNumInterfaces
    1,                                  // bConfigurationValue
    0,                                  // iConfiguration
    0x80,                               // bmAttributes: bus powered
    50,                                 // bMaxPower: 100 mA

    // Communication interface
    9, DescriptorType::Interface as u8,
    0, 0,                               // bInterfaceNumber, bAlternateSetting
    1,                                  // bNumEndpoints
    0x02, 0x02, 0x01,                   // CDC, ACM, AT commands
    0,

    // Header functional descriptor, CDC 1.10
    5, DescriptorType::CsInterface as u8, 0x00, 0x10, 0x01,
    // Call management functional descriptor
    5, DescriptorType::CsInterface as u8, 0x01, 0x00, 0x01,
    // ACM functional descriptor: line coding and serial state
    4, DescriptorType::CsInterface as u8, 0x02, 0x02,
    // Union functional descriptor
    5, DescriptorType::CsInterface as u8, 0x06, 0x00, 0x01,

    // Notification endpoint
    7, DescriptorType::Endpoint as u8,
    0x80 | CDC_ENDPOINT_INTR_IN as u8,
    0x03,                               // interrupt
    8, 0x00,                            // wMaxPacketSize
    0x10,                               // bInterval

    // Data interface
    9, DescriptorType::Interface as u8,
    1, 0,
    2,
    0x0a, 0x00, 0x00,                   // CDC data
    0,

    7, DescriptorType::Endpoint as u8,
    CDC_ENDPOINT_BULK_OUT as u8,
    0x02,                               // bulk
    64, 0x00,
    0x00,

    7, DescriptorType::Endpoint as u8,
    0x80 | CDC_ENDPOINT_BULK_IN as u8,
    0x02,
    64, 0x00,
    0x00,
];

/// Supported languages: English (United States).
static LANGUAGE_DESCRIPTOR: [u8; 4] = [4, DescriptorType::String as u8, 0x09, 0x04];

static MANUFACTURER_STRING: [u8; 16] = string_descriptor("OpenUSB");
static PRODUCT_STRING: [u8; 30] = string_descriptor("OpenUSB Serial");
static SERIAL_NUMBER_STRING: [u8; 10] = string_descriptor("0001");

/// Descriptor tables of the CDC-ACM device.
pub struct CdcDescriptors;

impl DescriptorSource for CdcDescriptors {
    fn descriptor(&self, descriptor_type: u8, index: u8, _requested_length: u16) -> Option<&[u8]> {
        match DescriptorType::get(descriptor_type)? {
            DescriptorType::Device => Some(&DEVICE_DESCRIPTOR[..]),
            DescriptorType::Configuration if index == 0 => Some(&CONFIGURATION_DESCRIPTOR[..]),
            DescriptorType::String => match index {
                0 => Some(&LANGUAGE_DESCRIPTOR[..]),
                1 => Some(&MANUFACTURER_STRING[..]),
                2 => Some(&PRODUCT_STRING[..]),
                3 => Some(&SERIAL_NUMBER_STRING[..]),
                _ => None,
            },
            _ => None,
        }
    }

    fn is_bus_powered(&self) -> bool {
        true
    }
}
