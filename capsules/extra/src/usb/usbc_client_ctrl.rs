// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! A generic USB client layer managing control requests.
//!
//! `ClientCtrl` runs the control pipe of a device on endpoint 0 of any
//! `hil::usb::UsbFunction` controller. It decodes SETUP packets, reassembles
//! the OUT data stage into a fixed buffer, answers the standard requests
//! itself and hands class requests to a [`ClassRequestHandler`].
//!
//! Only one control transfer is ever in flight. A new SETUP packet always
//! starts a new transfer, discarding whatever OUT data stage was still being
//! received.
//!
//! IN data stages are sent synchronously by [`ControlPipe::control_send`],
//! which polls the controller until the host acknowledges the transfer. All
//! requests the device cannot serve are answered with a STALL on endpoint 0.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! let cdc = static_init!(Cdc, Cdc::new());
//! let ctrl = static_init!(
//!     ClientCtrl<'static, Usbf<'static, MmioBus>>,
//!     ClientCtrl::new(usbf, descriptors)
//! );
//! ctrl.set_class_handler(cdc);
//! usbf.set_client(ctrl);
//! ```

use core::cell::Cell;
use core::cmp::min;

use kernel::config::CONFIG;
use kernel::hil;
use kernel::utilities::cells::{MapCell, OptionalCell};
use kernel::utilities::spin::spin_until;
use kernel::{debug, usb_trace, ErrorCode};

use super::descriptors::{
    DescriptorSource, FeatureSelector, Recipient, RequestType, SetupData, StandardRequest,
    TransferDirection, SETUP_PACKET_LENGTH,
};

/// Maximum packet size of the control endpoint.
pub const EP0_MAX_PACKET_SIZE: usize = 8;

/// Capacity of the buffer an OUT data stage is reassembled into.
pub const MAX_CTRL_DATA_LENGTH: usize = 64;

const CONTROL_ENDPOINT: usize = 0;

const N_ENDPOINTS: usize = 4;

const ENDPOINT_NUMBER_MASK: u16 = 0x0f;

const DEVICE_ADDRESS_MASK: u16 = 0x7f;

/// The operations a request handler may perform on the control pipe while it
/// handles a request.
pub trait ControlPipe {
    /// Send `buf` as the IN data stage of the current request.
    ///
    /// `requested_length` is the `wLength` of the SETUP packet. At most that
    /// many bytes are sent, and a zero-length packet only terminates the
    /// stage when the data ends on a packet boundary short of
    /// `requested_length`. Returns once the host acknowledged the transfer.
    /// Fails with `FAIL` if no control transfer is in progress.
    fn control_send(&self, buf: &[u8], requested_length: u16) -> Result<(), ErrorCode>;

    /// Complete a request without data stage (or after an OUT data stage)
    /// with a zero-length packet.
    fn send_status(&self);

    /// Reject the current request.
    fn stall(&self);
}

/// Handler for class-specific control requests.
pub trait ClassRequestHandler {
    /// Handle a class request.
    ///
    /// For OUT requests `data` holds the complete data stage and the STATUS
    /// stage has already been acknowledged. For IN requests `data` is empty
    /// and the handler answers with `pipe.control_send`. Either way the
    /// handler decides whether to stall.
    fn class_request(&self, pipe: &dyn ControlPipe, setup: SetupData, data: &[u8]);

    /// The bus was reset.
    fn bus_reset(&self) {}
}

pub struct ClientCtrl<'a, U: hil::usb::UsbFunction<'a>> {
    /// The hardware controller
    controller: &'a U,

    /// Descriptor tables and power source of the device
    descriptors: &'a dyn DescriptorSource,

    /// Handler for class requests. Class requests are stalled without one.
    class_handler: OptionalCell<&'a dyn ClassRequestHandler>,

    /// SETUP packet of the transfer in progress
    request: Cell<Option<SetupData>>,

    /// Whether an OUT data stage is still being received
    data_expected: Cell<bool>,

    /// Number of OUT data stage bytes received so far
    data_index: Cell<usize>,

    /// Reassembly buffer for the OUT data stage
    data_buffer: MapCell<[u8; MAX_CTRL_DATA_LENGTH]>,

    remote_wake_enabled: Cell<bool>,
}

impl<'a, U: hil::usb::UsbFunction<'a>> ClientCtrl<'a, U> {
    pub fn new(controller: &'a U, descriptors: &'a dyn DescriptorSource) -> Self {
        ClientCtrl {
            controller,
            descriptors,
            class_handler: OptionalCell::empty(),
            request: Cell::new(None),
            data_expected: Cell::new(false),
            data_index: Cell::new(0),
            data_buffer: MapCell::new([0; MAX_CTRL_DATA_LENGTH]),
            remote_wake_enabled: Cell::new(false),
        }
    }

    pub fn set_class_handler(&self, handler: &'a dyn ClassRequestHandler) {
        self.class_handler.set(handler);
    }

    #[inline]
    pub fn controller(&self) -> &'a U {
        self.controller
    }

    /// Whether an OUT data stage is pending.
    pub fn data_expected(&self) -> bool {
        self.data_expected.get()
    }

    pub fn remote_wake_enabled(&self) -> bool {
        self.remote_wake_enabled.get()
    }

    /// A SETUP packet is waiting on the control endpoint.
    fn on_setup(&self) {
        let mut packet = [0u8; EP0_MAX_PACKET_SIZE];
        let len = self.controller.read_rx_block(CONTROL_ENDPOINT, &mut packet);
        self.controller.clear_rx_ready(CONTROL_ENDPOINT);

        if CONFIG.log_setup_packets {
            debug!("SETUP {} bytes: {:02x?}", len, &packet[..len]);
        }

        self.data_index.set(0);
        self.data_expected.set(false);

        let setup = match SetupData::decode(&packet[..len]) {
            Some(setup) => setup,
            None => {
                debug!(
                    "USB: SETUP packet of {} bytes, expected {}",
                    len, SETUP_PACKET_LENGTH
                );
                self.request.set(None);
                self.stall();
                return;
            }
        };
        self.request.set(Some(setup));

        match setup.request_type.transfer_direction() {
            TransferDirection::DeviceToHost => {
                usb_trace!(
                    "USB: SETUP in {:?} value={:#x} index={:#x} length={}",
                    setup.request_type,
                    setup.value,
                    setup.index,
                    setup.length
                );
                self.dispatch(setup, &[]);
            }
            TransferDirection::HostToDevice => {
                usb_trace!(
                    "USB: SETUP out {:?} value={:#x} index={:#x} length={}",
                    setup.request_type,
                    setup.value,
                    setup.index,
                    setup.length
                );
                if setup.length == 0 {
                    self.dispatch(setup, &[]);
                } else if setup.length as usize <= MAX_CTRL_DATA_LENGTH {
                    self.data_expected.set(true);
                } else {
                    debug!(
                        "USB: OUT data stage of {} bytes exceeds {}",
                        setup.length, MAX_CTRL_DATA_LENGTH
                    );
                    self.stall();
                }
            }
        }
    }

    /// An OUT packet is waiting on the control endpoint.
    fn on_out(&self) {
        let setup = match self.request.get() {
            Some(setup) if self.data_expected.get() => setup,
            _ => {
                debug!("USB: unexpected OUT on ep0");
                self.stall();
                return;
            }
        };

        let received = self.controller.rx_byte_count(CONTROL_ENDPOINT);
        let index = self.data_index.get();
        if index + received > MAX_CTRL_DATA_LENGTH {
            debug!(
                "USB: too much OUT data on ep0 ({} > {})",
                index + received,
                MAX_CTRL_DATA_LENGTH
            );
            self.data_expected.set(false);
            self.stall();
            return;
        }

        self.data_buffer.map(|buf| {
            self.controller
                .read_rx_block(CONTROL_ENDPOINT, &mut buf[index..index + received])
        });
        self.controller.clear_rx_ready(CONTROL_ENDPOINT);
        let index = index + received;
        self.data_index.set(index);
        usb_trace!("USB: OUT data {} of {}", index, setup.length);

        // A short packet or the announced length ends the data stage.
        if received < EP0_MAX_PACKET_SIZE || index >= setup.length as usize {
            self.controller.send_status_zlp();
            self.data_expected.set(false);
            // Bytes past wLength are not handed to the handler.
            let len = min(index, setup.length as usize);
            self.data_buffer
                .map(|buf| self.dispatch(setup, &buf[..len]));
        }
    }

    fn dispatch(&self, setup: SetupData, data: &[u8]) {
        match setup.request_type.request_type() {
            RequestType::Standard => match setup.get_standard_request() {
                Some(request) => self.handle_standard_request(setup, request, data),
                None => {
                    usb_trace!("USB: unsupported standard request {}", setup.request_code);
                    self.stall();
                }
            },
            RequestType::Class => {
                let handled = self
                    .class_handler
                    .map(|handler| handler.class_request(self, setup, data));
                if handled.is_none() {
                    self.stall();
                }
            }
            RequestType::Vendor | RequestType::Reserved => {
                usb_trace!("USB: unsupported vendor request {}", setup.request_code);
                self.stall();
            }
        }
    }

    fn handle_standard_request(&self, setup: SetupData, request: StandardRequest, data: &[u8]) {
        let recipient = setup.request_type.recipient();
        match request {
            StandardRequest::GetStatus { recipient_index } => {
                let mut status = [0u8; 2];
                match recipient {
                    Recipient::Device => {
                        if !self.descriptors.is_bus_powered() {
                            status[0] |= 1 << 0;
                        }
                        if self.remote_wake_enabled.get() {
                            status[0] |= 1 << 1;
                        }
                    }
                    Recipient::Interface => {}
                    Recipient::Endpoint => match endpoint_number(recipient_index) {
                        Some(ep) => {
                            if self.controller.is_stalled(ep) {
                                status[0] = 1;
                            }
                        }
                        None => {
                            self.stall();
                            return;
                        }
                    },
                    _ => {
                        self.stall();
                        return;
                    }
                }
                self.reply(&status, setup.length);
            }
            StandardRequest::ClearFeature {
                feature,
                recipient_index,
            } => self.feature(recipient, feature, recipient_index, false),
            StandardRequest::SetFeature {
                feature,
                recipient_index,
            } => self.feature(recipient, feature, recipient_index, true),
            StandardRequest::SetAddress { device_address } => {
                let addr = (device_address & DEVICE_ADDRESS_MASK) as u8;
                self.controller.set_address(addr);
                self.send_status();
                usb_trace!("USB: set address {}", addr);
            }
            StandardRequest::GetDescriptor {
                descriptor_type,
                descriptor_index,
                requested_length,
            } => {
                match self
                    .descriptors
                    .descriptor(descriptor_type, descriptor_index, requested_length)
                {
                    Some(descriptor) => {
                        usb_trace!(
                            "USB: descriptor {}/{}: {:02x?}",
                            descriptor_type,
                            descriptor_index,
                            &descriptor[..min(descriptor.len(), requested_length as usize)]
                        );
                        self.reply(descriptor, requested_length);
                    }
                    None => {
                        usb_trace!(
                            "USB: no descriptor {}/{}",
                            descriptor_type,
                            descriptor_index
                        );
                        self.stall();
                    }
                }
            }
            StandardRequest::SetDescriptor {
                descriptor_type,
                descriptor_index,
            } => {
                // Descriptors are read-only. The data is only logged.
                usb_trace!(
                    "USB: set descriptor {}/{}: {:02x?}",
                    descriptor_type,
                    descriptor_index,
                    data
                );
            }
            StandardRequest::GetConfiguration => {
                let configuration = [self.controller.is_configured() as u8];
                self.reply(&configuration, setup.length);
            }
            StandardRequest::SetConfiguration {
                configuration_value,
            } => match configuration_value {
                0 | 1 => {
                    self.send_status();
                    self.controller.set_configured(configuration_value == 1);
                }
                _ => self.stall(),
            },
            StandardRequest::GetInterface => self.stall(),
            StandardRequest::SetInterface {
                alternate_setting,
                interface,
            } => {
                if alternate_setting == 0 && interface == 0 {
                    self.send_status();
                } else {
                    self.stall();
                }
            }
        }
    }

    fn feature(&self, recipient: Recipient, feature: FeatureSelector, index: u16, set: bool) {
        match (recipient, feature) {
            (Recipient::Device, FeatureSelector::DeviceRemoteWakeup) => {
                self.remote_wake_enabled.set(set);
                self.send_status();
            }
            (Recipient::Device, FeatureSelector::TestMode) => self.send_status(),
            (Recipient::Endpoint, FeatureSelector::EndpointHalt) => match endpoint_number(index) {
                Some(ep) => {
                    self.send_status();
                    let _ = if set {
                        self.controller.set_stall(ep)
                    } else {
                        self.controller.clear_stall(ep)
                    };
                }
                None => self.stall(),
            },
            _ => self.stall(),
        }
    }

    fn reply(&self, buf: &[u8], requested_length: u16) {
        if self.control_send(buf, requested_length).is_err() {
            self.stall();
        }
    }
}

/// Endpoint number addressed by the `wIndex` of an endpoint request.
fn endpoint_number(index: u16) -> Option<usize> {
    let ep = (index & ENDPOINT_NUMBER_MASK) as usize;
    if ep < N_ENDPOINTS {
        Some(ep)
    } else {
        None
    }
}

impl<'a, U: hil::usb::UsbFunction<'a>> ControlPipe for ClientCtrl<'a, U> {
    fn control_send(&self, buf: &[u8], requested_length: u16) -> Result<(), ErrorCode> {
        if self.request.get().is_none() {
            return Err(ErrorCode::FAIL);
        }

        let requested = requested_length as usize;
        let size = min(buf.len(), requested);

        // Keep an early STATUS stage from being dispatched as OUT data while
        // the IN data stage is still being sent.
        self.controller.set_rx_interrupt(CONTROL_ENDPOINT, false);
        usb_trace!("USB: control send {} of {}", size, requested);

        let mut sent = 0;
        loop {
            let remaining = size - sent;
            let chunk = min(remaining, EP0_MAX_PACKET_SIZE);

            // A full last packet only needs a ZLP if the host asked for more.
            if remaining == 0 && size == requested {
                break;
            }

            self.controller
                .transmit(CONTROL_ENDPOINT, &buf[sent..sent + chunk]);
            sent += chunk;

            while !self.controller.is_tx_complete(CONTROL_ENDPOINT) {
                if self.controller.is_rx_ready(CONTROL_ENDPOINT) {
                    usb_trace!("USB: early ACK");
                    break;
                }
            }

            if chunk < EP0_MAX_PACKET_SIZE {
                break;
            }
        }

        // Unbounded: the transfer only ends when the host sends its STATUS
        // stage.
        spin_until(|| self.controller.is_rx_ready(CONTROL_ENDPOINT));
        self.controller.clear_rx_ready(CONTROL_ENDPOINT);
        usb_trace!("USB: sent {}, ACK received", sent);

        self.controller.set_rx_interrupt(CONTROL_ENDPOINT, true);
        Ok(())
    }

    fn send_status(&self) {
        self.controller.send_status_zlp();
    }

    fn stall(&self) {
        usb_trace!("USB: stall ep0");
        let _ = self.controller.set_stall(CONTROL_ENDPOINT);
    }
}

impl<'a, U: hil::usb::UsbFunction<'a>> hil::usb::Client for ClientCtrl<'a, U> {
    fn bus_reset(&self) {
        self.request.set(None);
        self.data_expected.set(false);
        self.data_index.set(0);
        self.remote_wake_enabled.set(false);
        self.class_handler.map(|handler| handler.bus_reset());
    }

    fn ctrl_setup(&self) {
        self.on_setup();
    }

    fn ctrl_out(&self) {
        self.on_out();
    }
}
