// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Platform-independent USB 2.0 protocol library.
//!
//! Mostly data types for SETUP packets and descriptors.

use core::fmt;

/// Length of a SETUP packet on the wire.
pub const SETUP_PACKET_LENGTH: usize = 8;

/// The data structure sent in a SETUP handshake.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SetupData {
    pub request_type: DeviceRequestType,
    pub request_code: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl SetupData {
    /// Create a `SetupData` structure from a packet received from the wire.
    ///
    /// Multi-byte fields are little-endian. Returns `None` for packets
    /// shorter than eight bytes.
    pub fn decode(p: &[u8]) -> Option<Self> {
        if p.len() < SETUP_PACKET_LENGTH {
            return None;
        }
        Some(SetupData {
            request_type: DeviceRequestType(p[0]),
            request_code: p[1],
            value: get_u16(p[2], p[3]),
            index: get_u16(p[4], p[5]),
            length: get_u16(p[6], p[7]),
        })
    }

    /// Serialize back into the wire format.
    pub fn encode(&self) -> [u8; SETUP_PACKET_LENGTH] {
        let value = self.value.to_le_bytes();
        let index = self.index.to_le_bytes();
        let length = self.length.to_le_bytes();
        [
            self.request_type.0,
            self.request_code,
            value[0],
            value[1],
            index[0],
            index[1],
            length[0],
            length[1],
        ]
    }

    /// If the `SetupData` represents a standard device request, return it
    pub fn get_standard_request(&self) -> Option<StandardRequest> {
        match self.request_type.request_type() {
            RequestType::Standard => match self.request_code {
                0 => Some(StandardRequest::GetStatus {
                    recipient_index: self.index,
                }),
                1 => Some(StandardRequest::ClearFeature {
                    feature: FeatureSelector::get(self.value),
                    recipient_index: self.index,
                }),
                3 => Some(StandardRequest::SetFeature {
                    feature: FeatureSelector::get(self.value),
                    recipient_index: self.index,
                }),
                5 => Some(StandardRequest::SetAddress {
                    device_address: self.value,
                }),
                6 => Some(StandardRequest::GetDescriptor {
                    descriptor_type: (self.value >> 8) as u8,
                    descriptor_index: (self.value & 0xff) as u8,
                    requested_length: self.length,
                }),
                7 => Some(StandardRequest::SetDescriptor {
                    descriptor_type: (self.value >> 8) as u8,
                    descriptor_index: (self.value & 0xff) as u8,
                }),
                8 => Some(StandardRequest::GetConfiguration),
                9 => Some(StandardRequest::SetConfiguration {
                    configuration_value: self.value,
                }),
                10 => Some(StandardRequest::GetInterface),
                11 => Some(StandardRequest::SetInterface {
                    alternate_setting: self.value,
                    interface: self.index,
                }),
                _ => None,
            },
            _ => None,
        }
    }
}

fn get_u16(l: u8, h: u8) -> u16 {
    u16::from_le_bytes([l, h])
}

#[derive(Debug, PartialEq, Eq)]
pub enum StandardRequest {
    GetStatus {
        recipient_index: u16,
    },
    ClearFeature {
        feature: FeatureSelector,
        recipient_index: u16,
    },
    SetFeature {
        feature: FeatureSelector,
        recipient_index: u16,
    },
    SetAddress {
        device_address: u16,
    },
    GetDescriptor {
        descriptor_type: u8,
        descriptor_index: u8,
        requested_length: u16,
    },
    SetDescriptor {
        descriptor_type: u8,
        descriptor_index: u8,
    },
    GetConfiguration,
    SetConfiguration {
        configuration_value: u16,
    },
    GetInterface,
    SetInterface {
        alternate_setting: u16,
        interface: u16,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DescriptorType {
    Device = 1,
    Configuration,
    String,
    Interface,
    Endpoint,
    DeviceQualifier,
    OtherSpeedConfiguration,
    InterfacePower,
    CsInterface = 0x24,
    CsEndpoint = 0x25,
}

impl DescriptorType {
    pub fn get(byte: u8) -> Option<DescriptorType> {
        match byte {
            1 => Some(DescriptorType::Device),
            2 => Some(DescriptorType::Configuration),
            3 => Some(DescriptorType::String),
            4 => Some(DescriptorType::Interface),
            5 => Some(DescriptorType::Endpoint),
            6 => Some(DescriptorType::DeviceQualifier),
            7 => Some(DescriptorType::OtherSpeedConfiguration),
            8 => Some(DescriptorType::InterfacePower),
            0x24 => Some(DescriptorType::CsInterface),
            0x25 => Some(DescriptorType::CsEndpoint),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct DeviceRequestType(pub u8);

impl DeviceRequestType {
    pub fn transfer_direction(self) -> TransferDirection {
        match self.0 & (1 << 7) {
            0 => TransferDirection::HostToDevice,
            _ => TransferDirection::DeviceToHost,
        }
    }

    pub fn request_type(self) -> RequestType {
        match (self.0 & (0b11 << 5)) >> 5 {
            0 => RequestType::Standard,
            1 => RequestType::Class,
            2 => RequestType::Vendor,
            _ => RequestType::Reserved,
        }
    }

    pub fn recipient(self) -> Recipient {
        match self.0 & 0b11111 {
            0 => Recipient::Device,
            1 => Recipient::Interface,
            2 => Recipient::Endpoint,
            3 => Recipient::Other,
            _ => Recipient::Reserved,
        }
    }
}

impl fmt::Debug for DeviceRequestType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{{{:?}, {:?}, {:?}}}",
            self.transfer_direction(),
            self.request_type(),
            self.recipient()
        )
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum TransferDirection {
    HostToDevice = 0,
    DeviceToHost = 1,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RequestType {
    Standard,
    Class,
    Vendor,
    Reserved,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Recipient {
    Device,
    Interface,
    Endpoint,
    Other,
    Reserved,
}

#[derive(Debug, PartialEq, Eq)]
pub enum FeatureSelector {
    DeviceRemoteWakeup,
    EndpointHalt,
    TestMode,
    Unknown,
}

impl FeatureSelector {
    fn get(value: u16) -> Self {
        match value {
            1 => FeatureSelector::DeviceRemoteWakeup,
            0 => FeatureSelector::EndpointHalt,
            2 => FeatureSelector::TestMode,
            _ => FeatureSelector::Unknown,
        }
    }
}

/// Where the control endpoint finds the descriptors of the device.
pub trait DescriptorSource {
    /// Look up a descriptor by the type and index of a GET_DESCRIPTOR
    /// request.
    ///
    /// The returned slice is the whole descriptor (for configurations, with
    /// all subordinate descriptors). It may be longer than
    /// `requested_length`; the control endpoint sends at most that much.
    fn descriptor(&self, descriptor_type: u8, index: u8, requested_length: u16) -> Option<&[u8]>;

    /// Whether the device draws its power from the bus. Reported to the host
    /// as the inverse of the "self powered" status bit.
    fn is_bus_powered(&self) -> bool;
}
