// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! CDC-ACM class requests and the bulk data loopback.

use capsules_extra::usb::cdc::LineCoding;

use crate::device::Device;

const SET_LINE_CODING: [u8; 8] = [0x21, 0x20, 0x00, 0x00, 0x00, 0x00, 0x07, 0x00];
const GET_LINE_CODING: [u8; 8] = [0xa1, 0x21, 0x00, 0x00, 0x00, 0x00, 0x07, 0x00];
const DEFAULT_LINE_CODING: [u8; 7] = [0x00, 0xc2, 0x01, 0x00, 0x00, 0x00, 0x08];

fn set_control_line_state(state: u8) -> [u8; 8] {
    [0x21, 0x22, state, 0x00, 0x00, 0x00, 0x00, 0x00]
}

#[test]
fn default_line_coding() {
    let device = Device::new();
    assert_eq!(device.control_in(GET_LINE_CODING), [DEFAULT_LINE_CODING.to_vec()]);
}

#[test]
fn set_line_coding_is_acknowledged_then_applied() {
    let device = Device::new();
    // 9600 baud, 2 stop bits, odd parity, 7 data bits
    let coding = [0x80, 0x25, 0x00, 0x00, 0x02, 0x01, 0x07];

    let sent = device.control_out(SET_LINE_CODING, &coding);
    assert_eq!(sent, [Vec::<u8>::new()]);
    assert!(!device.ctrl.data_expected());
    assert!(!device.ep0_stalled());
    assert_eq!(
        device.cdc.line_coding(),
        LineCoding {
            baud_rate: 9600,
            stop_bits: 2,
            parity: 1,
            data_bits: 7,
        }
    );

    assert_eq!(device.control_in(GET_LINE_CODING), [coding.to_vec()]);
}

#[test]
fn data_stage_waits_for_the_out_packet() {
    let device = Device::new();

    device.bus().host_setup(SET_LINE_CODING);
    device.run();
    assert!(device.ctrl.data_expected());
    assert!(device.bus().take_sent(0).is_empty());

    device.bus().host_out(0, &[0x00, 0x4b, 0x00, 0x00, 0x00, 0x00, 0x08]);
    device.run();
    assert!(!device.ctrl.data_expected());
    assert_eq!(device.bus().take_sent(0), [Vec::<u8>::new()]);
    assert_eq!(device.cdc.line_coding().baud_rate, 19200);
}

#[test]
fn multi_packet_class_write() {
    let device = Device::new();
    // SEND_ENCAPSULATED_COMMAND with a 20 byte command: accepted and ignored.
    let command: Vec<u8> = (0..20).collect();
    let sent = device.control_out([0x21, 0x00, 0x00, 0x00, 0x00, 0x00, 20, 0x00], &command);

    assert_eq!(sent, [Vec::<u8>::new()]);
    assert!(!device.ctrl.data_expected());
    assert!(!device.ep0_stalled());
    assert_eq!(device.bus().rx_queued(0), 0);
}

#[test]
fn control_line_state_and_break() {
    let device = Device::new();

    assert_eq!(device.request(set_control_line_state(0x03)), [Vec::<u8>::new()]);
    assert!(device.cdc.dtr());
    assert!(device.cdc.rts());

    assert_eq!(device.request(set_control_line_state(0x01)), [Vec::<u8>::new()]);
    assert!(device.cdc.dtr());
    assert!(!device.cdc.rts());

    let send_break = [0x21, 0x23, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00];
    assert_eq!(device.request(send_break), [Vec::<u8>::new()]);
    assert!(!device.ep0_stalled());
}

#[test]
fn unsupported_class_requests_stall() {
    let device = Device::new();
    let get_encapsulated_response = [0xa1, 0x01, 0x00, 0x00, 0x00, 0x00, 0x40, 0x00];
    assert!(device.request(get_encapsulated_response).is_empty());
    assert!(device.ep0_stalled());

    let device = Device::new();
    // SET_COMM_FEATURE is not part of this function.
    assert!(device
        .request([0x21, 0x02, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00])
        .is_empty());
    assert!(device.ep0_stalled());
}

#[test]
fn bulk_out_is_echoed_on_bulk_in() {
    let device = Device::new();

    device.bus().host_out(1, b"hello");
    device.run();
    assert_eq!(device.bus().rx_queued(1), 0);
    assert!(device.echo.is_pending());
    assert!(device.bus().take_sent(2).is_empty());

    assert!(device.echo.service());
    assert!(!device.echo.is_pending());
    assert_eq!(device.bus().take_sent(2), [b"hello".to_vec()]);

    assert!(!device.echo.take_tx_complete());
    device.run();
    assert!(device.echo.take_tx_complete());

    // Nothing left to echo.
    assert!(!device.echo.service());
    assert!(device.bus().take_sent(2).is_empty());
}

#[test]
fn echo_of_full_packet() {
    let device = Device::new();
    let packet: Vec<u8> = (0..64).collect();

    device.bus().host_out(1, &packet);
    device.run();
    assert!(device.echo.service());
    assert_eq!(device.bus().take_sent(2), [packet]);
}
