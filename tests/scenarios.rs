//! Host-facing scenario tests driven through the public API: packets in,
//! packets out, exactly as a host on the serial link would see them.

use pinlink::hal::{MockBackend, MockLink};
use pinlink::{
    CommandPacket, Config, PeripheralRegistry, PinMode, Supervisor, RESPONSE_FAILURE,
    RESPONSE_SUCCESS,
};

/// Supervisor with the power-on peripheral set: hw 1 = pin 2 in Pwm mode,
/// hw 2 = pin 4 as digital input.
fn booted() -> Supervisor<MockBackend> {
    let mut registry = PeripheralRegistry::new(MockBackend::new());
    assert!(registry.add_gpio(1, 2, PinMode::Pwm));
    assert!(registry.add_gpio(2, 4, PinMode::DigitalInput));
    Supervisor::new(registry, Config::default())
}

/// Pushes one request frame, runs one request/response iteration, and decodes
/// the response frame.
fn send(
    supervisor: &Supervisor<MockBackend>,
    link: &mut MockLink,
    command: u8,
    address: u16,
    data: u16,
) -> CommandPacket {
    link.push_packet(&CommandPacket::new(command, address, data, 0xFFFF));
    assert!(supervisor.poll_once(link));
    let frames = link.sent_frames();
    CommandPacket::from_bytes(frames.last().unwrap()).unwrap()
}

// ============================================================================
// S1 - Register read/write
// ============================================================================

#[test]
fn s1_register_read_write_round_trip() {
    let supervisor = booted();
    let mut link = MockLink::new();

    // Fresh register reads as zero.
    let response = send(&supervisor, &mut link, 0x01, 5, 0);
    assert_eq!(response.data, 0x0000);

    // Write succeeds with a zero data response.
    let response = send(&supervisor, &mut link, 0x02, 5, 0x1234);
    assert_eq!(response.data, 0x0000);

    // And the value reads back, with the request header echoed.
    let response = send(&supervisor, &mut link, 0x01, 5, 0);
    assert_eq!(response.data, 0x1234);
    assert_eq!(response.command, 0x01);
    assert_eq!(response.address, 5);
    assert_eq!(response.device_id, 0xFFFF);
}

// ============================================================================
// S2 - Peripheral count
// ============================================================================

#[test]
fn s2_hw_count_after_boot() {
    let supervisor = booted();
    let mut link = MockLink::new();

    let response = send(&supervisor, &mut link, 0x03, 0x0000, 0);
    assert_eq!(response.data, 0x0002);
}

// ============================================================================
// S3 - Reconfigure
// ============================================================================

#[test]
fn s3_reconfigure_then_read_back() {
    let supervisor = booted();
    let mut link = MockLink::new();

    // hw 1 boots in Pwm mode; switch it to DigitalOutput.
    let response = send(&supervisor, &mut link, 0x04, 0x0001, 0x0004);
    assert_eq!(response.data, RESPONSE_SUCCESS);

    // READ_HW_CONFIG reports type GPIO, config DigitalOutput.
    let response = send(&supervisor, &mut link, 0x03, 0x0001, 0);
    assert_eq!(response.data, 0x0104);
}

// ============================================================================
// S4 - Invalid config byte
// ============================================================================

#[test]
fn s4_invalid_config_byte_fails() {
    let supervisor = booted();
    let mut link = MockLink::new();

    let response = send(&supervisor, &mut link, 0x04, 0x0001, 0x00FF);
    assert_eq!(response.data, RESPONSE_FAILURE);
}

// ============================================================================
// S5 - Link and propagate
// ============================================================================

#[test]
fn s5_link_write_tick_drives_pin() {
    let supervisor = booted();
    let mut link = MockLink::new();

    // Make hw 1 a digital output, link it to register 10, set the cell.
    assert_eq!(
        send(&supervisor, &mut link, 0x04, 0x0001, 0x0004).data,
        RESPONSE_SUCCESS
    );
    assert_eq!(
        send(&supervisor, &mut link, 0x05, 0x0001, 0x000A).data,
        RESPONSE_SUCCESS
    );
    assert_eq!(send(&supervisor, &mut link, 0x02, 0x000A, 0x0001).data, 0x0000);

    // Within one linker period the pin follows the register.
    supervisor.tick_once();

    let shared = supervisor.shared();
    let state = shared.lock().unwrap();
    assert_eq!(state.registry.backend().level(2), Some(true));
}

#[test]
fn s5_companion_input_feeds_register() {
    let supervisor = booted();
    let mut link = MockLink::new();

    // hw 2 (pin 4, digital input) -> register 7.
    assert_eq!(
        send(&supervisor, &mut link, 0x05, 0x0002, 0x0007).data,
        RESPONSE_SUCCESS
    );

    {
        let shared = supervisor.shared();
        let mut state = shared.lock().unwrap();
        state.registry.backend_mut().set_level(4, true);
    }
    supervisor.tick_once();

    // The host observes the sampled level through READ_REGISTER.
    let response = send(&supervisor, &mut link, 0x01, 0x0007, 0);
    assert_eq!(response.data, 0x0001);
}

// ============================================================================
// S6 - Bad CRC
// ============================================================================

#[test]
fn s6_bad_crc_gets_no_response() {
    let supervisor = booted();
    let mut link = MockLink::new();

    let mut wire = CommandPacket::new(0x01, 5, 0, 0xFFFF).to_bytes();
    wire[7] ^= 0x01;
    link.push_bytes(&wire);

    // The frame is consumed but never answered.
    assert!(supervisor.poll_once(&mut link));
    assert!(link.sent.is_empty());
}
