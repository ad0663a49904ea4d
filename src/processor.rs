//! Command dispatch: decodes the six host commands and mutates the register
//! file, registry, and linker.
//!
//! | Code | Command | Address | Data |
//! |------|---------|---------|------|
//! | 0x01 | READ_REGISTER | register addr | — |
//! | 0x02 | WRITE_REGISTER | register addr | value |
//! | 0x03 | READ_HW_CONFIG | hw id, or 0 for count | — |
//! | 0x04 | CONFIGURE_HW | hw id | config byte (low 8 bits) |
//! | 0x05 | LINK_HW | hw id | register addr |
//! | 0x06 | REMOVE_LINK_HW | hw id | — |
//!
//! Responses echo the request's command, address and device id; only the
//! data field (and the recomputed CRC) differ. Commands whose data field
//! carries no value answer with [`RESPONSE_SUCCESS`] or [`RESPONSE_FAILURE`].
//!
//! Note that a READ_REGISTER response cannot be told apart from a failure
//! when the register legitimately holds 0x00BB; the protocol accepts this
//! aliasing.

use log::trace;

use crate::linker::Linker;
use crate::packet::CommandPacket;
use crate::peripheral::{PeripheralKind, PinMode};
use crate::registers::RegisterFile;
use crate::registry::PeripheralRegistry;
use crate::traits::PeripheralBackend;

/// Data value answering a successful command with no payload.
pub const RESPONSE_SUCCESS: u16 = 0x00AA;

/// Data value answering any failed command.
pub const RESPONSE_FAILURE: u16 = 0x00BB;

/// The host command set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Read one register cell.
    ReadRegister = 0x01,
    /// Write one register cell.
    WriteRegister = 0x02,
    /// Query a peripheral's type and configuration, or the peripheral count.
    ReadHwConfig = 0x03,
    /// Switch a GPIO pin's mode.
    ConfigureHw = 0x04,
    /// Bind a peripheral to a register.
    LinkHw = 0x05,
    /// Unbind a peripheral from its register.
    RemoveLinkHw = 0x06,
}

impl Command {
    /// Decodes a command byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Command::ReadRegister),
            0x02 => Some(Command::WriteRegister),
            0x03 => Some(Command::ReadHwConfig),
            0x04 => Some(Command::ConfigureHw),
            0x05 => Some(Command::LinkHw),
            0x06 => Some(Command::RemoveLinkHw),
            _ => None,
        }
    }
}

/// Processes one request and builds the response packet.
///
/// Unknown command bytes answer with [`RESPONSE_FAILURE`] while still echoing
/// the original command byte.
pub fn process_command<B: PeripheralBackend>(
    registers: &mut RegisterFile,
    registry: &mut PeripheralRegistry<B>,
    linker: &mut Linker,
    request: &CommandPacket,
) -> CommandPacket {
    trace!(
        "command {:#04x} addr {:#06x} data {:#06x}",
        request.command,
        request.address,
        request.data
    );

    match Command::from_byte(request.command) {
        Some(Command::ReadRegister) => read_register(registers, request),
        Some(Command::WriteRegister) => write_register(registers, request),
        Some(Command::ReadHwConfig) => read_hw_config(registry, request),
        Some(Command::ConfigureHw) => configure_hw(registry, request),
        Some(Command::LinkHw) => link_hw(registry, linker, request),
        Some(Command::RemoveLinkHw) => remove_link_hw(linker, request),
        None => CommandPacket::response(request, RESPONSE_FAILURE),
    }
}

fn read_register(registers: &RegisterFile, request: &CommandPacket) -> CommandPacket {
    // Out-of-range reads degrade to 0; the response data field is the value
    // channel, so there is nothing else to report.
    CommandPacket::response(request, registers.read(request.address))
}

fn write_register(registers: &mut RegisterFile, request: &CommandPacket) -> CommandPacket {
    if registers.write(request.address, request.data) {
        CommandPacket::response(request, 0x0000)
    } else {
        CommandPacket::response(request, RESPONSE_FAILURE)
    }
}

fn read_hw_config<B: PeripheralBackend>(
    registry: &PeripheralRegistry<B>,
    request: &CommandPacket,
) -> CommandPacket {
    // Address 0 is the meta query: number of registered peripherals.
    if request.address == 0x0000 {
        return CommandPacket::response(request, registry.count() as u16);
    }

    let hw_id = u32::from(request.address);
    let Some(kind) = registry.kind(hw_id) else {
        return CommandPacket::response(request, RESPONSE_FAILURE);
    };

    let config_byte = match kind {
        PeripheralKind::Gpio => registry
            .get_gpio(hw_id)
            .map(|gpio| gpio.mode.config_byte())
            .unwrap_or(0x00),
        PeripheralKind::Dac => 0x00,
    };

    let data = (u16::from(kind.type_byte()) << 8) | u16::from(config_byte);
    CommandPacket::response(request, data)
}

fn configure_hw<B: PeripheralBackend>(
    registry: &mut PeripheralRegistry<B>,
    request: &CommandPacket,
) -> CommandPacket {
    let hw_id = u32::from(request.address);
    let config_byte = (request.data & 0xFF) as u8;

    let Some(kind) = registry.kind(hw_id) else {
        return CommandPacket::response(request, RESPONSE_FAILURE);
    };

    // DACs carry no mode; reconfiguring one is accepted and ignored.
    if kind == PeripheralKind::Dac {
        return CommandPacket::response(request, RESPONSE_SUCCESS);
    }

    let Some(mode) = PinMode::from_config_byte(config_byte) else {
        return CommandPacket::response(request, RESPONSE_FAILURE);
    };

    if registry.change_config(hw_id, mode) {
        CommandPacket::response(request, RESPONSE_SUCCESS)
    } else {
        CommandPacket::response(request, RESPONSE_FAILURE)
    }
}

fn link_hw<B: PeripheralBackend>(
    registry: &PeripheralRegistry<B>,
    linker: &mut Linker,
    request: &CommandPacket,
) -> CommandPacket {
    let hw_id = u32::from(request.address);
    let register = request.data;

    if !registry.exists(hw_id) {
        return CommandPacket::response(request, RESPONSE_FAILURE);
    }

    // Direction is derived from the peripheral's current state, never chosen
    // by the host. DACs are always outputs.
    let is_input = registry
        .get_gpio(hw_id)
        .map(|gpio| gpio.mode.is_input())
        .unwrap_or(false);

    if linker.create_link(registry, hw_id, register, is_input) {
        CommandPacket::response(request, RESPONSE_SUCCESS)
    } else {
        CommandPacket::response(request, RESPONSE_FAILURE)
    }
}

fn remove_link_hw(linker: &mut Linker, request: &CommandPacket) -> CommandPacket {
    // Idempotent: removing a link that does not exist is still a success, so
    // the Linker's own return value is deliberately ignored here.
    linker.remove_link(u32::from(request.address));
    CommandPacket::response(request, RESPONSE_SUCCESS)
}

// ============================================================================
// Tests
// ============================================================================
