//! Transport framing and the two cooperating firmware tasks.
//!
//! [`SharedState`] bundles the register file, the peripheral registry, and
//! the linker behind one mutex. Command processing and linker ticks each
//! take the lock once, so every command's mutations become visible atomically
//! to the next tick and a tick always sees a consistent registry.
//!
//! [`Supervisor`] runs the two loops:
//!
//! - **request/response**: blind 8-byte read with timeout; short reads loop,
//!   CRC failures are dropped silently (that is also how the receiver regains
//!   byte alignment), valid packets are processed and answered, then the task
//!   yields briefly.
//! - **linker**: ticks the dataflow at the configured rate and never touches
//!   the byte link.
//!
//! [`poll_once`](Supervisor::poll_once) and
//! [`tick_once`](Supervisor::tick_once) expose single iterations of each loop
//! so desktop tests can interleave them deterministically.
//!
//! # Example
//!
//! ```rust
//! use pinlink::config::Config;
//! use pinlink::hal::mock::{MockBackend, MockLink};
//! use pinlink::packet::CommandPacket;
//! use pinlink::registry::PeripheralRegistry;
//! use pinlink::supervisor::Supervisor;
//!
//! let registry = PeripheralRegistry::new(MockBackend::new());
//! let supervisor = Supervisor::new(registry, Config::default());
//!
//! let mut link = MockLink::new();
//! link.push_packet(&CommandPacket::new(0x01, 0x0005, 0, 0xFFFF));
//!
//! assert!(supervisor.poll_once(&mut link));
//! let response = CommandPacket::from_bytes(&link.sent_frames()[0]).unwrap();
//! assert_eq!(response.data, 0x0000);
//! ```

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::Config;
use crate::linker::Linker;
use crate::packet::{CommandPacket, PACKET_LEN};
use crate::processor::process_command;
use crate::registers::RegisterFile;
use crate::registry::PeripheralRegistry;
use crate::traits::{ByteLink, PeripheralBackend};

/// Everything the two tasks share, guarded by a single lock.
pub struct SharedState<B: PeripheralBackend> {
    /// The register file.
    pub registers: RegisterFile,
    /// The peripheral registry.
    pub registry: PeripheralRegistry<B>,
    /// The register ↔ hardware linker.
    pub linker: Linker,
}

impl<B: PeripheralBackend> SharedState<B> {
    /// Wraps a registry with a fresh register file and an empty linker.
    pub fn new(registry: PeripheralRegistry<B>) -> Self {
        Self {
            registers: RegisterFile::new(),
            registry,
            linker: Linker::new(),
        }
    }

    /// Processes one request packet and builds the response.
    pub fn process(&mut self, request: &CommandPacket) -> CommandPacket {
        process_command(
            &mut self.registers,
            &mut self.registry,
            &mut self.linker,
            request,
        )
    }

    /// Runs one linker tick.
    pub fn tick(&mut self) {
        self.linker.tick(&mut self.registry, &mut self.registers);
    }
}

/// Owns the shared state and drives the two firmware tasks.
pub struct Supervisor<B: PeripheralBackend> {
    shared: Arc<Mutex<SharedState<B>>>,
    config: Config,
}

impl<B: PeripheralBackend> Supervisor<B> {
    /// Creates a supervisor over `registry`.
    pub fn new(registry: PeripheralRegistry<B>, config: Config) -> Self {
        Self {
            shared: Arc::new(Mutex::new(SharedState::new(registry))),
            config,
        }
    }

    /// A handle to the shared state, for setup and inspection.
    pub fn shared(&self) -> Arc<Mutex<SharedState<B>>> {
        Arc::clone(&self.shared)
    }

    /// The active configuration.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// One request/response iteration.
    ///
    /// Returns `true` when a full frame was read (valid or not); `false` on
    /// a short read or transport error, meaning the caller should simply try
    /// again. Invalid CRCs are dropped without a response.
    pub fn poll_once<L: ByteLink>(&self, link: &mut L) -> bool {
        let mut buf = [0u8; PACKET_LEN];
        let n = match link.read(&mut buf, self.config.serial.read_timeout_ms) {
            Ok(n) => n,
            Err(err) => {
                warn!("link read failed: {:?}", err);
                return false;
            }
        };
        if n < PACKET_LEN {
            return false;
        }

        let request = match CommandPacket::from_bytes(&buf) {
            Ok(packet) => packet,
            Err(_) => {
                // Either corruption or byte misalignment; dropping the frame
                // is also how alignment is eventually recovered.
                debug!("dropped frame with bad crc: {:02X?}", buf);
                return true;
            }
        };

        let response = {
            let mut state = self.shared.lock().unwrap();
            state.process(&request)
        };

        if let Err(err) = link.write_all(&response.to_bytes()) {
            warn!("link write failed: {:?}", err);
        }
        true
    }

    /// One linker tick under the shared lock.
    pub fn tick_once(&self) {
        self.shared.lock().unwrap().tick();
    }

    /// Runs the request/response loop on the current thread, forever.
    pub fn run_transport<L: ByteLink>(&self, mut link: L) -> ! {
        info!(
            "transport task: {} baud, {} ms timeout",
            self.config.serial.baud_rate, self.config.serial.read_timeout_ms
        );
        let yield_time = Duration::from_millis(u64::from(self.config.serial.yield_ms));
        loop {
            if self.poll_once(&mut link) {
                thread::sleep(yield_time);
            }
        }
    }
}

impl<B: PeripheralBackend + Send + 'static> Supervisor<B> {
    /// Spawns the linker tick task.
    ///
    /// The lock is released before each sleep so a pending command is never
    /// held up for a full tick period.
    pub fn spawn_linker(&self) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let period = Duration::from_millis(self.config.linker.tick_period_ms());
        info!("linker task: {} Hz", self.config.linker.tick_hz);
        thread::spawn(move || loop {
            {
                let mut state = shared.lock().unwrap();
                state.tick();
            }
            thread::sleep(period);
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
