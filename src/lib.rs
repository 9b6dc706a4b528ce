//! LIN master node emulation over a generic UART.
//!
//! This crate implements the master side of a LIN (Local Interconnect
//! Network) bus without dedicated LIN hardware, targeting systems that only
//! expose an ordinary asynchronous serial interface. For background on the
//! bus and protocol see <https://en.wikipedia.org/wiki/Local_Interconnect_Network>.
//!
//! # Overview
//!
//! The core is [`LinMaster`], a non-blocking state machine that owns the
//! frame buffers and protocol logic and consumes two injected capabilities:
//!
//! - a [`ByteChannel`] for the serial transport (one implementation per
//!   physical port; a fake channel enables full unit testing without
//!   hardware),
//! - a [`Scheduler`] for deferred step execution in non-blocking mode.
//!
//! Key protocol mechanics handled by the engine:
//!
//! - **Break generation**: the sync break is produced by halving the baud
//!   rate and writing `0x00`, then restoring the full rate for the body.
//! - **Echo verification**: LIN is single-wire and self-echoing, so every
//!   written byte is read back and compared.
//! - **Version-dependent checksum**: classic (LIN 1.x, data only) or
//!   enhanced (LIN 2.x, protected ID included), with the diagnostic-frame
//!   exception mandated by the spec.
//! - **Latched error flags**: independent sticky bits for state, echo,
//!   timeout, checksum and channel faults, cleared only by the caller.
//!
//! # Examples
//!
//! Blocking operation against an in-memory loopback (stand-in for a real
//! UART binding):
//!
//! ```
//! use lin_master::{ByteChannel, ChannelError, Config, LinMaster, LinState, Mode};
//! use std::collections::VecDeque;
//!
//! /// Perfect single-wire bus: every written byte echoes straight back.
//! #[derive(Default)]
//! struct Loopback {
//!     rx: VecDeque<u8>,
//! }
//!
//! impl ByteChannel for Loopback {
//!     fn write(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
//!         self.rx.extend(bytes);
//!         Ok(())
//!     }
//!     fn available(&mut self) -> usize {
//!         self.rx.len()
//!     }
//!     fn read_byte(&mut self) -> Option<u8> {
//!         self.rx.pop_front()
//!     }
//!     fn set_baud_rate(&mut self, _baud: u32) -> Result<(), ChannelError> {
//!         Ok(())
//!     }
//!     fn flush(&mut self) {}
//!     fn clear_input(&mut self) {
//!         self.rx.clear();
//!     }
//! }
//!
//! let mut lin = LinMaster::new(Loopback::default());
//! lin.begin(Config {
//!     mode: Mode::Blocking,
//!     ..Config::default()
//! })?;
//!
//! lin.send_master_request(0x10, &[0x01, 0x02])?;
//! assert_eq!(lin.state(), LinState::Idle);
//! assert!(lin.errors().is_empty());
//! # Ok::<(), lin_master::LinError>(())
//! ```
//!
//! In non-blocking mode the initiating call returns immediately after the
//! break write; the engine registers `(step, delay)` tokens with the
//! [`Scheduler`] and the embedding application later re-enters the engine
//! through [`LinMaster::step`]. Completion is observed by polling
//! [`LinMaster::state`] or through the receive handler.
//!
//! # Scope
//!
//! Slave emulation, the diagnostic transport layer (ISO-TP over LIN),
//! wake-up/sleep frames and multi-master arbitration are out of scope.

pub mod channel;
pub mod error;
pub mod frame;
pub mod master;
pub mod scheduler;

pub use channel::ByteChannel;
pub use error::{ChannelError, ErrorFlag, ErrorFlags, LinError};
pub use frame::{checksum, protect_id, FrameKind, ProtocolVersion};
pub use master::{Config, LinMaster, LinState, Mode};
pub use scheduler::{NoopScheduler, Scheduler, Step};
