//! LIN master engine: state machine, frame buffers and I/O sequencing.
//!
//! The engine emulates the master node of a LIN bus over a generic UART.
//! A transaction runs in two phases: the sync break is written at half the
//! configured baud rate (its doubled bit duration reads as a dominant-long
//! break), then the full rate is restored and the frame body follows.
//! Because LIN is a single-wire bus every transmitted byte is also received;
//! the engine reads the echo back and uses it as a built-in integrity check.
//!
//! One engine instance drives one physical bus. Exactly one transaction may
//! be in flight; a request while the machine is not idle is rejected, never
//! queued. All failure paths are handled locally: the relevant [`ErrorFlag`]
//! is latched, the receive buffer is zeroed and the machine reverts to
//! `Idle` so the next call always finds a usable engine. Retry policy is the
//! caller's business.

use std::time::{Duration, Instant};

use heapless::Vec;
use log::{debug, trace, warn};

use crate::channel::ByteChannel;
use crate::error::{ChannelError, ErrorFlag, ErrorFlags, LinError};
use crate::frame::{checksum, protect_id, FrameKind, ProtocolVersion, BREAK, MAX_DATA_LEN, MAX_FRAME_LEN, SYNC};
use crate::scheduler::{NoopScheduler, Scheduler, Step};

/// Bound on the in-step spin for bytes that should already be on the wire.
const ECHO_SPIN: Duration = Duration::from_micros(500);

/// State of the LIN master state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinState {
    /// Engine inactive; only [`LinMaster::begin`] leaves this state.
    Off,
    /// No transmission ongoing; the only state that accepts a new request.
    Idle,
    /// Sync break written at half rate, echo not yet verified.
    BreakSent,
    /// Full rate restored and frame body written; echo/response pending.
    FrameInFlight,
}

/// Operating mode, fixed at [`LinMaster::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// Initiating calls busy-wait and drive both steps synchronously.
    Blocking,
    /// Initiating calls return after the break write; an external scheduler
    /// re-enters the engine via [`LinMaster::step`].
    NonBlocking,
}

/// Bus parameters handed to [`LinMaster::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Communication baud rate. Rates below 12000 widen the internal
    /// break/frame timing budgets (empirical safety margins).
    pub baud_rate: u32,
    /// LIN version for checksum calculation.
    pub version: ProtocolVersion,
    pub mode: Mode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            baud_rate: 19200,
            version: ProtocolVersion::V2,
            mode: Mode::NonBlocking,
        }
    }
}

type RxHandler = Box<dyn FnOnce(&[u8])>;

/// LIN master node emulation over an injected [`ByteChannel`].
///
/// Generic over the channel and, for non-blocking operation, a
/// [`Scheduler`]. Both may be owned or borrowed (`&mut T` implements both
/// traits). The engine exclusively owns its frame buffers and state; no
/// locking is needed because a single logical flow of control (either the
/// scheduler or a blocking caller, never both) drives the machine.
pub struct LinMaster<C: ByteChannel, S: Scheduler = NoopScheduler> {
    channel: C,
    scheduler: S,

    // Configuration, fixed between begin() and end()
    baud_rate: u32,
    version: ProtocolVersion,
    mode: Mode,
    break_budget: Duration,
    frame_budget: Duration,

    // State machine
    state: LinState,
    frame_kind: FrameKind,
    errors: ErrorFlags,

    // Frame buffers: BREAK + SYNC + PID + DATA + CHK, max 12 bytes
    buf_tx: Vec<u8, MAX_FRAME_LEN>,
    buf_rx: Vec<u8, MAX_FRAME_LEN>,
    /// Expected total receive length including the break echo.
    len_rx: usize,

    rx_handler: Option<RxHandler>,
}

impl<C: ByteChannel> LinMaster<C> {
    /// Create an engine in `Off` state for blocking use.
    pub fn new(channel: C) -> Self {
        Self::with_scheduler(channel, NoopScheduler)
    }
}

impl<C: ByteChannel, S: Scheduler> LinMaster<C, S> {
    /// Create an engine in `Off` state with a deferred-call scheduler for
    /// non-blocking use.
    pub fn with_scheduler(channel: C, scheduler: S) -> Self {
        Self {
            channel,
            scheduler,
            baud_rate: 19200,
            version: ProtocolVersion::V2,
            mode: Mode::NonBlocking,
            break_budget: Duration::from_millis(1),
            frame_budget: Duration::from_millis(7),
            state: LinState::Off,
            frame_kind: FrameKind::MasterRequest,
            errors: ErrorFlags::new(),
            buf_tx: Vec::new(),
            buf_rx: Vec::new(),
            len_rx: 0,
            rx_handler: None,
        }
    }

    /// Configure the bus and transition to `Idle`.
    pub fn begin(&mut self, config: Config) -> Result<(), LinError> {
        self.baud_rate = config.baud_rate;
        self.version = config.version;
        self.mode = config.mode;

        // Rough duration of the sync break and of a max-length frame body.
        if self.baud_rate < 12000 {
            self.break_budget = Duration::from_millis(2);
            self.frame_budget = Duration::from_millis(13);
        } else {
            self.break_budget = Duration::from_millis(1);
            self.frame_budget = Duration::from_millis(7);
        }

        self.errors.clear();
        self.buf_tx.clear();
        self.buf_rx.clear();
        self.len_rx = 0;
        self.rx_handler = None;

        // The line must be up before the engine accepts requests; a fault
        // here leaves the engine Off.
        self.state = LinState::Off;
        self.channel
            .set_baud_rate(self.baud_rate)
            .map_err(|e| self.channel_fault(e))?;
        self.state = LinState::Idle;

        debug!(
            "begin: {} baud, {:?}, {:?}",
            self.baud_rate, self.version, self.mode
        );
        Ok(())
    }

    /// Tear down to `Off`, discarding any in-flight transaction state.
    pub fn end(&mut self) {
        // Leave the line at the idle full rate even if a break was pending.
        if let Err(err) = self.channel.set_baud_rate(self.baud_rate) {
            warn!("end: could not restore baud rate: {err}");
        }
        self.channel.clear_input();
        self.buf_tx.clear();
        self.buf_rx.clear();
        self.len_rx = 0;
        self.rx_handler = None;
        self.errors.clear();
        self.state = LinState::Off;
        debug!("end: engine off");
    }

    /// Current state of the state machine. In non-blocking mode completion
    /// is observed by polling this until it returns to `Idle`.
    pub fn state(&self) -> LinState {
        self.state
    }

    /// Snapshot of the latched error flags. Flags persist across
    /// transactions until [`clear_errors`](Self::clear_errors).
    pub fn errors(&self) -> ErrorFlags {
        self.errors
    }

    /// Clear all latched error flags.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Send a master request frame: the master supplies header and payload,
    /// and the full frame echo is verified byte for byte.
    ///
    /// Blocking mode returns the transaction result; non-blocking mode
    /// returns once the break is out and the send step has been scheduled.
    pub fn send_master_request(&mut self, id: u8, data: &[u8]) -> Result<(), LinError> {
        if self.state != LinState::Idle {
            warn!("send_master_request: state {:?} != Idle", self.state);
            return Err(self.fault(ErrorFlag::State));
        }
        if data.len() > MAX_DATA_LEN {
            warn!("send_master_request: {} data bytes > {MAX_DATA_LEN}", data.len());
            return Err(LinError::PayloadTooLong { len: data.len() });
        }

        self.frame_kind = FrameKind::MasterRequest;
        self.rx_handler = None;

        let pid = protect_id(id);
        self.buf_tx.clear();
        // Cannot overflow: 4 + data.len() <= MAX_FRAME_LEN after the check above.
        let _ = self.buf_tx.push(BREAK);
        let _ = self.buf_tx.push(SYNC);
        let _ = self.buf_tx.push(pid);
        let _ = self.buf_tx.extend_from_slice(data);
        let _ = self.buf_tx.push(checksum(self.version, pid, data));
        self.len_rx = self.buf_tx.len();

        debug!("send_master_request: tx {} bytes {:02X?}", self.buf_tx.len(), &self.buf_tx[..]);
        self.start_transaction()
    }

    /// Send a slave response header and collect `num_data` data bytes plus
    /// checksum from the responding slave.
    ///
    /// `handler` is invoked with the received payload exactly once on
    /// success, synchronously from within the receive step; it is never
    /// invoked on any failure path.
    pub fn receive_slave_response<F>(
        &mut self,
        id: u8,
        num_data: usize,
        handler: F,
    ) -> Result<(), LinError>
    where
        F: FnOnce(&[u8]) + 'static,
    {
        if self.state != LinState::Idle {
            warn!("receive_slave_response: state {:?} != Idle", self.state);
            return Err(self.fault(ErrorFlag::State));
        }
        if num_data > MAX_DATA_LEN {
            warn!("receive_slave_response: {num_data} data bytes > {MAX_DATA_LEN}");
            return Err(LinError::PayloadTooLong { len: num_data });
        }

        self.rx_handler = Some(Box::new(handler));
        self.prepare_header(id, num_data);
        self.start_transaction()
    }

    /// Convenience variant of [`receive_slave_response`](Self::receive_slave_response)
    /// that copies the received payload into `buf` and returns its length.
    ///
    /// Only available in blocking mode, where the transaction completes
    /// within this call; the borrowed buffer cannot outlive a non-blocking
    /// transaction. The expected data length is `buf.len()`.
    pub fn receive_slave_response_into(
        &mut self,
        id: u8,
        buf: &mut [u8],
    ) -> Result<usize, LinError> {
        if self.mode != Mode::Blocking {
            warn!("receive_slave_response_into: requires blocking mode");
            return Err(self.fault(ErrorFlag::State));
        }
        if self.state != LinState::Idle {
            warn!("receive_slave_response_into: state {:?} != Idle", self.state);
            return Err(self.fault(ErrorFlag::State));
        }
        if buf.len() > MAX_DATA_LEN {
            warn!("receive_slave_response_into: {} data bytes > {MAX_DATA_LEN}", buf.len());
            return Err(LinError::PayloadTooLong { len: buf.len() });
        }

        self.rx_handler = None;
        self.prepare_header(id, buf.len());
        self.start_transaction()?;

        // Blocking mode: the transaction has fully completed and the
        // response survived checksum validation.
        let data = &self.buf_rx[3..self.len_rx - 1];
        buf[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    /// Dispatch a scheduled step token. For use by scheduler runners.
    pub fn step(&mut self, step: Step) -> Result<(), LinError> {
        match step {
            Step::Send => self.step_send(),
            Step::Receive => self.step_receive(),
        }
    }

    /// Send-phase step: verify the break echo, restore the full baud rate
    /// and write the frame body (or header).
    ///
    /// Invoked by the scheduler one break duration after the initiating
    /// call, or synchronously in blocking mode. Calling it in any state but
    /// `BreakSent` latches `StateError`.
    pub fn step_send(&mut self) -> Result<(), LinError> {
        if self.state != LinState::BreakSent {
            warn!("step_send: state {:?} != BreakSent", self.state);
            return Err(self.fault(ErrorFlag::State));
        }

        // The break echo must be in before the baud rate may change.
        let start = Instant::now();
        while self.channel.available() == 0 && start.elapsed() < ECHO_SPIN {
            std::hint::spin_loop();
        }
        let Some(echo) = self.channel.read_byte() else {
            warn!("step_send: no break echo within {ECHO_SPIN:?}");
            return Err(self.fault(ErrorFlag::Timeout));
        };
        if echo != BREAK {
            warn!("step_send: break echo 0x{echo:02X} != 0x00");
            return Err(self.fault(ErrorFlag::Echo));
        }
        let _ = self.buf_rx.push(echo);
        trace!("step_send: break echo ok");

        self.channel
            .set_baud_rate(self.baud_rate)
            .map_err(|e| self.channel_fault(e))?;
        self.channel
            .write(&self.buf_tx[1..])
            .map_err(|e| self.channel_fault(e))?;
        self.state = LinState::FrameInFlight;

        if self.mode == Mode::NonBlocking {
            self.scheduler.schedule(Step::Receive, self.frame_budget);
        }
        Ok(())
    }

    /// Receive-phase step: read back the frame echo (and, for slave
    /// responses, the slave's data and checksum) and complete the
    /// transaction.
    ///
    /// Invoked by the scheduler one frame duration after the send step, or
    /// synchronously in blocking mode. Calling it in any state but
    /// `FrameInFlight` latches `StateError`.
    pub fn step_receive(&mut self) -> Result<(), LinError> {
        if self.state != LinState::FrameInFlight {
            warn!("step_receive: state {:?} != FrameInFlight", self.state);
            return Err(self.fault(ErrorFlag::State));
        }

        // Break echo was consumed in step_send.
        let expected = self.len_rx - 1;
        let start = Instant::now();
        while self.channel.available() != expected && start.elapsed() < ECHO_SPIN {
            std::hint::spin_loop();
        }
        if self.channel.available() != expected {
            warn!(
                "step_receive: frame timeout ({} of {} bytes)",
                self.channel.available() + 1,
                self.len_rx
            );
            return Err(self.fault(ErrorFlag::Timeout));
        }

        while self.buf_rx.len() < self.len_rx {
            match self.channel.read_byte() {
                Some(byte) => {
                    let _ = self.buf_rx.push(byte);
                }
                None => break,
            }
        }

        match self.frame_kind {
            FrameKind::MasterRequest => {
                // The entire written frame must come back byte for byte.
                if self.buf_rx[..] != self.buf_tx[..] {
                    warn!(
                        "step_receive: frame echo mismatch: rx {:02X?} vs tx {:02X?}",
                        &self.buf_rx[..],
                        &self.buf_tx[..]
                    );
                    return Err(self.fault(ErrorFlag::Echo));
                }
                trace!("step_receive: frame echo ok");
            }
            FrameKind::SlaveResponse => {
                // Only the header is ours; the rest is the slave's and is
                // validated by checksum instead of echo comparison.
                if self.buf_rx[..3] != self.buf_tx[..3] {
                    warn!(
                        "step_receive: header echo mismatch: rx {:02X?} vs tx {:02X?}",
                        &self.buf_rx[..3],
                        &self.buf_tx[..3]
                    );
                    return Err(self.fault(ErrorFlag::Echo));
                }

                let pid = self.buf_rx[2];
                let data_end = self.len_rx - 1;
                let received = self.buf_rx[data_end];
                let computed = checksum(self.version, pid, &self.buf_rx[3..data_end]);
                if received != computed {
                    warn!("step_receive: checksum 0x{received:02X} != computed 0x{computed:02X}");
                    return Err(self.fault(ErrorFlag::Checksum));
                }

                debug!(
                    "step_receive: slave response {:02X?}",
                    &self.buf_rx[3..data_end]
                );
                if let Some(handler) = self.rx_handler.take() {
                    handler(&self.buf_rx[3..data_end]);
                }
            }
        }

        self.state = LinState::Idle;
        Ok(())
    }

    /// Build the header-only transmit buffer shared by both slave response
    /// entry points.
    fn prepare_header(&mut self, id: u8, num_data: usize) {
        self.frame_kind = FrameKind::SlaveResponse;
        let pid = protect_id(id);
        self.buf_tx.clear();
        let _ = self.buf_tx.push(BREAK);
        let _ = self.buf_tx.push(SYNC);
        let _ = self.buf_tx.push(pid);
        // BREAK + SYNC + PID + slave data + slave checksum
        self.len_rx = 4 + num_data;
        debug!(
            "receive_slave_response: tx header {:02X?}, expecting {num_data} data bytes",
            &self.buf_tx[..]
        );
    }

    /// Write the sync break at half rate and either hand control to the
    /// scheduler or drive the whole transaction synchronously.
    fn start_transaction(&mut self) -> Result<(), LinError> {
        // Recover from stale bytes left by a prior faulted transaction.
        self.channel.clear_input();
        self.buf_rx.clear();

        let half = self.baud_rate / 2;
        self.channel
            .set_baud_rate(half)
            .map_err(|e| self.channel_fault(e))?;
        self.channel
            .write(&[BREAK])
            .map_err(|e| self.channel_fault(e))?;
        self.state = LinState::BreakSent;

        match self.mode {
            Mode::NonBlocking => {
                self.scheduler.schedule(Step::Send, self.break_budget);
                Ok(())
            }
            Mode::Blocking => {
                // Wait until the break has been sent, then run both steps
                // in place with the same delays the scheduler would honour.
                self.channel.flush();
                self.step_send()?;
                self.channel.flush();
                if self.frame_kind == FrameKind::SlaveResponse {
                    self.wait_for_response();
                }
                self.step_receive()
            }
        }
    }

    /// Busy-wait until the slave's full response is available or the frame
    /// budget elapses. The shortfall is classified in `step_receive`.
    fn wait_for_response(&mut self) {
        let start = Instant::now();
        while self.channel.available() != self.len_rx - 1 && start.elapsed() < self.frame_budget {
            std::hint::spin_loop();
        }
    }

    /// Latch a flag, self-heal to `Idle` and produce the matching error.
    ///
    /// The receive buffer is zeroed; the transmit buffer is left untouched.
    /// An engine that was never started stays `Off`.
    fn fault(&mut self, flag: ErrorFlag) -> LinError {
        self.errors |= flag;
        if self.state != LinState::Off {
            self.state = LinState::Idle;
        }
        self.buf_rx.clear();
        self.rx_handler = None;
        match flag {
            ErrorFlag::State => LinError::State,
            ErrorFlag::Echo => LinError::Echo,
            ErrorFlag::Timeout => LinError::Timeout,
            ErrorFlag::Checksum => LinError::Checksum,
            ErrorFlag::Misc => LinError::Channel(ChannelError::new("unclassified fault")),
        }
    }

    /// Latch `MiscError` for a transport fault and self-heal like `fault`.
    fn channel_fault(&mut self, err: ChannelError) -> LinError {
        warn!("channel fault: {err}");
        self.errors |= ErrorFlag::Misc;
        if self.state != LinState::Off {
            self.state = LinState::Idle;
        }
        self.buf_rx.clear();
        self.rx_handler = None;
        LinError::Channel(err)
    }
}
