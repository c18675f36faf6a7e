//! Output command channel
//!
//! Builds 64-byte command frames, keeps the rolling 4-bit packet counter
//! and polls for the reply to a sub-command.
//!
//! Output frame layout:
//!
//! | Offset | Size | Field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 1    | command id (0x01 or 0x10)               |
//! | 1      | 1    | packet counter, low nibble              |
//! | 2      | 8    | rumble                                  |
//! | 10     | 1    | sub-command id (absent for 0x10)        |
//! | 11     | N    | sub-command data (absent for 0x10)      |

use crate::backend::{BackendError, HidConnection};
use crate::joycon::constants::*;
use crate::retry::RetryPolicy;
use log::{debug, trace};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Invalid command: {0}")]
    InvalidArgument(String),

    #[error("No reply to sub-command {expected:?} after polling")]
    ReplyTimeout {
        expected: Option<u8>,
        /// Last frame read before giving up, if any
        last: Option<Vec<u8>>,
    },

    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    #[error("Transport error: {0}")]
    Transport(#[from] BackendError),
}

/// Command side of one open device. Owned by the device's session.
pub struct CommandChannel {
    conn: Box<dyn HidConnection>,
    counter: u8,
    reply_policy: RetryPolicy,
    reply_timeout: Duration,
}

impl CommandChannel {
    pub fn new(conn: Box<dyn HidConnection>, reply_policy: RetryPolicy, reply_timeout: Duration) -> Self {
        Self {
            conn,
            counter: 0,
            reply_policy,
            reply_timeout,
        }
    }

    /// Counter value carried by the most recent frame
    pub fn counter(&self) -> u8 {
        self.counter
    }

    /// Send one command frame.
    ///
    /// `rumble` must be exactly 8 bytes; nothing is written otherwise. For
    /// the rumble-only command the sub-command fields are left out.
    pub fn send_command(
        &mut self,
        command_id: u8,
        rumble: &[u8],
        subcommand: Option<u8>,
        data: &[u8],
    ) -> Result<(), CommandError> {
        if rumble.len() != RUMBLE_LEN {
            return Err(CommandError::InvalidArgument(format!(
                "rumble data must be {} bytes, got {}",
                RUMBLE_LEN,
                rumble.len()
            )));
        }
        if SUBCOMMAND_OFFSET + 1 + data.len() > REPORT_LEN {
            return Err(CommandError::InvalidArgument(format!(
                "sub-command data of {} bytes does not fit in a frame",
                data.len()
            )));
        }

        self.counter = (self.counter + 1) & 0x0F;

        let mut frame = [0u8; REPORT_LEN];
        frame[0] = command_id;
        frame[1] = self.counter;
        frame[2..SUBCOMMAND_OFFSET].copy_from_slice(rumble);
        if command_id != CMD_RUMBLE_ONLY {
            frame[SUBCOMMAND_OFFSET] = subcommand.unwrap_or(0);
            frame[SUBCOMMAND_OFFSET + 1..SUBCOMMAND_OFFSET + 1 + data.len()].copy_from_slice(data);
        }

        debug!(
            "TX cmd=0x{:02X} counter={} sub={:?} data={:02X?}",
            command_id, self.counter, subcommand, data
        );
        self.conn.write(&frame)?;
        Ok(())
    }

    /// Poll for a frame whose sub-command echo (offset 14) equals
    /// `expected`. `None` accepts the first frame read.
    ///
    /// Gives up with [`CommandError::ReplyTimeout`] after the configured
    /// number of reads; the last frame read is attached to the error.
    pub fn read_expected(&mut self, byte_count: usize, expected: Option<u8>) -> Result<Vec<u8>, CommandError> {
        let mut last: Option<Vec<u8>> = None;
        let mut buf = vec![0u8; byte_count.max(REPORT_LEN)];
        let timeout = self.reply_timeout;
        let conn = &mut self.conn;

        let found = self.reply_policy.run(|attempt| {
            let n = conn.read(&mut buf, timeout)?;
            if n == 0 {
                trace!("reply poll {}: no data", attempt);
                return Err(None);
            }
            let frame = buf[..n.min(byte_count)].to_vec();
            let matched = match expected {
                None => true,
                Some(id) => frame.get(REPLY_SUBCOMMAND_OFFSET) == Some(&id),
            };
            if matched {
                Ok(frame)
            } else {
                trace!("reply poll {}: skipped report 0x{:02X}", attempt, frame[0]);
                last = Some(frame);
                Err(None)
            }
        });

        match found {
            Ok(frame) => Ok(frame),
            Err(Some(e)) => Err(CommandError::Transport(e)),
            Err(None) => Err(CommandError::ReplyTimeout { expected, last }),
        }
    }

    /// Send a sub-command with neutral rumble and wait for its reply.
    pub fn subcommand(&mut self, subcommand: u8, data: &[u8]) -> Result<Vec<u8>, CommandError> {
        self.send_command(CMD_RUMBLE_AND_SUBCOMMAND, &NEUTRAL_RUMBLE, Some(subcommand), data)?;
        self.read_expected(REPORT_LEN, Some(subcommand))
    }

    /// Read `len` bytes of SPI flash.
    pub fn spi_read(&mut self, address: u32, len: u8) -> Result<Vec<u8>, CommandError> {
        let mut args = [0u8; 5];
        args[..4].copy_from_slice(&address.to_le_bytes());
        args[4] = len;

        let reply = self.subcommand(SUBCMD_SPI_READ, &args)?;
        let end = REPLY_SPI_DATA_OFFSET + len as usize;
        if reply.len() < end {
            return Err(CommandError::MalformedReply(format!(
                "SPI reply of {} bytes too short for {} bytes at 0x{:04X}",
                reply.len(),
                len,
                address
            )));
        }
        Ok(reply[REPLY_SPI_DATA_OFFSET..end].to_vec())
    }

    /// Select the input report format the device streams.
    pub fn set_input_mode(&mut self, report_id: u8) -> Result<(), CommandError> {
        self.subcommand(SUBCMD_SET_INPUT_MODE, &[report_id]).map(|_| ())
    }

    /// Light the player LEDs (low nibble, one bit per LED).
    pub fn set_player_lights(&mut self, pattern: u8) -> Result<(), CommandError> {
        self.subcommand(SUBCMD_SET_PLAYER_LIGHTS, &[pattern & 0x0F]).map(|_| ())
    }

    /// Read one input frame for the streaming loop.
    pub fn read_frame(&mut self, buf: &mut [u8], wake: Duration) -> Result<usize, BackendError> {
        self.conn.read(buf, wake)
    }
}
