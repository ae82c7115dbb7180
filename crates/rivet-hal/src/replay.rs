//! [`ReplayIo`] – backend that plays a recorded log back with actuation
//! disabled.
//!
//! Each [`read_inputs`][MechanismIo::read_inputs] yields the next recorded
//! [`InputsSnapshot`]; once the log is exhausted the final snapshot is held.
//! Commands and gains are accepted and dropped.  A replayed mechanism can
//! therefore never move anything, no matter what the actions running against
//! it request.
//!
//! Logs are newline-delimited JSON, one snapshot per line:
//!
//! ```text
//! {"channels":[{"position_rad":0.0,"velocity_rpm":812.5,"current_amps":4.1,"applied_volts":2.0}],"sensors":[false,true]}
//! ```

use std::io::BufRead;

use rivet_types::{ChannelCommand, ChannelId, InputsSnapshot, PidGains, RivetError};
use tracing::debug;

use crate::io::MechanismIo;

/// Replay backend for one mechanism.
#[derive(Debug, Clone)]
pub struct ReplayIo {
    log: Vec<InputsSnapshot>,
    cursor: usize,
    commands_dropped: u64,
}

impl ReplayIo {
    /// Play `log` back in order.  An empty log replays a single all-zero
    /// snapshot sized for `channels` / `sensors`.
    pub fn new(log: Vec<InputsSnapshot>, channels: usize, sensors: usize) -> Self {
        let log = if log.is_empty() {
            vec![InputsSnapshot::zeroed(channels, sensors)]
        } else {
            log
        };
        Self {
            log,
            cursor: 0,
            commands_dropped: 0,
        }
    }

    /// Replay the same snapshot every tick.
    pub fn fixed(snapshot: InputsSnapshot) -> Self {
        Self {
            log: vec![snapshot],
            cursor: 0,
            commands_dropped: 0,
        }
    }

    /// Parse a newline-delimited JSON log.  Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// [`RivetError::Serialization`] naming the first malformed line.
    pub fn from_json_lines(reader: impl BufRead) -> Result<Vec<InputsSnapshot>, RivetError> {
        let mut log = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| RivetError::Serialization(format!("line {}: {e}", n + 1)))?;
            if line.trim().is_empty() {
                continue;
            }
            let snapshot = serde_json::from_str(&line)
                .map_err(|e| RivetError::Serialization(format!("line {}: {e}", n + 1)))?;
            log.push(snapshot);
        }
        Ok(log)
    }

    /// Number of commands received (and discarded) so far.
    pub fn commands_dropped(&self) -> u64 {
        self.commands_dropped
    }
}

impl MechanismIo for ReplayIo {
    fn kind(&self) -> &'static str {
        "replay"
    }

    fn read_inputs(&mut self) -> InputsSnapshot {
        let index = self.cursor.min(self.log.len() - 1);
        if self.cursor < self.log.len() {
            self.cursor += 1;
        }
        self.log[index].clone()
    }

    fn set_channel_command(&mut self, channel: ChannelId, command: ChannelCommand) {
        self.commands_dropped += 1;
        debug!(channel = channel.0, volts = command.volts, "replay: command discarded");
    }

    fn configure_gains(&mut self, _channel: ChannelId, _gains: PidGains) {}
}
