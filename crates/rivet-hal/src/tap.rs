//! [`CommandTap`] – records everything a controller sends to a backend.
//!
//! Wrap any [`MechanismIo`] in a tap to capture the exact command stream a
//! mechanism controller produced, without changing what the inner backend
//! sees.  Comparing taps across the live, simulated and replay backends is
//! how command parity is checked.

use std::sync::{Arc, Mutex};

use rivet_types::{ChannelCommand, ChannelId, InputsSnapshot, PidGains};

use crate::io::MechanismIo;

/// One call observed by a [`CommandTap`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TappedCall {
    Command(ChannelId, ChannelCommand),
    Gains(ChannelId, PidGains),
}

/// Shared, cloneable view of a tap's recording.
#[derive(Debug, Clone, Default)]
pub struct TapLog(Arc<Mutex<Vec<TappedCall>>>);

impl TapLog {
    /// Snapshot of every recorded call, oldest first.
    pub fn calls(&self) -> Vec<TappedCall> {
        self.0.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Only the commands, oldest first.
    pub fn commands(&self) -> Vec<(ChannelId, ChannelCommand)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TappedCall::Command(ch, cmd) => Some((ch, cmd)),
                TappedCall::Gains(..) => None,
            })
            .collect()
    }

    fn push(&self, call: TappedCall) {
        if let Ok(mut log) = self.0.lock() {
            log.push(call);
        }
    }
}

/// Decorator that records calls before delegating to `inner`.
pub struct CommandTap<I> {
    inner: I,
    log: TapLog,
}

impl<I: MechanismIo> CommandTap<I> {
    pub fn new(inner: I) -> (Self, TapLog) {
        let log = TapLog::default();
        (
            Self {
                inner,
                log: log.clone(),
            },
            log,
        )
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }
}

impl<I: MechanismIo> MechanismIo for CommandTap<I> {
    fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    fn read_inputs(&mut self) -> InputsSnapshot {
        self.inner.read_inputs()
    }

    fn set_channel_command(&mut self, channel: ChannelId, command: ChannelCommand) {
        self.log.push(TappedCall::Command(channel, command));
        self.inner.set_channel_command(channel, command);
    }

    fn configure_gains(&mut self, channel: ChannelId, gains: PidGains) {
        self.log.push(TappedCall::Gains(channel, gains));
        self.inner.configure_gains(channel, gains);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::ReplayIo;

    #[test]
    fn tap_records_and_delegates() {
        let (mut io, log) = CommandTap::new(ReplayIo::new(vec![], 1, 0));
        let cmd = ChannelCommand {
            volts: 2.0,
            feedforward_volts: 0.25,
        };
        io.set_channel_command(ChannelId(0), cmd);
        io.configure_gains(ChannelId(0), PidGains::default());

        assert_eq!(io.kind(), "replay");
        assert_eq!(io.inner().commands_dropped(), 1);
        assert_eq!(log.calls().len(), 2);
        assert_eq!(log.commands(), vec![(ChannelId(0), cmd)]);
    }
}
