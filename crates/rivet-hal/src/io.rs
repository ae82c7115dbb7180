//! The [`MechanismIo`] capability set every hardware backend implements.
//!
//! A mechanism controller is written once against this trait.  Three
//! substitutable implementations exist:
//!
//! | Backend | `read_inputs` | `set_channel_command` | `configure_gains` |
//! |---|---|---|---|
//! | [`LiveIo`][crate::live::LiveIo] | polls device drivers | forwards volts to the driver | forwards to the driver |
//! | [`SimIo`][crate::sim::SimIo] | reports plant-model state | steps the plant model one tick | recorded only |
//! | [`ReplayIo`][crate::replay::ReplayIo] | next recorded snapshot | discarded | discarded |
//!
//! None of the methods return errors.  A control loop cannot stall on a bad
//! tick, so backends fall back to a safe state (zero command, held readings)
//! and report the condition through [`FaultFlags`][rivet_types::FaultFlags]
//! in the snapshot instead.

use rivet_types::{ChannelCommand, ChannelId, InputsSnapshot, PidGains};

/// Hardware backend for one mechanism.
pub trait MechanismIo: Send {
    /// Human-readable backend kind, e.g. `"live"`, used in logs.
    fn kind(&self) -> &'static str;

    /// Readings as of this tick. Must not block.
    fn read_inputs(&mut self) -> InputsSnapshot;

    /// Apply `command` to `channel`.
    fn set_channel_command(&mut self, channel: ChannelId, command: ChannelCommand);

    /// Push feedback gains to a backend that closes the loop in hardware.
    ///
    /// Must be idempotent: repeating a call with identical gains is
    /// indistinguishable from making it once.
    fn configure_gains(&mut self, channel: ChannelId, gains: PidGains);
}

impl<T: MechanismIo + ?Sized> MechanismIo for Box<T> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn read_inputs(&mut self) -> InputsSnapshot {
        (**self).read_inputs()
    }

    fn set_channel_command(&mut self, channel: ChannelId, command: ChannelCommand) {
        (**self).set_channel_command(channel, command)
    }

    fn configure_gains(&mut self, channel: ChannelId, gains: PidGains) {
        (**self).configure_gains(channel, gains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-process backend used only for tests.
    struct MockIo {
        snapshot: InputsSnapshot,
        last_command: Option<(ChannelId, ChannelCommand)>,
    }

    impl MechanismIo for MockIo {
        fn kind(&self) -> &'static str {
            "mock"
        }

        fn read_inputs(&mut self) -> InputsSnapshot {
            self.snapshot.clone()
        }

        fn set_channel_command(&mut self, channel: ChannelId, command: ChannelCommand) {
            self.last_command = Some((channel, command));
        }

        fn configure_gains(&mut self, _channel: ChannelId, _gains: PidGains) {}
    }

    #[test]
    fn boxed_backend_delegates() {
        let mut io: Box<dyn MechanismIo> = Box::new(MockIo {
            snapshot: InputsSnapshot::zeroed(2, 0),
            last_command: None,
        });
        assert_eq!(io.kind(), "mock");
        assert_eq!(io.read_inputs().channels.len(), 2);
        io.set_channel_command(
            ChannelId(1),
            ChannelCommand {
                volts: 3.0,
                feedforward_volts: 0.5,
            },
        );
    }
}
