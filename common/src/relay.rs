//! Two-channel LoRa relay controller state.
//!
//! The controller tracks what each relay channel is (`actual`, only ever
//! taken from device uplinks) and what the control layer wants it to be
//! (`requested`). Whenever both are known and differ, a single set command
//! covering every differing channel is issued and kept as the pending command
//! until the device reports back, the command is superseded, or its retries
//! run out.
//!
//! ```text
//! Idle --diff--> Pending --uplink--> Idle
//!                  |  ^
//!                  +--+ retry (every retry_interval, max_retries times)
//!                  |
//!                  +--retries spent--> Exhausted --uplink / no diff--> Idle
//! ```

use tracing::{info, warn};

use crate::{
    codec::{
        channel_active, decode_relay_uplink, encode_relay_query, encode_relay_set, Downlink,
        RelayUplink, CHANGE_MASK_SHIFT,
    },
    config::RelayConfig,
    error::{DecodeError, RelayError},
    staleness::Stale,
    uplink::UplinkHandler,
};

pub const CHANNEL_COUNT: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayChannel {
    id: u8,
    actual: Option<bool>,
    requested: Option<bool>,
}

impl RelayChannel {
    fn new(id: u8) -> Self {
        Self {
            id,
            actual: None,
            requested: None,
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn actual(&self) -> Option<bool> {
        self.actual
    }

    pub fn requested(&self) -> Option<bool> {
        self.requested
    }

    fn reset(&mut self) {
        self.actual = None;
        self.requested = None;
    }

    /// Target value to send, only when both states are known and differ.
    fn required_change(&self) -> Option<bool> {
        match (self.actual, self.requested) {
            (Some(actual), Some(requested)) if actual != requested => Some(requested),
            _ => None,
        }
    }

    fn bit(&self) -> u32 {
        1 << (self.id - 1)
    }

    pub fn describe(&self) -> String {
        let state = match self.actual {
            Some(true) => "active",
            Some(false) => "deactive",
            None => "unknown",
        };
        format!("Channel {} state is {state}", self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval_ms: u64,
    pub max_retries: u32,
}

impl From<&RelayConfig> for RetryPolicy {
    fn from(config: &RelayConfig) -> Self {
        Self {
            interval_ms: config.retry_interval_ms,
            max_retries: config.max_retries,
        }
    }
}

/// A set command that has been sent but not yet confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCommand {
    command: u32,
    issued_ms: u64,
    last_sent_ms: u64,
    retries: u32,
    policy: RetryPolicy,
}

impl PendingCommand {
    fn new(command: u32, now_ms: u64, policy: RetryPolicy) -> Self {
        Self {
            command,
            issued_ms: now_ms,
            last_sent_ms: now_ms,
            retries: 0,
            policy,
        }
    }

    pub fn command(&self) -> u32 {
        self.command
    }

    pub fn issued_ms(&self) -> u64 {
        self.issued_ms
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    fn resend_due(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_sent_ms) > self.policy.interval_ms
    }

    fn retries_left(&self) -> bool {
        self.retries < self.policy.max_retries
    }

    fn record_retry(&mut self, now_ms: u64) {
        self.retries += 1;
        self.last_sent_ms = now_ms;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Idle,
    Pending(PendingCommand),
    /// Retries ran out for `command`; it is not sent again until the device
    /// reports in, the requested state is reached, or a different command is
    /// required.
    Exhausted { command: u32 },
}

impl CommandState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Pending(_) => "PENDING",
            Self::Exhausted { .. } => "EXHAUSTED",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayController {
    channels: [RelayChannel; CHANNEL_COUNT as usize],
    // The timestamp doubles as "last confirmed uplink" for the channel states.
    internal_temp: Stale<f32>,
    policy: RetryPolicy,
    command: CommandState,
}

impl RelayController {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            channels: [RelayChannel::new(1), RelayChannel::new(2)],
            internal_temp: Stale::new("relay temperature and channel states", config.max_age_ms),
            policy: RetryPolicy::from(config),
            command: CommandState::Idle,
        }
    }

    pub fn command_state(&self) -> &CommandState {
        &self.command
    }

    pub fn pending_command(&self) -> Option<&PendingCommand> {
        match &self.command {
            CommandState::Pending(pending) => Some(pending),
            _ => None,
        }
    }

    /// Decodes one relay uplink and applies it.
    ///
    /// A periodic report refreshes the age window and clears any pending
    /// command, whether or not it matches. A port 1 relay-status response only
    /// updates the actual states.
    pub fn decode(
        &mut self,
        port: u8,
        payload: &[u8],
        now_ms: u64,
    ) -> Result<RelayUplink, DecodeError> {
        let uplink = decode_relay_uplink(port, payload)?;

        match uplink {
            RelayUplink::Periodic {
                relay_bits,
                internal_temp,
            } => {
                self.apply_relay_bits(relay_bits);
                self.internal_temp.set(internal_temp, now_ms);

                match self.command {
                    CommandState::Pending(pending) => info!(
                        "relay uplink received, clearing pending command {:#010x}",
                        pending.command
                    ),
                    CommandState::Exhausted { command } => info!(
                        "relay uplink received, releasing exhausted command {command:#010x}"
                    ),
                    CommandState::Idle => {}
                }
                self.command = CommandState::Idle;
            }
            RelayUplink::RelayStatus { relay_bits } => self.apply_relay_bits(relay_bits),
            RelayUplink::Unhandled => {}
        }

        Ok(uplink)
    }

    fn apply_relay_bits(&mut self, relay_bits: u16) {
        for channel in &mut self.channels {
            channel.actual = Some(channel_active(relay_bits, channel.id));
        }
    }

    fn check_max_age(&mut self, now_ms: u64) {
        if self.internal_temp.expire(now_ms) {
            for channel in &mut self.channels {
                channel.reset();
            }
        }
    }

    /// Internal temperature of the relay controller, if still fresh.
    pub fn temperature(&mut self, now_ms: u64) -> Option<f32> {
        self.check_max_age(now_ms);
        self.internal_temp.peek().copied()
    }

    pub fn relay_states_description(&mut self, now_ms: u64) -> String {
        self.check_max_age(now_ms);
        self.channels
            .iter()
            .map(RelayChannel::describe)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn channels(&mut self, now_ms: u64) -> &[RelayChannel] {
        self.check_max_age(now_ms);
        &self.channels
    }

    /// One-shot query asking the device to report its relay states.
    pub fn request_relay_states(&self) -> Downlink {
        info!("querying relay states");
        encode_relay_query()
    }

    /// Records requested states and returns the set command to send, if any.
    ///
    /// All channel ids are validated before anything is modified. The full
    /// diff across every channel is recomputed regardless of which channels
    /// were updated.
    pub fn set_channel_state(
        &mut self,
        states: &[(u8, bool)],
        now_ms: u64,
    ) -> Result<Option<Downlink>, RelayError> {
        if let Some(&(invalid, _)) = states
            .iter()
            .find(|(id, _)| !(1..=CHANNEL_COUNT).contains(id))
        {
            return Err(RelayError::InvalidChannel(invalid));
        }

        self.check_max_age(now_ms);

        for &(id, requested) in states {
            self.channels[usize::from(id - 1)].requested = Some(requested);
        }

        Ok(self.send_required_command(now_ms))
    }

    fn required_command(&self) -> Option<u32> {
        let mut command = 0u32;
        let mut needed = false;

        for channel in &self.channels {
            let Some(target) = channel.required_change() else {
                continue;
            };
            needed = true;
            command |= channel.bit() << CHANGE_MASK_SHIFT;
            if target {
                command |= channel.bit();
            }
        }

        needed.then_some(command)
    }

    fn send_required_command(&mut self, now_ms: u64) -> Option<Downlink> {
        let Some(command) = self.required_command() else {
            // Desired state reached; a later diff is a new request.
            if let CommandState::Exhausted { command } = self.command {
                info!("relay state settled, releasing exhausted command {command:#010x}");
                self.command = CommandState::Idle;
            }
            return None;
        };

        match self.command {
            CommandState::Pending(pending) if pending.command == command => return None,
            CommandState::Exhausted { command: spent } if spent == command => return None,
            CommandState::Pending(pending) => info!(
                "superseding pending relay command {:#010x} after {} retries",
                pending.command, pending.retries
            ),
            _ => {}
        }

        info!("sending relay set command {command:#010x}");
        self.command = CommandState::Pending(PendingCommand::new(command, now_ms, self.policy));
        Some(encode_relay_set(command))
    }

    /// Drives retries of the pending command. Safe to call at any rate.
    pub fn periodic_poll(&mut self, now_ms: u64) -> Result<Option<Downlink>, RelayError> {
        let CommandState::Pending(pending) = &mut self.command else {
            return Ok(None);
        };

        if !pending.resend_due(now_ms) {
            return Ok(None);
        }

        if !pending.retries_left() {
            let command = pending.command;
            let attempts = pending.retries;
            warn!("relay out of retries on set command {command:#010x}");
            self.command = CommandState::Exhausted { command };
            return Err(RelayError::RetriesExhausted { command, attempts });
        }

        pending.record_retry(now_ms);
        info!(
            "relay set command {:#010x} retry count: {}",
            pending.command, pending.retries
        );
        Ok(Some(encode_relay_set(pending.command)))
    }
}

impl UplinkHandler for RelayController {
    type Update = RelayUplink;

    fn handle_uplink(
        &mut self,
        port: u8,
        payload: &[u8],
        now_ms: u64,
    ) -> Result<Self::Update, DecodeError> {
        self.decode(port, payload, now_ms)
    }
}
