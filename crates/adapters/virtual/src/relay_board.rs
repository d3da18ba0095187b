//! Virtual relay board: remembers each channel's state and every command.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use roomctl_app::ports::RelayBus;

/// One command received by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayCommand {
    pub channel: u8,
    pub on: bool,
}

#[derive(Debug, Default)]
struct Board {
    channels: BTreeMap<u8, bool>,
    log: Vec<RelayCommand>,
}

/// A relay board that switches instantly and never fails.
#[derive(Debug, Default)]
pub struct VirtualRelayBoard {
    board: Mutex<Board>,
}

impl VirtualRelayBoard {
    fn lock(&self) -> MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_on(&self, channel: u8) -> bool {
        self.relay_state(channel)
    }

    /// Every channel that was ever commanded, with its current state.
    #[must_use]
    pub fn channels(&self) -> Vec<(u8, bool)> {
        self.lock().channels.iter().map(|(c, on)| (*c, *on)).collect()
    }

    /// Commands received so far, oldest first.
    #[must_use]
    pub fn commands(&self) -> Vec<RelayCommand> {
        self.lock().log.clone()
    }
}

impl RelayBus for VirtualRelayBoard {
    fn set_relay(&self, channel: u8, on: bool) {
        tracing::debug!(channel, on, "virtual relay switched");
        let mut board = self.lock();
        board.channels.insert(channel, on);
        board.log.push(RelayCommand { channel, on });
    }

    fn relay_state(&self, channel: u8) -> bool {
        self.lock().channels.get(&channel).copied().unwrap_or(false)
    }
}
