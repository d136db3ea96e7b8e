//! Session Identifiers
//!
//! Each logical channel multiplexed over the chart socket is addressed by
//! a random id: `qs_` for quotes, `cs_` for the chart, `rs_` for replay.
//! Collisions are left to the server to reject.

use rand::Rng;

/// Length of the random part of an id.
pub const TOKEN_LEN: usize = 12;

/// Logical channel kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Quote session.
    Quote,
    /// Chart session.
    Chart,
    /// Replay session.
    Replay,
}

impl ChannelKind {
    /// Id prefix for this channel.
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Quote => "qs_",
            Self::Chart => "cs_",
            Self::Replay => "rs_",
        }
    }
}

/// Random lowercase ASCII letters.
#[must_use]
pub fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(rng.random_range(b'a'..=b'z')))
        .collect()
}

/// `prefix` followed by a fresh [`TOKEN_LEN`]-letter token.
#[must_use]
pub fn new_session_id(prefix: &str) -> String {
    format!("{prefix}{}", random_token(TOKEN_LEN))
}

/// Ids for every channel of one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIds {
    /// Quote session id.
    pub quote: String,
    /// Chart session id.
    pub chart: String,
    /// Replay session id.
    pub replay: String,
    /// Prefix for replay request ids; steps append `0`, `1`, `2`.
    pub replay_request: String,
}

impl SessionIds {
    /// Generate a fresh set.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            quote: new_session_id(ChannelKind::Quote.prefix()),
            chart: new_session_id(ChannelKind::Chart.prefix()),
            replay: new_session_id(ChannelKind::Replay.prefix()),
            replay_request: random_token(TOKEN_LEN),
        }
    }

    /// Replay request id for a handshake step.
    #[must_use]
    pub fn replay_step(&self, step: u8) -> String {
        format!("{}{step}", self.replay_request)
    }
}
