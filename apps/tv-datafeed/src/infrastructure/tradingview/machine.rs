//! Chart Session State Machine
//!
//! Sans-IO core of a history download. The machine never touches the
//! socket: it produces the handshake script, consumes inbound websocket
//! messages, and answers with [`Action`]s for the client to carry out.
//!
//! # States
//!
//! ```text
//! Disconnected -> Connected -> SessionsInitialized -> [ReplayEngaging]
//!   -> Streaming -> Draining -> RequestingMore  -> Streaming
//!                            -> RewindingReplay -> Streaming
//!                            -> Completed
//! (any) -> Failed | Cancelled
//! ```
//!
//! # Pages and chunks
//!
//! Data frames are accumulated until a message carries `series_completed`.
//! The accumulated text is then parsed into the pending chunk. Without
//! `data_completed` the machine asks for 2000 older bars; with it, the chunk
//! is flushed and the replay window (if any) is rewound to `earliest - 8h`,
//! or the stream is closed. The marker may trail `series_completed` by one
//! message, in which case it finalizes the page already requested.

use super::classify::{self, DATA_COMPLETED, FrameKind, QUOTE_DATA, SERIES_COMPLETED};
use super::codec::{CodecError, FrameBuffer};
use super::command::{
    Command, REPLAY_SYMBOL_ALIAS, ReplaySymbolDescriptor, SYMBOL_ALIAS, SymbolDescriptor,
};
use super::extract;
use super::session::SessionIds;
use crate::domain::bars::{self, BarRow};
use crate::domain::history::HistoryRequest;
use crate::domain::replay::ReplayWindow;

// =============================================================================
// Types
// =============================================================================

/// Lifecycle of one history download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No socket yet.
    Disconnected,
    /// Socket open, nothing sent.
    Connected,
    /// Auth, quote and chart sessions set up; series created.
    SessionsInitialized,
    /// Replay sub-handshake in progress.
    ReplayEngaging,
    /// Reading series data.
    Streaming,
    /// A page completed and is being folded into the chunk.
    Draining,
    /// Asked the server for older bars.
    RequestingMore,
    /// Moved the replay playhead back for the next chunk.
    RewindingReplay,
    /// All requested data received.
    Completed,
    /// Transport or framing failure.
    Failed,
    /// Stopped by the caller.
    Cancelled,
}

impl SessionState {
    /// Whether no further input will be processed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One step of the opening script.
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeStep {
    /// Send a command.
    Send(Command),
    /// Read one message and discard it, acknowledging heartbeats.
    Drain,
}

/// What the client must do after feeding the machine a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Send a command.
    Send(Command),
    /// Send this exact wire text back (heartbeat acknowledgement).
    Echo(String),
    /// A finished chunk, sorted ascending.
    Flush(Vec<BarRow>),
    /// Close the socket; the download is complete.
    Close,
}

// =============================================================================
// Machine
// =============================================================================

/// Drives one history download.
#[derive(Debug)]
pub struct SessionMachine {
    request: HistoryRequest,
    ids: SessionIds,
    replay: Option<ReplayWindow>,
    state: SessionState,
    frames: FrameBuffer,
    buffer: String,
    pending: Vec<BarRow>,
    data_done: bool,
    pages: u32,
    rewinds: u32,
}

impl SessionMachine {
    /// Create a machine for `request` using the client's channel ids.
    #[must_use]
    pub fn new(request: HistoryRequest, ids: SessionIds) -> Self {
        let replay = request.replay;
        Self {
            request,
            ids,
            replay,
            state: SessionState::Disconnected,
            frames: FrameBuffer::new(),
            buffer: String::new(),
            pending: Vec::new(),
            data_done: false,
            pages: 0,
            rewinds: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Pages requested with `request_more_data`.
    #[must_use]
    pub const fn pages_requested(&self) -> u32 {
        self.pages
    }

    /// Replay rewinds issued.
    #[must_use]
    pub const fn rewinds(&self) -> u32 {
        self.rewinds
    }

    /// Current replay window, if replay is engaged.
    #[must_use]
    pub const fn replay_window(&self) -> Option<&ReplayWindow> {
        self.replay.as_ref()
    }

    /// The request being served.
    #[must_use]
    pub const fn request(&self) -> &HistoryRequest {
        &self.request
    }

    /// Record that the socket is open.
    pub fn connected(&mut self) {
        self.state = SessionState::Connected;
    }

    /// Commands that authenticate and create the quote and chart sessions.
    ///
    /// Order matters: the server rejects `create_series` before the symbol
    /// is resolved.
    ///
    /// # Errors
    ///
    /// Returns an error if a symbol descriptor fails to serialize.
    pub fn session_setup(&mut self, token: &str) -> Result<Vec<Command>, serde_json::Error> {
        let ids = &self.ids;
        let symbol = self.request.symbol.as_str();
        let descriptor = SymbolDescriptor::new(symbol, self.request.session).render()?;

        let commands = vec![
            Command::set_auth_token(token),
            Command::chart_create_session(ids),
            Command::quote_create_session(ids),
            Command::quote_set_fields(ids),
            Command::quote_add_symbols(ids, symbol),
            Command::quote_fast_symbols(ids, symbol),
            Command::resolve_symbol(ids, SYMBOL_ALIAS, descriptor),
            Command::create_series(ids, self.request.interval, self.request.n_bars),
            Command::switch_timezone(ids),
        ];
        self.state = SessionState::SessionsInitialized;
        Ok(commands)
    }

    /// Replay sub-handshake, or `None` when the request has no replay window.
    ///
    /// Each step waits on acknowledgements of the previous one, so the
    /// script interleaves sends with drained reads.
    ///
    /// # Errors
    ///
    /// Returns an error if a symbol descriptor fails to serialize.
    pub fn replay_setup(&mut self) -> Result<Option<Vec<HandshakeStep>>, serde_json::Error> {
        let Some(window) = self.replay else {
            return Ok(None);
        };

        let ids = &self.ids;
        let symbol = self.request.symbol.as_str();
        let session = self.request.session;
        let interval = self.request.interval;
        let descriptor = SymbolDescriptor::new(symbol, session).render()?;
        let replay_descriptor = ReplaySymbolDescriptor::new(&ids.replay, symbol, session).render()?;

        let steps = vec![
            HandshakeStep::Drain,
            HandshakeStep::Drain,
            HandshakeStep::Send(Command::replay_create_session(ids)),
            HandshakeStep::Send(Command::replay_get_depth(ids, descriptor.clone(), interval)),
            HandshakeStep::Send(Command::replay_reset(ids, window.frontier().timestamp())),
            HandshakeStep::Drain,
            HandshakeStep::Send(Command::replay_add_series(ids, descriptor, interval)),
            HandshakeStep::Send(Command::resolve_symbol(
                ids,
                REPLAY_SYMBOL_ALIAS,
                replay_descriptor,
            )),
            HandshakeStep::Drain,
            HandshakeStep::Send(Command::modify_series(ids, interval)),
        ];
        self.state = SessionState::ReplayEngaging;
        Ok(Some(steps))
    }

    /// Handshake done; start reading series data.
    pub fn start_streaming(&mut self) {
        self.state = SessionState::Streaming;
    }

    /// Consume a message read during the handshake without accumulating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is not valid framing.
    pub fn drain(&mut self, text: &str) -> Result<Vec<Action>, CodecError> {
        let frames = self.frames.push(text).inspect_err(|_| self.fail())?;
        Ok(frames
            .into_iter()
            .filter(|frame| frame.is_heartbeat())
            .map(|frame| Action::Echo(frame.raw))
            .collect())
    }

    /// Feed one inbound websocket message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is not valid framing; the machine
    /// moves to [`SessionState::Failed`].
    pub fn on_message(&mut self, text: &str) -> Result<Vec<Action>, CodecError> {
        if self.state.is_terminal() {
            return Ok(Vec::new());
        }
        let requesting_more = self.state == SessionState::RequestingMore;
        if matches!(
            self.state,
            SessionState::RequestingMore | SessionState::RewindingReplay
        ) {
            self.state = SessionState::Streaming;
        }

        let frames = self.frames.push(text).inspect_err(|_| self.fail())?;

        let mut actions = Vec::new();
        let mut series_completed = false;
        let mut data_completed = false;

        for frame in &frames {
            match classify::classify(frame) {
                FrameKind::Heartbeat(raw) => actions.push(Action::Echo(raw.to_string())),
                FrameKind::ErrorNotice(payload) => {
                    tracing::warn!(symbol = %self.request.symbol, payload, "Server reported error");
                    if !payload.contains(QUOTE_DATA) {
                        self.accumulate(payload);
                        series_completed |= payload.contains(SERIES_COMPLETED);
                        data_completed |= payload.contains(DATA_COMPLETED);
                    }
                }
                FrameKind::QuoteNoise => {}
                FrameKind::SeriesCompleted {
                    payload,
                    data_completed: done,
                } => {
                    self.accumulate(payload);
                    series_completed = true;
                    data_completed |= done;
                }
                FrameKind::DataCompleted(payload) => {
                    self.accumulate(payload);
                    data_completed = true;
                }
                FrameKind::DataChunk(payload) => self.accumulate(payload),
            }
        }

        self.data_done |= data_completed;
        if series_completed {
            self.state = SessionState::Draining;
            self.absorb_page();
            actions.extend(self.after_page(self.data_done));
        } else if data_completed && requesting_more {
            tracing::debug!(
                symbol = %self.request.symbol,
                "data_completed trailed the page, finalizing"
            );
            self.state = SessionState::Draining;
            self.absorb_page();
            actions.extend(self.after_page(true));
        }

        Ok(actions)
    }

    /// Mark the download failed.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Failed;
        }
    }

    /// Mark the download cancelled.
    pub fn cancel(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Cancelled;
        }
    }

    /// Bars parsed since the last flush. Lost if the stream fails now.
    #[must_use]
    pub fn pending_rows(&self) -> usize {
        self.pending.len()
    }

    fn accumulate(&mut self, payload: &str) {
        self.buffer.push_str(payload);
        self.buffer.push('\n');
    }

    fn absorb_page(&mut self) {
        match extract::extract_bars(&self.buffer, &self.request.symbol) {
            Ok(page) => {
                tracing::debug!(
                    symbol = %self.request.symbol,
                    bars = page.rows.len(),
                    volume_missing = page.volume_missing,
                    "Page completed"
                );
                self.pending.extend(page.rows);
            }
            Err(e) => tracing::warn!(error = %e, "Page held no bars"),
        }
        self.buffer.clear();
    }

    fn after_page(&mut self, data_completed: bool) -> Vec<Action> {
        if !data_completed {
            self.pages += 1;
            self.state = SessionState::RequestingMore;
            return vec![Action::Send(Command::request_more_data(&self.ids))];
        }

        self.data_done = false;
        let mut chunk = std::mem::take(&mut self.pending);
        bars::sort_ascending(&mut chunk);

        let anchor = match (self.replay.as_mut(), bars::earliest(&chunk)) {
            (Some(window), Some(earliest)) => window.rewind(&earliest),
            (Some(_), None) => {
                tracing::info!(symbol = %self.request.symbol, "Replay chunk was empty, stopping");
                None
            }
            (None, _) => None,
        };

        tracing::info!(
            symbol = %self.request.symbol,
            bars = chunk.len(),
            first = ?chunk.first().map(|r| r.timestamp),
            "Chunk completed"
        );

        let mut actions = vec![Action::Flush(chunk)];
        if let Some(anchor) = anchor {
            tracing::info!(symbol = %self.request.symbol, next = %anchor, "Rewinding replay");
            self.rewinds += 1;
            self.state = SessionState::RewindingReplay;
            actions.push(Action::Send(Command::replay_reset(
                &self.ids,
                anchor.timestamp(),
            )));
        } else {
            self.state = SessionState::Completed;
            actions.push(Action::Close);
        }
        actions
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::domain::bars::Interval;
    use crate::infrastructure::tradingview::codec::encode;

    fn ids() -> SessionIds {
        SessionIds {
            quote: "qs_test".into(),
            chart: "cs_test".into(),
            replay: "rs_test".into(),
            replay_request: "req".into(),
        }
    }

    fn streaming(request: HistoryRequest) -> SessionMachine {
        let mut machine = SessionMachine::new(request, ids());
        machine.connected();
        machine.session_setup("tok").unwrap();
        machine.start_streaming();
        machine
    }

    fn live() -> SessionMachine {
        streaming(HistoryRequest::new("NASDAQ:AAPL", Interval::Minute1).with_bars(3))
    }

    fn message(payloads: &[String]) -> String {
        payloads.iter().map(|p| encode(p)).collect()
    }

    fn bars_payload(timestamps: &[i64]) -> String {
        let bars: Vec<String> = timestamps
            .iter()
            .enumerate()
            .map(|(i, ts)| format!(r#"{{"i":{i},"v":[{ts},1.0,2.0,0.5,1.5,10.0]}}"#))
            .collect();
        format!(
            r#"{{"m":"timescale_update","p":["cs_test",{{"sds_1":{{"s":[{}]}}}}]}}"#,
            bars.join(",")
        )
    }

    fn series_completed() -> String {
        r#"{"m":"series_completed","p":["cs_test","sds_1","streaming","s1"]}"#.to_string()
    }

    fn data_completed() -> String {
        r#"{"m":"timescale_update","p":["cs_test",{"sds_1":{"lbs":{"data_completed":"end"}}}]}"#
            .to_string()
    }

    fn sent(actions: &[Action]) -> Vec<&str> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Send(cmd) => Some(cmd.method()),
                _ => None,
            })
            .collect()
    }

    fn flushed(actions: &[Action]) -> Option<&Vec<BarRow>> {
        actions.iter().find_map(|a| match a {
            Action::Flush(rows) => Some(rows),
            _ => None,
        })
    }

    fn utc(ts: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(ts, 0).unwrap()
    }

    #[test]
    fn session_setup_order() {
        let mut machine =
            SessionMachine::new(HistoryRequest::new("NSE:NIFTY", Interval::Daily), ids());
        let methods: Vec<String> = machine
            .session_setup("tok")
            .unwrap()
            .iter()
            .map(|c| c.method().to_string())
            .collect();

        assert_eq!(
            methods,
            [
                "set_auth_token",
                "chart_create_session",
                "quote_create_session",
                "quote_set_fields",
                "quote_add_symbols",
                "quote_fast_symbols",
                "resolve_symbol",
                "create_series",
                "switch_timezone",
            ]
        );
        assert_eq!(machine.state(), SessionState::SessionsInitialized);
    }

    #[test]
    fn live_request_has_no_replay_script() {
        let mut machine = live();
        assert!(machine.replay_setup().unwrap().is_none());
    }

    #[test]
    fn replay_script_interleaves_drains() {
        let window = ReplayWindow::new(utc(1_734_580_799), utc(1_727_789_400));
        let request = HistoryRequest::new("NASDAQ:NVDA", Interval::Second1).with_replay(window);
        let mut machine = SessionMachine::new(request, ids());
        machine.session_setup("tok").unwrap();

        let steps = machine.replay_setup().unwrap().unwrap();
        let script: Vec<&str> = steps
            .iter()
            .map(|s| match s {
                HandshakeStep::Drain => "drain",
                HandshakeStep::Send(cmd) => cmd.method(),
            })
            .collect();

        assert_eq!(
            script,
            [
                "drain",
                "drain",
                "replay_create_session",
                "replay_get_depth",
                "replay_reset",
                "drain",
                "replay_add_series",
                "resolve_symbol",
                "drain",
                "modify_series",
            ]
        );
        assert_eq!(machine.state(), SessionState::ReplayEngaging);

        let HandshakeStep::Send(reset) = &steps[4] else {
            panic!("expected send");
        };
        assert_eq!(reset.params()[2], 1_734_580_799);
    }

    #[test]
    fn drained_messages_only_echo_heartbeats() {
        let mut machine = live();
        let text = message(&["~h~3".into(), bars_payload(&[1_700_000_000])]);
        let actions = machine.drain(&text).unwrap();

        assert_eq!(actions, vec![Action::Echo("~m~4~m~~h~3".into())]);
        let after = machine.on_message(&message(&[series_completed(), data_completed()])).unwrap();
        assert!(flushed(&after).unwrap().is_empty());
    }

    #[test]
    fn heartbeat_echoed_verbatim_while_streaming() {
        let mut machine = live();
        for n in ["1", "17", "123456"] {
            let raw = encode(&format!("~h~{n}"));
            let actions = machine.on_message(&raw).unwrap();
            assert_eq!(actions, vec![Action::Echo(raw)]);
            assert_eq!(machine.state(), SessionState::Streaming);
        }
    }

    #[test]
    fn heartbeat_inside_data_message_is_echoed() {
        let mut machine = live();
        let actions = machine
            .on_message(&message(&[bars_payload(&[1_700_000_000]), "~h~9".into()]))
            .unwrap();
        assert_eq!(actions, vec![Action::Echo("~m~4~m~~h~9".into())]);
    }

    #[test]
    fn completion_in_one_message_closes() {
        let mut machine = live();
        let actions = machine
            .on_message(&message(&[
                bars_payload(&[1_700_000_060, 1_700_000_000]),
                series_completed(),
                data_completed(),
            ]))
            .unwrap();

        assert!(sent(&actions).is_empty());
        assert_eq!(actions.last(), Some(&Action::Close));
        let rows = flushed(&actions).unwrap();
        assert_eq!(rows[0].timestamp.timestamp(), 1_700_000_000);
        assert_eq!(rows[1].timestamp.timestamp(), 1_700_000_060);
        assert_eq!(machine.state(), SessionState::Completed);
        assert_eq!(machine.pages_requested(), 0);
    }

    #[test]
    fn completion_markers_in_one_frame() {
        let mut machine = live();
        machine.on_message(&encode(&bars_payload(&[1_700_000_000]))).unwrap();
        let actions = machine
            .on_message(&encode(
                r#"{"m":"series_completed","p":["cs_test","sds_1","data_completed"]}"#,
            ))
            .unwrap();
        assert_eq!(flushed(&actions).unwrap().len(), 1);
        assert_eq!(machine.state(), SessionState::Completed);
    }

    #[test]
    fn no_more_input_after_completion() {
        let mut machine = live();
        machine
            .on_message(&message(&[series_completed(), data_completed()]))
            .unwrap();
        let late = machine.on_message(&encode("~h~1")).unwrap();
        assert!(late.is_empty());
    }

    #[test]
    fn page_without_data_completed_requests_more() {
        let mut machine = live();
        let first = machine
            .on_message(&message(&[bars_payload(&[1_700_000_600]), series_completed()]))
            .unwrap();

        assert_eq!(sent(&first), ["request_more_data"]);
        assert_eq!(
            first[0],
            Action::Send(Command::request_more_data(&ids()))
        );
        assert!(flushed(&first).is_none());
        assert_eq!(machine.state(), SessionState::RequestingMore);
        assert_eq!(machine.pending_rows(), 1);

        machine.on_message(&encode(&bars_payload(&[1_700_000_000]))).unwrap();
        assert_eq!(machine.state(), SessionState::Streaming);

        let second = machine
            .on_message(&message(&[series_completed(), data_completed()]))
            .unwrap();
        let rows = flushed(&second).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].timestamp < rows[1].timestamp);
        assert_eq!(machine.pages_requested(), 1);
        assert_eq!(machine.pending_rows(), 0);
    }

    #[test]
    fn data_completed_in_next_message_finalizes_page() {
        let mut machine = live();
        let first = machine
            .on_message(&message(&[
                bars_payload(&[1_700_000_060, 1_700_000_000]),
                series_completed(),
            ]))
            .unwrap();
        assert_eq!(sent(&first), ["request_more_data"]);

        let second = machine
            .on_message(&encode(r#"{"m":"du","p":["cs_test",{"data_completed":"end"}]}"#))
            .unwrap();

        assert_eq!(flushed(&second).unwrap().len(), 2);
        assert_eq!(second.last(), Some(&Action::Close));
        assert_eq!(machine.state(), SessionState::Completed);
        assert_eq!(machine.pending_rows(), 0);
    }

    #[test]
    fn early_data_completed_makes_next_page_final() {
        let mut machine = live();
        let early = machine
            .on_message(&message(&[bars_payload(&[1_700_000_000]), data_completed()]))
            .unwrap();
        assert!(early.is_empty());
        assert_eq!(machine.state(), SessionState::Streaming);

        let actions = machine.on_message(&encode(&series_completed())).unwrap();
        assert!(sent(&actions).is_empty());
        assert_eq!(flushed(&actions).unwrap().len(), 1);
        assert_eq!(machine.state(), SessionState::Completed);
    }

    #[test]
    fn quote_noise_is_not_accumulated() {
        let mut machine = live();
        let noise = r#"{"m":"qsd","p":["qs_test",{"n":"NASDAQ:AAPL","v":{"s":[{"i":0,"v":[1,1,1,1,1,1]}]}}]}"#;
        let actions = machine
            .on_message(&message(&[noise.into(), series_completed(), data_completed()]))
            .unwrap();
        assert!(flushed(&actions).unwrap().is_empty());
    }

    #[test]
    fn error_notice_does_not_abort() {
        let mut machine = live();
        let actions = machine
            .on_message(&encode(r#"{"m":"critical_error","p":["cs_test","invalid field"]}"#))
            .unwrap();
        assert!(actions.is_empty());
        assert_eq!(machine.state(), SessionState::Streaming);

        let done = machine
            .on_message(&message(&[
                bars_payload(&[1_700_000_000]),
                series_completed(),
                data_completed(),
            ]))
            .unwrap();
        assert_eq!(flushed(&done).unwrap().len(), 1);
    }

    #[test]
    fn empty_page_is_an_empty_chunk() {
        let mut machine = live();
        let actions = machine
            .on_message(&message(&[series_completed(), data_completed()]))
            .unwrap();
        assert!(flushed(&actions).unwrap().is_empty());
        assert_eq!(machine.state(), SessionState::Completed);
    }

    #[test]
    fn bad_framing_fails() {
        let mut machine = live();
        assert!(machine.on_message("~m~zz~m~{}").is_err());
        assert_eq!(machine.state(), SessionState::Failed);
    }

    #[test]
    fn replay_rewinds_until_boundary() {
        let hour = 3600;
        let boundary = 1_000_000;
        let window = ReplayWindow::new(utc(boundary + 100 * hour), utc(boundary));
        let request = HistoryRequest::new("NASDAQ:NVDA", Interval::Second1).with_replay(window);
        let mut machine = streaming(request);

        let earliest = boundary + 20 * hour;
        let first = machine
            .on_message(&message(&[
                bars_payload(&[earliest + 60, earliest]),
                series_completed(),
                data_completed(),
            ]))
            .unwrap();

        let expected_anchor = earliest - 8 * hour;
        assert_eq!(
            first.last(),
            Some(&Action::Send(Command::replay_reset(&ids(), expected_anchor)))
        );
        assert_eq!(sent(&first), ["replay_reset"]);
        assert_eq!(machine.state(), SessionState::RewindingReplay);
        assert_eq!(
            machine.replay_window().unwrap().frontier(),
            utc(expected_anchor)
        );

        let earliest = boundary + 5 * hour;
        let second = machine
            .on_message(&message(&[
                bars_payload(&[earliest]),
                series_completed(),
                data_completed(),
            ]))
            .unwrap();

        assert_eq!(second.last(), Some(&Action::Close));
        assert!(sent(&second).is_empty());
        assert_eq!(machine.rewinds(), 1);
        assert_eq!(machine.state(), SessionState::Completed);
    }

    #[test]
    fn replay_issues_one_rewind_per_chunk() {
        let hour = 3600;
        let boundary = 1_000_000;
        let window = ReplayWindow::new(utc(boundary + 200 * hour), utc(boundary));
        let request = HistoryRequest::new("NASDAQ:NVDA", Interval::Second1).with_replay(window);
        let mut machine = streaming(request);

        for (i, offset) in [150, 100, 50].into_iter().enumerate() {
            let actions = machine
                .on_message(&message(&[
                    bars_payload(&[boundary + offset * hour]),
                    series_completed(),
                    data_completed(),
                ]))
                .unwrap();
            assert_eq!(sent(&actions), ["replay_reset"]);
            assert_eq!(machine.rewinds(), u32::try_from(i + 1).unwrap());
        }
    }

    #[test]
    fn repeated_replay_chunk_stops() {
        let hour = 3600;
        let boundary = 1_000_000;
        let window = ReplayWindow::new(utc(boundary + 100 * hour), utc(boundary));
        let request = HistoryRequest::new("NASDAQ:NVDA", Interval::Second1).with_replay(window);
        let mut machine = streaming(request);
        let chunk = message(&[
            bars_payload(&[boundary + 50 * hour]),
            series_completed(),
            data_completed(),
        ]);

        let first = machine.on_message(&chunk).unwrap();
        assert_eq!(sent(&first), ["replay_reset"]);

        let second = machine.on_message(&chunk).unwrap();
        assert!(sent(&second).is_empty());
        assert_eq!(second.last(), Some(&Action::Close));
        assert_eq!(machine.rewinds(), 1);
        assert_eq!(machine.state(), SessionState::Completed);
    }

    #[test]
    fn empty_replay_chunk_stops() {
        let window = ReplayWindow::new(utc(2_000_000), utc(1_000_000));
        let request = HistoryRequest::new("NASDAQ:NVDA", Interval::Second1).with_replay(window);
        let mut machine = streaming(request);
        let actions = machine
            .on_message(&message(&[series_completed(), data_completed()]))
            .unwrap();
        assert_eq!(actions.last(), Some(&Action::Close));
    }

    #[test]
    fn cancel_is_terminal() {
        let mut machine = live();
        machine.cancel();
        machine.fail();
        assert_eq!(machine.state(), SessionState::Cancelled);
    }
}
