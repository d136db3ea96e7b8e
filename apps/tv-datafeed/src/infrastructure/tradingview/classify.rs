//! Frame classification.
//!
//! Frames are tagged by substring containment on the decoded payload,
//! checked in a fixed precedence. Heartbeats come first so they are
//! always acknowledged.

use super::codec::RawFrame;

/// Marker the server emits when a series finished loading a page.
pub const SERIES_COMPLETED: &str = "series_completed";

/// Marker the server emits when no older data remains for the request.
pub const DATA_COMPLETED: &str = "data_completed";

/// Marker carried by quote-session updates.
pub const QUOTE_DATA: &str = "qsd";

/// Marker for server-reported errors.
pub const ERROR: &str = "error";

/// What a frame means to the session driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind<'a> {
    /// Keep-alive; carries the whole wire frame for a verbatim echo.
    Heartbeat(&'a str),
    /// Payload mentioning an error. Logged, never fatal.
    ErrorNotice(&'a str),
    /// Quote-session update, irrelevant to bars.
    QuoteNoise,
    /// End of a page, possibly also the end of the data.
    SeriesCompleted {
        /// Payload text.
        payload: &'a str,
        /// The same payload also marked the data as complete.
        data_completed: bool,
    },
    /// End-of-data marker without a page completion.
    DataCompleted(&'a str),
    /// Anything else; accumulated for bar extraction.
    DataChunk(&'a str),
}

/// Classify one decoded frame.
#[must_use]
pub fn classify(frame: &RawFrame) -> FrameKind<'_> {
    if frame.is_heartbeat() {
        return FrameKind::Heartbeat(&frame.raw);
    }

    let payload = frame.payload.as_str();
    if payload.contains(ERROR) {
        FrameKind::ErrorNotice(payload)
    } else if payload.contains(QUOTE_DATA) {
        FrameKind::QuoteNoise
    } else if payload.contains(SERIES_COMPLETED) {
        FrameKind::SeriesCompleted {
            payload,
            data_completed: payload.contains(DATA_COMPLETED),
        }
    } else if payload.contains(DATA_COMPLETED) {
        FrameKind::DataCompleted(payload)
    } else {
        FrameKind::DataChunk(payload)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::infrastructure::tradingview::codec::{FrameBuffer, encode};

    fn frame(payload: &str) -> RawFrame {
        FrameBuffer::new()
            .push(&encode(payload))
            .unwrap()
            .remove(0)
    }

    #[test]
    fn heartbeat_echoes_whole_frame() {
        let hb = frame("~h~42");
        assert_eq!(classify(&hb), FrameKind::Heartbeat("~m~5~m~~h~42"));
    }

    #[test_case(r#"{"m":"critical_error","p":["qsd"]}"# ; "error beats quote noise")]
    #[test_case(r#"{"m":"series_error","p":["cs_x","series_completed"]}"# ; "error beats completion")]
    fn error_takes_precedence(payload: &str) {
        assert!(matches!(classify(&frame(payload)), FrameKind::ErrorNotice(_)));
    }

    #[test]
    fn quote_updates_are_noise() {
        let f = frame(r#"{"m":"qsd","p":["qs_x",{"n":"NASDAQ:AAPL"}]}"#);
        assert_eq!(classify(&f), FrameKind::QuoteNoise);
    }

    #[test]
    fn series_completed_notes_data_completed() {
        let only = frame(r#"{"m":"series_completed","p":["cs_x","sds_1","streaming"]}"#);
        let both = frame(r#"{"m":"series_completed","p":["cs_x","data_completed"]}"#);

        assert!(matches!(
            classify(&only),
            FrameKind::SeriesCompleted { data_completed: false, .. }
        ));
        assert!(matches!(
            classify(&both),
            FrameKind::SeriesCompleted { data_completed: true, .. }
        ));
    }

    #[test]
    fn data_completed_alone() {
        let f = frame(r#"{"m":"timescale_update","p":[{"data_completed":"end"}]}"#);
        assert!(matches!(classify(&f), FrameKind::DataCompleted(_)));
    }

    #[test]
    fn everything_else_is_data() {
        let f = frame(r#"{"m":"timescale_update","p":["cs_x",{"sds_1":{"s":[]}}]}"#);
        assert!(matches!(classify(&f), FrameKind::DataChunk(_)));
    }
}
