//! Chart Protocol Commands
//!
//! Every client request is a compact `{"m":<method>,"p":[<params>]}`
//! object. The server's parser is whitespace sensitive, so payloads are
//! produced by `serde_json` in compact mode with `m` ahead of `p`.
//!
//! Symbol descriptors are themselves JSON, serialized and prefixed with
//! `=` before being passed as a string parameter.

use serde::Serialize;
use serde_json::Value;

use super::codec;
use super::session::SessionIds;
use crate::domain::bars::Interval;
use crate::domain::history::SessionKind;

/// Fields requested on the quote session.
pub const QUOTE_FIELDS: [&str; 23] = [
    "ch",
    "chp",
    "current_session",
    "description",
    "local_description",
    "language",
    "exchange",
    "fractional",
    "is_tradable",
    "lp",
    "lp_time",
    "minmov",
    "minmove2",
    "original_name",
    "pricescale",
    "pro_name",
    "short_name",
    "type",
    "update_mode",
    "volume",
    "currency_code",
    "rchp",
    "rtc",
];

/// Bars requested per pagination step.
pub const MORE_DATA_BARS: u32 = 2000;

/// Series id shared by the live and replay-sourced series.
pub const SERIES_ID: &str = "sds_1";

/// Symbol alias resolved into the chart session.
pub const SYMBOL_ALIAS: &str = "sds_sym_1";

/// Symbol alias bound to the replay session.
pub const REPLAY_SYMBOL_ALIAS: &str = "sds_sym_2";

/// Split adjustment applied to every series.
const ADJUSTMENT: &str = "splits";

/// Replay symbols are priced in this currency.
const REPLAY_CURRENCY: &str = "USD";

/// A single remote procedure call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    #[serde(rename = "m")]
    method: String,
    #[serde(rename = "p")]
    params: Vec<Value>,
}

impl Command {
    /// Start a call with no parameters.
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: Vec::new(),
        }
    }

    /// Append a parameter.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Method name.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Parameters in order.
    #[must_use]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Compact JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Payload wrapped in a wire frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        self.to_payload().map(|payload| codec::encode(&payload))
    }

    // =========================================================================
    // Chart session handshake
    // =========================================================================

    /// Authenticate the socket.
    #[must_use]
    pub fn set_auth_token(token: &str) -> Self {
        Self::new("set_auth_token").arg(token)
    }

    /// Open the chart session.
    #[must_use]
    pub fn chart_create_session(ids: &SessionIds) -> Self {
        Self::new("chart_create_session").arg(ids.chart.as_str()).arg("")
    }

    /// Open the quote session.
    #[must_use]
    pub fn quote_create_session(ids: &SessionIds) -> Self {
        Self::new("quote_create_session").arg(ids.quote.as_str())
    }

    /// Select the quote fields the server streams.
    #[must_use]
    pub fn quote_set_fields(ids: &SessionIds) -> Self {
        QUOTE_FIELDS
            .iter()
            .fold(Self::new("quote_set_fields").arg(ids.quote.as_str()), |cmd, f| {
                cmd.arg(*f)
            })
    }

    /// Subscribe the quote session to a symbol.
    #[must_use]
    pub fn quote_add_symbols(ids: &SessionIds, symbol: &str) -> Self {
        Self::new("quote_add_symbols")
            .arg(ids.quote.as_str())
            .arg(symbol)
    }

    /// Mark a symbol for fast quote updates.
    #[must_use]
    pub fn quote_fast_symbols(ids: &SessionIds, symbol: &str) -> Self {
        Self::new("quote_fast_symbols")
            .arg(ids.quote.as_str())
            .arg(symbol)
    }

    /// Resolve a symbol descriptor under an alias in the chart session.
    #[must_use]
    pub fn resolve_symbol(ids: &SessionIds, alias: &str, descriptor: String) -> Self {
        Self::new("resolve_symbol")
            .arg(ids.chart.as_str())
            .arg(alias)
            .arg(descriptor)
    }

    /// Create the bar series for the resolved symbol.
    #[must_use]
    pub fn create_series(ids: &SessionIds, interval: Interval, n_bars: u32) -> Self {
        Self::new("create_series")
            .arg(ids.chart.as_str())
            .arg(SERIES_ID)
            .arg("s1")
            .arg(SYMBOL_ALIAS)
            .arg(interval.code())
            .arg(n_bars)
    }

    /// Report bar times in the exchange's timezone.
    #[must_use]
    pub fn switch_timezone(ids: &SessionIds) -> Self {
        Self::new("switch_timezone")
            .arg(ids.chart.as_str())
            .arg("exchange")
    }

    /// Page further back in the live series.
    #[must_use]
    pub fn request_more_data(ids: &SessionIds) -> Self {
        Self::new("request_more_data")
            .arg(ids.chart.as_str())
            .arg(SERIES_ID)
            .arg(MORE_DATA_BARS)
    }

    // =========================================================================
    // Replay sub-protocol
    // =========================================================================

    /// Open the replay session.
    #[must_use]
    pub fn replay_create_session(ids: &SessionIds) -> Self {
        Self::new("replay_create_session").arg(ids.replay.as_str())
    }

    /// Ask how far back replay can go for a symbol.
    #[must_use]
    pub fn replay_get_depth(ids: &SessionIds, descriptor: String, interval: Interval) -> Self {
        Self::new("replay_get_depth")
            .arg(ids.replay.as_str())
            .arg(ids.replay_step(0))
            .arg(descriptor)
            .arg(interval.code())
    }

    /// Move the replay playhead to `timestamp` (epoch seconds).
    #[must_use]
    pub fn replay_reset(ids: &SessionIds, timestamp: i64) -> Self {
        Self::new("replay_reset")
            .arg(ids.replay.as_str())
            .arg(ids.replay_step(1))
            .arg(timestamp)
    }

    /// Attach a series to the replay session.
    #[must_use]
    pub fn replay_add_series(ids: &SessionIds, descriptor: String, interval: Interval) -> Self {
        Self::new("replay_add_series")
            .arg(ids.replay.as_str())
            .arg(ids.replay_step(2))
            .arg(descriptor)
            .arg(interval.code())
    }

    /// Re-source the chart series from the replay-bound symbol.
    #[must_use]
    pub fn modify_series(ids: &SessionIds, interval: Interval) -> Self {
        Self::new("modify_series")
            .arg(ids.chart.as_str())
            .arg(SERIES_ID)
            .arg("s2")
            .arg(REPLAY_SYMBOL_ALIAS)
            .arg(interval.code())
            .arg("")
    }
}

// =============================================================================
// Symbol Descriptors
// =============================================================================

/// Descriptor for resolving a symbol into the chart session.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolDescriptor<'a> {
    symbol: &'a str,
    adjustment: &'static str,
    session: SessionKind,
}

impl<'a> SymbolDescriptor<'a> {
    /// Describe `symbol` for the given session.
    #[must_use]
    pub const fn new(symbol: &'a str, session: SessionKind) -> Self {
        Self {
            symbol,
            adjustment: ADJUSTMENT,
            session,
        }
    }

    /// `=`-prefixed wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render(&self) -> Result<String, serde_json::Error> {
        Ok(format!("={}", serde_json::to_string(self)?))
    }
}

#[derive(Debug, Clone, Serialize)]
struct ReplaySymbol<'a> {
    adjustment: &'static str,
    #[serde(rename = "currency-id")]
    currency_id: &'static str,
    session: SessionKind,
    symbol: &'a str,
}

/// Descriptor binding a symbol to a replay session.
#[derive(Debug, Clone, Serialize)]
pub struct ReplaySymbolDescriptor<'a> {
    replay: &'a str,
    symbol: ReplaySymbol<'a>,
}

impl<'a> ReplaySymbolDescriptor<'a> {
    /// Describe `symbol` as sourced from `replay_session`.
    #[must_use]
    pub const fn new(replay_session: &'a str, symbol: &'a str, session: SessionKind) -> Self {
        Self {
            replay: replay_session,
            symbol: ReplaySymbol {
                adjustment: ADJUSTMENT,
                currency_id: REPLAY_CURRENCY,
                session,
                symbol,
            },
        }
    }

    /// `=`-prefixed wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render(&self) -> Result<String, serde_json::Error> {
        Ok(format!("={}", serde_json::to_string(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> SessionIds {
        SessionIds {
            quote: "qs_quote".into(),
            chart: "cs_chart".into(),
            replay: "rs_replay".into(),
            replay_request: "rand".into(),
        }
    }

    #[test]
    fn payload_is_compact_and_ordered() {
        let cmd = Command::set_auth_token("tok");
        assert_eq!(cmd.to_payload().unwrap(), r#"{"m":"set_auth_token","p":["tok"]}"#);
    }

    #[test]
    fn frame_wraps_payload() {
        let frame = Command::set_auth_token("tok").to_frame().unwrap();
        assert_eq!(frame, r#"~m~34~m~{"m":"set_auth_token","p":["tok"]}"#);
    }

    #[test]
    fn mixed_params_serialize_in_order() {
        let cmd = Command::create_series(&ids(), Interval::Minute15, 5000);
        assert_eq!(
            cmd.to_payload().unwrap(),
            r#"{"m":"create_series","p":["cs_chart","sds_1","s1","sds_sym_1","15",5000]}"#
        );
    }

    #[test]
    fn quote_fields_follow_session() {
        let cmd = Command::quote_set_fields(&ids());
        assert_eq!(cmd.params().len(), 24);
        assert_eq!(cmd.params()[0], "qs_quote");
        assert_eq!(cmd.params()[23], "rtc");
    }

    #[test]
    fn replay_requests_use_step_ids() {
        let reset = Command::replay_reset(&ids(), 1_734_580_799);
        assert_eq!(
            reset.to_payload().unwrap(),
            r#"{"m":"replay_reset","p":["rs_replay","rand1",1734580799]}"#
        );
        let modify = Command::modify_series(&ids(), Interval::Second1);
        assert_eq!(
            modify.to_payload().unwrap(),
            r#"{"m":"modify_series","p":["cs_chart","sds_1","s2","sds_sym_2","1S",""]}"#
        );
    }

    #[test]
    fn symbol_descriptor_wire_form() {
        let desc = SymbolDescriptor::new("NASDAQ:AAPL", SessionKind::Extended);
        assert_eq!(
            desc.render().unwrap(),
            r#"={"symbol":"NASDAQ:AAPL","adjustment":"splits","session":"extended"}"#
        );
    }

    #[test]
    fn replay_descriptor_wire_form() {
        let desc = ReplaySymbolDescriptor::new("rs_replay", "NASDAQ:NVDA", SessionKind::Regular);
        assert_eq!(
            desc.render().unwrap(),
            r#"={"replay":"rs_replay","symbol":{"adjustment":"splits","currency-id":"USD","session":"regular","symbol":"NASDAQ:NVDA"}}"#
        );
    }

    #[test]
    fn descriptor_travels_as_string_param() {
        let desc = SymbolDescriptor::new("NSE:NIFTY", SessionKind::Regular)
            .render()
            .unwrap();
        let payload = Command::resolve_symbol(&ids(), SYMBOL_ALIAS, desc)
            .to_payload()
            .unwrap();
        assert!(payload.contains(r#""={\"symbol\":\"NSE:NIFTY\""#));
    }
}
