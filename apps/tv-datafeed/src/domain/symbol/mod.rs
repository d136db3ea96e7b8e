//! Symbol Formatting
//!
//! Normalizes a bare ticker into the `EXCHANGE:SYMBOL` form the chart
//! protocol resolves. Continuous futures use the `EXCHANGE:ROOTn!`
//! notation, where `n` selects the front (1), next (2), ... contract.

use std::fmt;

/// Futures contract selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contract {
    /// Continuous contract number, passed through as given.
    Continuous(i64),
    /// A selector that is not an integer.
    Invalid(String),
}

impl Contract {
    /// Parse a contract selector; anything but an integer is kept as
    /// [`Contract::Invalid`] and rejected by [`format_symbol`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        raw.trim()
            .parse::<i64>()
            .map_or_else(|_| Self::Invalid(raw.to_string()), Self::Continuous)
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continuous(n) => write!(f, "{n}"),
            Self::Invalid(raw) => f.write_str(raw),
        }
    }
}

/// Symbol formatting errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    /// Contract selector is not an integer.
    #[error("not a valid contract: {0}, must be an integer")]
    InvalidContract(String),

    /// Symbol is blank.
    #[error("symbol cannot be empty")]
    Empty,
}

/// Qualify `symbol` with `exchange`.
///
/// Symbols that already carry a `:` are returned unchanged and the exchange
/// is ignored.
///
/// # Errors
///
/// Returns [`SymbolError::InvalidContract`] when `contract` is not an
/// integer selector, or [`SymbolError::Empty`] for a blank symbol.
pub fn format_symbol(
    symbol: &str,
    exchange: &str,
    contract: Option<&Contract>,
) -> Result<String, SymbolError> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(SymbolError::Empty);
    }

    if symbol.contains(':') {
        return Ok(symbol.to_string());
    }

    match contract {
        None => Ok(format!("{exchange}:{symbol}")),
        Some(Contract::Continuous(n)) => Ok(format!("{exchange}:{symbol}{n}!")),
        Some(Contract::Invalid(raw)) => Err(SymbolError::InvalidContract(raw.clone())),
    }
}
