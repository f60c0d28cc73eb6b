//! Shared DTO types used across multiple endpoints.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::CurrencyType;
use crate::error::EconomyError;
use crate::persistence::HistoryFilter;

/// Paging query parameters for ledger listings.
///
/// Out-of-range values fall back to the defaults instead of failing.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// Page size, 1–100. Defaults to 20.
    pub limit: Option<i64>,
    /// Entries to skip. Defaults to 0.
    pub offset: Option<i64>,
}

impl PageParams {
    /// Page size after falling back to the default for out-of-range values.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
            .and_then(|l| u32::try_from(l).ok())
            .filter(|l| (1..=HistoryFilter::MAX_LIMIT).contains(l))
            .unwrap_or(HistoryFilter::DEFAULT_LIMIT)
    }

    /// Offset after falling back to zero for negative values.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
            .and_then(|o| u64::try_from(o).ok())
            .unwrap_or(0)
    }
}

/// Paging metadata included in list responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PageMeta {
    /// Page size used.
    pub limit: u32,
    /// Offset used.
    pub offset: u64,
    /// Total number of matching entries.
    pub total: u64,
}

/// Parses a wire currency string into the closed currency set.
///
/// # Errors
///
/// Returns [`EconomyError::InvalidCurrency`] for anything but `coins`,
/// `gems`, or `tokens`.
pub fn parse_currency(raw: &str) -> Result<CurrencyType, EconomyError> {
    CurrencyType::from_str(raw.trim())
}

/// Parses an optional enumeration filter, treating blank as absent.
///
/// # Errors
///
/// Propagates the parse error of `T`.
pub fn parse_filter<T>(raw: Option<&str>) -> Result<Option<T>, EconomyError>
where
    T: FromStr<Err = EconomyError>,
{
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some),
    }
}

/// Plain acknowledgement body.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    /// Human-readable outcome.
    pub message: String,
}

impl MessageResponse {
    /// Wraps a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransactionType;

    #[test]
    fn page_params_fall_back_on_out_of_range() {
        let params = PageParams {
            limit: Some(500),
            offset: Some(-3),
        };
        assert_eq!(params.limit(), 20);
        assert_eq!(params.offset(), 0);

        let params = PageParams {
            limit: Some(100),
            offset: Some(40),
        };
        assert_eq!(params.limit(), 100);
        assert_eq!(params.offset(), 40);

        assert_eq!(PageParams::default().limit(), 20);
    }

    #[test]
    fn unknown_currency_is_invalid() {
        assert!(matches!(
            parse_currency("gold"),
            Err(EconomyError::InvalidCurrency(_))
        ));
        assert!(matches!(parse_currency(" gems "), Ok(CurrencyType::Gems)));
    }

    #[test]
    fn blank_filter_is_absent() {
        assert!(matches!(parse_filter::<TransactionType>(Some("")), Ok(None)));
        assert!(matches!(
            parse_filter::<TransactionType>(Some("spend")),
            Ok(Some(TransactionType::Spend))
        ));
        assert!(parse_filter::<TransactionType>(Some("loan")).is_err());
    }
}
