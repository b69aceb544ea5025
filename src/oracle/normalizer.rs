//! Payload normalization
//!
//! Maps the CoinGecko and Alpha Vantage response shapes into [`Quote`]s and
//! [`Instrument`]s. Price fields are strict: a missing or non-numeric price
//! rejects that symbol. Percent-change fields are lenient and default to zero.

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

use crate::oracle::sources::SourceError;
use crate::oracle::Quote;
use crate::types::{AssetClass, Instrument, TrackedAsset};

/// Fields Alpha Vantage uses to report throttling inside a 200 response
const RATE_LIMIT_MARKERS: [&str; 2] = ["Note", "Information"];

const GLOBAL_QUOTE_KEY: &str = "Global Quote";
const QUOTE_PRICE_KEY: &str = "05. price";
const QUOTE_CHANGE_PCT_KEY: &str = "10. change percent";
const DAILY_SERIES_KEY: &str = "Time Series (Daily)";
const DAILY_CLOSE_KEY: &str = "4. close";

/// Read a decimal from a JSON number or numeric string ("1.5", "-0.42%")
pub fn decimal_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => {
            let trimmed = s.trim().trim_end_matches('%').trim();
            if trimmed.is_empty() {
                return None;
            }
            Decimal::from_str(trimmed)
                .or_else(|_| Decimal::from_scientific(trimmed))
                .ok()
        }
        _ => None,
    }
}

/// One entry of CoinGecko's `/simple/price` response:
/// `{"usd": 64000.1, "usd_24h_change": -1.234}`
pub fn parse_coingecko_entry(id: &str, entry: &Value) -> Result<Quote, SourceError> {
    let price = entry
        .get("usd")
        .and_then(decimal_from_json)
        .ok_or_else(|| SourceError::Malformed {
            id: id.to_string(),
            reason: "missing or non-numeric usd price".to_string(),
        })?;

    let change = entry
        .get("usd_24h_change")
        .and_then(decimal_from_json)
        .unwrap_or(Decimal::ZERO)
        .round_dp(2);

    Ok(Quote::new(price, change))
}

/// Price series of CoinGecko's `/coins/{id}/market_chart` response.
///
/// Each point is `[timestamp_ms, price]`; short or non-numeric points are
/// skipped.
pub fn parse_market_chart(root: &Value) -> Vec<f64> {
    root.get("prices")
        .and_then(Value::as_array)
        .map(|points| {
            points
                .iter()
                .filter_map(Value::as_array)
                .filter(|point| point.len() >= 2)
                .filter_map(|point| point[1].as_f64())
                .filter(|price| price.is_finite())
                .collect()
        })
        .unwrap_or_default()
}

/// Rate-limit message embedded in an Alpha Vantage body, if any
pub fn rate_limit_marker(root: &Value) -> Option<String> {
    RATE_LIMIT_MARKERS.iter().find_map(|key| {
        root.get(*key).map(|v| {
            v.as_str()
                .map(str::to_string)
                .unwrap_or_else(|| v.to_string())
        })
    })
}

/// Alpha Vantage `GLOBAL_QUOTE` response for one symbol.
///
/// The rate-limit marker is checked before anything else so a throttled
/// response is never mistaken for a quote.
pub fn parse_global_quote(symbol: &str, root: &Value) -> Result<Quote, SourceError> {
    if let Some(message) = rate_limit_marker(root) {
        return Err(SourceError::RateLimited {
            id: symbol.to_string(),
            message,
        });
    }

    let quote = root
        .get(GLOBAL_QUOTE_KEY)
        .and_then(Value::as_object)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| SourceError::NoData(symbol.to_string()))?;

    let price = quote
        .get(QUOTE_PRICE_KEY)
        .and_then(decimal_from_json)
        .ok_or_else(|| SourceError::Malformed {
            id: symbol.to_string(),
            reason: format!("missing or non-numeric '{}'", QUOTE_PRICE_KEY),
        })?;

    let change = quote
        .get(QUOTE_CHANGE_PCT_KEY)
        .and_then(decimal_from_json)
        .unwrap_or(Decimal::ZERO);

    Ok(Quote::new(price, change))
}

/// The most recent `count` closes of an Alpha Vantage `TIME_SERIES_DAILY`
/// response, oldest first.
pub fn parse_daily_closes(
    symbol: &str,
    root: &Value,
    count: usize,
) -> Result<Vec<f64>, SourceError> {
    if let Some(message) = rate_limit_marker(root) {
        return Err(SourceError::RateLimited {
            id: symbol.to_string(),
            message,
        });
    }

    let series = root
        .get(DAILY_SERIES_KEY)
        .and_then(Value::as_object)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SourceError::NoData(symbol.to_string()))?;

    // ISO dates sort lexicographically
    let mut dates: Vec<&String> = series.keys().collect();
    dates.sort_unstable_by(|a, b| b.cmp(a));

    let mut closes: Vec<f64> = dates
        .into_iter()
        .filter_map(|date| series.get(date))
        .filter_map(|day| day.get(DAILY_CLOSE_KEY))
        .filter_map(|close| match close {
            Value::String(s) => s.trim().parse::<f64>().ok(),
            other => other.as_f64(),
        })
        .filter(|close| close.is_finite())
        .take(count)
        .collect();
    closes.reverse();

    Ok(closes)
}

/// Build the canonical instrument for a tracked asset
pub fn to_instrument(
    asset: &TrackedAsset,
    class: AssetClass,
    quote: &Quote,
    sparkline: Vec<f64>,
) -> Instrument {
    Instrument {
        symbol: asset.symbol.clone(),
        display_name: asset.name.clone(),
        asset_class: class,
        price_usd: quote.price,
        change_24h_percent: quote.change_24h_pct,
        sparkline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn coingecko_entry_rounds_change_to_two_decimals() {
        let entry = json!({"usd": 64000.5, "usd_24h_change": -1.23456});
        let quote = parse_coingecko_entry("bitcoin", &entry).unwrap();
        assert_eq!(quote.price, dec!(64000.5));
        assert_eq!(quote.change_24h_pct, dec!(-1.23));
    }

    #[test]
    fn coingecko_entry_tolerates_missing_change() {
        let entry = json!({"usd": 150});
        let quote = parse_coingecko_entry("solana", &entry).unwrap();
        assert_eq!(quote.price, dec!(150));
        assert_eq!(quote.change_24h_pct, Decimal::ZERO);
    }

    #[test]
    fn coingecko_entry_rejects_missing_price() {
        let entry = json!({"usd_24h_change": 2.0});
        let err = parse_coingecko_entry("ripple", &entry).unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));

        let entry = json!({"usd": "n/a"});
        assert!(parse_coingecko_entry("ripple", &entry).is_err());
    }

    #[test]
    fn market_chart_takes_price_column_and_skips_bad_points() {
        let root = json!({"prices": [[1, 10.0], [2], [3, "x"], [4, 12.5]]});
        assert_eq!(parse_market_chart(&root), vec![10.0, 12.5]);
        assert!(parse_market_chart(&json!({})).is_empty());
    }

    #[test]
    fn global_quote_detects_rate_limit_before_quote() {
        let root = json!({
            "Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute",
            "Global Quote": {"05. price": "1.00"}
        });
        let err = parse_global_quote("AAPL", &root).unwrap_err();
        assert!(matches!(err, SourceError::RateLimited { .. }));

        let root = json!({"Information": "rate limit reached"});
        assert!(matches!(
            parse_global_quote("AAPL", &root).unwrap_err(),
            SourceError::RateLimited { .. }
        ));
    }

    #[test]
    fn global_quote_without_quote_is_no_data() {
        assert!(matches!(
            parse_global_quote("AAPL", &json!({})).unwrap_err(),
            SourceError::NoData(_)
        ));
        assert!(matches!(
            parse_global_quote("AAPL", &json!({"Global Quote": {}})).unwrap_err(),
            SourceError::NoData(_)
        ));
    }

    #[test]
    fn global_quote_parses_price_and_strips_percent() {
        let root = json!({
            "Global Quote": {
                "01. symbol": "AAPL",
                "05. price": "189.8400",
                "10. change percent": "-0.5213%"
            }
        });
        let quote = parse_global_quote("AAPL", &root).unwrap();
        assert_eq!(quote.price, dec!(189.8400));
        assert_eq!(quote.change_24h_pct, dec!(-0.5213));
    }

    #[test]
    fn global_quote_malformed_change_becomes_zero_but_bad_price_is_fatal() {
        let root = json!({
            "Global Quote": {"05. price": "10.00", "10. change percent": "abc"}
        });
        assert_eq!(
            parse_global_quote("MSFT", &root).unwrap().change_24h_pct,
            Decimal::ZERO
        );

        let root = json!({
            "Global Quote": {"05. price": "", "10. change percent": "1.0%"}
        });
        assert!(matches!(
            parse_global_quote("MSFT", &root).unwrap_err(),
            SourceError::Malformed { .. }
        ));
    }

    #[test]
    fn daily_closes_are_most_recent_oldest_first() {
        let root = json!({
            "Time Series (Daily)": {
                "2024-01-01": {"4. close": "1.0"},
                "2024-01-02": {"4. close": "2.0"},
                "2024-01-03": {"4. close": "3.0"},
                "2024-01-04": {"4. close": "4.0"}
            }
        });
        let closes = parse_daily_closes("SPY", &root, 3).unwrap();
        assert_eq!(closes, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn to_instrument_copies_display_fields() {
        let asset = TrackedAsset::new("bitcoin", "BTC", "Bitcoin");
        let quote = Quote::new(dec!(100), dec!(1.5));
        let inst = to_instrument(&asset, AssetClass::Crypto, &quote, vec![0.0, 1.0]);
        assert_eq!(inst.symbol, "BTC");
        assert_eq!(inst.display_name, "Bitcoin");
        assert_eq!(inst.price_usd, dec!(100));
        assert_eq!(inst.sparkline.len(), 2);
    }
}
