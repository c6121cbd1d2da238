//! Market data models

use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Scalar value of an ad-hoc extension field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    Number(f64),
    Text(String),
    Null,
}

/// One security's market snapshot
///
/// Numeric fields default to 0 when absent or null; the fetch script only
/// emits a subset of them, and NaN is stored as null. Unknown keys are kept in `extra` and written back
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stock {
    pub code: String,
    pub name: String,

    // Pricing
    #[serde(deserialize_with = "nullable_f64")]
    pub price: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub change: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub open: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub high: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub low: f64,
    #[serde(rename = "prevClose", deserialize_with = "nullable_f64")]
    pub prev_close: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub amplitude: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub speed: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub limit_up: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub limit_down: f64,

    // Volume and liquidity
    #[serde(deserialize_with = "nullable_f64")]
    pub volume: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub amount: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub turnover: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub turnover_actual: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub volume_ratio: f64,

    // Valuation
    #[serde(deserialize_with = "nullable_f64")]
    pub pe_dynamic: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub pe_static: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub pe_ttm: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub pb: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub market_cap: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub circulating_market_cap: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub total_shares: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub circulating_shares: f64,

    // Trend
    #[serde(deserialize_with = "nullable_f64")]
    pub change_60d: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub change_ytd: f64,

    // Money flow
    #[serde(deserialize_with = "nullable_f64")]
    pub main_inflow: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub main_inflow_ratio: f64,

    /// Extension fields used as ad-hoc sort keys
    #[serde(flatten)]
    pub extra: BTreeMap<String, ExtraValue>,
}

fn nullable_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_default())
}

/// Value of a field looked up by name
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Number(f64),
    Text(&'a str),
}

impl Stock {
    /// Look up a known field or extension field by its JSON name
    pub fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        let number = match name {
            "code" => return Some(FieldValue::Text(&self.code)),
            "name" => return Some(FieldValue::Text(&self.name)),
            "price" => self.price,
            "change" => self.change,
            "open" => self.open,
            "high" => self.high,
            "low" => self.low,
            "prevClose" => self.prev_close,
            "amplitude" => self.amplitude,
            "speed" => self.speed,
            "limit_up" => self.limit_up,
            "limit_down" => self.limit_down,
            "volume" => self.volume,
            "amount" => self.amount,
            "turnover" => self.turnover,
            "turnover_actual" => self.turnover_actual,
            "volume_ratio" => self.volume_ratio,
            "pe_dynamic" => self.pe_dynamic,
            "pe_static" => self.pe_static,
            "pe_ttm" => self.pe_ttm,
            "pb" => self.pb,
            "market_cap" => self.market_cap,
            "circulating_market_cap" => self.circulating_market_cap,
            "total_shares" => self.total_shares,
            "circulating_shares" => self.circulating_shares,
            "change_60d" => self.change_60d,
            "change_ytd" => self.change_ytd,
            "main_inflow" => self.main_inflow,
            "main_inflow_ratio" => self.main_inflow_ratio,
            other => {
                return match self.extra.get(other)? {
                    ExtraValue::Number(n) => Some(FieldValue::Number(*n)),
                    ExtraValue::Text(s) => Some(FieldValue::Text(s)),
                    ExtraValue::Null => None,
                }
            }
        };

        Some(FieldValue::Number(number))
    }
}

fn compare_fields(a: &FieldValue<'_>, b: &FieldValue<'_>) -> Ordering {
    match (a, b) {
        (FieldValue::Number(x), FieldValue::Number(y)) => x.total_cmp(y),
        (FieldValue::Text(x), FieldValue::Text(y)) => x.cmp(y),
        // Numbers before text when a key mixes both
        (FieldValue::Number(_), FieldValue::Text(_)) => Ordering::Less,
        (FieldValue::Text(_), FieldValue::Number(_)) => Ordering::Greater,
    }
}

/// Stable sort by a field name; records missing the field always go last
pub fn sort_stocks(stocks: &mut [Stock], key: &str, descending: bool) {
    stocks.sort_by(|a, b| match (a.field(key), b.field(key)) {
        (Some(x), Some(y)) => {
            let ord = compare_fields(&x, &y);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Market data held by the store and persisted as one JSON document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    pub stocks: Vec<Stock>,
    /// Epoch milliseconds of the last full replacement
    #[serde(rename = "lastUpdated")]
    pub last_updated: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stock(code: &str, price: f64) -> Stock {
        Stock {
            code: code.to_string(),
            name: format!("Stock {}", code),
            price,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_fetch_script_record() {
        // Shape emitted by the fetch script: a subset of fields, camelCase prevClose
        let value = json!({
            "code": "600000",
            "name": "SPDB",
            "price": 10.5,
            "prevClose": 10.2,
            "main_inflow_ratio": -1.25
        });

        let stock: Stock = serde_json::from_value(value).unwrap();
        assert_eq!(stock.code, "600000");
        assert_eq!(stock.prev_close, 10.2);
        assert_eq!(stock.main_inflow_ratio, -1.25);
        assert_eq!(stock.limit_up, 0.0);
        assert!(stock.extra.is_empty());
    }

    #[test]
    fn test_extra_fields_survive_roundtrip() {
        let value = json!({
            "code": "000001",
            "name": "PAB",
            "score": 87.5,
            "industry": "Banking",
            "note": null
        });

        let stock: Stock = serde_json::from_value(value).unwrap();
        assert_eq!(stock.extra.get("score"), Some(&ExtraValue::Number(87.5)));
        assert_eq!(
            stock.extra.get("industry"),
            Some(&ExtraValue::Text("Banking".to_string()))
        );

        let back = serde_json::to_value(&stock).unwrap();
        assert_eq!(back["score"], 87.5);
        assert_eq!(back["industry"], "Banking");
        assert!(back["note"].is_null());
        assert_eq!(back["prevClose"], 0.0);
    }

    #[test]
    fn test_null_numeric_field_reads_as_zero() {
        let raw = r#"{"stocks":[
            {"code":"600000","name":"SPDB","price":null,"prevClose":null,"pe_ttm":5.1},
            {"code":"000001","name":"PAB","price":11.2}
        ],"lastUpdated":1700000000000}"#;

        let state: MarketState = serde_json::from_str(raw).unwrap();
        assert_eq!(state.stocks.len(), 2);
        assert_eq!(state.stocks[0].price, 0.0);
        assert_eq!(state.stocks[0].prev_close, 0.0);
        assert_eq!(state.stocks[0].pe_ttm, 5.1);
        assert!(state.stocks[0].extra.is_empty());
        assert_eq!(state.stocks[1].price, 11.2);
    }

    #[test]
    fn test_market_state_wire_names() {
        let state = MarketState {
            stocks: vec![stock("600000", 10.5)],
            last_updated: Some(1_700_000_000_000),
        };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["lastUpdated"], 1_700_000_000_000_i64);
        assert_eq!(value["stocks"][0]["code"], "600000");

        let empty = serde_json::to_string(&MarketState::default()).unwrap();
        assert_eq!(empty, r#"{"stocks":[],"lastUpdated":null}"#);
    }

    #[test]
    fn test_field_lookup() {
        let mut s = stock("600519", 1700.0);
        s.extra.insert("score".to_string(), ExtraValue::Number(3.0));

        assert_eq!(s.field("price"), Some(FieldValue::Number(1700.0)));
        assert_eq!(s.field("code"), Some(FieldValue::Text("600519")));
        assert_eq!(s.field("score"), Some(FieldValue::Number(3.0)));
        assert_eq!(s.field("missing"), None);
    }

    #[test]
    fn test_sort_by_known_and_extra_keys() {
        let mut stocks = vec![stock("a", 3.0), stock("b", 1.0), stock("c", 2.0)];

        sort_stocks(&mut stocks, "price", true);
        let codes: Vec<&str> = stocks.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, vec!["a", "c", "b"]);

        stocks[0].extra.insert("rank".to_string(), ExtraValue::Number(2.0));
        stocks[2].extra.insert("rank".to_string(), ExtraValue::Number(1.0));
        sort_stocks(&mut stocks, "rank", false);
        let codes: Vec<&str> = stocks.iter().map(|s| s.code.as_str()).collect();
        // "c" has no rank and goes last
        assert_eq!(codes, vec!["b", "a", "c"]);
    }
}
