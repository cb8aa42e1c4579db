//! Casino one-wallet request and response shapes.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::wire;

/// Inbound request, routed by its `type` field
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CasinoRequest {
    Ping,
    Balance(BalanceRequest),
    Debit(WalletRequest),
    Credit(WalletRequest),
    Roundinfo(RoundInfoRequest),
}

impl CasinoRequest {
    pub fn name(&self) -> &'static str {
        match self {
            CasinoRequest::Ping => "ping",
            CasinoRequest::Balance(_) => "balance",
            CasinoRequest::Debit(_) => "debit",
            CasinoRequest::Credit(_) => "credit",
            CasinoRequest::Roundinfo(_) => "roundinfo",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceRequest {
    #[serde(deserialize_with = "wire::string_or_number")]
    pub userid: String,
    pub currency: String,
}

/// Debit or credit
#[derive(Debug, Clone, Deserialize)]
pub struct WalletRequest {
    #[serde(deserialize_with = "wire::string_or_number")]
    pub userid: String,
    #[serde(deserialize_with = "wire::decimal")]
    pub amount: Decimal,
    pub currency: String,
    #[serde(deserialize_with = "wire::string_or_number")]
    pub tid: String,
    #[serde(deserialize_with = "wire::string_or_number")]
    pub i_gameid: String,
    #[serde(deserialize_with = "wire::string_or_number")]
    pub i_actionid: String,
    #[serde(default, deserialize_with = "wire::opt_string_or_number")]
    pub i_gamedesc: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_string_or_number")]
    pub subtype: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoundInfoRequest {
    #[serde(deserialize_with = "wire::string_or_number")]
    pub gameid: String,
    #[serde(deserialize_with = "wire::string_or_number")]
    pub userid: String,
    #[serde(default, deserialize_with = "wire::opt_string_or_number")]
    pub i_gamedesc: Option<String>,
    #[serde(default)]
    pub actions: Vec<Value>,
}

/// Balance as the protocol renders it, two decimals
pub fn format_balance(balance: Decimal) -> String {
    format!("{:.2}", balance.round_dp(2))
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn ok_body() -> Map<String, Value> {
    into_map(json!({ "status": "OK" }))
}

pub fn balance_body(balance: Decimal) -> Map<String, Value> {
    into_map(json!({ "status": "OK", "balance": format_balance(balance) }))
}

pub fn transaction_body(tid: &str, balance: Decimal) -> Map<String, Value> {
    into_map(json!({ "status": "OK", "tid": tid, "balance": format_balance(balance) }))
}

pub fn error_body(message: &str, balance: Option<Decimal>) -> Map<String, Value> {
    let mut body = into_map(json!({ "error": message }));
    if let Some(balance) = balance {
        body.insert("balance".to_string(), Value::String(format_balance(balance)));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_by_type() {
        let request: CasinoRequest = serde_json::from_value(json!({
            "type": "debit",
            "userid": "u1",
            "amount": "50.00",
            "currency": "INR",
            "tid": "T1",
            "i_gameid": 991,
            "i_actionid": "A1",
            "i_gamedesc": "Roulette",
            "hmac": "abc",
        }))
        .unwrap();

        match request {
            CasinoRequest::Debit(req) => {
                assert_eq!(req.amount, Decimal::from(50));
                assert_eq!(req.i_gameid, "991");
                assert!(req.subtype.is_none());
            }
            other => panic!("unexpected {}", other.name()),
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result: Result<CasinoRequest, _> = serde_json::from_value(json!({ "type": "refund" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_format_balance() {
        assert_eq!(format_balance(Decimal::from(450)), "450.00");
        assert_eq!(format_balance(Decimal::new(12346, 3)), "12.35");
    }
}
