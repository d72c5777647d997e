//! Push-feed wire types
//!
//! Control messages are JSON with a header carrying the session approval
//! key and a direction flag. Inbound ticks arrive in a pipe-delimited
//! envelope whose payload field order is fixed by the upstream vendor and
//! parsed positionally.

use crate::feed::{FeedError, PriceTick, Source};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Direction flag: subscribe
const TR_TYPE_SUBSCRIBE: &str = "1";
/// Direction flag: unsubscribe
const TR_TYPE_UNSUBSCRIBE: &str = "2";

/// Fields per record in the caret-delimited tick payload
pub const TICK_FIELD_COUNT: usize = 15;

// Positional indices within one payload record.
const FIELD_CODE: usize = 0;
const FIELD_PRICE: usize = 2;
const FIELD_SIGN: usize = 3;
const FIELD_CHANGE: usize = 4;
const FIELD_CHANGE_RATE: usize = 5;
const FIELD_OPEN: usize = 7;
const FIELD_HIGH: usize = 8;
const FIELD_LOW: usize = 9;
const FIELD_VOLUME: usize = 12;
const FIELD_ACML_VALUE: usize = 14;

/// Transport-level events surfaced by the socket
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// Raw text frame
    Text(String),
    /// Connection established
    Connected,
    /// Connection closed for good
    Disconnected,
    /// Reconnect attempt in progress
    Reconnecting { attempt: u32 },
}

/// Connection lifecycle states for the push-feed manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// No connection and none in progress
    Disconnected,
    /// First connection attempt in flight
    Connecting,
    /// Live connection
    Connected,
    /// Connection lost, backoff retry in flight
    Reconnecting,
}

#[derive(Debug, Serialize)]
struct ControlHeader {
    approval_key: String,
    custtype: String,
    tr_type: String,
    #[serde(rename = "content-type")]
    content_type: String,
}

#[derive(Debug, Serialize)]
struct ControlInput {
    tr_id: String,
    tr_key: String,
}

#[derive(Debug, Serialize)]
struct ControlBody {
    input: ControlInput,
}

/// Subscribe/unsubscribe control message
#[derive(Debug, Serialize)]
pub struct ControlMessage {
    header: ControlHeader,
    body: ControlBody,
}

impl ControlMessage {
    /// Build a subscribe message for one transaction/key pair
    pub fn subscribe(approval_key: &str, tr_id: &str, tr_key: &str) -> Self {
        Self::new(approval_key, TR_TYPE_SUBSCRIBE, tr_id, tr_key)
    }

    /// Build an unsubscribe message for one transaction/key pair
    pub fn unsubscribe(approval_key: &str, tr_id: &str, tr_key: &str) -> Self {
        Self::new(approval_key, TR_TYPE_UNSUBSCRIBE, tr_id, tr_key)
    }

    fn new(approval_key: &str, tr_type: &str, tr_id: &str, tr_key: &str) -> Self {
        Self {
            header: ControlHeader {
                approval_key: approval_key.to_string(),
                custtype: "P".to_string(),
                tr_type: tr_type.to_string(),
                content_type: "utf-8".to_string(),
            },
            body: ControlBody {
                input: ControlInput {
                    tr_id: tr_id.to_string(),
                    tr_key: tr_key.to_string(),
                },
            },
        }
    }

    /// Serialize to the wire representation
    pub fn to_json(&self) -> Result<String, FeedError> {
        serde_json::to_string(self).map_err(|e| FeedError::Malformed(e.to_string()))
    }
}

/// Acknowledgement for a control message
#[derive(Debug, Deserialize)]
pub struct ControlAck {
    /// Transaction the ack refers to
    pub tr_id: Option<String>,
    /// Vendor result code ("0" on success)
    pub msg_cd: Option<String>,
    /// Vendor result text
    pub msg1: Option<String>,
}

/// Try to parse a frame as a JSON control acknowledgement
///
/// Tick frames are pipe-delimited and never start with a brace, so this is
/// a cheap discriminator.
pub fn parse_control_ack(raw: &str) -> Option<ControlAck> {
    if !raw.trim_start().starts_with('{') {
        return None;
    }
    #[derive(Deserialize)]
    struct AckEnvelope {
        header: Option<AckHeader>,
        body: Option<AckBody>,
    }
    #[derive(Deserialize)]
    struct AckHeader {
        tr_id: Option<String>,
    }
    #[derive(Deserialize)]
    struct AckBody {
        msg_cd: Option<String>,
        msg1: Option<String>,
    }
    let env: AckEnvelope = serde_json::from_str(raw).ok()?;
    Some(ControlAck {
        tr_id: env.header.and_then(|h| h.tr_id),
        msg_cd: env.body.as_ref().and_then(|b| b.msg_cd.clone()),
        msg1: env.body.and_then(|b| b.msg1),
    })
}

/// Parse a pipe-delimited tick envelope into price ticks
///
/// Envelope: `encryptedFlag|trId|recordCount|payload` where the payload is
/// caret-delimited with `TICK_FIELD_COUNT` fields per record. A falling
/// sign flag negates the change. The tick timestamp is the local receive
/// time.
pub fn parse_tick_frame(raw: &str) -> Result<Vec<PriceTick>, FeedError> {
    let mut parts = raw.splitn(4, '|');
    let encrypted = parts
        .next()
        .ok_or_else(|| FeedError::Malformed("empty frame".into()))?;
    let _tr_id = parts
        .next()
        .ok_or_else(|| FeedError::Malformed("missing transaction id".into()))?;
    let count: usize = parts
        .next()
        .ok_or_else(|| FeedError::Malformed("missing record count".into()))?
        .parse()
        .map_err(|_| FeedError::Malformed("record count not numeric".into()))?;
    let payload = parts
        .next()
        .ok_or_else(|| FeedError::Malformed("missing payload".into()))?;

    if encrypted == "1" {
        return Err(FeedError::Malformed("encrypted payload not supported".into()));
    }

    let fields: Vec<&str> = payload.split('^').collect();
    if fields.len() < count * TICK_FIELD_COUNT {
        return Err(FeedError::Malformed(format!(
            "expected {} fields for {} records, got {}",
            count * TICK_FIELD_COUNT,
            count,
            fields.len()
        )));
    }

    let now = Utc::now();
    let mut ticks = Vec::with_capacity(count);
    for record in fields.chunks_exact(TICK_FIELD_COUNT).take(count) {
        ticks.push(parse_record(record, now)?);
    }
    Ok(ticks)
}

fn parse_record(
    fields: &[&str],
    now: chrono::DateTime<Utc>,
) -> Result<PriceTick, FeedError> {
    let price = parse_decimal(fields[FIELD_PRICE], "price")?;
    let mut change = parse_decimal(fields[FIELD_CHANGE], "change")?;
    let mut change_rate = parse_decimal(fields[FIELD_CHANGE_RATE], "change rate")?;
    // Sign flags 4 and 5 mark lower-limit and falling prices.
    if matches!(fields[FIELD_SIGN], "4" | "5") {
        change = -change.abs();
        change_rate = -change_rate.abs();
    }

    Ok(PriceTick {
        code: fields[FIELD_CODE].to_string(),
        price,
        change,
        change_rate,
        volume: fields[FIELD_VOLUME]
            .parse()
            .map_err(|_| FeedError::Malformed("volume not numeric".into()))?,
        value: parse_decimal(fields[FIELD_ACML_VALUE], "accumulated value")?,
        high: parse_decimal(fields[FIELD_HIGH], "high")?,
        low: parse_decimal(fields[FIELD_LOW], "low")?,
        open: parse_decimal(fields[FIELD_OPEN], "open")?,
        prev_close: price - change,
        timestamp: now,
        source: Source::Push,
        stale: false,
    })
}

fn parse_decimal(raw: &str, what: &str) -> Result<Decimal, FeedError> {
    Decimal::from_str(raw).map_err(|_| FeedError::Malformed(format!("{what} not numeric: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_record(code: &str, price: &str, sign: &str, change: &str) -> String {
        // code^time^price^sign^change^rate^wavg^open^high^low^ask^bid^vol^acml_vol^acml_value
        format!(
            "{code}^093015^{price}^{sign}^{change}^0.71^70900^70500^71200^70100^71050^70950^150^981234^69912345000"
        )
    }

    #[test]
    fn test_subscribe_message_shape() {
        let msg = ControlMessage::subscribe("key-123", "QUOTE0", "005930");
        let json = msg.to_json().unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["header"]["approval_key"], "key-123");
        assert_eq!(v["header"]["tr_type"], "1");
        assert_eq!(v["header"]["content-type"], "utf-8");
        assert_eq!(v["body"]["input"]["tr_id"], "QUOTE0");
        assert_eq!(v["body"]["input"]["tr_key"], "005930");
    }

    #[test]
    fn test_unsubscribe_direction_flag() {
        let msg = ControlMessage::unsubscribe("key", "QUOTE0", "005930");
        let json = msg.to_json().unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["header"]["tr_type"], "2");
    }

    #[test]
    fn test_parse_single_record_frame() {
        let frame = format!("0|QUOTE0|1|{}", sample_record("005930", "71000", "2", "500"));
        let ticks = parse_tick_frame(&frame).unwrap();
        assert_eq!(ticks.len(), 1);

        let tick = &ticks[0];
        assert_eq!(tick.code, "005930");
        assert_eq!(tick.price, dec!(71000));
        assert_eq!(tick.change, dec!(500));
        assert_eq!(tick.volume, 150);
        assert_eq!(tick.open, dec!(70500));
        assert_eq!(tick.prev_close, dec!(70500));
        assert_eq!(tick.source, Source::Push);
    }

    #[test]
    fn test_parse_falling_sign_negates_change() {
        let frame = format!("0|QUOTE0|1|{}", sample_record("005930", "70000", "5", "500"));
        let ticks = parse_tick_frame(&frame).unwrap();
        assert_eq!(ticks[0].change, dec!(-500));
        assert_eq!(ticks[0].prev_close, dec!(70500));
    }

    #[test]
    fn test_parse_multi_record_frame() {
        let payload = format!(
            "{}^{}",
            sample_record("005930", "71000", "2", "500"),
            sample_record("000660", "132000", "2", "1500")
        );
        let frame = format!("0|QUOTE0|2|{payload}");
        let ticks = parse_tick_frame(&frame).unwrap();
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].code, "005930");
        assert_eq!(ticks[1].code, "000660");
        assert_eq!(ticks[1].price, dec!(132000));
    }

    #[test]
    fn test_parse_rejects_encrypted() {
        let frame = format!("1|QUOTE0|1|{}", sample_record("005930", "71000", "2", "500"));
        assert!(matches!(
            parse_tick_frame(&frame),
            Err(FeedError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_rejects_short_payload() {
        let frame = "0|QUOTE0|1|005930^093015^71000";
        assert!(parse_tick_frame(frame).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_count() {
        let frame = "0|QUOTE0|x|payload";
        assert!(parse_tick_frame(frame).is_err());
    }

    #[test]
    fn test_control_ack_detection() {
        let ack = r#"{"header":{"tr_id":"QUOTE0"},"body":{"msg_cd":"0","msg1":"SUBSCRIBE SUCCESS"}}"#;
        let parsed = parse_control_ack(ack).unwrap();
        assert_eq!(parsed.tr_id.as_deref(), Some("QUOTE0"));
        assert_eq!(parsed.msg_cd.as_deref(), Some("0"));

        let tick_frame = "0|QUOTE0|1|fields";
        assert!(parse_control_ack(tick_frame).is_none());
    }
}
