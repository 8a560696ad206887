//! VNPay gateway protocol: signed redirect URLs and IPN verification.
//!
//! Both directions sign the same canonical string: every `vnp_*` field with
//! a non-empty value, sorted by name, joined as `name=value` pairs with `&`,
//! values form-url-encoded. The signature is the lowercase hex
//! HMAC-SHA512 of that string under the merchant hash secret.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, FixedOffset, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use subtle::ConstantTimeEq;

use crate::config::VnPayConfig;
use crate::error::{AppError, AppResult};

pub const VERSION: &str = "2.1.0";
pub const COMMAND_PAY: &str = "pay";
pub const CURRENCY: &str = "VND";
pub const LOCALE: &str = "vn";
pub const ORDER_TYPE: &str = "other";

/// Gateway success value for `vnp_ResponseCode` and `vnp_TransactionStatus`.
pub const GATEWAY_SUCCESS: &str = "00";

const SECURE_HASH: &str = "vnp_SecureHash";
const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";
const PAYMENT_WINDOW_MINUTES: i64 = 15;
const GATEWAY_UTC_OFFSET_SECS: i32 = 7 * 3600;

type HmacSha512 = Hmac<Sha512>;

/// Acknowledgement codes VNPay expects in the IPN response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpnCode {
    ConfirmSuccess,
    OrderNotFound,
    AlreadyConfirmed,
    InvalidAmount,
    InvalidSignature,
    UnknownError,
}

impl IpnCode {
    pub fn code(self) -> &'static str {
        match self {
            IpnCode::ConfirmSuccess => "00",
            IpnCode::OrderNotFound => "01",
            IpnCode::AlreadyConfirmed => "02",
            IpnCode::InvalidAmount => "04",
            IpnCode::InvalidSignature => "97",
            IpnCode::UnknownError => "99",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            IpnCode::ConfirmSuccess => "Confirm Success",
            IpnCode::OrderNotFound => "Order not found",
            IpnCode::AlreadyConfirmed => "Order already confirmed",
            IpnCode::InvalidAmount => "Invalid amount",
            IpnCode::InvalidSignature => "Invalid signature",
            IpnCode::UnknownError => "Unknown error",
        }
    }
}

/// IPN response body. Always sent with HTTP 200.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpnResponse {
    #[serde(rename = "RspCode")]
    pub rsp_code: String,

    #[serde(rename = "Message")]
    pub message: String,
}

impl From<IpnCode> for IpnResponse {
    fn from(code: IpnCode) -> Self {
        IpnResponse {
            rsp_code: code.code().to_string(),
            message: code.message().to_string(),
        }
    }
}

/// Form-url-encodes a value the way the gateway's signer does: space as
/// `+`, `*` left bare, `~` escaped.
fn encode(value: &str) -> String {
    urlencoding::encode(value)
        .replace("%20", "+")
        .replace("%2A", "*")
        .replace('~', "%7E")
}

/// Builds the canonical `k=v&...` string over the signable fields.
pub fn canonical_query<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let sorted: BTreeMap<&String, &String> = fields
        .into_iter()
        .filter(|(k, v)| k.starts_with("vnp_") && !v.is_empty())
        .filter(|(k, _)| k.as_str() != SECURE_HASH && k.as_str() != SECURE_HASH_TYPE)
        .collect();

    sorted
        .into_iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Lowercase hex HMAC-SHA512 of `data`.
pub fn sign(secret: &str, data: &str) -> AppResult<String> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("invalid VNPay hash secret: {e}")))?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks the `vnp_SecureHash` of an inbound field set in constant time.
pub fn verify_signature(secret: &str, fields: &HashMap<String, String>) -> bool {
    let Some(provided) = fields.get(SECURE_HASH) else {
        return false;
    };
    let Ok(expected) = sign(secret, &canonical_query(fields)) else {
        return false;
    };
    let provided = provided.to_ascii_lowercase();
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// Reference sent as `vnp_TxnRef`: `<orderId>_<unixMillis>`.
pub fn order_reference(order_id: i64, now: DateTime<Utc>) -> String {
    format!("{order_id}_{}", now.timestamp_millis())
}

/// Extracts the order id from a `vnp_TxnRef`.
pub fn parse_order_reference(txn_ref: &str) -> Option<i64> {
    let (order_id, stamp) = txn_ref.split_once('_')?;
    if stamp.is_empty() || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    order_id.parse::<i64>().ok().filter(|id| *id > 0)
}

/// Amount in the gateway's minor units (major × 100).
pub fn amount_to_minor(amount: Decimal) -> AppResult<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| AppError::Internal(format!("amount {amount} does not fit the gateway format")))
}

/// Parses a `vnp_Amount` value into a major-unit decimal.
pub fn minor_to_amount(raw: &str) -> Option<Decimal> {
    let minor = raw.trim().parse::<i64>().ok().filter(|m| *m >= 0)?;
    Some(Decimal::new(minor, 2))
}

fn gateway_timestamp(at: DateTime<Utc>) -> AppResult<String> {
    let offset = FixedOffset::east_opt(GATEWAY_UTC_OFFSET_SECS)
        .ok_or_else(|| AppError::Internal("invalid gateway UTC offset".to_string()))?;
    Ok(at.with_timezone(&offset).format("%Y%m%d%H%M%S").to_string())
}

/// Inputs for one redirect URL.
#[derive(Debug, Clone)]
pub struct PaymentUrlRequest {
    pub order_id: i64,
    pub amount: Decimal,
    pub bank_code: Option<String>,
    pub client_ip: String,
}

/// Builds the signed gateway redirect URL for an order.
pub fn build_payment_url(
    config: &VnPayConfig,
    request: &PaymentUrlRequest,
    now: DateTime<Utc>,
) -> AppResult<String> {
    let txn_ref = order_reference(request.order_id, now);

    let mut fields: BTreeMap<String, String> = BTreeMap::new();
    let mut put = |k: &str, v: String| {
        fields.insert(k.to_string(), v);
    };
    put("vnp_Version", VERSION.to_string());
    put("vnp_Command", COMMAND_PAY.to_string());
    put("vnp_TmnCode", config.tmn_code.clone());
    put("vnp_Amount", amount_to_minor(request.amount)?.to_string());
    put("vnp_CurrCode", CURRENCY.to_string());
    if let Some(bank_code) = request.bank_code.as_deref().filter(|b| !b.is_empty()) {
        put("vnp_BankCode", bank_code.to_string());
    }
    put("vnp_OrderInfo", format!("Thanh toan don hang:{txn_ref}"));
    put("vnp_OrderType", ORDER_TYPE.to_string());
    put("vnp_Locale", LOCALE.to_string());
    put("vnp_ReturnUrl", config.return_url.clone());
    put("vnp_IpAddr", request.client_ip.clone());
    put("vnp_CreateDate", gateway_timestamp(now)?);
    put(
        "vnp_ExpireDate",
        gateway_timestamp(now + Duration::minutes(PAYMENT_WINDOW_MINUTES))?,
    );
    put("vnp_TxnRef", txn_ref);

    let query = canonical_query(&fields);
    let secure_hash = sign(&config.hash_secret, &query)?;
    Ok(format!("{}?{query}&{SECURE_HASH}={secure_hash}", config.pay_url))
}
