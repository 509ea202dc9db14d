//! Card payload decoding and field validation.
//!
//! The payload arrives as an opaque blob. Decoding only checks structure;
//! every field is optional at that stage and presence is enforced by
//! [`validate_card`], so a partially parseable payload never reaches
//! persistence with missing fields.

use crate::{entities::payments::PaymentType, errors::ServiceError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fmt;

static EXPIRATION_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0[1-9]|1[0-2])/\d{2}$").expect("valid expiration regex"));

const CARD_NUMBER_DIGITS: usize = 16;

/// Decoded card fields, before validation.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPayload {
    #[serde(default, alias = "card_number")]
    pub card_number: Option<String>,
    #[serde(default, alias = "card_holder_name")]
    pub card_holder_name: Option<String>,
    #[serde(default, alias = "expiration_date")]
    pub expiration_date: Option<String>,
    #[serde(default)]
    pub cvv: Option<String>,
    #[serde(default)]
    pub installments: Option<i32>,
    #[serde(default, alias = "payment_type")]
    pub payment_type: Option<String>,
}

impl fmt::Debug for CardPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardPayload")
            .field("card_number", &self.card_number.as_ref().map(|_| "<redacted>"))
            .field("card_holder_name", &self.card_holder_name)
            .field("expiration_date", &self.expiration_date)
            .field("cvv", &self.cvv.as_ref().map(|_| "<redacted>"))
            .field("installments", &self.installments)
            .field("payment_type", &self.payment_type)
            .finish()
    }
}

/// Turns the encoded card blob into structured fields.
pub trait CardPayloadDecoder: Send + Sync {
    fn decode(&self, encoded: &str) -> Result<CardPayload, ServiceError>;
}

/// Standard base64 wrapping a JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64JsonCardDecoder;

impl CardPayloadDecoder for Base64JsonCardDecoder {
    fn decode(&self, encoded: &str) -> Result<CardPayload, ServiceError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ServiceError::DecodeError(format!("Card data is not valid base64: {}", e)))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::DecodeError(format!("Card data is not a valid card object: {}", e)))
    }
}

/// Card fields that passed validation. Only the last four digits of the
/// number ever leave this type.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidatedCard {
    card_number: String,
    pub card_holder_name: String,
    pub expiration_date: Option<String>,
    pub installments: Option<i32>,
    pub payment_type: PaymentType,
}

impl ValidatedCard {
    pub fn last_four(&self) -> &str {
        &self.card_number[self.card_number.len() - 4..]
    }
}

impl fmt::Debug for ValidatedCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedCard")
            .field("last_four", &self.last_four())
            .field("card_holder_name", &self.card_holder_name)
            .field("expiration_date", &self.expiration_date)
            .field("installments", &self.installments)
            .field("payment_type", &self.payment_type)
            .finish()
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Checks card fields in order: number, holder, payment type, expiration.
/// The first failure is returned with its own error variant.
pub fn validate_card(payload: &CardPayload) -> Result<ValidatedCard, ServiceError> {
    let raw_number = non_blank(payload.card_number.as_ref())
        .ok_or_else(|| ServiceError::InvalidCardNumber("Card number is required".to_string()))?;

    let card_number: String = raw_number
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    if card_number.len() != CARD_NUMBER_DIGITS || !card_number.chars().all(|c| c.is_ascii_digit()) {
        return Err(ServiceError::InvalidCardNumber(format!(
            "Card number must contain exactly {} digits",
            CARD_NUMBER_DIGITS
        )));
    }

    let card_holder_name = non_blank(payload.card_holder_name.as_ref())
        .ok_or_else(|| ServiceError::InvalidCardData("Card holder name is required".to_string()))?
        .to_string();

    let raw_type = non_blank(payload.payment_type.as_ref())
        .ok_or_else(|| ServiceError::InvalidPaymentType("Payment type is required".to_string()))?;
    let payment_type = PaymentType::parse(raw_type).ok_or_else(|| {
        ServiceError::InvalidPaymentType(format!(
            "Unsupported payment type '{}', expected debit or credit",
            raw_type
        ))
    })?;

    let expiration_date = match payload.expiration_date.as_deref().map(str::trim) {
        Some(date) if EXPIRATION_DATE.is_match(date) => Some(date.to_string()),
        Some(date) => {
            return Err(ServiceError::InvalidExpirationDate(format!(
                "Expiration date '{}' must use MM/YY with month 01-12",
                date
            )))
        }
        None => None,
    };

    if let Some(installments) = payload.installments {
        if installments < 1 {
            return Err(ServiceError::InvalidCardData(
                "Installments must be at least 1".to_string(),
            ));
        }
    }

    Ok(ValidatedCard {
        card_number,
        card_holder_name,
        expiration_date,
        installments: payload.installments,
        payment_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use test_case::test_case;

    fn payload() -> CardPayload {
        CardPayload {
            card_number: Some("4111111111111111".into()),
            card_holder_name: Some("Ana Perez".into()),
            expiration_date: Some("08/29".into()),
            cvv: Some("123".into()),
            installments: None,
            payment_type: Some("credit".into()),
        }
    }

    #[test]
    fn accepts_well_formed_card() {
        let card = validate_card(&payload()).unwrap();
        assert_eq!(card.payment_type, PaymentType::Credit);
        assert_eq!(card.last_four(), "1111");
        assert_eq!(card.expiration_date.as_deref(), Some("08/29"));
    }

    #[test]
    fn strips_separators_from_number() {
        let mut p = payload();
        p.card_number = Some("1234-5678-1234-5678".into());
        p.payment_type = Some("debito".into());

        let card = validate_card(&p).unwrap();
        assert_eq!(card.last_four(), "5678");
        assert_eq!(card.payment_type, PaymentType::Debit);
    }

    #[test_case(None ; "missing")]
    #[test_case(Some("   ") ; "blank")]
    #[test_case(Some("4111 1111 1111") ; "too short")]
    #[test_case(Some("4111111111111111111") ; "too long")]
    #[test_case(Some("4111x11111111111") ; "non digit")]
    fn rejects_bad_card_number(number: Option<&str>) {
        let mut p = payload();
        p.card_number = number.map(String::from);
        assert_matches!(validate_card(&p), Err(ServiceError::InvalidCardNumber(_)));
    }

    #[test]
    fn rejects_blank_holder() {
        let mut p = payload();
        p.card_holder_name = Some(" ".into());
        assert_matches!(validate_card(&p), Err(ServiceError::InvalidCardData(_)));
    }

    #[test_case(None ; "missing")]
    #[test_case(Some("paypal") ; "unknown")]
    fn rejects_bad_payment_type(payment_type: Option<&str>) {
        let mut p = payload();
        p.payment_type = payment_type.map(String::from);
        assert_matches!(validate_card(&p), Err(ServiceError::InvalidPaymentType(_)));
    }

    #[test_case("13/25")]
    #[test_case("00/25")]
    #[test_case("1/25")]
    #[test_case("12/2025")]
    #[test_case("")]
    fn rejects_bad_expiration(date: &str) {
        let mut p = payload();
        p.expiration_date = Some(date.into());
        assert_matches!(validate_card(&p), Err(ServiceError::InvalidExpirationDate(_)));
    }

    #[test]
    fn expiration_is_optional() {
        let mut p = payload();
        p.expiration_date = None;
        assert!(validate_card(&p).unwrap().expiration_date.is_none());
    }

    #[test]
    fn card_number_checked_before_holder() {
        let p = CardPayload {
            card_number: Some("12".into()),
            ..CardPayload::default()
        };
        assert_matches!(validate_card(&p), Err(ServiceError::InvalidCardNumber(_)));
    }

    #[test]
    fn rejects_zero_installments() {
        let mut p = payload();
        p.installments = Some(0);
        assert_matches!(validate_card(&p), Err(ServiceError::InvalidCardData(_)));
    }

    #[test]
    fn debug_output_hides_card_number() {
        let card = validate_card(&payload()).unwrap();
        let rendered = format!("{:?} {:?}", card, payload());
        assert!(!rendered.contains("4111111111111111"));
        assert!(!rendered.contains("123\""));
    }

    #[test]
    fn decodes_camel_and_snake_case() {
        let camel = STANDARD.encode(
            r#"{"cardNumber":"4111111111111111","cardHolderName":"Ana","paymentType":"debit","installments":3}"#,
        );
        let snake = STANDARD.encode(
            r#"{"card_number":"4111111111111111","card_holder_name":"Ana","payment_type":"debit","installments":3}"#,
        );

        let decoder = Base64JsonCardDecoder;
        let a = decoder.decode(&camel).unwrap();
        let b = decoder.decode(&snake).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.installments, Some(3));
        assert_eq!(a.expiration_date, None);
    }

    #[test_case("not base64!!" ; "invalid base64")]
    #[test_case("bm90IGpzb24=" ; "not json")]
    #[test_case("WzEsMiwzXQ==" ; "json array")]
    fn decode_failures(encoded: &str) {
        assert_matches!(
            Base64JsonCardDecoder.decode(encoded),
            Err(ServiceError::DecodeError(_))
        );
    }
}
