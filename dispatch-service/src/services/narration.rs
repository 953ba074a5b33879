//! Narration heuristics: payment-mode classification and explicit bill
//! references.
//!
//! Upstream receipt narrations are free text typed by accountants. Two
//! signals are extracted: the payment mode (keyword rules, first match
//! wins) and an explicit bill reference (`BILL:<token>` or
//! `bill <token>`) that, when present, overrides FIFO mapping.

use crate::models::PaymentMode;
use once_cell::sync::Lazy;
use regex::Regex;

/// Ordered classification rules. Earlier rules take priority regardless of
/// where the keyword appears in the narration; anything unmatched is cash.
const MODE_RULES: &[(&str, PaymentMode)] = &[
    ("cheque", PaymentMode::Cheque),
    ("chq", PaymentMode::Cheque),
    ("dd ", PaymentMode::Cheque),
    ("neft", PaymentMode::Digital),
    ("rtgs", PaymentMode::Digital),
    ("imps", PaymentMode::Digital),
    ("upi", PaymentMode::Digital),
    ("gpay", PaymentMode::Digital),
    ("phonepe", PaymentMode::Digital),
    ("paytm", PaymentMode::Digital),
    ("online", PaymentMode::Digital),
    ("transfer", PaymentMode::Digital),
];

static BILL_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bbill\s*(?:[:#]\s*|\s+)([A-Za-z0-9][A-Za-z0-9/\-]*)")
        .expect("Failed to compile BILL_REF_RE")
});

/// Classify the payment mode of a receipt from its narration.
pub fn classify_mode(narration: Option<&str>) -> PaymentMode {
    let Some(text) = narration else {
        return PaymentMode::Cash;
    };
    let lowered = text.to_lowercase();
    for (keyword, mode) in MODE_RULES {
        if lowered.contains(keyword) {
            return *mode;
        }
    }
    PaymentMode::Cash
}

/// Extract an explicit bill reference (`BILL:<token>` or `bill <token>`)
/// from a narration. The token is taken verbatim apart from trimming
/// trailing separators.
pub fn extract_bill_ref(narration: Option<&str>) -> Option<String> {
    let text = narration?;
    let captures = BILL_REF_RE.captures(text)?;
    let token = captures.get(1)?.as_str().trim_end_matches(['/', '-']);
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_narration_defaults_to_cash() {
        assert_eq!(classify_mode(None), PaymentMode::Cash);
        assert_eq!(classify_mode(Some("")), PaymentMode::Cash);
        assert_eq!(classify_mode(Some("being amount received")), PaymentMode::Cash);
    }

    #[test]
    fn cheque_keywords_classify_as_cheque() {
        assert_eq!(
            classify_mode(Some("Received by cheque no 004512")),
            PaymentMode::Cheque
        );
        assert_eq!(classify_mode(Some("CHQ 004512 SBI")), PaymentMode::Cheque);
    }

    #[test]
    fn digital_keywords_classify_as_digital() {
        for text in [
            "NEFT UTR AXIS0001",
            "received via UPI",
            "RTGS from party",
            "GPay collect request",
            "imps transfer ref 99",
        ] {
            assert_eq!(classify_mode(Some(text)), PaymentMode::Digital, "{}", text);
        }
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(classify_mode(Some("ChEqUe bounced")), PaymentMode::Cheque);
        assert_eq!(classify_mode(Some("uPi ref 12")), PaymentMode::Digital);
    }

    #[test]
    fn earlier_rules_win_over_later_ones() {
        // Both keywords present: cheque is listed before upi.
        assert_eq!(
            classify_mode(Some("UPI failed, paid by cheque instead")),
            PaymentMode::Cheque
        );
    }

    #[test]
    fn extracts_bill_reference_token() {
        assert_eq!(
            extract_bill_ref(Some("Recd against BILL:SV/1042 in full")),
            Some("SV/1042".to_string())
        );
        assert_eq!(
            extract_bill_ref(Some("bill: 2231 part payment")),
            Some("2231".to_string())
        );
        assert_eq!(
            extract_bill_ref(Some("Bill#A-17")),
            Some("A-17".to_string())
        );
    }

    #[test]
    fn space_separated_reference_extracts() {
        assert_eq!(
            extract_bill_ref(Some("recd against bill SV-1042 in full")),
            Some("SV-1042".to_string())
        );
        assert_eq!(
            extract_bill_ref(Some("bill 1042 cleared")),
            Some("1042".to_string())
        );
    }

    #[test]
    fn plural_bills_is_not_a_reference() {
        assert_eq!(extract_bill_ref(Some("paid three bills today")), None);
        assert_eq!(extract_bill_ref(None), None);
    }

    #[test]
    fn reference_trims_trailing_separators() {
        assert_eq!(
            extract_bill_ref(Some("BILL:SV/1042/ closing")),
            Some("SV/1042".to_string())
        );
    }
}
