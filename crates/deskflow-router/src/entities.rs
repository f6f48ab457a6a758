// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Regex entity extraction run on every incoming message.

use std::sync::LazyLock;

use regex::Regex;

use deskflow_core::state::ExtractedEntities;

/// `ORD-1234` style references, kept verbatim (upper-cased).
static ORDER_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(ord-\d{3,})\b").unwrap());

/// `#1234`, `order 1234`, `order number: 1234`.
static ORDER_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:#|\border\s*(?:number|no\.?|id)?\s*[:#]?\s*)(\d{3,})\b").unwrap()
});

static PRODUCT_SKU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b((?:sku|prod)-[a-z0-9]+(?:-[a-z0-9]+)*)\b").unwrap());

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});

/// `$25`, `$ 25.5`, `25.00 USD`, `EUR 10`.
static MONEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:[$€£]\s?(\d+)(?:\.(\d{1,2}))?)|(?:\b(\d+)(?:\.(\d{1,2}))?\s?(?:usd|eur|gbp|dollars?)\b)|(?:\b(?:usd|eur|gbp)\s?(\d+)(?:\.(\d{1,2}))?)",
    )
    .unwrap()
});

/// Converts a whole part and an optional one or two digit fraction to minor units.
fn to_minor_units(whole: &str, fraction: Option<&str>) -> Option<i64> {
    let whole: i64 = whole.parse().ok()?;
    let cents = match fraction {
        None => 0,
        Some(f) if f.len() == 1 => f.parse::<i64>().ok()? * 10,
        Some(f) => f.parse::<i64>().ok()?,
    };
    whole.checked_mul(100)?.checked_add(cents)
}

fn extract_amount(message: &str) -> Option<i64> {
    let caps = MONEY.captures(message)?;
    [(1, 2), (3, 4), (5, 6)].into_iter().find_map(|(w, f)| {
        let whole = caps.get(w)?;
        to_minor_units(whole.as_str(), caps.get(f).map(|m| m.as_str()))
    })
}

/// Pulls order ids, product SKUs, emails and money amounts out of free text.
///
/// Never sets `query`; that is derived from the intent.
pub fn extract_entities(message: &str) -> ExtractedEntities {
    let order_id = ORDER_REF
        .captures(message)
        .map(|c| c[1].to_uppercase())
        .or_else(|| ORDER_NUMBER.captures(message).map(|c| c[1].to_string()));

    ExtractedEntities {
        order_id,
        product_id: PRODUCT_SKU.captures(message).map(|c| c[1].to_uppercase()),
        customer_email: EMAIL
            .find(message)
            .map(|m| m.as_str().to_ascii_lowercase()),
        amount: extract_amount(message),
        query: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_order_number() {
        let e = extract_entities("where is order #1234?");
        assert_eq!(e.order_id.as_deref(), Some("1234"));
    }

    #[test]
    fn spelled_out_order_number() {
        assert_eq!(
            extract_entities("my order number: 98765 never came").order_id.as_deref(),
            Some("98765")
        );
        assert_eq!(
            extract_entities("refund order 4521 please").order_id.as_deref(),
            Some("4521")
        );
    }

    #[test]
    fn prefixed_order_reference_wins() {
        let e = extract_entities("refund ord-2024 and also #1111");
        assert_eq!(e.order_id.as_deref(), Some("ORD-2024"));
    }

    #[test]
    fn short_numbers_are_not_orders() {
        assert!(extract_entities("I have 2 questions").order_id.is_none());
    }

    #[test]
    fn sku_and_email() {
        let e = extract_entities("Is sku-hd450-blk in stock? reply to Alice@Example.com");
        assert_eq!(e.product_id.as_deref(), Some("SKU-HD450-BLK"));
        assert_eq!(e.customer_email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn money_amounts_in_minor_units() {
        assert_eq!(extract_entities("refund $25").amount, Some(2500));
        assert_eq!(extract_entities("refund $12.5 of it").amount, Some(1250));
        assert_eq!(extract_entities("just 40.99 USD back").amount, Some(4099));
        assert_eq!(extract_entities("EUR 7").amount, Some(700));
        assert_eq!(extract_entities("no money here").amount, None);
    }

    #[test]
    fn plain_message_has_no_entities() {
        assert_eq!(extract_entities("hello there"), ExtractedEntities::default());
    }
}
