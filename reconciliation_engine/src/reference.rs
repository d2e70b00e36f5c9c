//! Payment reference parsing.
//!
//! A payment reference is a string correlating a backend order to a provider-side transaction record. The format is
//! provider-dependent and ambiguous: a bare order id, a composite `order_<id>_<millis>` token generated at
//! initialization time, or a provider-issued opaque token. The ambiguity is resolved here, once, at the boundary,
//! rather than re-sniffed ad hoc at every call site.

use std::{fmt::Display, sync::OnceLock};

use chrono::Utc;
use regex::Regex;

use crate::db_types::OrderId;

const COMPOSITE_PATTERN: &str = r"^order_(?P<id>.+)_(?P<ts>\d{10,16})$";
const BARE_ID_PATTERN: &str = r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$";

fn composite_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(COMPOSITE_PATTERN).expect("composite reference pattern is valid"))
}

fn bare_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(BARE_ID_PATTERN).expect("bare id pattern is valid"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReference {
    /// A bare order identifier.
    Raw(OrderId),
    /// A correlation reference generated at initialization time, embedding the order id and a millisecond timestamp
    /// so that it survives provider-side truncation or requoting.
    Composite { order_id: OrderId, timestamp: i64 },
    /// A provider-issued token we cannot decompose. Only usable for lookups against the stored payment reference.
    ProviderOpaque(String),
}

impl ParsedReference {
    pub fn parse(reference: &str) -> Self {
        if let Some(caps) = composite_re().captures(reference) {
            // Both groups are guaranteed by the pattern.
            let order_id = OrderId::from(&caps["id"]);
            if let Ok(timestamp) = caps["ts"].parse::<i64>() {
                return ParsedReference::Composite { order_id, timestamp };
            }
        }
        if bare_id_re().is_match(reference) {
            return ParsedReference::Raw(OrderId::from(reference));
        }
        ParsedReference::ProviderOpaque(reference.to_string())
    }

    /// Generates a fresh composite reference for the given order, stamped with the current time.
    pub fn new_composite(order_id: &OrderId) -> Self {
        ParsedReference::Composite { order_id: order_id.clone(), timestamp: Utc::now().timestamp_millis() }
    }

    /// The order id embedded in the reference, if there is one.
    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            ParsedReference::Raw(id) => Some(id),
            ParsedReference::Composite { order_id, .. } => Some(order_id),
            ParsedReference::ProviderOpaque(_) => None,
        }
    }
}

impl Display for ParsedReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParsedReference::Raw(id) => write!(f, "{}", id.as_str()),
            ParsedReference::Composite { order_id, timestamp } => {
                write!(f, "order_{}_{timestamp}", order_id.as_str())
            },
            ParsedReference::ProviderOpaque(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::ParsedReference;
    use crate::db_types::OrderId;

    const UUID: &str = "9f1c2e34-55a6-47b8-9c0d-1e2f3a4b5c6d";

    #[test]
    fn composite_references_extract_the_order_id() {
        let parsed = ParsedReference::parse(&format!("order_{UUID}_1700000000000"));
        assert_eq!(parsed, ParsedReference::Composite { order_id: OrderId::from(UUID), timestamp: 1_700_000_000_000 });
        assert_eq!(parsed.order_id(), Some(&OrderId::from(UUID)));
    }

    #[test]
    fn bare_order_ids_parse_as_raw() {
        let parsed = ParsedReference::parse(UUID);
        assert_eq!(parsed, ParsedReference::Raw(OrderId::from(UUID)));
    }

    #[test]
    fn anything_else_is_provider_opaque() {
        let parsed = ParsedReference::parse("ch_8Bq2vLkT9xWd");
        assert_eq!(parsed, ParsedReference::ProviderOpaque("ch_8Bq2vLkT9xWd".to_string()));
        assert_eq!(parsed.order_id(), None);
    }

    #[test]
    fn display_round_trips_composites() {
        let s = format!("order_{UUID}_1700000000000");
        assert_eq!(ParsedReference::parse(&s).to_string(), s);
    }

    #[test]
    fn generated_composites_parse_back() {
        let oid = OrderId::from(UUID);
        let generated = ParsedReference::new_composite(&oid).to_string();
        assert_eq!(ParsedReference::parse(&generated).order_id(), Some(&oid));
    }
}
