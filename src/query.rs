//! Query string parsing.
//!
//! `key=value` pairs separated by `&`; each value is split on `,` and every piece
//! percent-decoded on its own, so an encoded `%2C` survives as a literal comma.

use std::collections::BTreeMap;

use percent_encoding::percent_decode_str;
use serde::{Serialize, Serializer};

use crate::error::RequestError;

/// Query key carrying field specifiers.
pub const FIELDS_KEY: &str = "f";

/// Query keys consumed in list mode.
pub const LIST_KEYS: [&str; 4] = ["after", "before", "limit", "order"];

/// Parsed query: key -> values, in order of appearance.
pub type QueryMap = BTreeMap<String, Vec<String>>;

/// Percent-decode a path segment or query component. `+` is kept literally.
pub fn decode_component(raw: &str) -> Result<String, RequestError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| RequestError::InvalidEncoding {
            value: raw.to_string(),
        })
}

/// Parse a raw query string.
///
/// # Errors
///
/// Returns `RequestError::MalformedQueryPair` for a pair without `=`, or
/// `RequestError::InvalidEncoding` for undecodable components.
pub fn parse_query_string(query_string: &str) -> Result<QueryMap, RequestError> {
    let query_string = query_string.trim();
    let mut query = QueryMap::new();
    if query_string.is_empty() {
        return Ok(query);
    }

    for pair in query_string.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(RequestError::MalformedQueryPair {
                pair: pair.to_string(),
            });
        };

        let key = decode_component(key)?;
        let values = query.entry(key).or_default();
        for piece in value.split(',') {
            values.push(decode_component(piece)?);
        }
    }

    Ok(query)
}

/// Sort direction for list requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Ascending,
    Descending,
}

impl OrderDirection {
    /// Parse a direction: `1`/`asc` or `-1`/`desc`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1" | "asc" => Some(OrderDirection::Ascending),
            "-1" | "desc" => Some(OrderDirection::Descending),
            _ => None,
        }
    }

    /// `1` for ascending, `-1` for descending.
    pub fn sign(&self) -> i8 {
        match self {
            OrderDirection::Ascending => 1,
            OrderDirection::Descending => -1,
        }
    }
}

impl Serialize for OrderDirection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.sign())
    }
}

/// Paging and ordering arguments forwarded to a driver's `list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_direction: Option<OrderDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl ListParams {
    /// Remove the list keys from `query` and parse them.
    ///
    /// Repeated `after`, `before` or `limit` values: the first one wins.
    ///
    /// # Errors
    ///
    /// Returns `RequestError` for a malformed `order` or `limit`.
    pub fn take_from(query: &mut QueryMap) -> Result<Self, RequestError> {
        let [after, before, limit, order] = LIST_KEYS.map(|key| query.remove(key));
        let mut params = ListParams {
            after: first(after),
            before: first(before),
            ..Default::default()
        };

        if let Some(limit) = first(limit) {
            let parsed = limit
                .parse::<u64>()
                .map_err(|_| RequestError::InvalidLimit { value: limit })?;
            params.limit = Some(parsed);
        }

        if let Some(order) = order {
            let invalid = || RequestError::InvalidOrder {
                value: order.join(","),
            };
            match order.as_slice() {
                [name] if !name.is_empty() => {
                    params.order_name = Some(name.clone());
                }
                [name, direction] if !name.is_empty() => {
                    params.order_name = Some(name.clone());
                    params.order_direction =
                        Some(OrderDirection::parse(direction).ok_or_else(invalid)?);
                }
                _ => return Err(invalid()),
            }
        }

        Ok(params)
    }
}

fn first(values: Option<Vec<String>>) -> Option<String> {
    values.and_then(|v| v.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query() {
        assert!(parse_query_string("").unwrap().is_empty());
        assert!(parse_query_string("   ").unwrap().is_empty());
    }

    #[test]
    fn splits_values_and_merges_repeated_keys() {
        let query = parse_query_string("f=bar,bazz.plugh&f=foo&x=1").unwrap();
        assert_eq!(query["f"], vec!["bar", "bazz.plugh", "foo"]);
        assert_eq!(query["x"], vec!["1"]);
    }

    #[test]
    fn decodes_each_piece_after_splitting() {
        let query = parse_query_string("f=%5B%22bazz%22%2C%22waldo%22%5D,foo").unwrap();
        assert_eq!(query["f"], vec![r#"["bazz","waldo"]"#, "foo"]);
    }

    #[test]
    fn plus_is_literal() {
        let query = parse_query_string("q=a+b").unwrap();
        assert_eq!(query["q"], vec!["a+b"]);
    }

    #[test]
    fn empty_value_is_kept() {
        let query = parse_query_string("f=").unwrap();
        assert_eq!(query["f"], vec![""]);
    }

    #[test]
    fn pair_without_equals_errors() {
        assert!(matches!(
            parse_query_string("f=bar&oops"),
            Err(RequestError::MalformedQueryPair { pair }) if pair == "oops"
        ));
    }

    #[test]
    fn invalid_encoding_errors() {
        assert!(matches!(
            parse_query_string("f=%FF"),
            Err(RequestError::InvalidEncoding { .. })
        ));
    }

    #[test]
    fn list_params_are_removed_from_query() {
        let mut query = parse_query_string("after=2&limit=3&order=name,desc&tag=x").unwrap();
        let params = ListParams::take_from(&mut query).unwrap();

        assert_eq!(params.after.as_deref(), Some("2"));
        assert_eq!(params.before, None);
        assert_eq!(params.limit, Some(3));
        assert_eq!(params.order_name.as_deref(), Some("name"));
        assert_eq!(params.order_direction, Some(OrderDirection::Descending));
        assert_eq!(query.keys().collect::<Vec<_>>(), vec!["tag"]);
    }

    #[test]
    fn every_list_key_is_consumed() {
        let mut query =
            parse_query_string("after=a&before=b&limit=1&order=name&f=id&tag=x").unwrap();
        ListParams::take_from(&mut query).unwrap();

        assert!(LIST_KEYS.iter().all(|key| !query.contains_key(*key)));
        assert_eq!(query.keys().collect::<Vec<_>>(), vec!["f", "tag"]);
    }

    #[test]
    fn order_without_direction() {
        let mut query = parse_query_string("order=name").unwrap();
        let params = ListParams::take_from(&mut query).unwrap();
        assert_eq!(params.order_name.as_deref(), Some("name"));
        assert_eq!(params.order_direction, None);
    }

    #[test]
    fn numeric_directions() {
        assert_eq!(OrderDirection::parse("1"), Some(OrderDirection::Ascending));
        assert_eq!(OrderDirection::parse("-1"), Some(OrderDirection::Descending));
        assert_eq!(OrderDirection::Descending.sign(), -1);
    }

    #[test]
    fn invalid_order_errors() {
        for qs in ["order=name,sideways", "order=", "order=a,b,c"] {
            let mut query = parse_query_string(qs).unwrap();
            assert!(
                matches!(
                    ListParams::take_from(&mut query),
                    Err(RequestError::InvalidOrder { .. })
                ),
                "{qs}"
            );
        }
    }

    #[test]
    fn invalid_limit_errors() {
        let mut query = parse_query_string("limit=ten").unwrap();
        assert!(matches!(
            ListParams::take_from(&mut query),
            Err(RequestError::InvalidLimit { value }) if value == "ten"
        ));
    }
}
