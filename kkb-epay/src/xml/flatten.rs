//! Collapsing the parser's verbose shape into plain records.

use super::node::{ATTRIBUTES_KEY, XmlMap, XmlValue};

/// Flattens a parsed node into a plain record.
///
/// Rules, applied recursively:
///
/// - a one-element sequence collapses to its flattened element
/// - a longer sequence flattens its first element in place and attaches every
///   further element under its index as a string key (`"1"`, `"2"`, ...); a scalar
///   first element has no record to merge into and is kept under `"0"`
/// - an empty sequence becomes an empty map
/// - attributes are merged into the surrounding record instead of staying under
///   [`ATTRIBUTES_KEY`]
/// - scalars pass through unchanged
///
/// Index keys can collide with element or attribute names; a later key overwrites
/// an earlier one.
///
/// # Examples
///
/// ```
/// use kkb_epay::xml::{XmlValue, flatten, parse};
///
/// let doc = parse(r#"<response order_id="123456"><session id="42"/></response>"#).unwrap();
/// let flat = flatten(&doc);
/// assert_eq!(flat.path(&["response", "order_id"]).and_then(XmlValue::as_str), Some("123456"));
/// assert_eq!(flat.path(&["response", "session", "id"]).and_then(XmlValue::as_str), Some("42"));
/// ```
#[must_use]
pub fn flatten(node: &XmlValue) -> XmlValue {
    match node {
        XmlValue::Scalar(_) => node.clone(),
        XmlValue::Sequence(items) => flatten_sequence(items),
        XmlValue::Map(map) => XmlValue::Map(flatten_map(map)),
    }
}

fn flatten_sequence(items: &[XmlValue]) -> XmlValue {
    let Some((first, rest)) = items.split_first() else {
        return XmlValue::map();
    };
    if rest.is_empty() {
        return flatten(first);
    }

    let mut record = match flatten(first) {
        XmlValue::Map(map) => map,
        other => XmlMap::from([("0".to_owned(), other)]),
    };
    for (index, item) in rest.iter().enumerate() {
        record.insert((index + 1).to_string(), flatten(item));
    }
    XmlValue::Map(record)
}

fn flatten_map(map: &XmlMap) -> XmlMap {
    let mut record = XmlMap::with_capacity(map.len());
    for (key, value) in map {
        if key == ATTRIBUTES_KEY
            && let XmlValue::Map(attrs) = value
        {
            for (name, attr) in attrs {
                record.insert(name.clone(), flatten(attr));
            }
        } else {
            record.insert(key.clone(), flatten(value));
        }
    }
    record
}
