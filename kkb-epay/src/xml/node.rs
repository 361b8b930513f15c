//! Generic in-memory XML element shape.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Reserved key holding an element's attributes.
pub const ATTRIBUTES_KEY: &str = "$";

/// Reserved key holding an element's text content when it also has attributes
/// or children.
pub const TEXT_KEY: &str = "_";

/// Insertion-ordered mapping from child tag (or reserved key) to value.
pub type XmlMap = IndexMap<String, XmlValue>;

/// One node of the canonical XML shape.
///
/// Parsing produces, and encoding consumes, a tree of these values:
///
/// - [`Scalar`](Self::Scalar): text content or an attribute value
/// - [`Sequence`](Self::Sequence): repeated child elements sharing one tag
/// - [`Map`](Self::Map): an element, keyed by child tag, with attributes under
///   [`ATTRIBUTES_KEY`] and text under [`TEXT_KEY`]
///
/// Map order is insertion order and is preserved by every operation in this crate.
///
/// # Examples
///
/// ```
/// use kkb_epay::xml::{XmlValue, attributes, ATTRIBUTES_KEY};
///
/// let payment = XmlValue::from_pairs([
///     (ATTRIBUTES_KEY, attributes([("amount", "500"), ("currency_code", "398")])),
///     ("reason", XmlValue::from("Return payment")),
/// ]);
///
/// assert_eq!(payment.path(&["reason"]).and_then(XmlValue::as_str), Some("Return payment"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum XmlValue {
    /// Text content or attribute value.
    Scalar(String),
    /// Repeated elements, in document order.
    Sequence(Vec<XmlValue>),
    /// Element with attributes, text and children.
    Map(XmlMap),
}

impl XmlValue {
    /// Creates an empty map node.
    #[must_use]
    pub fn map() -> Self {
        Self::Map(XmlMap::new())
    }

    /// Creates a map node from key/value pairs, preserving their order.
    #[must_use]
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, XmlValue)>,
        K: Into<String>,
    {
        pairs.into_iter().collect()
    }

    /// Returns the string if this is a scalar.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the map if this is a map node.
    #[must_use]
    pub const fn as_map(&self) -> Option<&XmlMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the items if this is a sequence.
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[XmlValue]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Consumes the value, returning the map if this is a map node.
    #[must_use]
    pub fn into_map(self) -> Option<XmlMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Looks up a key of a map node.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&XmlValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Walks nested map nodes along `keys`.
    ///
    /// Sequences are not traversed; index them explicitly or [`flatten`] first.
    ///
    /// [`flatten`]: crate::xml::flatten
    #[must_use]
    pub fn path(&self, keys: &[&str]) -> Option<&XmlValue> {
        keys.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Returns the text content of this node.
    ///
    /// A scalar is its own text; a map node yields its [`TEXT_KEY`] entry.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::Map(m) => m.get(TEXT_KEY).and_then(Self::as_str),
            Self::Sequence(_) => None,
        }
    }
}

impl From<&str> for XmlValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_owned())
    }
}

impl From<String> for XmlValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<XmlMap> for XmlValue {
    fn from(value: XmlMap) -> Self {
        Self::Map(value)
    }
}

impl From<Vec<XmlValue>> for XmlValue {
    fn from(value: Vec<XmlValue>) -> Self {
        Self::Sequence(value)
    }
}

impl<K: Into<String>> FromIterator<(K, XmlValue)> for XmlValue {
    fn from_iter<I: IntoIterator<Item = (K, XmlValue)>>(iter: I) -> Self {
        Self::Map(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Builds an attribute map from name/value pairs, preserving their order.
#[must_use]
pub fn attributes<I, K, V>(pairs: I) -> XmlValue
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    XmlValue::Map(pairs.into_iter().map(|(k, v)| (k.into(), XmlValue::Scalar(v.into()))).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_walks_maps() {
        let node = XmlValue::from_pairs([(
            "results",
            XmlValue::from_pairs([("payment", attributes([("code", "00")]))]),
        )]);

        assert_eq!(node.path(&["results", "payment", "code"]).and_then(XmlValue::as_str), Some("00"));
        assert!(node.path(&["results", "missing"]).is_none());
    }

    #[test]
    fn test_path_does_not_enter_sequences() {
        let node = XmlValue::from_pairs([("items", XmlValue::Sequence(vec![XmlValue::map()]))]);
        assert!(node.path(&["items", "0"]).is_none());
    }

    #[test]
    fn test_text_of_map_and_scalar() {
        let with_attrs = XmlValue::from_pairs([
            (ATTRIBUTES_KEY, attributes([("type", "RSA")])),
            (TEXT_KEY, XmlValue::from("c2ln")),
        ]);
        assert_eq!(with_attrs.text(), Some("c2ln"));
        assert_eq!(XmlValue::from("plain").text(), Some("plain"));
        assert_eq!(XmlValue::Sequence(vec![]).text(), None);
    }

    #[test]
    fn test_attributes_preserve_order() {
        let attrs = attributes([("z", "1"), ("a", "2")]);
        let keys: Vec<&str> = attrs.as_map().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a"]);
    }

    #[test]
    fn test_serialize_untagged() {
        let node = XmlValue::from_pairs([
            (ATTRIBUTES_KEY, attributes([("name", "Kazkom")])),
            ("items", XmlValue::Sequence(vec!["a".into(), "b".into()])),
        ]);

        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(json, r#"{"$":{"name":"Kazkom"},"items":["a","b"]}"#);

        let back: XmlValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}
