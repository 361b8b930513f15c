//! [`XmlValue`] to single-line XML text.

use std::fmt::Write as _;

use super::node::{ATTRIBUTES_KEY, TEXT_KEY, XmlValue};
use crate::error::{EpayError, Result};

/// Encodes `node` as an XML fragment rooted at `root`.
///
/// No whitespace or newlines are inserted. Children are written in the node's key
/// order. A [`XmlValue::Sequence`] becomes repeated elements with the same tag.
/// Elements without text or children are written self-closing.
///
/// The output of this function is the exact byte sequence that gets signed, so it
/// must stay stable for a given node.
///
/// # Errors
///
/// Returns [`EpayError::InvalidInput`] if a tag is empty or the attributes entry is
/// not a map of scalars.
///
/// # Examples
///
/// ```
/// use kkb_epay::xml::{ATTRIBUTES_KEY, XmlValue, attributes, encode};
///
/// let node = XmlValue::from_pairs([
///     (ATTRIBUTES_KEY, attributes([("a", "1"), ("b", "2")])),
///     ("t", XmlValue::from("3")),
/// ]);
/// assert_eq!(encode("root", &node).unwrap(), r#"<root a="1" b="2"><t>3</t></root>"#);
/// ```
pub fn encode(root: &str, node: &XmlValue) -> Result<String> {
    let mut out = String::new();
    write_element(&mut out, root, node)?;
    Ok(out)
}

fn write_element(out: &mut String, tag: &str, value: &XmlValue) -> Result<()> {
    if tag.is_empty() {
        return Err(EpayError::InvalidInput("element name must be non-empty".to_owned()));
    }

    match value {
        XmlValue::Scalar(text) if text.is_empty() => {
            let _ = write!(out, "<{tag}/>");
        }
        XmlValue::Scalar(text) => {
            let _ = write!(out, "<{tag}>{}</{tag}>", escape_text(text));
        }
        XmlValue::Sequence(items) => {
            for item in items {
                write_element(out, tag, item)?;
            }
        }
        XmlValue::Map(map) => {
            out.push('<');
            out.push_str(tag);
            if let Some(attrs) = map.get(ATTRIBUTES_KEY) {
                write_attributes(out, tag, attrs)?;
            }

            let mut body = String::new();
            for (key, child) in map {
                match key.as_str() {
                    ATTRIBUTES_KEY => {}
                    TEXT_KEY => {
                        let text = child.as_str().ok_or_else(|| {
                            EpayError::InvalidInput(format!("text of <{tag}> must be a scalar"))
                        })?;
                        body.push_str(&escape_text(text));
                    }
                    _ => write_element(&mut body, key, child)?,
                }
            }

            if body.is_empty() {
                out.push_str("/>");
            } else {
                let _ = write!(out, ">{body}</{tag}>");
            }
        }
    }
    Ok(())
}

fn write_attributes(out: &mut String, tag: &str, attrs: &XmlValue) -> Result<()> {
    let attrs = attrs
        .as_map()
        .ok_or_else(|| EpayError::InvalidInput(format!("attributes of <{tag}> must be a map")))?;

    for (name, value) in attrs {
        let value = value.as_str().ok_or_else(|| {
            EpayError::InvalidInput(format!("attribute `{name}` of <{tag}> must be a scalar"))
        })?;
        let _ = write!(out, " {name}=\"{}\"", escape_attr(value));
    }
    Ok(())
}

/// Escapes text content.
fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escapes an attribute value for double-quoted output. `>` is left as is.
fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{attributes, parse};

    #[test]
    fn test_encode_children_in_order() {
        let node = XmlValue::from_pairs([("a", XmlValue::from("1")), ("b", XmlValue::from("2"))]);
        assert_eq!(encode("root", &node).unwrap(), "<root><a>1</a><b>2</b></root>");
    }

    #[test]
    fn test_encode_does_not_reorder() {
        let node = XmlValue::from_pairs([("z", XmlValue::from("1")), ("a", XmlValue::from("2"))]);
        assert_eq!(encode("root", &node).unwrap(), "<root><z>1</z><a>2</a></root>");
    }

    #[test]
    fn test_encode_attributes_and_child() {
        let node = XmlValue::from_pairs([
            (ATTRIBUTES_KEY, attributes([("a", "1"), ("b", "2")])),
            ("t", XmlValue::from("3")),
        ]);
        assert_eq!(encode("root", &node).unwrap(), r#"<root a="1" b="2"><t>3</t></root>"#);
    }

    #[test]
    fn test_encode_self_closing() {
        let node = XmlValue::from_pairs([(ATTRIBUTES_KEY, attributes([("merchant_id", "92061101")]))]);
        assert_eq!(encode("department", &node).unwrap(), r#"<department merchant_id="92061101"/>"#);
        assert_eq!(encode("empty", &XmlValue::from("")).unwrap(), "<empty/>");
    }

    #[test]
    fn test_encode_sequence_repeats_tag() {
        let node = XmlValue::from_pairs([(
            "item",
            XmlValue::Sequence(vec![XmlValue::from("a"), XmlValue::from("b")]),
        )]);
        assert_eq!(encode("list", &node).unwrap(), "<list><item>a</item><item>b</item></list>");
    }

    #[test]
    fn test_encode_text_key() {
        let node = XmlValue::from_pairs([
            (ATTRIBUTES_KEY, attributes([("type", "RSA")])),
            (TEXT_KEY, XmlValue::from("c2ln")),
        ]);
        assert_eq!(encode("merchant_sign", &node).unwrap(), r#"<merchant_sign type="RSA">c2ln</merchant_sign>"#);
    }

    #[test]
    fn test_encode_escapes() {
        let node = XmlValue::from_pairs([
            (ATTRIBUTES_KEY, attributes([("name", "A&B \"shop\"")])),
            (TEXT_KEY, XmlValue::from("1 < 2")),
        ]);
        assert_eq!(
            encode("merchant", &node).unwrap(),
            r#"<merchant name="A&amp;B &quot;shop&quot;">1 &lt; 2</merchant>"#
        );
    }

    #[test]
    fn test_encode_attribute_keeps_greater_than() {
        let node = attributes([("name", "Shop > Almaty <1>")]);
        let xml = encode("merchant", &node).unwrap();
        assert_eq!(xml, r#"<merchant name="Shop > Almaty &lt;1>"/>"#);
        assert_eq!(
            parse(&xml).unwrap().path(&["merchant", "$", "name"]).and_then(XmlValue::as_str),
            Some("Shop > Almaty <1>")
        );
    }

    #[test]
    fn test_encode_rejects_nested_attribute() {
        let node = XmlValue::from_pairs([(
            ATTRIBUTES_KEY,
            XmlValue::from_pairs([("a", XmlValue::map())]),
        )]);
        assert!(matches!(encode("root", &node).unwrap_err(), EpayError::InvalidInput(_)));
    }

    #[test]
    fn test_encode_rejects_empty_tag() {
        assert!(matches!(encode("", &XmlValue::from("x")).unwrap_err(), EpayError::InvalidInput(_)));
    }

    #[test]
    fn test_encode_parses_back() {
        let xml = r#"<merchant cert_id="00C182B189" name="Test shop"><order order_id="000333" amount="500" currency="398"><department merchant_id="92061101" amount="500"/></order></merchant>"#;
        let doc = parse(xml).unwrap();
        let merchant = doc.get("merchant").unwrap();
        assert_eq!(encode("merchant", merchant).unwrap(), xml);
    }
}
