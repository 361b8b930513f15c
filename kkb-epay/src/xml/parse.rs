//! XML text to [`XmlValue`].

use roxmltree::{Document, Node};
use tracing::trace;

use super::node::{ATTRIBUTES_KEY, TEXT_KEY, XmlMap, XmlValue};
use crate::error::{EpayError, Result};

/// Parses XML text into the canonical node shape.
///
/// The result is a map with a single key, the root tag, whose value is the root
/// element. Below the root every child element is collected into a
/// [`XmlValue::Sequence`] under its tag, even when it occurs once. Attributes go
/// under [`ATTRIBUTES_KEY`]. An element without attributes or children becomes a
/// plain scalar of its text; otherwise non-blank text is kept under [`TEXT_KEY`].
///
/// Names are local names: a namespace prefix is dropped and `xmlns` declarations
/// are not reported as attributes. Gateway documents carry no namespaces.
///
/// # Errors
///
/// - [`EpayError::InvalidInput`] if `xml` is empty
/// - [`EpayError::MalformedXml`] if `xml` is not well-formed
///
/// # Examples
///
/// ```
/// use kkb_epay::xml::{XmlValue, parse};
///
/// let doc = parse(r#"<document><bank name="Kazkom"></bank></document>"#).unwrap();
/// let bank = doc.path(&["document", "bank"]).and_then(XmlValue::as_sequence).unwrap();
/// assert_eq!(bank[0].path(&["$", "name"]).and_then(XmlValue::as_str), Some("Kazkom"));
/// ```
pub fn parse(xml: &str) -> Result<XmlValue> {
    if xml.is_empty() {
        return Err(EpayError::InvalidInput("XML text must be non-empty string".to_owned()));
    }

    let document = Document::parse(xml).map_err(|e| EpayError::MalformedXml(e.to_string()))?;
    let root = document.root_element();
    trace!(root = root.tag_name().name(), "parsed XML document");

    let mut top = XmlMap::with_capacity(1);
    top.insert(root.tag_name().name().to_owned(), element_value(root));
    Ok(XmlValue::Map(top))
}

fn element_value(element: Node<'_, '_>) -> XmlValue {
    let mut attrs = XmlMap::new();
    for attr in element.attributes() {
        attrs.insert(attr.name().to_owned(), XmlValue::Scalar(attr.value().to_owned()));
    }

    let mut children = XmlMap::new();
    let mut text = String::new();
    for child in element.children() {
        if child.is_element() {
            let entry = children
                .entry(child.tag_name().name().to_owned())
                .or_insert_with(|| XmlValue::Sequence(Vec::new()));
            if let XmlValue::Sequence(items) = entry {
                items.push(element_value(child));
            }
        } else if child.is_text()
            && let Some(chunk) = child.text()
        {
            text.push_str(chunk);
        }
    }

    if attrs.is_empty() && children.is_empty() {
        return XmlValue::Scalar(text);
    }

    let mut node = XmlMap::with_capacity(children.len() + 2);
    if !attrs.is_empty() {
        node.insert(ATTRIBUTES_KEY.to_owned(), XmlValue::Map(attrs));
    }
    if !text.trim().is_empty() {
        node.insert(TEXT_KEY.to_owned(), XmlValue::Scalar(text));
    }
    node.extend(children);
    XmlValue::Map(node)
}
