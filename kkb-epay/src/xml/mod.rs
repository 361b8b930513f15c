//! Canonical XML codec.
//!
//! The gateway speaks single-line XML documents. This module converts between that
//! text and a generic [`XmlValue`] tree:
//!
//! - [`encode`]: node to XML fragment, used to build the signed `<merchant>` element
//! - [`parse`]: XML text to node, used on every bank response
//! - [`flatten`]: collapses parsed nodes into plain records
//!
//! The node shape mirrors the classic attributes-under-`$`, text-under-`_`
//! convention, so responses can be inspected with the same paths the gateway
//! documentation uses.
//!
//! # Examples
//!
//! ```
//! use kkb_epay::xml::{XmlValue, encode, flatten, parse};
//!
//! # fn example() -> kkb_epay::error::Result<()> {
//! let doc = parse(r#"<merchant id="92061101"><command type="complete"/></merchant>"#)?;
//! let merchant = doc.get("merchant").unwrap();
//!
//! // Encoding a parsed element reproduces the original fragment.
//! assert_eq!(encode("merchant", merchant)?, r#"<merchant id="92061101"><command type="complete"/></merchant>"#);
//!
//! let flat = flatten(merchant);
//! assert_eq!(flat.path(&["command", "type"]).and_then(XmlValue::as_str), Some("complete"));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod encode;
mod flatten;
mod node;
mod parse;

pub use encode::encode;
pub use flatten::flatten;
pub use node::{ATTRIBUTES_KEY, TEXT_KEY, XmlMap, XmlValue, attributes};
pub use parse::parse;
