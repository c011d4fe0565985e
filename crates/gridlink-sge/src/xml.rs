//! SOAP envelope helpers.

pub use gridlink_core::xml::XmlNode;

/// Wrap a serialized body in a SOAP 1.1 envelope.
pub fn soap_envelope(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body>{body}</soapenv:Body></soapenv:Envelope>"#
    )
}

/// Render one element with text content, escaping the text.
pub fn element(name: &str, text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    format!("<{name}>{escaped}</{name}>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_element_text() {
        assert_eq!(element("nom", "R&D <SA>"), "<nom>R&amp;D &lt;SA&gt;</nom>");
    }

    #[test]
    fn envelope_wraps_body() {
        let envelope = soap_envelope("<demande/>");
        assert!(envelope.starts_with("<?xml"));
        assert!(envelope.contains("<soapenv:Body><demande/></soapenv:Body>"));
    }
}
