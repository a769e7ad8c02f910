// MIT License

//! Outbound command construction. Pure string building, no network access
//! and no knowledge of which devices or properties actually exist — the
//! gateway rejects commands for unknown targets.

use std::fmt::Write;

use quick_xml::escape::escape;

use crate::devices::element::SwitchState;

/// INDI protocol version announced in the discovery command.
pub const PROTOCOL_VERSION: &str = "1.7";

/// Standard property/element names used by the connection toggle.
const CONNECTION_PROPERTY: &str = "CONNECTION";
const CONNECT_ELEMENT: &str = "CONNECT";
const DISCONNECT_ELEMENT: &str = "DISCONNECT";

/// Commands that can be sent to an INDI gateway.
///
/// Element values are carried as ordered `(name, value)` pairs; the emitted
/// XML preserves that order. All names and values are XML-escaped, so a
/// label containing `<` or `&` cannot break the frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `<getProperties version="1.7" />` — initial discovery, sent right
    /// after the transport opens.
    GetProperties,
    /// Toggle the CONNECT/DISCONNECT pair of a device's CONNECTION vector.
    SetConnection { device: String, connect: bool },
    /// `<newNumberVector>` with one `<oneNumber>` per entry.
    NewNumberVector {
        device: String,
        property: String,
        values: Vec<(String, f64)>,
    },
    /// `<newSwitchVector>` with one `<oneSwitch>` per entry.
    NewSwitchVector {
        device: String,
        property: String,
        values: Vec<(String, SwitchState)>,
    },
    /// `<newTextVector>` with one `<oneText>` per entry.
    NewTextVector {
        device: String,
        property: String,
        values: Vec<(String, String)>,
    },
    /// Pre-built frame passed through unchanged.
    Raw(String),
}

impl Command {
    /// Build the outbound XML frame for this command.
    pub fn to_xml(&self) -> String {
        match self {
            Command::GetProperties => {
                format!("<getProperties version=\"{PROTOCOL_VERSION}\" />")
            }
            Command::SetConnection { device, connect } => {
                let (on, off) = if *connect {
                    (CONNECT_ELEMENT, DISCONNECT_ELEMENT)
                } else {
                    (DISCONNECT_ELEMENT, CONNECT_ELEMENT)
                };
                Command::NewSwitchVector {
                    device: device.clone(),
                    property: CONNECTION_PROPERTY.to_string(),
                    values: vec![
                        (on.to_string(), SwitchState::On),
                        (off.to_string(), SwitchState::Off),
                    ],
                }
                .to_xml()
            }
            Command::NewNumberVector {
                device,
                property,
                values,
            } => new_vector(
                "Number",
                device,
                property,
                values.iter().map(|(n, v)| (n.as_str(), v.to_string())),
            ),
            Command::NewSwitchVector {
                device,
                property,
                values,
            } => new_vector(
                "Switch",
                device,
                property,
                values.iter().map(|(n, v)| (n.as_str(), v.as_str().to_string())),
            ),
            Command::NewTextVector {
                device,
                property,
                values,
            } => new_vector(
                "Text",
                device,
                property,
                values.iter().map(|(n, v)| (n.as_str(), v.clone())),
            ),
            Command::Raw(frame) => frame.clone(),
        }
    }
}

/// Emit a `new<Kind>Vector` frame with one `one<Kind>` child per value.
fn new_vector<'a>(
    kind: &str,
    device: &str,
    property: &str,
    values: impl Iterator<Item = (&'a str, String)>,
) -> String {
    let mut xml = format!(
        "<new{kind}Vector device=\"{}\" name=\"{}\">",
        escape(device),
        escape(property)
    );
    for (name, value) in values {
        let _ = write!(
            xml,
            "<one{kind} name=\"{}\">{}</one{kind}>",
            escape(name),
            escape(value.as_str())
        );
    }
    let _ = write!(xml, "</new{kind}Vector>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_properties() {
        assert_eq!(
            Command::GetProperties.to_xml(),
            "<getProperties version=\"1.7\" />"
        );
    }

    #[test]
    fn test_set_connection_on() {
        let xml = Command::SetConnection {
            device: "CCD".to_string(),
            connect: true,
        }
        .to_xml();
        assert_eq!(
            xml,
            "<newSwitchVector device=\"CCD\" name=\"CONNECTION\">\
             <oneSwitch name=\"CONNECT\">On</oneSwitch>\
             <oneSwitch name=\"DISCONNECT\">Off</oneSwitch>\
             </newSwitchVector>"
        );
    }

    #[test]
    fn test_set_connection_off() {
        let xml = Command::SetConnection {
            device: "CCD".to_string(),
            connect: false,
        }
        .to_xml();
        assert!(xml.contains("<oneSwitch name=\"DISCONNECT\">On</oneSwitch>"));
        assert!(xml.contains("<oneSwitch name=\"CONNECT\">Off</oneSwitch>"));
    }

    #[test]
    fn test_new_number_vector_preserves_order() {
        let xml = Command::NewNumberVector {
            device: "Mount".to_string(),
            property: "EQUATORIAL_EOD_COORD".to_string(),
            values: vec![("RA".to_string(), 5.5), ("DEC".to_string(), -10.0)],
        }
        .to_xml();
        assert_eq!(
            xml,
            "<newNumberVector device=\"Mount\" name=\"EQUATORIAL_EOD_COORD\">\
             <oneNumber name=\"RA\">5.5</oneNumber>\
             <oneNumber name=\"DEC\">-10</oneNumber>\
             </newNumberVector>"
        );
    }

    #[test]
    fn test_new_text_vector() {
        let xml = Command::NewTextVector {
            device: "Mount".to_string(),
            property: "TIME_UTC".to_string(),
            values: vec![("UTC".to_string(), "2024-06-01T12:00:00".to_string())],
        }
        .to_xml();
        assert!(xml.starts_with("<newTextVector device=\"Mount\" name=\"TIME_UTC\">"));
        assert!(xml.contains("<oneText name=\"UTC\">2024-06-01T12:00:00</oneText>"));
    }

    #[test]
    fn test_values_are_escaped() {
        let xml = Command::NewTextVector {
            device: "A&B".to_string(),
            property: "P\"Q".to_string(),
            values: vec![("EL".to_string(), "a<b & c".to_string())],
        }
        .to_xml();
        assert_eq!(
            xml,
            "<newTextVector device=\"A&amp;B\" name=\"P&quot;Q\">\
             <oneText name=\"EL\">a&lt;b &amp; c</oneText>\
             </newTextVector>"
        );
    }

    #[test]
    fn test_raw_passthrough() {
        let frame = "<enableBLOB device=\"CCD\">Also</enableBLOB>";
        assert_eq!(Command::Raw(frame.to_string()).to_xml(), frame);
    }
}
