// MIT License

//! Wire decoder: one inbound XML frame in, one structured [`Message`] out.
//!
//! INDI frames are single top-level XML elements. The decoder normalizes
//! every shape quirk at this boundary: one child or many children both
//! become a `Vec`, children without a `name` attribute are skipped, and
//! absent attributes take their protocol defaults. Internal code never
//! sees the raw XML.

use std::collections::HashMap;

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;
use tracing::debug;

use crate::devices::element::{Permission, PropertyKind, PropertyState, SwitchRule};

/// A frame that could not be decoded. Reported to subscribers as a
/// non-fatal `parse` error; the frame is dropped and the connection lives on.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    Attr(#[from] AttrError),

    #[error("empty frame")]
    EmptyFrame,

    #[error("frame truncated inside <{0}>")]
    Truncated(String),

    #[error("unexpected element: {0}")]
    UnexpectedTag(String),

    #[error("<{tag}> missing required attribute {attr:?}")]
    MissingAttribute { tag: String, attr: &'static str },
}

/// One child element as it appeared on the wire.
///
/// Definition messages populate the metadata fields; set messages carry
/// only `name` and `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct WireElement {
    pub name: String,
    pub label: Option<String>,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub format: Option<String>,
    pub value: String,
}

/// A property definition: full metadata plus the initial element set.
#[derive(Debug, Clone, PartialEq)]
pub struct DefineVector {
    pub device: String,
    pub name: String,
    pub label: String,
    pub group: String,
    pub state: PropertyState,
    pub perm: Permission,
    pub rule: Option<SwitchRule>,
    pub timeout: f64,
    pub timestamp: Option<String>,
    pub kind: PropertyKind,
    pub elements: Vec<WireElement>,
}

/// A property update: new values for existing elements only.
#[derive(Debug, Clone, PartialEq)]
pub struct SetVector {
    pub device: String,
    pub name: String,
    pub state: Option<PropertyState>,
    pub timeout: Option<f64>,
    pub timestamp: Option<String>,
    pub kind: PropertyKind,
    pub elements: Vec<WireElement>,
}

/// A human-readable message from a device or the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolMessage {
    pub device: Option<String>,
    pub timestamp: Option<String>,
    pub text: String,
}

/// A deletion. Both attributes absent clears everything; a device without
/// a property name deletes the whole device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelProperty {
    pub device: Option<String>,
    pub property: Option<String>,
}

/// One decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Define(DefineVector),
    Set(SetVector),
    Message(ProtocolMessage),
    DelProperty(DelProperty),
}

/// Decode a single inbound XML frame into a structured message.
pub fn decode(frame: &str) -> Result<Message, DecodeError> {
    let mut reader = Reader::from_str(frame);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => continue,
            Event::Start(start) => {
                let start = start.into_owned();
                return decode_root(&mut reader, &start, false);
            }
            Event::Empty(start) => {
                let start = start.into_owned();
                return decode_root(&mut reader, &start, true);
            }
            Event::Eof => return Err(DecodeError::EmptyFrame),
            other => {
                return Err(DecodeError::UnexpectedTag(format!("{:?}", other)));
            }
        }
    }
}

fn decode_root(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart<'static>,
    is_empty: bool,
) -> Result<Message, DecodeError> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let attrs = read_attrs(start)?;

    match tag.as_str() {
        "message" => {
            if !is_empty {
                reader.read_to_end(start.name())?;
            }
            Ok(Message::Message(ProtocolMessage {
                device: attrs.get("device").cloned(),
                timestamp: attrs.get("timestamp").cloned(),
                text: attrs.get("message").cloned().unwrap_or_default(),
            }))
        }
        "delProperty" => {
            if !is_empty {
                reader.read_to_end(start.name())?;
            }
            Ok(Message::DelProperty(DelProperty {
                device: attrs.get("device").cloned(),
                property: attrs.get("name").cloned(),
            }))
        }
        _ => {
            let (is_def, kind) =
                classify_vector(&tag).ok_or_else(|| DecodeError::UnexpectedTag(tag.clone()))?;

            let device = require_attr(&attrs, &tag, "device")?;
            let name = require_attr(&attrs, &tag, "name")?;
            let elements = if is_empty {
                Vec::new()
            } else {
                read_children(reader, &tag)?
            };

            if is_def {
                Ok(Message::Define(DefineVector {
                    label: attrs
                        .get("label")
                        .filter(|l| !l.is_empty())
                        .cloned()
                        .unwrap_or_else(|| name.clone()),
                    group: attrs.get("group").cloned().unwrap_or_default(),
                    state: attrs
                        .get("state")
                        .map(|s| PropertyState::from_wire(s))
                        .unwrap_or_default(),
                    perm: attrs
                        .get("perm")
                        .map(|p| Permission::from_wire(p))
                        .unwrap_or_default(),
                    rule: match kind {
                        PropertyKind::Switch => Some(
                            attrs
                                .get("rule")
                                .map(|r| SwitchRule::from_wire(r))
                                .unwrap_or_default(),
                        ),
                        _ => None,
                    },
                    timeout: parse_f64_or_zero(attrs.get("timeout")),
                    timestamp: attrs.get("timestamp").cloned(),
                    device,
                    name,
                    kind,
                    elements,
                }))
            } else {
                Ok(Message::Set(SetVector {
                    state: attrs.get("state").map(|s| PropertyState::from_wire(s)),
                    timeout: attrs.get("timeout").and_then(|t| t.trim().parse().ok()),
                    timestamp: attrs.get("timestamp").cloned(),
                    device,
                    name,
                    kind,
                    elements,
                }))
            }
        }
    }
}

/// Map a vector tag name to (is_definition, element kind).
fn classify_vector(tag: &str) -> Option<(bool, PropertyKind)> {
    let (is_def, rest) = if let Some(rest) = tag.strip_prefix("def") {
        (true, rest)
    } else if let Some(rest) = tag.strip_prefix("set") {
        (false, rest)
    } else {
        return None;
    };

    let kind = match rest {
        "NumberVector" => PropertyKind::Number,
        "SwitchVector" => PropertyKind::Switch,
        "TextVector" => PropertyKind::Text,
        "LightVector" => PropertyKind::Light,
        "BLOBVector" => PropertyKind::Blob,
        _ => return None,
    };
    Some((is_def, kind))
}

/// Child tags carrying element data. Definitions use `def*`, sets use
/// `one*`; some gateways re-emit definitions with `one*` children, so both
/// spellings are accepted on either message.
fn is_element_tag(tag: &str) -> bool {
    matches!(
        tag,
        "oneNumber"
            | "oneSwitch"
            | "oneText"
            | "oneLight"
            | "oneBLOB"
            | "defNumber"
            | "defSwitch"
            | "defText"
            | "defLight"
            | "defBLOB"
    )
}

fn read_children(
    reader: &mut Reader<&[u8]>,
    parent_tag: &str,
) -> Result<Vec<WireElement>, DecodeError> {
    let mut elements = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(child) => {
                let child = child.into_owned();
                let tag = String::from_utf8_lossy(child.name().as_ref()).into_owned();
                if !is_element_tag(&tag) {
                    debug!(tag, "skipping unknown child element");
                    reader.read_to_end(child.name())?;
                    continue;
                }
                let attrs = read_attrs(&child)?;
                let value = read_text(reader, child.name())?;
                push_element(&mut elements, &tag, attrs, value);
            }
            Event::Empty(child) => {
                let tag = String::from_utf8_lossy(child.name().as_ref()).into_owned();
                if !is_element_tag(&tag) {
                    debug!(tag, "skipping unknown child element");
                    continue;
                }
                let attrs = read_attrs(&child)?;
                push_element(&mut elements, &tag, attrs, String::new());
            }
            Event::End(_) => break,
            Event::Eof => return Err(DecodeError::Truncated(parent_tag.to_string())),
            _ => {}
        }
    }

    Ok(elements)
}

fn push_element(
    elements: &mut Vec<WireElement>,
    tag: &str,
    attrs: HashMap<String, String>,
    value: String,
) {
    // Malformed children without a name cannot be matched to anything;
    // skip them rather than failing the whole frame.
    let Some(name) = attrs.get("name").cloned() else {
        debug!(tag, "skipping child element without name attribute");
        return;
    };

    elements.push(WireElement {
        label: attrs.get("label").filter(|l| !l.is_empty()).cloned(),
        min: parse_f64_or_zero(attrs.get("min")),
        max: parse_f64_or_zero(attrs.get("max")),
        step: parse_f64_or_zero(attrs.get("step")),
        format: attrs.get("format").cloned(),
        name,
        value,
    });
}

/// Collect the text content of a child element up to its end tag.
fn read_text(reader: &mut Reader<&[u8]>, end: QName<'_>) -> Result<String, DecodeError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
            Event::End(_) => break,
            Event::Eof => {
                return Err(DecodeError::Truncated(
                    String::from_utf8_lossy(end.as_ref()).into_owned(),
                ))
            }
            _ => {}
        }
    }
    Ok(text.trim().to_string())
}

fn read_attrs(start: &BytesStart<'_>) -> Result<HashMap<String, String>, DecodeError> {
    let mut map = HashMap::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

fn require_attr(
    attrs: &HashMap<String, String>,
    tag: &str,
    attr: &'static str,
) -> Result<String, DecodeError> {
    attrs
        .get(attr)
        .cloned()
        .ok_or_else(|| DecodeError::MissingAttribute {
            tag: tag.to_string(),
            attr,
        })
}

/// Numeric attributes default to zero when absent or unparseable.
pub(crate) fn parse_f64_or_zero(value: Option<&String>) -> f64 {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_ok(frame: &str) -> Message {
        decode(frame).expect("frame should decode")
    }

    #[test]
    fn test_decode_def_number_vector() {
        let msg = decode_ok(
            r#"<defNumberVector device="Focuser" name="ABS_FOCUS_POSITION" label="Position" group="Main" state="Ok" perm="rw" timeout="60" timestamp="2024-01-01T00:00:00">
                 <oneNumber name="FOCUS_ABSOLUTE_POSITION" label="Ticks" min="0" max="60000" step="100" format="%.0f">31250</oneNumber>
               </defNumberVector>"#,
        );

        let Message::Define(def) = msg else {
            panic!("expected definition, got {msg:?}");
        };
        assert_eq!(def.device, "Focuser");
        assert_eq!(def.name, "ABS_FOCUS_POSITION");
        assert_eq!(def.label, "Position");
        assert_eq!(def.group, "Main");
        assert_eq!(def.state, PropertyState::Ok);
        assert_eq!(def.perm, Permission::ReadWrite);
        assert_eq!(def.timeout, 60.0);
        assert_eq!(def.kind, PropertyKind::Number);
        assert_eq!(def.elements.len(), 1);

        let el = &def.elements[0];
        assert_eq!(el.name, "FOCUS_ABSOLUTE_POSITION");
        assert_eq!(el.label.as_deref(), Some("Ticks"));
        assert_eq!(el.min, 0.0);
        assert_eq!(el.max, 60000.0);
        assert_eq!(el.step, 100.0);
        assert_eq!(el.format.as_deref(), Some("%.0f"));
        assert_eq!(el.value, "31250");
    }

    #[test]
    fn test_decode_defaults() {
        let msg = decode_ok(
            r#"<defNumberVector device="CCD" name="CCD_TEMPERATURE">
                 <oneNumber name="CCD_TEMPERATURE_VALUE">-10</oneNumber>
               </defNumberVector>"#,
        );
        let Message::Define(def) = msg else {
            panic!("expected definition");
        };
        // Missing attributes take protocol defaults.
        assert_eq!(def.label, "CCD_TEMPERATURE");
        assert_eq!(def.state, PropertyState::Idle);
        assert_eq!(def.perm, Permission::ReadWrite);
        assert_eq!(def.timeout, 0.0);
        assert!(def.timestamp.is_none());
        assert!(def.rule.is_none());

        let el = &def.elements[0];
        assert_eq!(el.min, 0.0);
        assert_eq!(el.max, 0.0);
        assert_eq!(el.step, 0.0);
        assert!(el.label.is_none());
    }

    #[test]
    fn test_decode_switch_vector_with_rule() {
        let msg = decode_ok(
            r#"<defSwitchVector device="CCD" name="CONNECTION" state="Idle" perm="rw" rule="OneOfMany">
                 <oneSwitch name="CONNECT">Off</oneSwitch>
                 <oneSwitch name="DISCONNECT">On</oneSwitch>
               </defSwitchVector>"#,
        );
        let Message::Define(def) = msg else {
            panic!("expected definition");
        };
        assert_eq!(def.kind, PropertyKind::Switch);
        assert_eq!(def.rule, Some(SwitchRule::OneOfMany));
        assert_eq!(def.elements.len(), 2);
        assert_eq!(def.elements[0].value, "Off");
        assert_eq!(def.elements[1].value, "On");
    }

    #[test]
    fn test_decode_set_vector() {
        let msg = decode_ok(
            r#"<setNumberVector device="Focuser" name="ABS_FOCUS_POSITION" state="Busy" timestamp="2024-01-01T00:00:01">
                 <oneNumber name="FOCUS_ABSOLUTE_POSITION">32000</oneNumber>
               </setNumberVector>"#,
        );
        let Message::Set(set) = msg else {
            panic!("expected set, got {msg:?}");
        };
        assert_eq!(set.device, "Focuser");
        assert_eq!(set.name, "ABS_FOCUS_POSITION");
        assert_eq!(set.state, Some(PropertyState::Busy));
        assert_eq!(set.timestamp.as_deref(), Some("2024-01-01T00:00:01"));
        assert_eq!(set.elements.len(), 1);
        assert_eq!(set.elements[0].value, "32000");
    }

    #[test]
    fn test_decode_set_without_state() {
        let msg = decode_ok(
            r#"<setTextVector device="Mount" name="TIME_UTC">
                 <oneText name="UTC">2024-06-01T12:00:00</oneText>
               </setTextVector>"#,
        );
        let Message::Set(set) = msg else {
            panic!("expected set");
        };
        assert!(set.state.is_none());
        assert!(set.timeout.is_none());
    }

    #[test]
    fn test_single_child_normalizes_to_list() {
        let single = decode_ok(
            r#"<setSwitchVector device="CCD" name="CONNECTION"><oneSwitch name="CONNECT">On</oneSwitch></setSwitchVector>"#,
        );
        let Message::Set(set) = single else {
            panic!("expected set");
        };
        assert_eq!(set.elements.len(), 1);
    }

    #[test]
    fn test_child_without_name_is_skipped() {
        let msg = decode_ok(
            r#"<setSwitchVector device="CCD" name="CONNECTION">
                 <oneSwitch>On</oneSwitch>
                 <oneSwitch name="DISCONNECT">Off</oneSwitch>
               </setSwitchVector>"#,
        );
        let Message::Set(set) = msg else {
            panic!("expected set");
        };
        assert_eq!(set.elements.len(), 1);
        assert_eq!(set.elements[0].name, "DISCONNECT");
    }

    #[test]
    fn test_unknown_child_tag_is_skipped() {
        let msg = decode_ok(
            r#"<setNumberVector device="CCD" name="CCD_EXPOSURE">
                 <bogus name="NOT_AN_ELEMENT">1</bogus>
                 <oneNumber name="CCD_EXPOSURE_VALUE">2.5</oneNumber>
               </setNumberVector>"#,
        );
        let Message::Set(set) = msg else {
            panic!("expected set");
        };
        assert_eq!(set.elements.len(), 1);
        assert_eq!(set.elements[0].name, "CCD_EXPOSURE_VALUE");
    }

    #[test]
    fn test_def_children_accepted() {
        let msg = decode_ok(
            r#"<defSwitchVector device="CCD" name="CONNECTION" rule="OneOfMany">
                 <defSwitch name="CONNECT" label="Connect">Off</defSwitch>
                 <defSwitch name="DISCONNECT" label="Disconnect">On</defSwitch>
               </defSwitchVector>"#,
        );
        let Message::Define(def) = msg else {
            panic!("expected definition");
        };
        assert_eq!(def.elements.len(), 2);
        assert_eq!(def.elements[0].label.as_deref(), Some("Connect"));
    }

    #[test]
    fn test_decode_message() {
        let msg = decode_ok(
            r#"<message device="Mount" timestamp="2024-01-01T00:00:00" message="Slew complete" />"#,
        );
        let Message::Message(m) = msg else {
            panic!("expected message");
        };
        assert_eq!(m.device.as_deref(), Some("Mount"));
        assert_eq!(m.text, "Slew complete");
    }

    #[test]
    fn test_decode_del_property_variants() {
        let full = decode_ok(r#"<delProperty device="CCD" name="CCD_EXPOSURE" />"#);
        assert_eq!(
            full,
            Message::DelProperty(DelProperty {
                device: Some("CCD".to_string()),
                property: Some("CCD_EXPOSURE".to_string()),
            })
        );

        let device_only = decode_ok(r#"<delProperty device="CCD" />"#);
        assert_eq!(
            device_only,
            Message::DelProperty(DelProperty {
                device: Some("CCD".to_string()),
                property: None,
            })
        );

        let all = decode_ok(r#"<delProperty />"#);
        assert_eq!(
            all,
            Message::DelProperty(DelProperty {
                device: None,
                property: None,
            })
        );
    }

    #[test]
    fn test_decode_blob_vector() {
        let msg = decode_ok(
            r#"<setBLOBVector device="CCD" name="CCD1" state="Ok">
                 <oneBLOB name="CCD1" format=".fits">aGVsbG8=</oneBLOB>
               </setBLOBVector>"#,
        );
        let Message::Set(set) = msg else {
            panic!("expected set");
        };
        assert_eq!(set.kind, PropertyKind::Blob);
        assert_eq!(set.elements[0].format.as_deref(), Some(".fits"));
        assert_eq!(set.elements[0].value, "aGVsbG8=");
    }

    #[test]
    fn test_malformed_xml_is_error() {
        assert!(decode("<defNumberVector device=").is_err());
        assert!(decode("not xml at all").is_err());
        assert!(decode("").is_err());
    }

    #[test]
    fn test_unexpected_tag_is_error() {
        let err = decode(r#"<getProperties version="1.7" />"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedTag(_)));
    }

    #[test]
    fn test_missing_device_attr_is_error() {
        let err = decode(r#"<setNumberVector name="X"><oneNumber name="Y">1</oneNumber></setNumberVector>"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::MissingAttribute { .. }));
    }

    #[test]
    fn test_decode_idempotence() {
        let frame = r#"<defSwitchVector device="CCD" name="CONNECTION" state="Idle" perm="rw">
            <oneSwitch name="CONNECT">Off</oneSwitch>
            <oneSwitch name="DISCONNECT">On</oneSwitch>
        </defSwitchVector>"#;
        assert_eq!(decode_ok(frame), decode_ok(frame));
    }

    #[test]
    fn test_escaped_attribute_values() {
        let msg = decode_ok(
            r#"<message device="CCD" message="temp &lt; 0 &amp; falling" />"#,
        );
        let Message::Message(m) = msg else {
            panic!("expected message");
        };
        assert_eq!(m.text, "temp < 0 & falling");
    }
}
