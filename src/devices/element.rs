// MIT License

use std::fmt;

/// State of a property vector (and of light elements).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PropertyState {
    #[default]
    Idle,
    Ok,
    Busy,
    Alert,
}

impl PropertyState {
    /// Parse the wire literal, falling back to `Idle` for anything unknown.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "Ok" => Self::Ok,
            "Busy" => Self::Busy,
            "Alert" => Self::Alert,
            _ => Self::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Ok => "Ok",
            Self::Busy => "Busy",
            Self::Alert => "Alert",
        }
    }
}

impl fmt::Display for PropertyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access permission of a property vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Permission {
    ReadOnly,
    WriteOnly,
    #[default]
    ReadWrite,
}

impl Permission {
    /// Parse the wire literal (`ro`/`wo`/`rw`), falling back to `rw`.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "ro" => Self::ReadOnly,
            "wo" => Self::WriteOnly,
            _ => Self::ReadWrite,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "ro",
            Self::WriteOnly => "wo",
            Self::ReadWrite => "rw",
        }
    }
}

/// On/Off state of a switch element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SwitchState {
    On,
    #[default]
    Off,
}

impl SwitchState {
    /// Coerce a wire literal: exactly `On` is on, everything else is off.
    pub fn from_wire(s: &str) -> Self {
        if s == "On" {
            Self::On
        } else {
            Self::Off
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "On",
            Self::Off => "Off",
        }
    }

    pub fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selection rule of a switch vector, inherited by its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SwitchRule {
    #[default]
    OneOfMany,
    AtMostOne,
    AnyOfMany,
}

impl SwitchRule {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "AtMostOne" => Self::AtMostOne,
            "AnyOfMany" => Self::AnyOfMany,
            _ => Self::OneOfMany,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneOfMany => "OneOfMany",
            Self::AtMostOne => "AtMostOne",
            Self::AnyOfMany => "AnyOfMany",
        }
    }
}

/// The five element kinds a property vector can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Number,
    Switch,
    Text,
    Light,
    Blob,
}

impl PropertyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Switch => "switch",
            Self::Text => "text",
            Self::Light => "light",
            Self::Blob => "blob",
        }
    }
}

/// A numeric element with its range metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberElement {
    pub name: String,
    pub label: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    /// printf-style display format, `%g` by default
    pub format: String,
}

/// An On/Off element carrying its vector's selection rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchElement {
    pub name: String,
    pub label: String,
    pub value: SwitchState,
    pub rule: SwitchRule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextElement {
    pub name: String,
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightElement {
    pub name: String,
    pub label: String,
    pub value: PropertyState,
}

/// Opaque encoded payload (e.g. base64 image data) with a format hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobElement {
    pub name: String,
    pub label: String,
    pub value: String,
    /// Encoding/extension hint, e.g. `.fits` or `.z`
    pub format: String,
}

/// The smallest addressable unit inside a property, keyed by its name.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Number(NumberElement),
    Switch(SwitchElement),
    Text(TextElement),
    Light(LightElement),
    Blob(BlobElement),
}

impl Element {
    pub fn name(&self) -> &str {
        match self {
            Self::Number(e) => &e.name,
            Self::Switch(e) => &e.name,
            Self::Text(e) => &e.name,
            Self::Light(e) => &e.name,
            Self::Blob(e) => &e.name,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Number(e) => &e.label,
            Self::Switch(e) => &e.label,
            Self::Text(e) => &e.label,
            Self::Light(e) => &e.label,
            Self::Blob(e) => &e.label,
        }
    }

    /// The element kind, always matching the owning property's kind.
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Number(_) => PropertyKind::Number,
            Self::Switch(_) => PropertyKind::Switch,
            Self::Text(_) => PropertyKind::Text,
            Self::Light(_) => PropertyKind::Light,
            Self::Blob(_) => PropertyKind::Blob,
        }
    }

    /// The switch state, if this is a switch element.
    pub fn as_switch(&self) -> Option<SwitchState> {
        match self {
            Self::Switch(e) => Some(e.value),
            _ => None,
        }
    }

    /// The numeric value, if this is a number element.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(e) => Some(e.value),
            _ => None,
        }
    }

    /// The text value, if this is a text element.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(e) => Some(&e.value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_state_coercion() {
        assert_eq!(SwitchState::from_wire("On"), SwitchState::On);
        assert_eq!(SwitchState::from_wire("Off"), SwitchState::Off);
        assert_eq!(SwitchState::from_wire("on"), SwitchState::Off);
        assert_eq!(SwitchState::from_wire("garbage"), SwitchState::Off);
        assert_eq!(SwitchState::from_wire(""), SwitchState::Off);
    }

    #[test]
    fn test_property_state_from_wire() {
        assert_eq!(PropertyState::from_wire("Idle"), PropertyState::Idle);
        assert_eq!(PropertyState::from_wire("Ok"), PropertyState::Ok);
        assert_eq!(PropertyState::from_wire("Busy"), PropertyState::Busy);
        assert_eq!(PropertyState::from_wire("Alert"), PropertyState::Alert);
        assert_eq!(PropertyState::from_wire("Unknown"), PropertyState::Idle);
    }

    #[test]
    fn test_permission_from_wire() {
        assert_eq!(Permission::from_wire("ro"), Permission::ReadOnly);
        assert_eq!(Permission::from_wire("wo"), Permission::WriteOnly);
        assert_eq!(Permission::from_wire("rw"), Permission::ReadWrite);
        assert_eq!(Permission::from_wire(""), Permission::ReadWrite);
    }

    #[test]
    fn test_switch_rule_from_wire() {
        assert_eq!(SwitchRule::from_wire("OneOfMany"), SwitchRule::OneOfMany);
        assert_eq!(SwitchRule::from_wire("AtMostOne"), SwitchRule::AtMostOne);
        assert_eq!(SwitchRule::from_wire("AnyOfMany"), SwitchRule::AnyOfMany);
        assert_eq!(SwitchRule::from_wire("bogus"), SwitchRule::OneOfMany);
    }
}
