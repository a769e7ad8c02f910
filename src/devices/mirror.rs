// MIT License

//! The authoritative in-memory snapshot of all known devices, updated
//! exclusively from decoded wire messages.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::devices::element::{
    BlobElement, Element, LightElement, NumberElement, PropertyKind, PropertyState, SwitchElement,
    SwitchState, TextElement,
};
use crate::devices::property::Property;
use crate::wire::{DefineVector, SetVector, WireElement};

/// The standard property and element names that drive a device's
/// `connected` flag.
const CONNECTION_PROPERTY: &str = "CONNECTION";
const CONNECT_ELEMENT: &str = "CONNECT";

/// A remote device: a name, a connected flag derived from its `CONNECTION`
/// property, and its properties keyed by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub name: String,
    pub connected: bool,
    properties: BTreeMap<String, Property>,
}

impl Device {
    fn new(name: String) -> Self {
        Self {
            name,
            connected: false,
            properties: BTreeMap::new(),
        }
    }

    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// All properties, ordered by name.
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Re-derive `connected` from the CONNECTION property when it exists;
    /// otherwise the flag keeps its last value.
    fn refresh_connected(&mut self) {
        if let Some(prop) = self.properties.get(CONNECTION_PROPERTY) {
            self.connected = prop.switch_state(CONNECT_ELEMENT) == Some(SwitchState::On);
        }
    }
}

/// Device → property → element table mirroring the remote gateway state.
///
/// All mutation goes through `apply_definition`/`apply_set`/the delete
/// operations; the session emits exactly one `DevicesUpdated` per mutating
/// inbound frame.
#[derive(Debug, Default)]
pub struct DeviceMirror {
    devices: BTreeMap<String, Device>,
}

impl DeviceMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert the device and insert or fully replace the named property.
    ///
    /// Returns a clone of the stored property for the `PropertyUpdated`
    /// notification.
    pub fn apply_definition(&mut self, def: &DefineVector) -> Property {
        let device = self
            .devices
            .entry(def.device.clone())
            .or_insert_with(|| Device::new(def.device.clone()));

        let elements = def
            .elements
            .iter()
            .map(|el| build_element(def.kind, def, el))
            .collect();

        let property = Property::new(
            def.name.clone(),
            def.label.clone(),
            def.group.clone(),
            def.state,
            def.perm,
            def.timeout,
            def.timestamp.clone(),
            def.kind,
            def.rule,
            elements,
        );
        device.properties.insert(def.name.clone(), property.clone());
        device.refresh_connected();

        debug!(
            device = %def.device,
            property = %def.name,
            kind = def.kind.as_str(),
            "property defined"
        );
        property
    }

    /// Update state/timestamp and element values of an existing property.
    ///
    /// Stray sets for unknown devices or properties are protocol chatter
    /// during definition races or teardown; they are logged and ignored.
    /// Element names not present in the definition are likewise skipped.
    /// Returns the updated property, or `None` when nothing was applied.
    pub fn apply_set(&mut self, set: &SetVector) -> Option<Property> {
        let Some(device) = self.devices.get_mut(&set.device) else {
            warn!(device = %set.device, property = %set.name, "set for unknown device ignored");
            return None;
        };
        let Some(property) = device.properties.get_mut(&set.name) else {
            warn!(device = %set.device, property = %set.name, "set for unknown property ignored");
            return None;
        };

        if let Some(state) = set.state {
            property.state = state;
        }
        if let Some(timeout) = set.timeout {
            property.timeout = timeout;
        }
        if set.timestamp.is_some() {
            property.timestamp = set.timestamp.clone();
        }

        for el in &set.elements {
            match property.element_mut(&el.name) {
                Some(existing) => apply_value(existing, el),
                None => {
                    debug!(
                        device = %set.device,
                        property = %set.name,
                        element = %el.name,
                        "set for unknown element ignored"
                    );
                }
            }
        }

        let snapshot = property.clone();
        device.refresh_connected();
        Some(snapshot)
    }

    /// Remove one property from one device. Unknown names are ignored.
    pub fn delete_property(&mut self, device: &str, property: &str) {
        if let Some(dev) = self.devices.get_mut(device) {
            dev.properties.remove(property);
        }
    }

    /// Remove a device and everything it owns.
    pub fn delete_device(&mut self, device: &str) {
        self.devices.remove(device);
    }

    /// Clear every device (delete message with no device attribute).
    pub fn clear(&mut self) {
        self.devices.clear();
    }

    /// Snapshot of all current devices, ordered by name.
    pub fn devices(&self) -> Vec<Device> {
        self.devices.values().cloned().collect()
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Build a typed element from a definition's wire element.
fn build_element(kind: PropertyKind, def: &DefineVector, el: &WireElement) -> Element {
    let label = el.label.clone().unwrap_or_else(|| el.name.clone());
    match kind {
        PropertyKind::Number => Element::Number(NumberElement {
            name: el.name.clone(),
            label,
            value: parse_number(&el.value),
            min: el.min,
            max: el.max,
            step: el.step,
            format: el.format.clone().unwrap_or_else(|| "%g".to_string()),
        }),
        PropertyKind::Switch => Element::Switch(SwitchElement {
            name: el.name.clone(),
            label,
            value: SwitchState::from_wire(&el.value),
            rule: def.rule.unwrap_or_default(),
        }),
        PropertyKind::Text => Element::Text(TextElement {
            name: el.name.clone(),
            label,
            value: el.value.clone(),
        }),
        PropertyKind::Light => Element::Light(LightElement {
            name: el.name.clone(),
            label,
            value: PropertyState::from_wire(&el.value),
        }),
        PropertyKind::Blob => Element::Blob(BlobElement {
            name: el.name.clone(),
            label,
            value: el.value.clone(),
            format: el.format.clone().unwrap_or_default(),
        }),
    }
}

/// Overwrite only the value of an existing element; metadata is untouched.
fn apply_value(element: &mut Element, el: &WireElement) {
    match element {
        Element::Number(n) => n.value = parse_number(&el.value),
        Element::Switch(s) => s.value = SwitchState::from_wire(&el.value),
        Element::Text(t) => t.value = el.value.clone(),
        Element::Light(l) => l.value = PropertyState::from_wire(&el.value),
        Element::Blob(b) => {
            b.value = el.value.clone();
            if let Some(format) = &el.format {
                b.format = format.clone();
            }
        }
    }
}

fn parse_number(value: &str) -> f64 {
    value.trim().parse().unwrap_or(0.0)
}
