// MIT License

use crate::devices::element::{Element, Permission, PropertyKind, PropertyState, SwitchRule, SwitchState};

/// A property vector: a named group of elements of one kind on a device.
///
/// Created by a definition message and mutated in place by set messages.
/// The `kind` and the element set are fixed at definition time; sets only
/// update `state`, `timestamp`, `timeout` and element values.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub label: String,
    pub group: String,
    pub state: PropertyState,
    pub perm: Permission,
    pub timeout: f64,
    pub timestamp: Option<String>,
    pub kind: PropertyKind,
    /// Switch selection rule; `None` for non-switch vectors.
    pub rule: Option<SwitchRule>,
    /// Elements in wire definition order.
    elements: Vec<Element>,
}

impl Property {
    pub(crate) fn new(
        name: String,
        label: String,
        group: String,
        state: PropertyState,
        perm: Permission,
        timeout: f64,
        timestamp: Option<String>,
        kind: PropertyKind,
        rule: Option<SwitchRule>,
        elements: Vec<Element>,
    ) -> Self {
        Self {
            name,
            label,
            group,
            state,
            perm,
            timeout,
            timestamp,
            kind,
            rule,
            elements,
        }
    }

    /// All elements in definition order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Look up an element by its name within this property.
    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name() == name)
    }

    pub(crate) fn element_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.name() == name)
    }

    /// The On/Off state of a named switch element, if present.
    pub fn switch_state(&self, element: &str) -> Option<SwitchState> {
        self.element(element).and_then(Element::as_switch)
    }

    /// The numeric value of a named number element, if present.
    pub fn number_value(&self, element: &str) -> Option<f64> {
        self.element(element).and_then(Element::as_number)
    }

    /// The string value of a named text element, if present.
    pub fn text_value(&self, element: &str) -> Option<&str> {
        self.element(element).and_then(Element::as_text)
    }
}
