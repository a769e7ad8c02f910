// MIT License

//! Data model for the device state mirror: devices own properties,
//! properties own elements.

pub mod element;
pub mod mirror;
pub mod property;

pub use element::{
    BlobElement, Element, LightElement, NumberElement, Permission, PropertyKind, PropertyState,
    SwitchElement, SwitchRule, SwitchState, TextElement,
};
pub use mirror::{Device, DeviceMirror};
pub use property::Property;
