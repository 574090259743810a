//! Behavior objects: executable mechanisms attached to content units.

use serde::{Deserialize, Serialize};

use crate::canonical::{at_most_one, names, only_children, optional, qualified, required};
use crate::content::DataObjectPointer;
use crate::data::Reference;
use crate::error::CoreError;
use crate::tree::Element;
use crate::types::Id;

/// A named argument of an interface definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputParameter {
    pub name: String,
    pub value: Option<String>,
    pub text: Option<String>,
    pub data_object_pointer: Option<DataObjectPointer>,
}

impl InputParameter {
    fn from_element(el: &Element) -> Result<Self, CoreError> {
        only_children(el, &[names::DATA_OBJECT_POINTER])?;
        Ok(Self {
            name: required(el, "name")?.to_string(),
            value: optional(el, "value"),
            text: el
                .text_content()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            data_object_pointer: at_most_one(el, names::DATA_OBJECT_POINTER)?
                .map(DataObjectPointer::from_element)
                .transpose()?,
        })
    }

    fn to_element(&self) -> Element {
        let mut el = Element::new(names::INPUT_PARAMETER)
            .attr("name", self.name.as_str())
            .attr_opt("value", self.value.as_deref());
        if let Some(text) = &self.text {
            el = el.text(text.as_str());
        }
        if let Some(pointer) = &self.data_object_pointer {
            el = el.child(pointer.to_element());
        }
        el
    }
}

/// Interface a behavior exposes: a reference plus its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    pub reference: Reference,
    pub input_parameters: Vec<InputParameter>,
}

impl InterfaceDefinition {
    fn from_element(el: &Element) -> Result<Self, CoreError> {
        only_children(el, &[names::INPUT_PARAMETER])?;
        Ok(Self {
            reference: Reference::from_element(el)?,
            input_parameters: el
                .find_all(names::INPUT_PARAMETER)
                .map(InputParameter::from_element)
                .collect::<Result<_, _>>()?,
        })
    }

    fn to_element(&self) -> Element {
        self.reference
            .to_element(names::INTERFACE_DEFINITION)
            .children(self.input_parameters.iter().map(InputParameter::to_element))
    }
}

/// Member of the mechanism substitution group.
///
/// `mechanism` is the only concrete member today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mechanism {
    Mechanism(Reference),
}

impl Mechanism {
    pub fn reference(&self) -> &Reference {
        match self {
            Mechanism::Mechanism(r) => r,
        }
    }

    fn from_element(el: &Element) -> Result<Self, CoreError> {
        match el.local_name() {
            names::MECHANISM => Ok(Mechanism::Mechanism(Reference::from_element(el)?)),
            other => Err(CoreError::malformed(
                other,
                "abstract mechanism cannot appear in a manifest",
            )),
        }
    }

    fn to_element(&self) -> Element {
        match self {
            Mechanism::Mechanism(r) => r.to_element(qualified(names::MECHANISM)),
        }
    }
}

/// A behavior object of the behavior section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorObject {
    pub id: Id,
    pub behavior_type: Option<String>,
    pub text_info: Option<String>,
    pub interface_definition: Option<InterfaceDefinition>,
    pub mechanisms: Vec<Mechanism>,
}

impl BehaviorObject {
    /// Data objects named by input parameters.
    pub fn parameter_pointers(&self) -> impl Iterator<Item = &DataObjectPointer> {
        self.interface_definition
            .iter()
            .flat_map(|i| i.input_parameters.iter())
            .filter_map(|p| p.data_object_pointer.as_ref())
    }

    /// Every reference carried by this behavior.
    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.interface_definition
            .iter()
            .map(|i| &i.reference)
            .chain(self.mechanisms.iter().map(Mechanism::reference))
    }

    pub(crate) fn from_element(el: &Element) -> Result<Self, CoreError> {
        only_children(
            el,
            &[names::INTERFACE_DEFINITION, names::MECHANISM, names::ABSTRACT_MECHANISM],
        )?;
        Ok(Self {
            id: Id::parse(names::BEHAVIOR_OBJECT, required(el, "ID")?)?,
            behavior_type: optional(el, "behaviorType"),
            text_info: optional(el, "textInfo"),
            interface_definition: at_most_one(el, names::INTERFACE_DEFINITION)?
                .map(InterfaceDefinition::from_element)
                .transpose()?,
            mechanisms: el
                .children
                .iter()
                .filter(|c| !c.is(names::INTERFACE_DEFINITION))
                .map(Mechanism::from_element)
                .collect::<Result<_, _>>()?,
        })
    }

    pub(crate) fn to_element(&self) -> Element {
        let mut el = Element::new(names::BEHAVIOR_OBJECT)
            .attr("ID", self.id.as_str())
            .attr_opt("behaviorType", self.behavior_type.as_deref())
            .attr_opt("textInfo", self.text_info.as_deref());
        if let Some(interface) = &self.interface_definition {
            el = el.child(interface.to_element());
        }
        el.children(self.mechanisms.iter().map(Mechanism::to_element))
    }
}
