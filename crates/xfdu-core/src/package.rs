//! The package root aggregate.

use serde::{Deserialize, Serialize};

use crate::behavior::BehaviorObject;
use crate::canonical::{at_most_one, names, only_children, optional, qualified, required, required_child};
use crate::content::{ContentNode, ContentUnit};
use crate::data::DataObject;
use crate::error::CoreError;
use crate::metadata::MetadataObject;
use crate::tree::{Element, XFDU_NAMESPACE};

/// Default declaration of the `xfdu` prefix, always emitted.
const XFDU_DECLARATION: &str = "xmlns:xfdu";

/// A whole package: logical tree, metadata, data and behaviors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Format version string.
    pub version: String,
    /// Namespace declarations of the root element other than the default
    /// `xfdu` prefix, in document order.
    pub namespaces: Vec<(String, String)>,
    pub package_type: Option<String>,
    pub text_info: Option<String>,
    /// The single top-level content unit.
    pub root: ContentUnit,
    pub metadata_section: Option<Vec<MetadataObject>>,
    pub data_object_section: Option<Vec<DataObject>>,
    pub behavior_section: Option<Vec<BehaviorObject>>,
}

impl Package {
    /// A package holding only a root content unit.
    pub fn new(version: impl Into<String>, root: ContentUnit) -> Self {
        Self {
            version: version.into(),
            namespaces: Vec::new(),
            package_type: None,
            text_info: None,
            root,
            metadata_section: None,
            data_object_section: None,
            behavior_section: None,
        }
    }

    /// Metadata objects in document order (empty without a section).
    pub fn metadata_objects(&self) -> &[MetadataObject] {
        self.metadata_section.as_deref().unwrap_or_default()
    }

    /// Data objects in document order (empty without a section).
    pub fn data_objects(&self) -> &[DataObject] {
        self.data_object_section.as_deref().unwrap_or_default()
    }

    /// Behavior objects in document order (empty without a section).
    pub fn behavior_objects(&self) -> &[BehaviorObject] {
        self.behavior_section.as_deref().unwrap_or_default()
    }

    /// Build a package from the generic tree of a manifest.
    pub fn from_element(el: &Element) -> Result<Self, CoreError> {
        if !el.is(names::XFDU) {
            return Err(CoreError::malformed(
                el.local_name(),
                format!("root element must be '{}'", names::XFDU),
            ));
        }
        only_children(
            el,
            &[
                names::INFORMATION_PACKAGE_MAP,
                names::METADATA_SECTION,
                names::DATA_OBJECT_SECTION,
                names::BEHAVIOR_SECTION,
            ],
        )?;

        let namespaces = el
            .attributes
            .iter()
            .filter(|(k, v)| {
                (k == "xmlns" || k.starts_with("xmlns:"))
                    && !(k == XFDU_DECLARATION && v == XFDU_NAMESPACE)
            })
            .cloned()
            .collect();

        let map = required_child(el, names::INFORMATION_PACKAGE_MAP)?;
        let mut units = map.children.iter();
        let root = match (units.next(), units.next()) {
            (Some(unit), None) => match ContentNode::from_element(unit)? {
                ContentNode::ContentUnit(cu) => cu,
            },
            _ => {
                return Err(CoreError::malformed(
                    names::INFORMATION_PACKAGE_MAP,
                    "must contain exactly one content unit",
                ))
            }
        };

        let metadata_section = at_most_one(el, names::METADATA_SECTION)?
            .map(|section| {
                only_children(section, &[names::METADATA_OBJECT])?;
                section
                    .children
                    .iter()
                    .map(MetadataObject::from_element)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let data_object_section = at_most_one(el, names::DATA_OBJECT_SECTION)?
            .map(|section| {
                only_children(section, &[names::DATA_OBJECT])?;
                if section.children.is_empty() {
                    return Err(CoreError::malformed(
                        names::DATA_OBJECT_SECTION,
                        "must contain at least one data object",
                    ));
                }
                section
                    .children
                    .iter()
                    .map(DataObject::from_element)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let behavior_section = at_most_one(el, names::BEHAVIOR_SECTION)?
            .map(|section| {
                only_children(section, &[names::BEHAVIOR_OBJECT])?;
                section
                    .children
                    .iter()
                    .map(BehaviorObject::from_element)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        Ok(Self {
            version: required(el, "version")?.to_string(),
            namespaces,
            package_type: optional(map, "packageType"),
            text_info: optional(map, "textInfo"),
            root,
            metadata_section,
            data_object_section,
            behavior_section,
        })
    }

    /// Re-emit the generic tree.
    pub fn to_element(&self) -> Element {
        let mut root = Element::new(qualified(names::XFDU));
        if !self.namespaces.iter().any(|(k, _)| k == XFDU_DECLARATION) {
            root = root.attr(XFDU_DECLARATION, XFDU_NAMESPACE);
        }
        root.attributes.extend(self.namespaces.iter().cloned());
        root = root.attr("version", self.version.as_str());

        let map = Element::new(names::INFORMATION_PACKAGE_MAP)
            .attr_opt("packageType", self.package_type.as_deref())
            .attr_opt("textInfo", self.text_info.as_deref())
            .child(ContentNode::ContentUnit(self.root.clone()).to_element());
        root = root.child(map);

        if let Some(section) = &self.metadata_section {
            root = root.child(
                Element::new(names::METADATA_SECTION)
                    .children(section.iter().map(MetadataObject::to_element)),
            );
        }
        if let Some(section) = &self.data_object_section {
            root = root.child(
                Element::new(names::DATA_OBJECT_SECTION)
                    .children(section.iter().map(DataObject::to_element)),
            );
        }
        if let Some(section) = &self.behavior_section {
            root = root.child(
                Element::new(names::BEHAVIOR_SECTION)
                    .children(section.iter().map(BehaviorObject::to_element)),
            );
        }
        root
    }
}
