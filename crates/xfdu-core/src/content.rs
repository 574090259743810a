//! Content units: the logical tree of an information package.
//!
//! The tree is owned: every unit exclusively owns its children and holds no
//! pointer to its parent. Parent lookups live in the resolved graph.

use serde::{Deserialize, Serialize};

use crate::canonical::{
    at_most_one, id_list, names, optional, optional_id, qualified, required_id,
};
use crate::error::CoreError;
use crate::tree::{is_qualified, Element};
use crate::types::Id;

/// Pointer from a content unit, metadata object or input parameter to a
/// data object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataObjectPointer {
    /// Optional identifier of the pointer itself.
    pub id: Option<Id>,
    /// The referenced data object.
    pub data_object_id: Id,
}

impl DataObjectPointer {
    /// Point at a data object.
    pub fn to(data_object_id: Id) -> Self {
        Self {
            id: None,
            data_object_id,
        }
    }

    pub(crate) fn from_element(el: &Element) -> Result<Self, CoreError> {
        Ok(Self {
            id: optional_id(el, "ID")?,
            data_object_id: required_id(el, "dataObjectID")?,
        })
    }

    pub(crate) fn to_element(&self) -> Element {
        Element::new(names::DATA_OBJECT_POINTER)
            .attr_opt("ID", self.id.as_ref().map(Id::as_str))
            .attr("dataObjectID", self.data_object_id.as_str())
    }
}

/// A node of the information package map.
///
/// `abstractContentUnit` is a substitution group; `contentUnit` is its only
/// member today. A new substitute becomes a new variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentNode {
    ContentUnit(ContentUnit),
}

impl ContentNode {
    /// The unit carried by this node.
    pub fn unit(&self) -> &ContentUnit {
        match self {
            ContentNode::ContentUnit(unit) => unit,
        }
    }

    /// Whether an element is a member of the content unit substitution group.
    pub(crate) fn accepts(el: &Element) -> bool {
        el.is(names::CONTENT_UNIT) || el.is(names::ABSTRACT_CONTENT_UNIT)
    }

    pub(crate) fn from_element(el: &Element) -> Result<Self, CoreError> {
        match el.local_name() {
            names::CONTENT_UNIT => Ok(ContentNode::ContentUnit(ContentUnit::from_element(el)?)),
            names::ABSTRACT_CONTENT_UNIT => Err(CoreError::malformed(
                names::ABSTRACT_CONTENT_UNIT,
                "abstract element cannot appear in a manifest",
            )),
            other => Err(CoreError::malformed(
                other,
                "not a member of the content unit substitution group",
            )),
        }
    }

    pub(crate) fn to_element(&self) -> Element {
        match self {
            ContentNode::ContentUnit(unit) => unit.to_element(),
        }
    }
}

impl From<ContentUnit> for ContentNode {
    fn from(unit: ContentUnit) -> Self {
        ContentNode::ContentUnit(unit)
    }
}

/// A content unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentUnit {
    pub id: Option<Id>,
    /// Ordering hint among siblings.
    pub order: Option<String>,
    pub unit_type: Option<String>,
    pub text_info: Option<String>,
    /// Representation metadata (`repID`).
    pub rep_ids: Vec<Id>,
    /// Descriptive metadata (`dmdID`).
    pub dmd_ids: Vec<Id>,
    /// Preservation description metadata (`pdiID`).
    pub pdi_ids: Vec<Id>,
    /// Metadata of any category (`anyMdID`).
    pub any_md_ids: Vec<Id>,
    pub behavior_id: Option<Id>,
    pub data_object_pointer: Option<DataObjectPointer>,
    pub children: Vec<ContentNode>,
    /// Attributes from foreign namespaces, kept verbatim.
    pub extension_attributes: Vec<(String, String)>,
}

const UNIT_ATTRIBUTES: &[&str] = &[
    "ID",
    "order",
    "unitType",
    "textInfo",
    "repID",
    "dmdID",
    "pdiID",
    "anyMdID",
    "behaviorID",
];

impl ContentUnit {
    /// Human-readable label for diagnostics.
    pub fn label(&self) -> String {
        match (&self.id, &self.unit_type) {
            (Some(id), _) => format!("content unit '{id}'"),
            (None, Some(t)) => format!("content unit of type '{t}'"),
            (None, None) => "anonymous content unit".to_string(),
        }
    }

    /// Child units in presentation order.
    ///
    /// When every child carries an integer `order` hint the children are
    /// sorted by it (stable); otherwise document order is kept.
    pub fn ordered_children(&self) -> Vec<&ContentUnit> {
        self.child_order()
            .into_iter()
            .map(|position| self.children[position].unit())
            .collect()
    }

    /// Document positions of the children, in presentation order.
    pub fn child_order(&self) -> Vec<usize> {
        let hints: Option<Vec<i64>> = self
            .children
            .iter()
            .map(|c| c.unit().order.as_deref().and_then(|o| o.trim().parse().ok()))
            .collect();
        let mut positions: Vec<usize> = (0..self.children.len()).collect();
        if let Some(hints) = hints {
            positions.sort_by_key(|&p| hints[p]);
        }
        positions
    }

    pub(crate) fn from_element(el: &Element) -> Result<Self, CoreError> {
        let data_object_pointer = at_most_one(el, names::DATA_OBJECT_POINTER)?
            .map(DataObjectPointer::from_element)
            .transpose()?;

        let mut children = Vec::new();
        for child in &el.children {
            if child.is(names::DATA_OBJECT_POINTER) {
                continue;
            }
            if !ContentNode::accepts(child) {
                return Err(CoreError::malformed(
                    names::CONTENT_UNIT,
                    format!("unexpected element '{}'", child.local_name()),
                ));
            }
            children.push(ContentNode::from_element(child)?);
        }

        let extension_attributes = el
            .attributes
            .iter()
            .filter(|(k, _)| is_qualified(k) && !UNIT_ATTRIBUTES.contains(&k.as_str()))
            .cloned()
            .collect();

        Ok(Self {
            id: optional_id(el, "ID")?,
            order: optional(el, "order"),
            unit_type: optional(el, "unitType"),
            text_info: optional(el, "textInfo"),
            rep_ids: id_list(el, "repID")?,
            dmd_ids: id_list(el, "dmdID")?,
            pdi_ids: id_list(el, "pdiID")?,
            any_md_ids: id_list(el, "anyMdID")?,
            behavior_id: optional_id(el, "behaviorID")?,
            data_object_pointer,
            children,
            extension_attributes,
        })
    }

    pub(crate) fn to_element(&self) -> Element {
        let refs = |ids: &[Id]| (!ids.is_empty()).then(|| Id::join(ids));

        let mut el = Element::new(qualified(names::CONTENT_UNIT))
            .attr_opt("ID", self.id.as_ref().map(Id::as_str))
            .attr_opt("order", self.order.as_deref())
            .attr_opt("unitType", self.unit_type.as_deref())
            .attr_opt("textInfo", self.text_info.as_deref())
            .attr_opt("repID", refs(&self.rep_ids))
            .attr_opt("dmdID", refs(&self.dmd_ids))
            .attr_opt("pdiID", refs(&self.pdi_ids))
            .attr_opt("anyMdID", refs(&self.any_md_ids))
            .attr_opt("behaviorID", self.behavior_id.as_ref().map(Id::as_str));
        el.attributes.extend(self.extension_attributes.iter().cloned());

        if let Some(pointer) = &self.data_object_pointer {
            el = el.child(pointer.to_element());
        }
        el.children(self.children.iter().map(ContentNode::to_element))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: &str, order: Option<&str>) -> Element {
        let el = Element::new("xfdu:contentUnit").attr("ID", id);
        match order {
            Some(o) => el.attr("order", o),
            None => el,
        }
    }

    #[test]
    fn test_parse_content_unit() {
        let el = Element::new("xfdu:contentUnit")
            .attr("ID", "measurementUnit")
            .attr("unitType", "Measurement Data Unit")
            .attr("repID", "s1Level1MeasurementSchema")
            .attr("dmdID", "acquisitionPeriod platform")
            .attr("s1:extra", "kept")
            .child(Element::new("dataObjectPointer").attr("dataObjectID", "s1aiwgrd"));

        let cu = ContentUnit::from_element(&el).unwrap();
        assert_eq!(cu.id.as_ref().unwrap().as_str(), "measurementUnit");
        assert_eq!(cu.rep_ids.len(), 1);
        assert_eq!(cu.dmd_ids.len(), 2);
        assert_eq!(
            cu.data_object_pointer.as_ref().unwrap().data_object_id.as_str(),
            "s1aiwgrd"
        );
        assert_eq!(cu.extension_attributes, vec![("s1:extra".into(), "kept".into())]);
    }

    #[test]
    fn test_two_pointers_rejected() {
        let el = Element::new("contentUnit")
            .child(Element::new("dataObjectPointer").attr("dataObjectID", "a"))
            .child(Element::new("dataObjectPointer").attr("dataObjectID", "b"));
        assert!(ContentUnit::from_element(&el).is_err());
    }

    #[test]
    fn test_pointer_requires_target() {
        let el = Element::new("contentUnit").child(Element::new("dataObjectPointer"));
        assert!(matches!(
            ContentUnit::from_element(&el),
            Err(CoreError::MalformedEntity { .. })
        ));
    }

    #[test]
    fn test_abstract_unit_rejected() {
        let el = Element::new("contentUnit").child(Element::new("xfdu:abstractContentUnit"));
        assert!(ContentUnit::from_element(&el).is_err());
    }

    #[test]
    fn test_ordered_children_with_hints() {
        let el = Element::new("contentUnit")
            .child(unit("c", Some("3")))
            .child(unit("a", Some("1")))
            .child(unit("b", Some("2")));
        let cu = ContentUnit::from_element(&el).unwrap();
        let ids: Vec<_> = cu
            .ordered_children()
            .iter()
            .map(|c| c.id.as_ref().unwrap().as_str().to_string())
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn test_ordered_children_document_order_without_full_hints() {
        let el = Element::new("contentUnit")
            .child(unit("c", Some("3")))
            .child(unit("a", None))
            .child(unit("b", Some("")));
        let cu = ContentUnit::from_element(&el).unwrap();
        let ids: Vec<_> = cu
            .ordered_children()
            .iter()
            .map(|c| c.id.as_ref().unwrap().as_str().to_string())
            .collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn test_roundtrip() {
        let el = Element::new("xfdu:contentUnit")
            .attr("ID", "root")
            .attr("unitType", "SAFE Archive Information Package")
            .attr("dmdID", "platform")
            .child(unit("child", Some("1")).child(
                Element::new("dataObjectPointer").attr("dataObjectID", "D1"),
            ));
        let cu = ContentUnit::from_element(&el).unwrap();
        let again = ContentUnit::from_element(&cu.to_element()).unwrap();
        assert_eq!(cu, again);
    }
}
