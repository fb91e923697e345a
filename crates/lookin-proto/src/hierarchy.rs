//! Fixed external classes the bridge consumes/produces (spec §6). The object
//! graph itself is not respecified — these are exactly the fields this
//! client reads out of `LookinAppInfo`, `LookinHierarchyInfo`, and
//! `LookinAttributesGroup` instances, nothing more.

use std::collections::BTreeMap;

use crate::archive::{Rect, Value};
use crate::error::Error;

/// View/layer classes treated as text-bearing for enrichment (spec §4.4:
/// "identified by its class being a text-bearing kind"). `lb_t_t` lives on
/// labels, `tf_t_t`/`tf_p_p` on text fields (text and placeholder), `te_t_t`
/// on text views.
pub const TEXT_BEARING_CLASSES: &[&str] = &["UILabel", "UITextField", "UITextView"];

/// Attribute identifiers whose string value is user-visible text (spec §6).
pub const TEXT_ATTRIBUTE_IDS: &[&str] = &["lb_t_t", "tf_t_t", "tf_p_p", "te_t_t"];

fn missing(field: &str) -> Error {
    Error::InvalidFrame(format!("response is missing field {field:?}"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppInfo {
    pub app_name: String,
    pub bundle_identifier: String,
    pub device_name: String,
    pub system_version: String,
    pub screen_scale: f64,
}

impl TryFrom<&Value> for AppInfo {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self, Error> {
        let get_str = |key: &str| -> Result<String, Error> {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| missing(key))
        };
        Ok(AppInfo {
            app_name: get_str("appName")?,
            bundle_identifier: get_str("bundleIdentifier")?,
            device_name: get_str("deviceName")?,
            system_version: get_str("systemVersion")?,
            screen_scale: value
                .get("screenScale")
                .and_then(|v| match v {
                    Value::Double(d) => Some(*d),
                    Value::Int(n) => Some(*n as f64),
                    _ => None,
                })
                .unwrap_or(1.0),
        })
    }
}

/// One node of the view hierarchy tree. Every node carries both its view oid
/// and its layer oid, since attribute reads by code 210 target the layer
/// while modification may target either (spec §6 glossary, §4.4).
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyNode {
    pub view_oid: u64,
    pub layer_oid: u64,
    pub class_name: String,
    pub frame: Rect,
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    pub fn is_text_bearing(&self) -> bool {
        TEXT_BEARING_CLASSES.contains(&self.class_name.as_str())
    }

    /// Depth-first walk collecting every descendant (self included) whose
    /// class is text-bearing, as `(view_oid, layer_oid)` pairs (spec §4.4).
    pub fn collect_text_bearing_oids(&self, out: &mut Vec<(u64, u64)>) {
        if self.is_text_bearing() {
            out.push((self.view_oid, self.layer_oid));
        }
        for child in &self.children {
            child.collect_text_bearing_oids(out);
        }
    }

    /// Find the layer oid owned by the view with `view_oid`, if present in
    /// this subtree (spec §4.4 view-oid/layer-oid resolution).
    pub fn find_layer_oid_for_view(&self, view_oid: u64) -> Option<u64> {
        if self.view_oid == view_oid {
            return Some(self.layer_oid);
        }
        self.children
            .iter()
            .find_map(|c| c.find_layer_oid_for_view(view_oid))
    }

    pub fn find(&self, view_oid: u64) -> Option<&HierarchyNode> {
        if self.view_oid == view_oid {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(view_oid))
    }
}

impl TryFrom<&Value> for HierarchyNode {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self, Error> {
        let view_oid = value.get("viewOid").and_then(Value::as_u64).ok_or_else(|| missing("viewOid"))?;
        let layer_oid = value.get("layerOid").and_then(Value::as_u64).ok_or_else(|| missing("layerOid"))?;
        let class_name = value
            .get("className")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| missing("className"))?;
        let frame = match value.get("frame") {
            Some(Value::Rect(r)) => *r,
            _ => return Err(missing("frame")),
        };
        let children = match value.get("children") {
            Some(Value::Array(items)) => items
                .iter()
                .map(HierarchyNode::try_from)
                .collect::<Result<Vec<_>, _>>()?,
            _ => Vec::new(),
        };
        Ok(HierarchyNode {
            view_oid,
            layer_oid,
            class_name,
            frame,
            children,
        })
    }
}

/// Response to code 202 (and, when the server conflates the two, code 201 —
/// spec §9 open question: "the hierarchy response may occasionally return
/// `LookinHierarchyInfo` for request code 201").
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyInfo {
    pub app_info: Option<AppInfo>,
    pub root: HierarchyNode,
}

impl TryFrom<&Value> for HierarchyInfo {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self, Error> {
        let app_info = match value.get("appInfo") {
            Some(v) if *v != Value::Null => Some(AppInfo::try_from(v)?),
            _ => None,
        };
        let root = value
            .get("root")
            .ok_or_else(|| missing("root"))
            .and_then(HierarchyNode::try_from)?;
        Ok(HierarchyInfo { app_info, root })
    }
}

/// One attribute reading from a `LookinAttributesGroup` (response to code
/// 210, spec §6).
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeItem {
    pub identifier: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributesGroup {
    pub name: String,
    pub items: Vec<AttributeItem>,
}

impl TryFrom<&Value> for AttributesGroup {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self, Error> {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default();
        let items = match value.get("items") {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|entry| {
                    let identifier = entry.get("identifier")?.as_str()?.to_string();
                    let value = entry.get("value")?.clone();
                    Some(AttributeItem { identifier, value })
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(AttributesGroup { name, items })
    }
}

/// Parse a list of `LookinAttributesGroup` from a response `data` array.
pub fn parse_attr_groups(value: &Value) -> Result<Vec<AttributesGroup>, Error> {
    value
        .as_array()
        .ok_or_else(|| Error::InvalidFrame("expected an array of attribute groups".into()))?
        .iter()
        .map(AttributesGroup::try_from)
        .collect()
}

/// Extract every non-empty text-bearing attribute value out of a decoded
/// attribute-groups response, joined with `" | "` (spec §4.4).
pub fn extract_text(groups: &[AttributesGroup]) -> Option<String> {
    let mut found = Vec::new();
    for group in groups {
        for item in &group.items {
            if TEXT_ATTRIBUTE_IDS.contains(&item.identifier.as_str()) {
                if let Some(s) = item.value.as_str() {
                    if !s.is_empty() {
                        found.push(s.to_string());
                    }
                }
            }
        }
    }
    if found.is_empty() {
        None
    } else {
        Some(found.join(" | "))
    }
}

/// Sentinel the server returns as a method's `description` for void return
/// values (spec §6, request code 206).
pub const VOID_RETURN_SENTINEL: &str = "LOOKIN_TAG_RETURN_VALUE_VOID";

/// Parse the `description` field out of an invoke-method response.
pub fn parse_invoke_description(value: &Value) -> Result<Option<String>, Error> {
    let description = value
        .get("description")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("description"))?;
    if description == VOID_RETURN_SENTINEL {
        Ok(None)
    } else {
        Ok(Some(description.to_string()))
    }
}

/// Parse a list-of-strings response (code 213).
pub fn parse_string_list(value: &Value) -> Result<Vec<String>, Error> {
    value
        .as_array()
        .ok_or_else(|| Error::InvalidFrame("expected an array of strings".into()))?
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::InvalidFrame("expected a string in list".into()))
        })
        .collect()
}

/// `LookinDisplayItemDetail`'s success indicator (code 204 response).
pub fn parse_modification_success(value: &Value) -> Result<bool, Error> {
    value
        .get("success")
        .and_then(Value::as_bool)
        .ok_or_else(|| missing("success"))
}

/// Build the `LookinAttributeModification` request object (code 204).
#[allow(clippy::too_many_arguments)]
pub fn build_modification(
    target_oid: u64,
    setter_selector: &str,
    attr_type: i32,
    value: Value,
    client_readable_version: &str,
) -> Value {
    let mut fields: BTreeMap<String, Value> = BTreeMap::new();
    fields.insert("targetOid".to_string(), Value::Int(target_oid as i64));
    fields.insert("setterSelector".to_string(), Value::Str(setter_selector.to_string()));
    fields.insert("attrType".to_string(), Value::Int(attr_type as i64));
    fields.insert("value".to_string(), value);
    fields.insert(
        "clientReadableVersion".to_string(),
        Value::Str(client_readable_version.to_string()),
    );
    Value::ClassedObject {
        class_name: "LookinAttributeModification".to_string(),
        fields,
    }
}
