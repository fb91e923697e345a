//! The object-graph value model the archive codec encodes and decodes
//! (spec §4.3). This is the host-side shape every LookinServer payload is
//! projected into — it is deliberately flatter than Apple's actual keyed
//! archive object graph (see `codec.rs` module docs for why a from-scratch
//! re-implementation of that format is out of scope).

use std::collections::BTreeMap;

/// One geometric or color primitive the wire format uses alongside the
/// usual scalar/collection types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeInsets {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

/// RGBA color, each component in `[0, 1]` (spec §6: "Colors are encoded as
/// a 4-element list of floats `[r,g,b,a]`").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// A decoded/to-be-encoded node in the archive object graph.
///
/// `ClassedObject` stands in for Apple's keyed-archive root objects (the
/// ones with a class name, e.g. `LookinHierarchyInfo`, `LookinAttributesGroup`
/// — see spec §6). Everything else is a structural value with no class of
/// its own, same as a plain property-list fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Data(Vec<u8>),
    Array(Vec<Value>),
    Dict(BTreeMap<String, Value>),
    Rect(Rect),
    Point(Point),
    Size(Size),
    EdgeInsets(EdgeInsets),
    Color(Color),
    /// An instance of a named class carrying its own keyed fields, e.g.
    /// `ClassedObject { class_name: "LookinHierarchyInfo", fields: {..} }`.
    ClassedObject {
        class_name: String,
        fields: BTreeMap<String, Value>,
    },
}

impl Value {
    pub fn dict(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> Self {
        Value::Dict(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    pub fn classed(
        class_name: impl Into<String>,
        fields: impl IntoIterator<Item = (&'static str, Value)>,
    ) -> Self {
        Value::ClassedObject {
            class_name: class_name.into(),
            fields: fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            Value::ClassedObject { fields, .. } => Some(fields),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_i64().and_then(|n| u64::try_from(n).ok())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            Value::ClassedObject { class_name, .. } => Some(class_name),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_dict().and_then(|d| d.get(key))
    }
}
