//! Attribute registry (spec §4.5): a curated, statically-populated table from
//! friendly attribute names to the wire tuple a modification needs.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::value_parse::AttrType;

/// Which object a modification's setter selector is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    View,
    Layer,
}

#[derive(Debug, Clone, Copy)]
pub struct AttributeMapping {
    pub friendly_name: &'static str,
    pub identifier: &'static str,
    pub setter_selector: &'static str,
    pub attr_type: AttrType,
    pub target_kind: TargetKind,
    /// Best-understanding flag (spec §9 open question: "whether the server
    /// tolerates view oid vs layer oid for every modifiable attribute is
    /// ambiguous") — properties the registry marks `needs_patch` are ones
    /// known to require the resolved oid of `target_kind` rather than
    /// tolerating either.
    pub needs_patch: bool,
    pub value_format_help: &'static str,
}

const ENTRIES: &[AttributeMapping] = &[
    AttributeMapping {
        friendly_name: "text",
        identifier: "lb_t_t",
        setter_selector: "setText:",
        attr_type: AttrType::Str,
        target_kind: TargetKind::View,
        needs_patch: false,
        value_format_help: "text: any string, passed through verbatim",
    },
    AttributeMapping {
        friendly_name: "textColor",
        identifier: "lb_t_c",
        setter_selector: "setTextColor:",
        attr_type: AttrType::Color,
        target_kind: TargetKind::View,
        needs_patch: false,
        value_format_help: "textColor: '#RRGGBB', '#RRGGBBAA', or 3-4 comma-separated floats in [0,1]",
    },
    AttributeMapping {
        friendly_name: "backgroundColor",
        identifier: "v_b_c",
        setter_selector: "setBackgroundColor:",
        attr_type: AttrType::Color,
        target_kind: TargetKind::Layer,
        needs_patch: true,
        value_format_help: "backgroundColor: '#RRGGBB', '#RRGGBBAA', or 3-4 comma-separated floats in [0,1]",
    },
    AttributeMapping {
        friendly_name: "alpha",
        identifier: "v_a",
        setter_selector: "setAlpha:",
        attr_type: AttrType::Double,
        target_kind: TargetKind::View,
        needs_patch: false,
        value_format_help: "alpha: decimal, typically in [0,1]",
    },
    AttributeMapping {
        friendly_name: "hidden",
        identifier: "v_h",
        setter_selector: "setHidden:",
        attr_type: AttrType::Bool,
        target_kind: TargetKind::View,
        needs_patch: false,
        value_format_help: "hidden: true|yes|1 or false|no|0",
    },
    AttributeMapping {
        friendly_name: "frame",
        identifier: "v_f",
        setter_selector: "setFrame:",
        attr_type: AttrType::Rect,
        target_kind: TargetKind::View,
        needs_patch: false,
        value_format_help: "frame: 'x,y,width,height'",
    },
    AttributeMapping {
        friendly_name: "cornerRadius",
        identifier: "l_cr",
        setter_selector: "setCornerRadius:",
        attr_type: AttrType::Double,
        target_kind: TargetKind::Layer,
        needs_patch: true,
        value_format_help: "cornerRadius: decimal",
    },
    AttributeMapping {
        friendly_name: "borderWidth",
        identifier: "l_bw",
        setter_selector: "setBorderWidth:",
        attr_type: AttrType::Double,
        target_kind: TargetKind::Layer,
        needs_patch: true,
        value_format_help: "borderWidth: decimal",
    },
    AttributeMapping {
        friendly_name: "borderColor",
        identifier: "l_bc",
        setter_selector: "setBorderColor:",
        attr_type: AttrType::Color,
        target_kind: TargetKind::Layer,
        needs_patch: true,
        value_format_help: "borderColor: '#RRGGBB', '#RRGGBBAA', or 3-4 comma-separated floats in [0,1]",
    },
    AttributeMapping {
        friendly_name: "contentEdgeInsets",
        identifier: "b_cei",
        setter_selector: "setContentEdgeInsets:",
        attr_type: AttrType::EdgeInsets,
        target_kind: TargetKind::View,
        needs_patch: false,
        value_format_help: "contentEdgeInsets: 'top,left,bottom,right'",
    },
];

fn registry() -> &'static HashMap<&'static str, AttributeMapping> {
    static REGISTRY: OnceLock<HashMap<&'static str, AttributeMapping>> = OnceLock::new();
    REGISTRY.get_or_init(|| ENTRIES.iter().map(|e| (e.friendly_name, *e)).collect())
}

/// Pseudo-name intercepted before lookup (spec §4.5).
pub const HELP_PSEUDO_NAME: &str = "help";

pub enum Lookup {
    Mapping(AttributeMapping),
    Help(String),
    Unknown,
}

/// Look up a friendly name, case-sensitive. `help` is special-cased to
/// return the full help text instead of a mapping.
pub fn lookup(friendly_name: &str) -> Lookup {
    if friendly_name == HELP_PSEUDO_NAME {
        return Lookup::Help(help_text());
    }
    match registry().get(friendly_name) {
        Some(mapping) => Lookup::Mapping(*mapping),
        None => Lookup::Unknown,
    }
}

/// All registered friendly names, for listing/help purposes.
pub fn help_text() -> String {
    let mut names: Vec<&AttributeMapping> = registry().values().collect();
    names.sort_by_key(|m| m.friendly_name);
    names
        .into_iter()
        .map(|m| format!("{} — {}", m.friendly_name, m.value_format_help))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_name_resolves_to_mapping() {
        match lookup("alpha") {
            Lookup::Mapping(m) => assert_eq!(m.setter_selector, "setAlpha:"),
            _ => panic!("expected a mapping"),
        }
    }

    #[test]
    fn unknown_name_is_unknown() {
        assert!(matches!(lookup("totallyMadeUp"), Lookup::Unknown));
    }

    #[test]
    fn help_pseudo_name_is_intercepted_before_lookup() {
        match lookup("help") {
            Lookup::Help(text) => assert!(text.contains("alpha")),
            _ => panic!("expected help text"),
        }
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert!(matches!(lookup("Alpha"), Lookup::Unknown));
    }
}
