//! The eleven MCP tools (spec.md §6), each dispatching into a shared
//! `Session`/`RequestManager` and returning one text block.

use std::fmt;
use std::time::Duration;

use lookin_proto::registry::{self, Lookup, TargetKind};
use lookin_proto::value_parse;
use lookin_proto::{Error as ProtoError, Session};
use serde_json::{json, Value};

use crate::format;

#[derive(Debug)]
pub enum ToolError {
    UnknownTool(String),
    InvalidParams(String),
    Protocol(ProtoError),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::UnknownTool(name) => write!(f, "unknown tool {name:?}"),
            ToolError::InvalidParams(msg) => write!(f, "invalid params: {msg}"),
            ToolError::Protocol(err) => write!(f, "{err}"),
        }
    }
}

impl From<ProtoError> for ToolError {
    fn from(err: ProtoError) -> Self {
        ToolError::Protocol(err)
    }
}

pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Every tool this bridge exposes, with the JSON input schema an MCP client
/// uses to drive it.
pub fn tool_descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "lookin_connect",
            description: "Connect to a LookinServer instance. Auto-discovers the port if omitted.",
            input_schema: json!({
                "type": "object",
                "properties": { "port": { "type": "integer" } },
            }),
        },
        ToolDescriptor {
            name: "lookin_disconnect",
            description: "Disconnect from the current LookinServer instance.",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolDescriptor {
            name: "lookin_ping",
            description: "Check whether the connected LookinServer is responsive.",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolDescriptor {
            name: "lookin_app_info",
            description: "Fetch the target app's name, bundle id, device, and OS version.",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolDescriptor {
            name: "lookin_hierarchy",
            description: "Fetch the full view hierarchy as an indented tree.",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolDescriptor {
            name: "lookin_view_detail",
            description: "Describe one view/layer pair, including its resolved text.",
            input_schema: json!({
                "type": "object",
                "properties": { "view_oid": { "type": "integer" } },
                "required": ["view_oid"],
            }),
        },
        ToolDescriptor {
            name: "lookin_search",
            description: "Search the hierarchy for views whose class name or text matches a query.",
            input_schema: json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"],
            }),
        },
        ToolDescriptor {
            name: "lookin_subtree",
            description: "Render the subtree rooted at a given view oid.",
            input_schema: json!({
                "type": "object",
                "properties": { "view_oid": { "type": "integer" } },
                "required": ["view_oid"],
            }),
        },
        ToolDescriptor {
            name: "lookin_modify",
            description: "Set a curated attribute on a view (see lookin_selectors for the \"help\" pseudo-attribute).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "view_oid": { "type": "integer" },
                    "attribute": { "type": "string" },
                    "value": { "type": "string" },
                },
                "required": ["view_oid", "attribute", "value"],
            }),
        },
        ToolDescriptor {
            name: "lookin_invoke",
            description: "Invoke a zero/one-arg selector on an object oid and report its description.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "oid": { "type": "integer" },
                    "selector": { "type": "string" },
                },
                "required": ["oid", "selector"],
            }),
        },
        ToolDescriptor {
            name: "lookin_selectors",
            description: "List selector names known for a class.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "class_name": { "type": "string" },
                    "has_arg": { "type": "boolean" },
                },
                "required": ["class_name"],
            }),
        },
    ]
}

fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidParams(format!("missing string field {key:?}")))
}

fn u64_param(params: &Value, key: &str) -> Result<u64, ToolError> {
    params
        .get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| ToolError::InvalidParams(format!("missing integer field {key:?}")))
}

fn bool_param_or(params: &Value, key: &str, default: bool) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// Dispatch one tool call by name, returning the single text block the
/// caller should render as the tool's output.
pub async fn dispatch(
    session: &Session,
    name: &str,
    params: &Value,
    connect_timeout: Duration,
) -> Result<String, ToolError> {
    match name {
        "lookin_connect" => {
            let _ = connect_timeout; // port-probe timeout lives in Session; reserved for future use.
            match params.get("port").and_then(Value::as_u64) {
                Some(port) => {
                    let port = u16::try_from(port)
                        .map_err(|_| ToolError::InvalidParams("port out of range".into()))?;
                    session.connect_to(port).await?;
                    Ok(format!("connected on port {port}"))
                }
                None => {
                    let port = session.connect_auto().await?;
                    Ok(format!("connected on port {port}"))
                }
            }
        }
        "lookin_disconnect" => {
            session.disconnect().await;
            Ok("disconnected".to_string())
        }
        "lookin_ping" => {
            session.ping(None).await?;
            Ok("alive".to_string())
        }
        "lookin_app_info" => {
            let info = session.app_info(None).await?;
            Ok(format!(
                "{} ({})\ndevice: {}\nsystem: {}\nscreen scale: {}",
                info.app_name, info.bundle_identifier, info.device_name, info.system_version, info.screen_scale
            ))
        }
        "lookin_hierarchy" => {
            let info = session.hierarchy(None).await?;
            Ok(format::render_tree(&info))
        }
        "lookin_view_detail" => {
            let view_oid = u64_param(params, "view_oid")?;
            let node = session.find_node(view_oid, None).await?;
            let enriched = session.hierarchy_with_text(None).await?;
            let text = enriched.text_by_view_oid.get(&view_oid).map(String::as_str);
            Ok(format::render_detail(&node, text))
        }
        "lookin_search" => {
            let query = str_param(params, "query")?.to_ascii_lowercase();
            let enriched = session.hierarchy_with_text(None).await?;
            let mut matches = Vec::new();
            collect_matches(&enriched.info.root, &query, &enriched.text_by_view_oid, &mut matches);
            if matches.is_empty() {
                Ok("no matches".to_string())
            } else {
                Ok(matches.join("\n"))
            }
        }
        "lookin_subtree" => {
            let view_oid = u64_param(params, "view_oid")?;
            let node = session.find_node(view_oid, None).await?;
            let mut out = String::new();
            render_subtree(&node, 0, &mut out);
            Ok(out)
        }
        "lookin_modify" => {
            let view_oid = u64_param(params, "view_oid")?;
            let attribute = str_param(params, "attribute")?;
            let raw_value = str_param(params, "value")?;

            match registry::lookup(attribute) {
                Lookup::Help(text) => Ok(text),
                Lookup::Unknown => Err(ProtoError::UnknownAttribute(attribute.to_string()).into()),
                Lookup::Mapping(mapping) => {
                    let value = value_parse::parse_value(raw_value, mapping.attr_type, attribute)?;
                    let target_oid = if mapping.needs_patch && matches!(mapping.target_kind, TargetKind::Layer) {
                        session.resolve_layer_oid(view_oid).await
                    } else {
                        view_oid
                    };
                    let success = session
                        .modify_attribute(target_oid, mapping.setter_selector, mapping.attr_type.code(), value, None)
                        .await?;
                    Ok(format!("{attribute} modification {}", if success { "succeeded" } else { "failed" }))
                }
            }
        }
        "lookin_invoke" => {
            let oid = u64_param(params, "oid")?;
            let selector = str_param(params, "selector")?;
            let description = session.invoke_method(oid, selector, None).await?;
            Ok(description.unwrap_or_else(|| "(void)".to_string()))
        }
        "lookin_selectors" => {
            let class_name = str_param(params, "class_name")?;
            let has_arg = bool_param_or(params, "has_arg", false);
            let selectors = session.list_selectors(class_name, has_arg, None).await?;
            if selectors.is_empty() {
                Ok("no selectors found".to_string())
            } else {
                Ok(selectors.join("\n"))
            }
        }
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

fn collect_matches(
    node: &lookin_proto::hierarchy::HierarchyNode,
    query: &str,
    text_by_view_oid: &std::collections::HashMap<u64, String>,
    out: &mut Vec<String>,
) {
    let class_hit = node.class_name.to_ascii_lowercase().contains(query);
    let text_hit = text_by_view_oid
        .get(&node.view_oid)
        .is_some_and(|t| t.to_ascii_lowercase().contains(query));
    if class_hit || text_hit {
        out.push(format!("view={} layer={} {}", node.view_oid, node.layer_oid, node.class_name));
    }
    for child in &node.children {
        collect_matches(child, query, text_by_view_oid, out);
    }
}

fn render_subtree(node: &lookin_proto::hierarchy::HierarchyNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    out.push_str(&format!("{indent}{} [view={} layer={}]\n", node.class_name, node.view_oid, node.layer_oid));
    for child in &node.children {
        render_subtree(child, depth + 1, out);
    }
}
