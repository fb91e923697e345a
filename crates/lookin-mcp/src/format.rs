//! Text rendering for tool output. Deliberately minimal — spec.md §1
//! descopes elaborating these into richer prettyprinters; each returns
//! whatever an assistant needs to read, nothing more.

use lookin_proto::hierarchy::{HierarchyInfo, HierarchyNode};

/// Render the view hierarchy as an indented tree: one line per node, class
/// name plus its view/layer oid pair.
pub fn render_tree(info: &HierarchyInfo) -> String {
    let mut out = String::new();
    if let Some(app) = &info.app_info {
        out.push_str(&format!("{} ({})\n", app.app_name, app.bundle_identifier));
    }
    render_node(&info.root, 0, &mut out);
    out
}

fn render_node(node: &HierarchyNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    out.push_str(&format!(
        "{indent}{} [view={} layer={}] {{{:.0},{:.0},{:.0},{:.0}}}\n",
        node.class_name, node.view_oid, node.layer_oid, node.frame.x, node.frame.y, node.frame.width, node.frame.height
    ));
    for child in &node.children {
        render_node(child, depth + 1, out);
    }
}

/// Render one view/layer pair's details, including its resolved text if any
/// was enriched.
pub fn render_detail(node: &HierarchyNode, text: Option<&str>) -> String {
    let mut out = format!(
        "{}\nview oid: {}\nlayer oid: {}\nframe: x={}, y={}, width={}, height={}\n",
        node.class_name, node.view_oid, node.layer_oid, node.frame.x, node.frame.y, node.frame.width, node.frame.height
    );
    match text {
        Some(t) => out.push_str(&format!("text: {t}\n")),
        None => out.push_str("text: (none)\n"),
    }
    out.push_str(&format!("children: {}\n", node.children.len()));
    out
}
