//! ASCII rendering of exploration trees.

use uuid::Uuid;

use crate::models::Item;

const EXPLORED: char = '●';
const LEAF: char = '○';
const CURRENT_MARKER: &str = "  ◀";

/// Symbol for a node: filled once it has been broken down further.
fn node_symbol(item: &Item) -> char {
    if item.children.is_empty() {
        LEAF
    } else {
        EXPLORED
    }
}

/// Render trees as ASCII art, marking `current` if given.
///
/// Example output:
/// ```text
/// Car
/// ├── ● Engine
/// │   ├── ○ Piston
/// │   └── ○ Crankshaft  ◀
/// └── ○ Wheel
/// ```
pub fn render_tree(roots: &[Item], current: Option<Uuid>) -> String {
    let mut output = String::new();
    for (i, root) in roots.iter().enumerate() {
        let is_last = i == roots.len() - 1;
        render_node(&mut output, root, "", is_last, true, current);
    }
    output
}

fn render_node(
    output: &mut String,
    item: &Item,
    prefix: &str,
    is_last: bool,
    is_root: bool,
    current: Option<Uuid>,
) {
    if is_root {
        output.push_str(&item.name);
    } else {
        let branch = if is_last { "└── " } else { "├── " };
        output.push_str(prefix);
        output.push_str(branch);
        output.push(node_symbol(item));
        output.push(' ');
        output.push_str(&item.name);
    }
    if current == Some(item.id) {
        output.push_str(CURRENT_MARKER);
    }
    output.push('\n');

    let child_prefix = if is_root {
        String::new()
    } else {
        let continuation = if is_last { "    " } else { "│   " };
        format!("{}{}", prefix, continuation)
    };

    for (i, child) in item.children.iter().enumerate() {
        let child_is_last = i == item.children.len() - 1;
        render_node(output, child, &child_prefix, child_is_last, false, current);
    }
}
