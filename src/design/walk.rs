use super::node::Node;

/// Pre-order traversal of the visible tree. The visitor sees each node
/// together with its ancestor chain (root first, immediate parent last).
/// A hidden node hides its whole subtree, so neither it nor any descendant
/// is visited.
pub fn walk<'a, F>(root: &'a Node, visit: &mut F)
where
    F: FnMut(&'a Node, &[&'a Node]),
{
    let mut ancestors: Vec<&'a Node> = Vec::new();
    walk_inner(root, &mut ancestors, visit);
}

fn walk_inner<'a, F>(node: &'a Node, ancestors: &mut Vec<&'a Node>, visit: &mut F)
where
    F: FnMut(&'a Node, &[&'a Node]),
{
    if !node.visible {
        return;
    }
    visit(node, ancestors);
    ancestors.push(node);
    for child in &node.children {
        walk_inner(child, ancestors, visit);
    }
    ancestors.pop();
}

/// True if any visible node in the subtree (root included) satisfies `pred`.
pub fn any<F>(root: &Node, mut pred: F) -> bool
where
    F: FnMut(&Node) -> bool,
{
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if !node.visible {
            continue;
        }
        if pred(node) {
            return true;
        }
        stack.extend(node.children.iter());
    }
    false
}
