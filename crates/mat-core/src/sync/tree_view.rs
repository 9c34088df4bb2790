//! Text rendering of the cache as a directory tree.

use std::collections::BTreeMap;

use super::cache::{Cache, CacheEntry};

#[derive(Default)]
struct Node<'c> {
    children: BTreeMap<&'c str, Node<'c>>,
    entry: Option<&'c CacheEntry>,
}

/// Render `cache` as an indented tree, one line per directory or file.
///
/// ```text
/// └─ src
///    ├─ index.js: sha256:4c28… [new]
///    └─ nested
///       └─ hoge.js: sha256:91aa…
/// ```
pub fn render(cache: &Cache, show_hash: bool) -> String {
    let mut root = Node::default();
    for entry in cache.iter() {
        let mut node = &mut root;
        for segment in entry.path.segments() {
            node = node.children.entry(segment).or_default();
        }
        node.entry = Some(entry);
    }

    let mut out = String::new();
    write_children(&mut out, &root, "", show_hash);
    out
}

fn write_children(out: &mut String, node: &Node<'_>, indent: &str, show_hash: bool) {
    let count = node.children.len();
    for (idx, (name, child)) in node.children.iter().enumerate() {
        let last = idx + 1 == count;
        let branch = if last { "└─" } else { "├─" };
        out.push_str(&format!("{indent}{branch} {name}"));

        if let Some(entry) = child.entry {
            if show_hash {
                out.push_str(": ");
                out.push_str(&entry.hash);
            }
            if let Some(tag) = entry.status.tag() {
                out.push(' ');
                out.push_str(tag);
            }
        }
        out.push('\n');

        let nested = format!("{indent}{}", if last { "   " } else { "│  " });
        write_children(out, child, &nested, show_hash);
    }
}
