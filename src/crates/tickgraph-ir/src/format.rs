//! Tree-rendering helpers shared by the `Display` impls.

pub(crate) fn tree_prefix(last: bool) -> &'static str {
    if last {
        "└─ "
    } else {
        "├─ "
    }
}

pub(crate) fn tree_indent(last: bool) -> &'static str {
    if last {
        "   "
    } else {
        "│  "
    }
}
