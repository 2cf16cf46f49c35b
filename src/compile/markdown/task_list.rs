//! Task list plugin for Markdown.
//!
//! List items starting with `[ ]` or `[x]` are rendered with a disabled
//! checkbox, as on GitHub.

use markdown_it::{
    parser::{core::CoreRule, inline::Text},
    plugins::cmark::block::{list::ListItem, paragraph::Paragraph},
    MarkdownIt, Node, NodeValue, Renderer,
};

/// Add a Markdown rule for task lists.
pub fn add(md: &mut MarkdownIt) {
    md.add_rule::<TaskListRule>();
}

/// Checkbox rendered at the start of a task list item.
#[derive(Debug)]
struct TaskCheckbox {
    checked: bool,
}

impl NodeValue for TaskCheckbox {
    fn render(&self, _: &Node, fmt: &mut dyn Renderer) {
        const INPUT: &str = "input";

        let mut attrs = vec![
            ("type", "checkbox".to_owned()),
            ("disabled", String::new()),
        ];
        if self.checked {
            attrs.push(("checked", String::new()));
        }

        fmt.self_close(INPUT, &attrs);
        fmt.text(" ");
    }
}

/// Task list rule for Markdown.
struct TaskListRule;

impl CoreRule for TaskListRule {
    fn run(root: &mut Node, _: &MarkdownIt) {
        root.walk_mut(|node, _| {
            if !node.is::<ListItem>() {
                return;
            }

            // Loose lists wrap the item content in a paragraph
            let is_loose = node
                .children
                .first()
                .is_some_and(|first| first.is::<Paragraph>());

            let container = if is_loose {
                &mut node.children[0]
            } else {
                &mut *node
            };

            let Some(checked) = strip_marker(container) else {
                return;
            };

            container
                .children
                .insert(0, Node::new(TaskCheckbox { checked }));

            node.attrs.push(("class", "task-list-item".to_owned()));
        });
    }
}

/// Remove a leading `[ ] ` or `[x] ` marker from the first text child.
///
/// Returns whether the task is checked, or [`None`] when there is no marker.
fn strip_marker(container: &mut Node) -> Option<bool> {
    let text = container.children.first_mut()?.cast_mut::<Text>()?;

    let (checked, rest) = ["[ ]", "[x]", "[X]"].into_iter().find_map(|marker| {
        let rest = text.content.strip_prefix(marker)?;
        let checked = marker != "[ ]";
        if rest.is_empty() {
            Some((checked, rest))
        } else {
            rest.strip_prefix([' ', '\t']).map(|rest| (checked, rest))
        }
    })?;

    text.content = rest.to_owned();

    Some(checked)
}
