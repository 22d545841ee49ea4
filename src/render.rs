//! The renderer seam.
//!
//! The engine needs three things from a renderer: a pass that turns the
//! element tree into markup, a structural [`NodePath`] for every component
//! instance it rendered, and the instances themselves as a tree. Anything
//! implementing [`Renderer`] can be driven by the engine; [`HtmlRenderer`]
//! is the bundled one.

use std::collections::HashSet;
use std::sync::Arc;

use crate::component::{Component, Element, Host, Mount};
use crate::core::Props;
use crate::engine::{NodePath, Registry, Slot};
use crate::error::RenderError;
use crate::observe::overlay;
use crate::packet::{DataPacket, Records};

/// Renders an element tree in one synchronous pass.
pub trait Renderer {
    /// Renders `root`. Component instances whose data is available through
    /// `resolved` must be rendered with that data overlaid on their props.
    fn render(&self, root: &Element, resolved: &Resolved<'_>) -> Result<RenderTree, RenderError>;
}

/// Read-only view of the data settled so far, handed to the renderer.
pub struct Resolved<'a> {
    registry: &'a Registry,
    packet: &'a DataPacket,
    seed: Option<&'a DataPacket>,
}

impl<'a> Resolved<'a> {
    pub(crate) fn new(
        registry: &'a Registry,
        packet: &'a DataPacket,
        seed: Option<&'a DataPacket>,
    ) -> Self {
        Self {
            registry,
            packet,
            seed,
        }
    }

    /// Settled records for the node at `path`, if all of its dependencies
    /// have settled in this render or were supplied by the seed packet.
    pub fn records(&self, path: &NodePath) -> Option<&'a Records> {
        let id = self.registry.peek(path);
        self.packet
            .get(&id)
            .or_else(|| self.seed.and_then(|seed| seed.get(&id)))
    }

    /// Props to render the node at `path` with.
    pub fn props(&self, path: &NodePath, props: &Props) -> Props {
        match self.records(path) {
            Some(records) => overlay(props, records),
            None => props.clone(),
        }
    }
}

/// A component instance met during a render pass.
#[derive(Clone)]
pub struct RenderedNode {
    pub path: NodePath,
    pub component: Arc<dyn Component>,
    /// Props as mounted by the parent, before any data overlay.
    pub props: Props,
    /// Component instances rendered underneath this one.
    pub children: Vec<RenderedNode>,
}

/// Output of a render pass.
pub struct RenderTree {
    pub markup: String,
    /// Top-level component instances, in render order.
    pub nodes: Vec<RenderedNode>,
}

impl RenderTree {
    /// Every component instance, parents before their children.
    pub fn instances(&self) -> impl Iterator<Item = &RenderedNode> {
        let mut stack: Vec<&RenderedNode> = self.nodes.iter().rev().collect();
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}

const VOID: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Renders elements to an HTML string.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn render(&self, root: &Element, resolved: &Resolved<'_>) -> Result<RenderTree, RenderError> {
        let mut pass = Pass {
            markup: String::new(),
            resolved,
        };

        let mut nodes = Vec::new();
        pass.element(root, &NodePath::root(), Slot::Index(0), &mut nodes)?;

        Ok(RenderTree {
            markup: pass.markup,
            nodes,
        })
    }
}

struct Pass<'r, 'a> {
    markup: String,
    resolved: &'r Resolved<'a>,
}

impl Pass<'_, '_> {
    fn element(
        &mut self,
        element: &Element,
        parent: &NodePath,
        slot: Slot,
        nodes: &mut Vec<RenderedNode>,
    ) -> Result<(), RenderError> {
        match element {
            Element::Empty => {}
            Element::Text(text) => escape(&mut self.markup, text, false),
            Element::Fragment(children) => {
                let path = parent.child(slot, "#fragment");
                self.children(children, &path, nodes)?;
            }
            Element::Host(host) => self.host(host, parent, slot, nodes)?,
            Element::Mount(mount) => self.mount(mount, parent, slot, nodes)?,
        }

        Ok(())
    }

    fn children(
        &mut self,
        children: &[Element],
        path: &NodePath,
        nodes: &mut Vec<RenderedNode>,
    ) -> Result<(), RenderError> {
        let mut keys = HashSet::new();

        for (index, child) in children.iter().enumerate() {
            let slot = match child {
                Element::Host(Host { key: Some(key), .. })
                | Element::Mount(Mount { key: Some(key), .. }) => {
                    if keys.insert(key.as_str()) {
                        Slot::Key(key.clone())
                    } else {
                        // Keyed and indexed slots never encode alike, so the
                        // index keeps a repeated key apart from its siblings.
                        tracing::warn!(parent = %path, %key, index, "duplicate key among siblings");
                        Slot::Index(index)
                    }
                }
                _ => Slot::Index(index),
            };
            self.element(child, path, slot, nodes)?;
        }
        Ok(())
    }

    fn host(
        &mut self,
        host: &Host,
        parent: &NodePath,
        slot: Slot,
        nodes: &mut Vec<RenderedNode>,
    ) -> Result<(), RenderError> {
        let path = parent.child(slot, host.tag.clone());

        self.markup.push('<');
        self.markup.push_str(&host.tag);
        for (name, value) in &host.attrs {
            self.markup.push(' ');
            self.markup.push_str(name);
            self.markup.push_str("=\"");
            escape(&mut self.markup, value, true);
            self.markup.push('"');
        }
        self.markup.push('>');

        if VOID.contains(&&*host.tag) {
            return Ok(());
        }

        self.children(&host.children, &path, nodes)?;

        self.markup.push_str("</");
        self.markup.push_str(&host.tag);
        self.markup.push('>');

        Ok(())
    }

    fn mount(
        &mut self,
        mount: &Mount,
        parent: &NodePath,
        slot: Slot,
        nodes: &mut Vec<RenderedNode>,
    ) -> Result<(), RenderError> {
        let name = mount.component.name();
        let path = parent.child(slot, name.clone());
        let props = self.resolved.props(&path, &mount.props);

        let element = mount
            .component
            .render(&props)
            .map_err(|err| RenderError::render(name, err))?;

        let mut children = Vec::new();
        self.element(&element, &path, Slot::Index(0), &mut children)?;

        nodes.push(RenderedNode {
            path,
            component: mount.component.clone(),
            props: mount.props.clone(),
            children,
        });

        Ok(())
    }
}

fn escape(out: &mut String, text: &str, attr: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            '\'' if attr => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::component::from_fn;
    use crate::core::PropsExt;
    use crate::packet::Record;

    fn render(root: &Element) -> RenderTree {
        let registry = Registry::new();
        let packet = DataPacket::new();
        HtmlRenderer
            .render(root, &Resolved::new(&registry, &packet, None))
            .unwrap()
    }

    fn greeting() -> impl Component {
        from_fn("Greeting", |props| {
            Ok(Element::host("p")
                .child(Element::text(props.text("message")))
                .into())
        })
    }

    #[test]
    fn test_markup_is_escaped() {
        let root: Element = Element::host("div")
            .attr("title", "\"quoted\" & <b>")
            .child(Element::text("a < b && c > d"))
            .child(Element::host("br"))
            .into();

        assert_eq!(
            render(&root).markup,
            r#"<div title="&quot;quoted&quot; &amp; &lt;b&gt;">a &lt; b &amp;&amp; c &gt; d<br></div>"#
        );
    }

    #[test]
    fn test_components_are_collected_as_tree() {
        let outer = from_fn("Outer", |_| {
            Ok(Element::host("section")
                .child(Element::mount(greeting(), Props::new()))
                .child(Element::mount(greeting(), Props::new()).keyed("second"))
                .into())
        });

        let tree = render(&Element::mount(outer, Props::new()));
        let paths: Vec<_> = tree.instances().map(|n| n.path.to_string()).collect();

        assert_eq!(
            paths,
            vec![
                "/0:Outer",
                "/0:Outer/0:section/0:Greeting",
                "/0:Outer/0:section/second:Greeting",
            ]
        );
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].children.len(), 2);
    }

    #[test]
    fn test_repeated_key_falls_back_to_index() {
        let root: Element = Element::host("div")
            .child(Element::mount(greeting(), Props::new()).keyed("x"))
            .child(Element::mount(greeting(), Props::new()).keyed("x"))
            .child(Element::mount(greeting(), Props::new()).keyed("y"))
            .into();

        let tree = render(&root);
        let paths: Vec<_> = tree.instances().map(|n| n.path.to_string()).collect();

        assert_eq!(
            paths,
            vec!["/0:div/x:Greeting", "/0:div/1:Greeting", "/0:div/y:Greeting"]
        );
    }

    #[test]
    fn test_resolved_records_are_overlaid() {
        let root = Element::mount(greeting(), Props::new());
        let path = NodePath::root().child(Slot::Index(0), "Greeting");

        let mut registry = Registry::new();
        let id = registry.identify(&path);

        let mut records = Records::new();
        records.insert("message".into(), Record::resolved(None, json!("hello")));
        let mut packet = DataPacket::new();
        packet.insert(id, records);

        let tree = HtmlRenderer
            .render(&root, &Resolved::new(&registry, &packet, None))
            .unwrap();

        assert_eq!(tree.markup, "<p>hello</p>");
        // The node keeps the props it was mounted with.
        assert!(tree.nodes[0].props.get("message").is_none());
    }

    #[test]
    fn test_render_error_names_component() {
        let broken = from_fn("Broken", |_| anyhow::bail!("nope"));
        let registry = Registry::new();
        let packet = DataPacket::new();

        let err = HtmlRenderer
            .render(
                &Element::mount(broken, Props::new()),
                &Resolved::new(&registry, &packet, None),
            )
            .err()
            .unwrap();

        assert!(matches!(err, RenderError::Render { ref component, .. } if component == "Broken"));
    }
}
