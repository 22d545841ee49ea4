//! Components and the element tree they render into.
//!
//! The tree is rebuilt from scratch on every render pass, so nothing in here
//! carries identity. Identity comes from the structural position of a node,
//! see [`NodePath`](crate::NodePath).

use std::borrow::Cow;
use std::sync::Arc;

use crate::core::Props;
use crate::observe::Observe;

/// A renderable component.
///
/// Implement this directly for class-style components, or use [`from_fn`]
/// for factory-style ones. A component that returns `Some` from
/// [`observer`](Component::observer) declares asynchronous dependencies;
/// every other component is inert and rendered as-is.
pub trait Component: Send + Sync + 'static {
    /// Produces the element tree for the given props.
    fn render(&self, props: &Props) -> anyhow::Result<Element>;

    /// Type name used in node paths and error messages.
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }

    /// Dependency declaration carried by the component itself.
    fn observer(&self) -> Option<&dyn Observe> {
        None
    }
}

/// Factory-style component built from a plain function.
pub struct FnComponent<F> {
    name: Cow<'static, str>,
    render: F,
}

/// Creates a component from a render function.
///
/// ```rust
/// use prerender::{Element, PropsExt, component};
///
/// let legacy = component::from_fn("Legacy", |props| {
///     Ok(Element::host("div").child(Element::text(props.text("message"))).into())
/// });
/// ```
pub fn from_fn<F>(name: impl Into<Cow<'static, str>>, render: F) -> FnComponent<F>
where
    F: Fn(&Props) -> anyhow::Result<Element> + Send + Sync + 'static,
{
    FnComponent {
        name: name.into(),
        render,
    }
}

impl<F> Component for FnComponent<F>
where
    F: Fn(&Props) -> anyhow::Result<Element> + Send + Sync + 'static,
{
    fn render(&self, props: &Props) -> anyhow::Result<Element> {
        (self.render)(props)
    }

    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }
}

/// A node of the element tree.
#[derive(Clone)]
pub enum Element {
    /// Renders nothing.
    Empty,
    /// Escaped text.
    Text(String),
    /// A plain markup element such as `div`.
    Host(Host),
    /// A component instance, rendered lazily by the renderer.
    Mount(Mount),
    /// A list of siblings without a wrapping element.
    Fragment(Vec<Element>),
}

impl Element {
    pub fn text(text: impl Into<String>) -> Self {
        Element::Text(text.into())
    }

    pub fn host(tag: impl Into<Cow<'static, str>>) -> Host {
        Host {
            tag: tag.into(),
            key: None,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Mounts `component` with `props`.
    pub fn mount(component: impl Component, props: Props) -> Self {
        Self::mount_shared(Arc::new(component), props)
    }

    /// Mounts an already shared component, useful when the same component
    /// value is mounted from many places.
    pub fn mount_shared(component: Arc<dyn Component>, props: Props) -> Self {
        Element::Mount(Mount {
            component,
            props,
            key: None,
        })
    }

    pub fn fragment(children: impl IntoIterator<Item = Element>) -> Self {
        Element::Fragment(children.into_iter().collect())
    }

    /// Sets an explicit key, which replaces the child index in the node path.
    pub fn keyed(self, key: impl Into<String>) -> Self {
        match self {
            Element::Host(host) => Element::Host(host.key(key)),
            Element::Mount(mut mount) => {
                mount.key = Some(key.into());
                Element::Mount(mount)
            }
            other => other,
        }
    }
}

/// A plain markup element.
#[derive(Clone)]
pub struct Host {
    pub tag: Cow<'static, str>,
    pub key: Option<String>,
    pub attrs: Vec<(Cow<'static, str>, String)>,
    pub children: Vec<Element>,
}

impl Host {
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn attr(mut self, name: impl Into<Cow<'static, str>>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn child(mut self, child: impl Into<Element>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }
}

impl From<Host> for Element {
    fn from(value: Host) -> Self {
        Element::Host(value)
    }
}

/// A component together with the props it is mounted with.
#[derive(Clone)]
pub struct Mount {
    pub component: Arc<dyn Component>,
    pub props: Props,
    pub key: Option<String>,
}
