//! Declaring asynchronous dependencies.
//!
//! A component declares its dependencies through an [`Observe`] capability,
//! which maps the component's current props to a set of named
//! [`Source`]s. The capability is either carried by the component itself
//! (see [`Component::observer`]) or attached from the outside with
//! [`wrap_with`]. When both exist the attached one wins outright, the two
//! declarations are never merged.

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::component::{Component, Element};
use crate::core::Props;
use crate::error::RenderError;
use crate::packet::Records;
use crate::source::{BoxSource, Source};

/// Named sources a component waits for before it is rendered with data.
#[derive(Default)]
pub struct Dependencies(BTreeMap<String, BoxSource>);

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dependency. A later source under the same name replaces the
    /// earlier one.
    pub fn with(mut self, name: impl Into<String>, source: impl Source + 'static) -> Self {
        self.0.insert(name.into(), Box::new(source));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: BoxSource) {
        self.0.insert(name.into(), source);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl IntoIterator for Dependencies {
    type Item = (String, BoxSource);
    type IntoIter = std::collections::btree_map::IntoIter<String, BoxSource>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(String, BoxSource)> for Dependencies {
    fn from_iter<I: IntoIterator<Item = (String, BoxSource)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Dependency declaration capability.
pub trait Observe: Send + Sync {
    /// Maps the current props to named sources. Must not have side effects
    /// beyond building the sources; starting them is the engine's job.
    fn dependencies(&self, props: &Props) -> anyhow::Result<Dependencies>;
}

impl<F> Observe for F
where
    F: Fn(&Props) -> anyhow::Result<Dependencies> + Send + Sync,
{
    fn dependencies(&self, props: &Props) -> anyhow::Result<Dependencies> {
        self(props)
    }
}

/// A component augmented with a dependency declaration.
pub struct Async<C> {
    inner: C,
    observe: Option<Box<dyn Observe>>,
}

/// Marks `component` as asynchronous, relying on the declaration the
/// component carries itself.
pub fn wrap<C: Component>(component: C) -> Async<C> {
    Async {
        inner: component,
        observe: None,
    }
}

/// Attaches `observe` to `component`. It takes precedence over any
/// declaration carried by the component itself.
pub fn wrap_with<C, O>(component: C, observe: O) -> Async<C>
where
    C: Component,
    O: Observe + 'static,
{
    Async {
        inner: component,
        observe: Some(Box::new(observe)),
    }
}

impl<C: Component> Async<C> {
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: Component> Component for Async<C> {
    fn render(&self, props: &Props) -> anyhow::Result<Element> {
        self.inner.render(props)
    }

    fn name(&self) -> Cow<'static, str> {
        self.inner.name()
    }

    fn observer(&self) -> Option<&dyn Observe> {
        match &self.observe {
            Some(observe) => Some(observe.as_ref()),
            None => self.inner.observer(),
        }
    }
}

/// Asks `component` for its dependencies. Inert components yield `None`.
pub(crate) fn extract(
    component: &dyn Component,
    props: &Props,
) -> Result<Option<Dependencies>, RenderError> {
    let Some(observer) = component.observer() else {
        return Ok(None);
    };

    observer
        .dependencies(props)
        .map(Some)
        .map_err(|err| RenderError::extraction(component.name(), err))
}

/// Returns `props` with every settled record written over the prop of the
/// same name. Failed records overlay `null`.
pub(crate) fn overlay(props: &Props, records: &Records) -> Props {
    let mut props = props.clone();
    for (name, record) in records {
        props.insert(name.clone(), record.data.clone());
    }
    props
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::component::from_fn;
    use crate::packet::Record;
    use crate::source::ready;

    fn blank() -> impl Component {
        from_fn("Blank", |_| Ok(Element::Empty))
    }

    fn message(_: &Props) -> anyhow::Result<Dependencies> {
        Ok(Dependencies::new().with("message", ready("hello")))
    }

    struct Static;

    impl Component for Static {
        fn render(&self, _: &Props) -> anyhow::Result<Element> {
            Ok(Element::Empty)
        }

        fn observer(&self) -> Option<&dyn Observe> {
            Some(self)
        }
    }

    impl Observe for Static {
        fn dependencies(&self, _: &Props) -> anyhow::Result<Dependencies> {
            Ok(Dependencies::new().with("fromStatic", ready(1)))
        }
    }

    #[test]
    fn test_inert_component_has_no_dependencies() {
        let deps = extract(&blank(), &Props::new()).unwrap();
        assert!(deps.is_none());
    }

    #[test]
    fn test_wrap_with_attaches_capability() {
        let component = wrap_with(blank(), message);
        let deps = extract(&component, &Props::new()).unwrap().unwrap();
        assert_eq!(deps.names().collect::<Vec<_>>(), vec!["message"]);
    }

    #[test]
    fn test_wrap_uses_static_capability() {
        let component = wrap(Static);
        let deps = extract(&component, &Props::new()).unwrap().unwrap();
        assert_eq!(deps.names().collect::<Vec<_>>(), vec!["fromStatic"]);
    }

    #[test]
    fn test_attached_capability_overrides_static() {
        let component = wrap_with(Static, message);
        let deps = extract(&component, &Props::new()).unwrap().unwrap();
        assert_eq!(deps.names().collect::<Vec<_>>(), vec!["message"]);
    }

    #[test]
    fn test_observe_sees_props() {
        let component = wrap_with(blank(), |props: &Props| {
            let id = props.get("id").cloned().unwrap_or_default();
            Ok(Dependencies::new().with(format!("user{id}"), ready(id)))
        });

        let props = json!({ "id": 7 }).as_object().cloned().unwrap();
        let deps = extract(&component, &props).unwrap().unwrap();
        assert_eq!(deps.names().collect::<Vec<_>>(), vec!["user7"]);
    }

    #[test]
    fn test_failing_observe_is_an_extraction_error() {
        let component = wrap_with(blank(), |_: &Props| -> anyhow::Result<Dependencies> {
            anyhow::bail!("no backend")
        });

        let err = extract(&component, &Props::new()).err().unwrap();
        assert!(matches!(err, RenderError::Extraction { ref component, .. } if component == "Blank"));
    }

    #[test]
    fn test_overlay_does_not_touch_original() {
        let props = json!({ "className": "x", "message": "old" })
            .as_object()
            .cloned()
            .unwrap();

        let mut records = Records::new();
        records.insert("message".into(), Record::resolved(None, json!("hello")));
        records.insert(
            "broken".into(),
            Record::failed(None, &anyhow::anyhow!("boom")),
        );

        let overlaid = overlay(&props, &records);
        assert_eq!(overlaid["message"], json!("hello"));
        assert_eq!(overlaid["className"], json!("x"));
        assert_eq!(overlaid["broken"], json!(null));
        assert_eq!(props["message"], json!("old"));
    }
}
