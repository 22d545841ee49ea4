#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

pub mod component;
mod config;
mod core;
mod dispatch;
mod engine;
mod error;
#[cfg(feature = "logging")]
pub mod logging;
pub mod observe;
mod packet;
mod render;
#[cfg(feature = "tokio")]
mod runtime;
pub mod source;

pub use crate::component::{Component, Element, FnComponent, Host, Mount};
pub use crate::config::Options;
pub use crate::core::{Props, PropsExt};
pub use crate::dispatch::Completion;
pub use crate::engine::{NodeId, NodePath, Prerender, Rendered, Segment, Slot};
pub use crate::error::RenderError;
pub use crate::observe::{Async, Dependencies, Observe, wrap, wrap_with};
pub use crate::packet::{DEFAULT_GLOBAL, DataPacket, Record, Records};
pub use crate::render::{HtmlRenderer, RenderTree, RenderedNode, Renderer, Resolved};
pub use crate::source::{BoxSource, Source};

/// Renders `root` with the default HTML prerenderer and hands the outcome to
/// `completion`.
///
/// Shorthand for `Prerender::html().render_to_string(root, completion)`.
pub async fn render_to_string(root: &Element, completion: Completion<'_>) {
    Prerender::html().render_to_string(root, completion).await
}
