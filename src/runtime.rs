use crate::component::Element;
use crate::dispatch::Completion;
use crate::engine::{Prerender, Rendered};
use crate::error::RenderError;
use crate::render::Renderer;

fn current_thread() -> Result<tokio::runtime::Runtime, RenderError> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

impl<R: Renderer> Prerender<R> {
    /// Runs [`resolve`](Self::resolve) to completion on a temporary
    /// single-threaded Tokio runtime.
    ///
    /// Must not be called from within an async context.
    pub fn resolve_blocking(&self, root: &Element) -> Result<Rendered, RenderError> {
        current_thread()?.block_on(self.resolve(root))
    }

    /// Blocking counterpart of [`render_to_string`](Self::render_to_string).
    /// A runtime that can't be built is reported through `completion` too.
    pub fn render_to_string_blocking(&self, root: &Element, completion: Completion<'_>) {
        match current_thread() {
            Ok(runtime) => runtime.block_on(self.render_to_string(root, completion)),
            Err(err) => completion.dispatch(Err(err), &self.options().global),
        }
    }
}
