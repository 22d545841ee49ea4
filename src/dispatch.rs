//! Delivering the result of a render to a completion callback.

use crate::engine::Rendered;
use crate::error::RenderError;
use crate::packet::DataPacket;

type MarkupFn<'a> = Box<dyn FnOnce(Result<String, RenderError>) + Send + 'a>;
type PacketFn<'a> = Box<dyn FnOnce(Result<(String, DataPacket), RenderError>) + Send + 'a>;

/// What the caller wants back once a render finishes.
///
/// The shape of the callback decides what happens to the data packet:
///
/// * [`Completion::markup`] receives the markup only, with the packet
///   injected into it as an inline script;
/// * [`Completion::with_packet`] receives the untouched markup together with
///   the packet.
///
/// Either way, a failed render delivers just the error.
pub enum Completion<'a> {
    Markup(MarkupFn<'a>),
    WithPacket(PacketFn<'a>),
}

impl<'a> Completion<'a> {
    pub fn markup<F>(callback: F) -> Self
    where
        F: FnOnce(Result<String, RenderError>) + Send + 'a,
    {
        Completion::Markup(Box::new(callback))
    }

    pub fn with_packet<F>(callback: F) -> Self
    where
        F: FnOnce(Result<(String, DataPacket), RenderError>) + Send + 'a,
    {
        Completion::WithPacket(Box::new(callback))
    }

    /// Whether the packet ends up inside the markup.
    pub fn injects(&self) -> bool {
        matches!(self, Completion::Markup(_))
    }

    pub(crate) fn dispatch(self, result: Result<Rendered, RenderError>, global: &str) {
        match self {
            Completion::Markup(callback) => {
                callback(result.and_then(|rendered| rendered.into_injected(global)))
            }
            Completion::WithPacket(callback) => {
                callback(result.map(|rendered| (rendered.markup, rendered.packet)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::packet::DEFAULT_GLOBAL;

    fn rendered() -> Rendered {
        Rendered {
            markup: "<div>hello</div>".into(),
            packet: DataPacket::new(),
            passes: 1,
        }
    }

    #[test]
    fn test_markup_completion_injects() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();

        let completion = Completion::markup(move |result| {
            *sink.lock().unwrap() = Some(result.unwrap());
        });
        assert!(completion.injects());
        completion.dispatch(Ok(rendered()), DEFAULT_GLOBAL);

        let markup = seen.lock().unwrap().take().unwrap();
        assert_eq!(
            markup,
            "<div>hello</div><script>window.__reactAsyncDataPacket__ = {};</script>"
        );
    }

    #[test]
    fn test_packet_completion_does_not_inject() {
        let mut seen = None;

        let completion = Completion::with_packet(|result| seen = Some(result.unwrap()));
        assert!(!completion.injects());
        completion.dispatch(Ok(rendered()), DEFAULT_GLOBAL);

        let (markup, packet) = seen.unwrap();
        assert_eq!(markup, "<div>hello</div>");
        assert!(packet.is_empty());
    }

    #[test]
    fn test_errors_are_forwarded() {
        let mut failed = false;

        Completion::markup(|result| failed = result.is_err()).dispatch(
            Err(RenderError::render("Broken", anyhow::anyhow!("nope"))),
            DEFAULT_GLOBAL,
        );

        assert!(failed);
    }
}
