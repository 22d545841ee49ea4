//! Asynchronous value sources.
//!
//! A [`Source`] wraps exactly one asynchronous producer behind a uniform
//! contract: it is started once, and eventually settles with either a value
//! or an error. The engine never looks past this contract, so a source can
//! be backed by a future, a stream, a channel, or anything else that can be
//! turned into a [`BoxFuture`].

use std::borrow::Cow;
use std::future::Future;

use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;

/// Type-erased source, as returned from a dependency declaration.
pub type BoxSource = Box<dyn Source>;

/// A single asynchronous value producer.
pub trait Source: Send {
    /// Correlation key. Sources with the same non-null id are considered
    /// equivalent: only the first one is started and every node asking for
    /// it receives the same settled record.
    fn id(&self) -> Option<&str> {
        None
    }

    /// Starts the producer. Consuming `self` guarantees a source can't be
    /// started twice.
    fn start(self: Box<Self>) -> BoxFuture<'static, anyhow::Result<Value>>;
}

fn to_value<T: Serialize>(value: T) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// A source which runs a future produced lazily on [`Source::start`].
///
/// Nothing happens until the engine starts the source, in particular the
/// factory closure isn't called when the dependency is declared.
pub struct Deferred<F> {
    id: Option<Cow<'static, str>>,
    make: F,
}

/// Creates a source from a future factory.
///
/// ```rust
/// let source = prerender::source::defer(|| async { Ok::<_, anyhow::Error>("hello") });
/// ```
pub fn defer<F, Fut, T>(make: F) -> Deferred<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Serialize + 'static,
{
    Deferred { id: None, make }
}

impl<F> Deferred<F> {
    pub fn with_id(mut self, id: impl Into<Cow<'static, str>>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl<F, Fut, T> Source for Deferred<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Serialize + 'static,
{
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn start(self: Box<Self>) -> BoxFuture<'static, anyhow::Result<Value>> {
        let make = self.make;
        async move { to_value(make().await?) }.boxed()
    }
}

/// A source which is already settled.
pub struct Ready {
    id: Option<Cow<'static, str>>,
    outcome: anyhow::Result<Value>,
}

/// Creates a source which resolves to `value` as soon as it is started.
pub fn ready<T: Serialize>(value: T) -> Ready {
    Ready {
        id: None,
        outcome: to_value(value),
    }
}

/// Creates a source which fails with `error` as soon as it is started.
pub fn fail(error: impl Into<anyhow::Error>) -> Ready {
    Ready {
        id: None,
        outcome: Err(error.into()),
    }
}

impl Ready {
    pub fn with_id(mut self, id: impl Into<Cow<'static, str>>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl Source for Ready {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn start(self: Box<Self>) -> BoxFuture<'static, anyhow::Result<Value>> {
        futures::future::ready(self.outcome).boxed()
    }
}

/// A source backed by a stream of values.
///
/// The source settles on the first item the stream yields; the rest of the
/// stream is dropped. A stream that ends without yielding anything settles
/// as failed.
pub struct Streamed<S> {
    id: Option<Cow<'static, str>>,
    stream: S,
}

/// Creates a source from a stream, settling on its first item.
pub fn from_stream<S, T>(stream: S) -> Streamed<S>
where
    S: Stream<Item = anyhow::Result<T>> + Send + Unpin + 'static,
    T: Serialize + 'static,
{
    Streamed { id: None, stream }
}

impl<S> Streamed<S> {
    pub fn with_id(mut self, id: impl Into<Cow<'static, str>>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl<S, T> Source for Streamed<S>
where
    S: Stream<Item = anyhow::Result<T>> + Send + Unpin + 'static,
    T: Serialize + 'static,
{
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn start(self: Box<Self>) -> BoxFuture<'static, anyhow::Result<Value>> {
        let mut stream = self.stream;
        async move {
            match stream.next().await {
                Some(item) => to_value(item?),
                None => Err(anyhow::anyhow!("stream ended without producing a value")),
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use serde_json::json;

    use super::*;

    fn settle(source: impl Source + 'static) -> anyhow::Result<Value> {
        let source: BoxSource = Box::new(source);
        block_on(source.start())
    }

    #[test]
    fn test_defer_is_lazy() {
        let called = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = called.clone();

        let source = defer(move || {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            async { Ok::<_, anyhow::Error>(vec![1, 2, 3]) }
        });

        assert!(!called.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(settle(source).unwrap(), json!([1, 2, 3]));
        assert!(called.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_ready_and_fail() {
        assert_eq!(settle(ready("hello")).unwrap(), json!("hello"));

        let err = settle(fail(anyhow::anyhow!("boom"))).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_stream_takes_first_item() {
        let stream = futures::stream::iter(vec![Ok("first"), Ok("second")]);
        assert_eq!(settle(from_stream(stream)).unwrap(), json!("first"));
    }

    #[test]
    fn test_empty_stream_fails() {
        let stream = futures::stream::iter(Vec::<anyhow::Result<u8>>::new());
        assert!(settle(from_stream(stream)).is_err());
    }

    #[test]
    fn test_ids() {
        assert_eq!(ready(1).id(), None);
        assert_eq!(ready(1).with_id("user:1").id(), Some("user:1"));
        assert_eq!(
            defer(|| async { Ok::<_, anyhow::Error>(1) })
                .with_id("one")
                .id(),
            Some("one")
        );
    }
}
