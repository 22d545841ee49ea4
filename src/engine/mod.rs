//! The render-retry loop.
//!
//! Rendering a tree whose components wait for data is a fixpoint iteration:
//!
//! 1. The whole tree is rendered to markup with the data settled so far.
//! 2. The rendered component instances are walked, parents first. Each
//!    instance declaring dependencies gets an identity from its structural
//!    path; if that identity has no session yet, a session is opened and the
//!    instance's sources are started.
//! 3. If nothing is in flight, the markup from step 1 is final. Otherwise
//!    the loop waits until at least one session completes and goes back to
//!    step 1, which may reveal components that only appear once their
//!    parent has its data.
//!
//! Every source runs concurrently with every other one; the loop itself
//! only suspends between passes.

mod identity;
mod session;

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde_json::Value;
use tracing::Instrument;

pub use crate::engine::identity::{NodeId, NodePath, Segment, Slot};
pub(crate) use crate::engine::identity::Registry;
use crate::engine::session::{Phase, Session};

use crate::component::Element;
use crate::config::Options;
use crate::dispatch::Completion;
use crate::error::RenderError;
use crate::observe::{Dependencies, extract};
use crate::packet::{DataPacket, Record};
use crate::render::{HtmlRenderer, Renderer, Resolved};
use crate::source::BoxSource;

/// Final markup of a render together with the data it was rendered with.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub markup: String,
    pub packet: DataPacket,
    /// Number of render passes it took to settle.
    pub passes: usize,
}

impl Rendered {
    /// Markup with the packet injected as an inline script.
    pub fn into_injected(self, global: &str) -> Result<String, RenderError> {
        Ok(self.packet.inject(&self.markup, global)?)
    }
}

/// Who is waiting for a started source.
enum Ticket {
    /// A source without an id, owned by a single node.
    Direct(NodeId, String),
    /// A source with an id; its record goes to every node waiting on it.
    Shared(String),
}

enum Shared {
    InFlight(Vec<(NodeId, String)>),
    Settled(Record),
}

type Flight = BoxFuture<'static, (Ticket, anyhow::Result<Value>)>;

/// Everything one render owns. Dropped when the render returns, nothing
/// leaks into the next one.
#[derive(Default)]
struct State {
    registry: Registry,
    sessions: HashMap<NodeId, Session>,
    shared: HashMap<String, Shared>,
    packet: DataPacket,
    /// Nodes the latest pass rendered from the seed packet.
    seeded: Vec<NodeId>,
    inflight: FuturesUnordered<Flight>,
}

fn launch(ticket: Ticket, source: BoxSource) -> Flight {
    source.start().map(move |outcome| (ticket, outcome)).boxed()
}

impl State {
    /// Opens a session for `id` and starts its sources. Returns `true` when
    /// the session completed on the spot, because every dependency was
    /// served by an already settled shared source.
    fn open(&mut self, id: NodeId, dependencies: Dependencies) -> bool {
        let mut session = Session::new(id.clone(), dependencies.names());

        for (name, source) in dependencies {
            let Some(key) = source.id().map(str::to_owned) else {
                self.inflight
                    .push(launch(Ticket::Direct(id.clone(), name), source));
                continue;
            };

            match self.shared.entry(key.clone()) {
                Entry::Occupied(mut entry) => match entry.get_mut() {
                    Shared::Settled(record) => {
                        tracing::debug!(node = %id, %name, source = %key, "reusing settled source");
                        session.settle(&name, record.clone());
                    }
                    Shared::InFlight(waiters) => {
                        tracing::debug!(node = %id, %name, source = %key, "joining in-flight source");
                        waiters.push((id.clone(), name));
                    }
                },
                Entry::Vacant(entry) => {
                    entry.insert(Shared::InFlight(vec![(id.clone(), name)]));
                    self.inflight.push(launch(Ticket::Shared(key), source));
                }
            }
        }

        session.started();
        debug_assert_ne!(session.phase(), Phase::Collecting);
        tracing::debug!(node = %id, pending = session.pending(), "opened session");

        if session.is_complete() {
            self.complete(session);
            return true;
        }

        self.sessions.insert(id, session);
        false
    }

    /// Applies the outcome of a source. Returns how many sessions it
    /// completed.
    fn settle(&mut self, ticket: Ticket, outcome: anyhow::Result<Value>) -> usize {
        match ticket {
            Ticket::Direct(id, name) => {
                let record = Record::settle(None, outcome);
                usize::from(self.deliver(&id, &name, record))
            }
            Ticket::Shared(key) => {
                let record = Record::settle(Some(key.clone()), outcome);
                let waiters = match self.shared.insert(key, Shared::Settled(record.clone())) {
                    Some(Shared::InFlight(waiters)) => waiters,
                    _ => Vec::new(),
                };

                waiters
                    .into_iter()
                    .filter(|(id, name)| self.deliver(id, name, record.clone()))
                    .count()
            }
        }
    }

    fn deliver(&mut self, id: &NodeId, name: &str, record: Record) -> bool {
        let Some(session) = self.sessions.get_mut(id) else {
            return false;
        };

        if record.is_failed() {
            tracing::warn!(node = %id, %name, error = ?record.error, "source failed");
        }

        if !session.settle(name, record) {
            return false;
        }

        if let Some(session) = self.sessions.remove(id) {
            self.complete(session);
        }
        true
    }

    fn complete(&mut self, session: Session) {
        tracing::debug!(node = %session.id(), "session complete");
        let (id, records) = session.into_parts();
        self.packet.insert(id, records);
    }

    fn is_tracked(&self, id: &NodeId) -> bool {
        self.sessions.contains_key(id) || self.packet.contains(id)
    }
}

/// Renders element trees, waiting for every asynchronous dependency the
/// tree declares before producing the final markup.
///
/// ```rust,no_run
/// # async fn run(root: prerender::Element) -> Result<(), prerender::RenderError> {
/// let rendered = prerender::Prerender::html().resolve(&root).await?;
/// println!("{}", rendered.into_injected(prerender::DEFAULT_GLOBAL)?);
/// # Ok(())
/// # }
/// ```
pub struct Prerender<R = HtmlRenderer> {
    renderer: R,
    options: Options,
}

impl Prerender<HtmlRenderer> {
    /// A prerenderer producing HTML.
    pub fn html() -> Self {
        Self::new(HtmlRenderer)
    }
}

impl Default for Prerender<HtmlRenderer> {
    fn default() -> Self {
        Self::html()
    }
}

impl<R: Renderer> Prerender<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            options: Options::default(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Sets the name of the global the injected script assigns to.
    pub fn global(mut self, name: impl Into<std::borrow::Cow<'static, str>>) -> Self {
        self.options.global = name.into();
        self
    }

    /// Seeds renders with a packet from an earlier render.
    ///
    /// Seeded entries are left out of the returned packet unless
    /// [`carry_seed`](Self::carry_seed) is set. Without it, markup rendered
    /// entirely from the seed is delivered with an empty packet, and a
    /// client hydrating from the injected script finds no data.
    pub fn seed(mut self, packet: DataPacket) -> Self {
        self.options.seed = Some(packet);
        self
    }

    /// Copies the seeded entries used by the final render pass into the
    /// returned packet.
    pub fn carry_seed(mut self, carry: bool) -> Self {
        self.options.carry_seed = carry;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Renders `root`, waiting for all of its dependencies, and returns the
    /// final markup together with the data packet.
    pub async fn resolve(&self, root: &Element) -> Result<Rendered, RenderError> {
        self.run(root)
            .instrument(tracing::info_span!("prerender"))
            .await
    }

    /// Renders `root` and hands the outcome to `completion`.
    pub async fn render_to_string(&self, root: &Element, completion: Completion<'_>) {
        let result = self.resolve(root).await;
        completion.dispatch(result, &self.options.global);
    }

    async fn run(&self, root: &Element) -> Result<Rendered, RenderError> {
        let mut state = State::default();
        let seed = self.options.seed.as_ref();
        let mut passes = 0;

        loop {
            passes += 1;

            let span = tracing::debug_span!("render_pass", pass = passes);
            let (markup, progressed) = span.in_scope(|| self.pass(root, seed, &mut state))?;

            if progressed {
                continue;
            }

            if state.inflight.is_empty() {
                if let Some(seed) = seed.filter(|_| self.options.carry_seed) {
                    for id in std::mem::take(&mut state.seeded) {
                        if let Some(records) = seed.get(&id) {
                            state.packet.insert(id, records.clone());
                        }
                    }
                }

                tracing::info!(
                    passes,
                    nodes = state.registry.len(),
                    entries = state.packet.len(),
                    "render settled"
                );

                return Ok(Rendered {
                    markup,
                    packet: state.packet,
                    passes,
                });
            }

            // Suspend until at least one session completes.
            while let Some((ticket, outcome)) = state.inflight.next().await {
                if state.settle(ticket, outcome) > 0 {
                    break;
                }
            }
        }
    }

    /// Runs one render pass and opens sessions for newly discovered nodes.
    /// Returns the markup and whether a session completed during the pass.
    fn pass(
        &self,
        root: &Element,
        seed: Option<&DataPacket>,
        state: &mut State,
    ) -> Result<(String, bool), RenderError> {
        let tree = self
            .renderer
            .render(root, &Resolved::new(&state.registry, &state.packet, seed))?;

        let mut progressed = false;
        let mut opened = 0;
        state.seeded.clear();

        for node in tree.instances() {
            if node.component.observer().is_none() {
                continue;
            }

            let id = state.registry.identify(&node.path);
            if state.is_tracked(&id) {
                continue;
            }
            if seed.is_some_and(|seed| seed.contains(&id)) {
                state.seeded.push(id);
                continue;
            }

            let Some(dependencies) = extract(node.component.as_ref(), &node.props)? else {
                continue;
            };

            tracing::debug!(node = %id, path = %node.path, "discovered");
            opened += 1;
            progressed |= state.open(id, dependencies);
        }

        tracing::debug!(opened, inflight = state.inflight.len(), "pass done");
        Ok((tree.markup, progressed))
    }
}
