//! Event types and sinks for observing cost surface runs.
//!
//! This module defines [`CostEvent`] and a set of sinks and adapters to emit,
//! collect, or forward events while a [`crate::cost::runner::CostSurfaceRunner`]
//! builds the grid and evaluates tiles.
use crate::cost::evaluator::TileStats;
use crate::cost::runner::{RunConfig, RunStats};
use crate::raster::{Grid, TileId};

/// Describes events emitted by cost surface runs.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum CostEvent {
    /// Emitted when a run starts.
    RunStarted {
        /// The run configuration used.
        config: RunConfig,
        /// Number of regions in the input set.
        region_count: usize,
        /// Number of deposits, when the run indexes them itself.
        deposit_count: Option<usize>,
    },

    /// Emitted once the grid has been derived from the contour.
    GridBuilt {
        /// Descriptor of the output raster.
        grid: Grid,
        /// Number of tiles the grid is split into.
        tiles: usize,
    },

    /// Emitted when a tile was evaluated successfully.
    TileEvaluated {
        /// Tile identifier.
        id: TileId,
        /// Attempts it took, including the successful one.
        attempts: usize,
        /// Per-tile counters.
        stats: TileStats,
    },

    /// Emitted when a tile attempt failed and will be retried.
    TileRetried {
        /// Tile identifier.
        id: TileId,
        /// The failed attempt (1-based).
        attempt: usize,
        /// Cause of the failure.
        error: String,
    },

    /// Emitted when a tile failed on every attempt.
    TileFailed {
        /// Tile identifier.
        id: TileId,
        /// Attempts made.
        attempts: usize,
        /// Cause of the last failure.
        error: String,
    },

    /// Emitted when every tile has been evaluated and stored.
    RunFinished {
        /// Aggregated counters of the run.
        stats: RunStats,
    },

    /// Non-fatal warning generated during a run.
    Warning {
        /// Context string (e.g. tile id, stage name).
        context: String,
        /// Human-readable message.
        message: String,
    },
}

impl CostEvent {
    pub fn kind(&self) -> CostEventKind {
        match self {
            CostEvent::RunStarted { .. } => CostEventKind::RunStarted,
            CostEvent::GridBuilt { .. } => CostEventKind::GridBuilt,
            CostEvent::TileEvaluated { .. } => CostEventKind::TileEvaluated,
            CostEvent::TileRetried { .. } => CostEventKind::TileRetried,
            CostEvent::TileFailed { .. } => CostEventKind::TileFailed,
            CostEvent::RunFinished { .. } => CostEventKind::RunFinished,
            CostEvent::Warning { .. } => CostEventKind::Warning,
        }
    }
}

/// Discriminant of [`CostEvent`], used by sinks to opt out of event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CostEventKind {
    RunStarted,
    GridBuilt,
    TileEvaluated,
    TileRetried,
    TileFailed,
    RunFinished,
    Warning,
}

/// A generic event sink that accepts [`CostEvent`]s.
pub trait EventSink {
    fn send(&mut self, event: CostEvent);

    /// Returns `false` to skip building events of `kind`.
    fn wants(&self, _kind: CostEventKind) -> bool {
        true
    }

    fn send_many<I>(&mut self, events: I)
    where
        Self: Sized,
        I: IntoIterator<Item = CostEvent>,
    {
        for e in events {
            self.send(e);
        }
    }
}

/// A no-op event sink.
impl EventSink for () {
    #[inline]
    fn send(&mut self, _event: CostEvent) {}

    #[inline]
    fn wants(&self, _kind: CostEventKind) -> bool {
        false
    }
}

/// Forwards to the borrowed sink, so sinks the caller keeps can join a [`MultiSink`].
impl<S: EventSink + ?Sized> EventSink for &mut S {
    #[inline]
    fn send(&mut self, event: CostEvent) {
        (**self).send(event);
    }

    #[inline]
    fn wants(&self, kind: CostEventKind) -> bool {
        (**self).wants(kind)
    }
}

/// An event sink that forwards to a user-provided closure.
pub struct FnSink<F>
where
    F: FnMut(CostEvent),
{
    f: F,
}

impl<F> FnSink<F>
where
    F: FnMut(CostEvent),
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> EventSink for FnSink<F>
where
    F: FnMut(CostEvent),
{
    #[inline]
    fn send(&mut self, event: CostEvent) {
        (self.f)(event);
    }
}

/// An event sink that collects events in a `Vec`, optionally filtered by kind.
#[derive(Default)]
pub struct VecSink {
    events: Vec<CostEvent>,
    only: Option<Vec<CostEventKind>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            only: None,
        }
    }

    /// Collects only events whose kind is listed.
    pub fn only(kinds: impl IntoIterator<Item = CostEventKind>) -> Self {
        Self {
            events: Vec::new(),
            only: Some(kinds.into_iter().collect()),
        }
    }

    pub fn into_inner(self) -> Vec<CostEvent> {
        self.events
    }

    pub fn as_slice(&self) -> &[CostEvent] {
        &self.events
    }

    pub fn count(&self, kind: CostEventKind) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for VecSink {
    #[inline]
    fn send(&mut self, event: CostEvent) {
        if self.wants(event.kind()) {
            self.events.push(event);
        }
    }

    fn wants(&self, kind: CostEventKind) -> bool {
        self.only.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }
}

/// Fan-out sink that forwards each event to all contained sinks.
pub struct MultiSink<S: EventSink> {
    pub(crate) sinks: Vec<S>,
}

impl<S: EventSink> MultiSink<S> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with_sinks(sinks: Vec<S>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: S) {
        self.sinks.push(sink);
    }

    pub fn into_sinks(self) -> Vec<S> {
        self.sinks
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }
}

impl<S: EventSink> Default for MultiSink<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EventSink> EventSink for MultiSink<S> {
    fn send(&mut self, event: CostEvent) {
        let kind = event.kind();
        let mut targets: Vec<&mut S> = self.sinks.iter_mut().filter(|s| s.wants(kind)).collect();
        let Some(last) = targets.pop() else {
            return;
        };
        for sink in targets {
            sink.send(event.clone());
        }
        last.send(event);
    }

    fn wants(&self, kind: CostEventKind) -> bool {
        self.sinks.iter().any(|s| s.wants(kind))
    }
}

/// Minimal adapter trait for types that can expose an [`EventSink`].
pub trait AsEventSink {
    fn as_event_sink(&mut self) -> &mut dyn EventSink;
}

impl AsEventSink for VecSink {
    fn as_event_sink(&mut self) -> &mut dyn EventSink {
        self
    }
}

impl<S: EventSink> AsEventSink for MultiSink<S> {
    fn as_event_sink(&mut self) -> &mut dyn EventSink {
        self
    }
}
