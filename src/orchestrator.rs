//! One update cycle: fetch → transform → join → scale → render instruction.
//!
//! The orchestrator owns the session's geometry (loaded once, shared
//! read-only) and the currently published layer. Every call to
//! [`MapOrchestrator::update`] takes a ticket from a monotonic sequence; a
//! completion whose ticket is no longer the newest is dropped instead of
//! published, so a slow answer to an old selection can never overwrite the
//! layer of a newer one.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::config::InputConfig;
use crate::data::{load_geometry, RegionGeometry};
use crate::error::InitializationError;
use crate::processing::{join, transform};
use crate::render::RenderInstruction;
use crate::scale::ColorScale;
use crate::source::StatisticsSource;
use crate::types::{FrequencyMode, Selection, StatisticRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No geometry loaded.
    Idle,
    /// Geometry and coordinate metadata being fetched.
    Loading,
    /// Geometry cached; the published layer is up to date.
    Ready,
    /// At least one statistics fetch in flight.
    Computing,
}

/// Monotonic ticket counter. Ticket 0 is the initial neutral layer.
#[derive(Debug, Default)]
pub struct RequestSequence {
    latest: AtomicU64,
}

impl RequestSequence {
    pub fn begin(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MapOrchestrator<S> {
    geometry: Arc<RegionGeometry>,
    source: S,
    scale: ColorScale,
    sequence: RequestSequence,
    in_flight: AtomicUsize,
    layer: watch::Sender<Arc<RenderInstruction>>,
}

impl<S: StatisticsSource> MapOrchestrator<S> {
    /// Wraps already-loaded geometry and publishes the neutral layer.
    pub fn new(geometry: Arc<RegionGeometry>, source: S, scale: ColorScale) -> Self {
        let neutral = RenderInstruction::neutral(0, &geometry, scale.no_data());
        let (layer, _) = watch::channel(Arc::new(neutral));
        Self {
            geometry,
            source,
            scale,
            sequence: RequestSequence::default(),
            in_flight: AtomicUsize::new(0),
            layer,
        }
    }

    /// Loads the geometry and enters `Ready`. A failure here is fatal: no
    /// orchestrator exists and nothing can be rendered.
    pub async fn initialize(
        input: &InputConfig,
        source: S,
        scale: ColorScale,
    ) -> Result<Self, InitializationError> {
        tracing::info!(phase = ?Phase::Loading, "initializing map session");
        let geometry = load_geometry(input).await.inspect_err(|e| {
            tracing::error!(error = %e, "map initialization failed");
        })?;
        let orchestrator = Self::new(Arc::new(geometry), source, scale);
        tracing::info!(phase = ?Phase::Ready, regions = orchestrator.geometry.len(), "map session ready");
        Ok(orchestrator)
    }

    pub fn phase(&self) -> Phase {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            Phase::Computing
        } else {
            Phase::Ready
        }
    }

    pub fn geometry(&self) -> &Arc<RegionGeometry> {
        &self.geometry
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn scale(&self) -> &ColorScale {
        &self.scale
    }

    /// The layer currently published to the map surface.
    pub fn current(&self) -> Arc<RenderInstruction> {
        self.layer.borrow().clone()
    }

    /// Receives every layer that replaces the current one.
    pub fn subscribe(&self) -> watch::Receiver<Arc<RenderInstruction>> {
        self.layer.subscribe()
    }

    /// Runs one update cycle for `selection` and publishes the result.
    ///
    /// Never fails: a rejected statistics fetch produces a degraded layer.
    /// Returns `None` when a newer update started while this one was waiting
    /// for statistics; the stale result is discarded.
    pub async fn update(&self, selection: &Selection) -> Option<Arc<RenderInstruction>> {
        let ticket = self.sequence.begin();
        let no_data = self.scale.no_data();

        let Some(profession) = selection.active_profession() else {
            tracing::debug!(ticket, "no profession selected, publishing neutral layer");
            let neutral = RenderInstruction::neutral(ticket, &self.geometry, no_data);
            return self.publish(ticket, neutral);
        };

        let region_codes = if selection.region_codes.is_empty() {
            self.geometry.region_codes()
        } else {
            selection.region_codes.clone()
        };
        let mode = selection.frequency_mode;

        let fetched = {
            let _computing = InFlight::enter(&self.in_flight);
            tracing::info!(ticket, %profession, ?mode, regions = region_codes.len(), "fetching statistics");
            self.source.fetch_statistics(profession, &region_codes).await
        };

        let instruction = match fetched {
            Ok(records) => self.compose(ticket, profession, mode, records),
            Err(e) => {
                tracing::error!(ticket, %profession, error = %e, "statistics fetch failed, publishing degraded layer");
                RenderInstruction::degraded(ticket, &self.geometry, profession, mode, e.to_string(), no_data)
            }
        };

        self.publish(ticket, instruction)
    }

    fn compose(
        &self,
        ticket: u64,
        profession: &str,
        mode: FrequencyMode,
        records: Vec<StatisticRecord>,
    ) -> RenderInstruction {
        let records = transform(records, mode);
        let joined = join(self.geometry.features(), &records);
        let (painted, max_value) = self.scale.paint(joined);

        let with_data = painted.iter().filter(|f| f.display_value > 0.0).count();
        tracing::info!(
            ticket,
            records = records.len(),
            regions = painted.len(),
            with_data,
            max_value,
            "statistics joined"
        );

        RenderInstruction::data(ticket, profession, mode, painted, max_value, self.scale.no_data())
    }

    fn publish(&self, ticket: u64, instruction: RenderInstruction) -> Option<Arc<RenderInstruction>> {
        let instruction = Arc::new(instruction);
        let applied = self.layer.send_if_modified(|current| {
            if self.sequence.is_current(ticket) && ticket > current.sequence {
                *current = Arc::clone(&instruction);
                true
            } else {
                false
            }
        });

        if applied {
            Some(instruction)
        } else {
            tracing::debug!(ticket, latest = self.sequence.latest(), "discarding stale render instruction");
            None
        }
    }
}
