//! Lueckenlose Wiedergabeplanung
//!
//! Jeder Chunk wird auf einer monotonen Zeitachse direkt an das Ende des
//! vorherigen gelegt. Ist der Plan veraltet (Zeitpunkt liegt in der
//! Vergangenheit), wird neu bei `jetzt + Sicherheitsabstand` begonnen.
//!
//! Ablauf:
//! - `schedule()` plant einen Chunk und uebergibt ihn sofort der Senke
//! - `tick()` raeumt abgespielte Chunks ab und feuert deren Callbacks
//! - `stop()` blendet aus und verwirft alles Geplante (Barge-in)
//! - `reset()` vergisst den Plan und stellt die Verstaerkung wieder her

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};
use voxlink_core::{AudioFrame, FrameError};

use crate::clock::Clock;

/// Callback nach vollstaendiger Wiedergabe eines Chunks
pub type CompletionFn = Box<dyn FnOnce() + Send + 'static>;
/// Callback, wenn alle geplanten Chunks abgespielt sind
pub type IdleFn = Box<dyn FnMut() + Send + 'static>;

/// Laufende Nummer eines geplanten Chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(pub u64);

/// Ausgabeseite des Schedulers (Geraet oder Testsenke)
pub trait PlaybackSink: Send {
    /// Spielt `frame` ab `start_at` (Zeitachse der Uhr) ab
    fn play(&mut self, id: ChunkId, frame: &AudioFrame, start_at: Duration);

    /// Blendet hoerbare Ausgabe ueber `window` aus und verwirft den Rest
    fn fade_out(&mut self, window: Duration);

    /// Setzt die Ausgangsverstaerkung fuer kuenftige Chunks
    fn set_gain(&mut self, gain: f32);
}

/// Konfiguration des Schedulers
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Vorlauf vor dem fruehesten Startzeitpunkt
    pub safety_margin: Duration,
    /// Ausblendzeit bei `stop()`
    pub fade_out: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            safety_margin: Duration::from_millis(50),
            fade_out: Duration::from_millis(30),
        }
    }
}

/// Zustand des Schedulers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Scheduled,
}

/// Ein geplanter, noch nicht abgeschlossener Chunk
pub struct PlaybackQueueEntry {
    pub id: ChunkId,
    pub frame: AudioFrame,
    pub start_at: Duration,
    on_complete: Option<CompletionFn>,
}

impl PlaybackQueueEntry {
    pub fn end_at(&self) -> Duration {
        self.start_at + self.frame.duration()
    }
}

impl std::fmt::Debug for PlaybackQueueEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackQueueEntry")
            .field("id", &self.id)
            .field("start_at", &self.start_at)
            .field("samples", &self.frame.len())
            .finish()
    }
}

/// Plant Agent-Audio lueckenlos auf der Zeitachse einer [`Clock`]
pub struct PlaybackScheduler {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    sink: Box<dyn PlaybackSink>,
    queue: VecDeque<PlaybackQueueEntry>,
    /// Ende des zuletzt geplanten Chunks; `ZERO` = kein gueltiger Plan
    next_start_time: Duration,
    phase: SchedulerPhase,
    gain: f32,
    naechste_id: u64,
    on_idle: Option<IdleFn>,
}

impl PlaybackScheduler {
    pub fn new(config: SchedulerConfig, clock: Arc<dyn Clock>, sink: Box<dyn PlaybackSink>) -> Self {
        Self {
            config,
            clock,
            sink,
            queue: VecDeque::new(),
            next_start_time: Duration::ZERO,
            phase: SchedulerPhase::Idle,
            gain: 1.0,
            naechste_id: 0,
            on_idle: None,
        }
    }

    /// Callback fuer den Uebergang Scheduled -> Idle durch natuerliches Ende
    pub fn set_on_idle(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_idle = Some(Box::new(callback));
    }

    /// Plant einen Chunk und liefert seinen Startzeitpunkt.
    ///
    /// Der Start liegt nie vor `jetzt + Sicherheitsabstand` und schliesst
    /// bei gueltigem Plan direkt an den vorherigen Chunk an.
    pub fn schedule(
        &mut self,
        frame: AudioFrame,
        on_complete: Option<CompletionFn>,
    ) -> Result<Duration, FrameError> {
        if frame.is_empty() {
            return Err(FrameError::Leer);
        }

        let now = self.clock.now();
        let frueheste = now + self.config.safety_margin;
        if self.next_start_time < now {
            if !self.next_start_time.is_zero() {
                debug!(
                    verspaetung_ms = (now - self.next_start_time).as_millis() as u64,
                    "Wiedergabeplan veraltet, neu ausgerichtet"
                );
            }
            self.next_start_time = frueheste;
        }

        let start_at = self.next_start_time.max(frueheste);
        self.next_start_time = start_at + frame.duration();

        let id = ChunkId(self.naechste_id);
        self.naechste_id += 1;

        self.sink.play(id, &frame, start_at);
        trace!(
            chunk = id.0,
            start_ms = start_at.as_millis() as u64,
            samples = frame.len(),
            "Chunk geplant"
        );

        self.queue.push_back(PlaybackQueueEntry {
            id,
            frame,
            start_at,
            on_complete,
        });
        self.phase = SchedulerPhase::Scheduled;
        Ok(start_at)
    }

    /// Raeumt abgespielte Chunks ab. Liefert die Anzahl abgeschlossener Chunks.
    pub fn tick(&mut self) -> usize {
        let now = self.clock.now();
        let mut fertig = 0;

        while self.queue.front().is_some_and(|e| e.end_at() <= now) {
            let Some(mut entry) = self.queue.pop_front() else {
                break;
            };
            if let Some(callback) = entry.on_complete.take() {
                callback();
            }
            fertig += 1;
        }

        if fertig > 0 && self.queue.is_empty() && self.phase == SchedulerPhase::Scheduled {
            self.phase = SchedulerPhase::Idle;
            debug!("Wiedergabe beendet");
            if let Some(callback) = self.on_idle.as_mut() {
                callback();
            }
        }
        fertig
    }

    /// Bricht die Wiedergabe ab: Ausblenden, alles Geplante verwerfen.
    ///
    /// Completion-Callbacks verworfener Chunks werden nicht aufgerufen.
    /// Idempotent.
    pub fn stop(&mut self) {
        let verworfen = self.queue.len();
        self.sink.fade_out(self.config.fade_out);
        self.queue.clear();
        self.gain = 0.0;
        self.next_start_time = Duration::ZERO;
        self.phase = SchedulerPhase::Idle;
        if verworfen > 0 {
            debug!(verworfen, "Wiedergabe abgebrochen");
        }
    }

    /// Vergisst den Plan und stellt volle Verstaerkung her. Blendet nicht aus.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.next_start_time = Duration::ZERO;
        self.phase = SchedulerPhase::Idle;
        self.gain = 1.0;
        self.sink.set_gain(1.0);
    }

    /// Ende des zuletzt geplanten Chunks (`ZERO` wenn veraltet)
    pub fn next_start_time(&self) -> Duration {
        self.next_start_time
    }

    /// Kein gueltiger Plan vorhanden
    pub fn is_stale(&self) -> bool {
        self.next_start_time.is_zero()
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn is_playing(&self) -> bool {
        self.phase == SchedulerPhase::Scheduled
    }

    /// Anzahl noch nicht abgeschlossener Chunks
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Geplante Chunks in Startreihenfolge
    pub fn entries(&self) -> impl Iterator<Item = &PlaybackQueueEntry> {
        self.queue.iter()
    }
}
