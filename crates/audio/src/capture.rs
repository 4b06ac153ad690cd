//! Mikrofon-Capture
//!
//! Die Geraetequelle liefert Mono-PCM16 im Geraete-Callback. Dort werden
//! nur Frames fester Groesse geschnitten und ueber einen Kanal mit
//! Kapazitaet 1 an einen Pump-Thread uebergeben. Ist der Kanal voll, wird
//! der Frame verworfen und gezaehlt; der Callback blockiert nie.
//! Der Pump-Thread ruft den nachgelagerten Callback auf.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{Sender, TrySendError};
use tracing::{debug, error, info, warn};
use voxlink_core::AudioFrame;

use crate::device::{build_fehler, config_fehler, load_cpal_input_device};
use crate::error::{AudioError, AudioResult};

/// Standard-Framegroesse in Samples
pub const DEFAULT_FRAME_SIZE: usize = 2048;

/// Callback der Geraetequelle: Mono-Samples und native Rate
pub type SampleCallback = Box<dyn FnMut(&[i16], u32) + Send + 'static>;

/// Quelle fuer Mikrofon-Samples
///
/// `open` startet die Quelle und liefert die native Abtastrate. `close`
/// stoppt sie und gibt den Callback frei; danach wird er nie wieder
/// aufgerufen.
pub trait MicrophoneSource: Send {
    fn open(&mut self, on_samples: SampleCallback) -> AudioResult<u32>;
    fn close(&mut self);
}

/// Schneidet einen Sample-Strom in Frames fester Groesse
#[derive(Debug)]
pub struct FrameAssembler {
    frame_size: usize,
    puffer: Vec<i16>,
    rate: u32,
}

impl FrameAssembler {
    pub fn new(frame_size: usize) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame_size,
            puffer: Vec::with_capacity(frame_size),
            rate: 0,
        }
    }

    /// Haengt Samples an und gibt jeden vollstaendigen Frame an `emit`.
    ///
    /// Wechselt die Rate, wird der angefangene Frame verworfen.
    pub fn push(&mut self, mut samples: &[i16], rate: u32, mut emit: impl FnMut(AudioFrame)) {
        if rate != self.rate {
            self.puffer.clear();
            self.rate = rate;
        }
        while !samples.is_empty() {
            let fehlend = self.frame_size - self.puffer.len();
            let n = fehlend.min(samples.len());
            self.puffer.extend_from_slice(&samples[..n]);
            samples = &samples[n..];

            if self.puffer.len() == self.frame_size {
                let voll =
                    std::mem::replace(&mut self.puffer, Vec::with_capacity(self.frame_size));
                emit(AudioFrame::new(voll, self.rate));
            }
        }
    }

    /// Gibt den angefangenen Rest als kurzen Frame aus
    pub fn flush(&mut self) -> Option<AudioFrame> {
        if self.puffer.is_empty() {
            return None;
        }
        let rest = std::mem::replace(&mut self.puffer, Vec::with_capacity(self.frame_size));
        Some(AudioFrame::new(rest, self.rate))
    }

    /// Verwirft den angefangenen Rest
    pub fn clear(&mut self) {
        self.puffer.clear();
    }

    /// Samples im angefangenen Frame
    pub fn gepuffert(&self) -> usize {
        self.puffer.len()
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }
}

/// Zaehler der Aufnahme
#[derive(Debug, Default)]
pub struct CaptureStats {
    frames_erzeugt: AtomicU64,
    frames_verworfen: AtomicU64,
}

impl CaptureStats {
    pub fn frames_erzeugt(&self) -> u64 {
        self.frames_erzeugt.load(Ordering::Relaxed)
    }

    pub fn frames_verworfen(&self) -> u64 {
        self.frames_verworfen.load(Ordering::Relaxed)
    }
}

struct Laufend {
    pump: JoinHandle<()>,
    native_rate: u32,
}

/// Mikrofon-Aufnahme mit fester Framegroesse
///
/// `stop()` ist idempotent und wird auch beim Drop aufgerufen.
pub struct AudioCapture {
    source: Box<dyn MicrophoneSource>,
    frame_size: usize,
    laufend: Option<Laufend>,
    stats: Arc<CaptureStats>,
}

impl AudioCapture {
    pub fn new(source: Box<dyn MicrophoneSource>, frame_size: usize) -> Self {
        Self {
            source,
            frame_size: frame_size.max(1),
            laufend: None,
            stats: Arc::new(CaptureStats::default()),
        }
    }

    /// Startet die Aufnahme. `on_frame` laeuft auf dem Pump-Thread.
    ///
    /// Liefert die native Abtastrate des Geraets.
    pub fn start<F>(&mut self, mut on_frame: F) -> AudioResult<u32>
    where
        F: FnMut(AudioFrame) + Send + 'static,
    {
        if self.laufend.is_some() {
            return Err(AudioError::LaeuftBereits);
        }

        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<AudioFrame>(1);
        let callback = frame_callback(self.frame_size, frame_tx, self.stats.clone());

        let native_rate = self.source.open(callback)?;

        let pump = std::thread::Builder::new()
            .name("voxlink-capture".into())
            .spawn(move || {
                while let Ok(frame) = frame_rx.recv() {
                    on_frame(frame);
                }
                debug!("Capture-Pump beendet");
            });
        let pump = match pump {
            Ok(handle) => handle,
            Err(e) => {
                self.source.close();
                return Err(AudioError::StreamFehler(e.to_string()));
            }
        };

        info!(
            native_rate,
            frame_size = self.frame_size,
            "Aufnahme gestartet"
        );
        self.laufend = Some(Laufend { pump, native_rate });
        Ok(native_rate)
    }

    /// Stoppt die Aufnahme und gibt das Geraet frei. Idempotent.
    pub fn stop(&mut self) {
        let Some(laufend) = self.laufend.take() else {
            return;
        };
        // Schliessen gibt den Callback frei, damit endet auch die Pumpe
        self.source.close();
        if laufend.pump.join().is_err() {
            warn!("Capture-Pump mit Panic beendet");
        }
        info!(
            erzeugt = self.stats.frames_erzeugt(),
            verworfen = self.stats.frames_verworfen(),
            "Aufnahme gestoppt"
        );
    }

    pub fn is_running(&self) -> bool {
        self.laufend.is_some()
    }

    pub fn native_rate(&self) -> Option<u32> {
        self.laufend.as_ref().map(|l| l.native_rate)
    }

    pub fn stats(&self) -> Arc<CaptureStats> {
        self.stats.clone()
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Baut den Geraete-Callback: Frames schneiden, nicht-blockierend uebergeben
fn frame_callback(
    frame_size: usize,
    frame_tx: Sender<AudioFrame>,
    stats: Arc<CaptureStats>,
) -> SampleCallback {
    let mut assembler = FrameAssembler::new(frame_size);
    Box::new(move |samples, rate| {
        assembler.push(samples, rate, |frame| {
            stats.frames_erzeugt.fetch_add(1, Ordering::Relaxed);
            if let Err(TrySendError::Full(_)) = frame_tx.try_send(frame) {
                stats.frames_verworfen.fetch_add(1, Ordering::Relaxed);
            }
        });
    })
}

/// Mikrofon ueber cpal
///
/// Der cpal-Stream ist nicht `Send`; er lebt daher auf einem eigenen
/// Thread, bis `close()` ihn beendet.
pub struct CpalMicrophone {
    geraet: Option<String>,
    thread: Option<(JoinHandle<()>, Sender<()>)>,
}

impl CpalMicrophone {
    /// `geraet` ist ein Namensteil, `None` waehlt das Standardgeraet
    pub fn new(geraet: Option<String>) -> Self {
        Self {
            geraet,
            thread: None,
        }
    }
}

impl MicrophoneSource for CpalMicrophone {
    fn open(&mut self, on_samples: SampleCallback) -> AudioResult<u32> {
        self.close();

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<AudioResult<u32>>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let geraet = self.geraet.clone();

        let handle = std::thread::Builder::new()
            .name("voxlink-mikrofon".into())
            .spawn(move || {
                let stream = match open_input_stream(geraet.as_deref(), on_samples) {
                    Ok((stream, rate)) => {
                        let _ = ready_tx.send(Ok(rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Laeuft bis Stop-Signal oder bis der Sender weg ist
                let _ = stop_rx.recv();
                drop(stream);
                debug!("Mikrofon-Thread beendet");
            })
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

        let ergebnis = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(AudioError::StreamFehler("Mikrofon-Thread abgebrochen".into())));

        match ergebnis {
            Ok(rate) => {
                self.thread = Some((handle, stop_tx));
                Ok(rate)
            }
            Err(e) => {
                let _ = handle.join();
                Err(e)
            }
        }
    }

    fn close(&mut self) {
        if let Some((handle, stop_tx)) = self.thread.take() {
            let _ = stop_tx.send(());
            if handle.join().is_err() {
                warn!("Mikrofon-Thread mit Panic beendet");
            }
        }
    }
}

impl Drop for CpalMicrophone {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_input_stream(
    geraet: Option<&str>,
    mut on_samples: SampleCallback,
) -> AudioResult<(Stream, u32)> {
    let device = load_cpal_input_device(geraet)?;
    let supported = device.default_input_config().map_err(config_fehler)?;
    let rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();

    let err_fn = |err| error!("Capture-Fehler: {}", err);
    let mut mono: Vec<i16> = Vec::new();

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                downmix(data, channels, &mut mono, |s| s);
                on_samples(&mono, rate);
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                downmix(data, channels, &mut mono, |s| s as f32 / 32768.0);
                on_samples(&mono, rate);
            },
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                downmix(data, channels, &mut mono, |s| (s as f32 - 32768.0) / 32768.0);
                on_samples(&mono, rate);
            },
            err_fn,
            None,
        ),
        _ => {
            return Err(AudioError::StreamFehler(format!(
                "Nicht unterstuetztes Sample-Format: {:?}",
                sample_format
            )))
        }
    }
    .map_err(build_fehler)?;

    stream
        .play()
        .map_err(|e| AudioError::aus_backend(e.to_string()))?;

    debug!("Capture-Stream geoeffnet: {}Hz {}ch", rate, channels);
    Ok((stream, rate))
}

/// Mittelt interleavte Kanaele zu Mono-PCM16
fn downmix<T: Copy>(data: &[T], channels: usize, out: &mut Vec<i16>, to_f32: impl Fn(T) -> f32) {
    out.clear();
    for frame in data.chunks(channels.max(1)) {
        let summe: f32 = frame.iter().map(|&s| to_f32(s)).sum();
        out.push(f32_zu_i16(summe / frame.len() as f32));
    }
}

/// Wandelt ein Float-Sample (-1.0..1.0) in PCM16
pub fn f32_zu_i16(s: f32) -> i16 {
    (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
