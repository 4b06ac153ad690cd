//! Zeitgenaue Wiedergabe via cpal
//!
//! Der Scheduler plant in Geraetezeit; die Senke rechnet Startzeitpunkte
//! in Frame-Positionen um und schickt Befehle an den Mixer im
//! Ausgabe-Callback. Der Mixer legt jeden Chunk an seine Position auf der
//! Zeitachse und zaehlt die gerenderten Frames, aus denen die
//! [`DeviceClock`] ihre Zeit bezieht.
//!
//! Start und Ende eines Chunks werden beide aus der geplanten Zeit
//! gerundet; aneinander geplante Chunks teilen sich damit exakt die
//! Frame-Grenze. Abgespielte Sample-Puffer gehen ueber einen Rueckkanal an
//! die Senke zurueck und werden dort wiederverwendet, damit im
//! Ausgabe-Callback kein Speicher freigegeben wird.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info, warn};
use voxlink_core::AudioFrame;

use crate::capture::f32_zu_i16;
use crate::clock::DeviceClock;
use crate::device::{build_fehler, config_fehler, load_cpal_output_device};
use crate::error::{AudioError, AudioResult};
use crate::resampler::resample;
use crate::scheduler::{ChunkId, PlaybackSink};

/// Plaetze im Rueckkanal fuer abgespielte Puffer
const RUECKGABE_KAPAZITAET: usize = 256;

/// Befehle an den Mixer im Ausgabe-Callback
#[derive(Debug)]
pub enum MixerBefehl {
    /// Chunk ab Frame-Position abspielen (Samples bereits in Geraeterate)
    Abspielen { start_frame: u64, samples: Vec<f32> },
    /// Hoerbares ueber `frames` ausblenden, Geplantes verwerfen
    Ausblenden { frames: usize },
    /// Verstaerkung fuer kuenftige Chunks
    Verstaerkung(f32),
}

#[derive(Debug)]
struct GeplanterChunk {
    start: u64,
    samples: Vec<f32>,
    gain: f32,
}

impl GeplanterChunk {
    fn ende(&self) -> u64 {
        self.start + self.samples.len() as u64
    }
}

/// Mischt geplante Chunks auf einer Frame-Zeitachse (Mono)
#[derive(Debug)]
pub struct TimelineMixer {
    position: u64,
    chunks: VecDeque<GeplanterChunk>,
    gain: f32,
    ausblend_puffer: Vec<f32>,
    ausblend_pos: usize,
    rueckgabe: Option<Sender<Vec<f32>>>,
}

/// Gibt einen Puffer an die Senke zurueck. Nur bei vollem Rueckkanal wird
/// er hier freigegeben.
fn zurueckgeben(rueckgabe: &Option<Sender<Vec<f32>>>, samples: Vec<f32>) {
    if let Some(tx) = rueckgabe {
        let _ = tx.try_send(samples);
    }
}

impl TimelineMixer {
    /// `max_ausblenden` reserviert den Ausblendpuffer im Voraus
    pub fn new(max_ausblenden: usize) -> Self {
        Self {
            position: 0,
            chunks: VecDeque::with_capacity(64),
            gain: 1.0,
            ausblend_puffer: Vec::with_capacity(max_ausblenden),
            ausblend_pos: 0,
            rueckgabe: None,
        }
    }

    /// Abgespielte und verworfene Puffer gehen an `tx` statt freigegeben
    /// zu werden
    pub fn mit_rueckgabe(mut self, tx: Sender<Vec<f32>>) -> Self {
        self.rueckgabe = Some(tx);
        self
    }

    /// Bisher gerenderte Frames
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn geplant(&self) -> usize {
        self.chunks.len()
    }

    pub fn befehl(&mut self, befehl: MixerBefehl) {
        match befehl {
            MixerBefehl::Abspielen {
                start_frame,
                samples,
            } => {
                let chunk = GeplanterChunk {
                    start: start_frame,
                    samples,
                    gain: self.gain,
                };
                if chunk.ende() <= self.position {
                    // Komplett verpasst
                    zurueckgeben(&self.rueckgabe, chunk.samples);
                    return;
                }
                self.chunks.push_back(chunk);
            }
            MixerBefehl::Ausblenden { frames } => self.ausblenden(frames),
            MixerBefehl::Verstaerkung(gain) => self.gain = gain,
        }
    }

    fn ausblenden(&mut self, frames: usize) {
        // Rest eines laufenden Ausblendens bleibt erhalten
        let rest = self.ausblend_puffer.len() - self.ausblend_pos;
        self.ausblend_puffer.copy_within(self.ausblend_pos.., 0);
        self.ausblend_puffer.truncate(rest);
        self.ausblend_puffer.resize(frames.max(rest), 0.0);
        self.ausblend_pos = 0;

        let mut tail = std::mem::take(&mut self.ausblend_puffer);
        self.mische(self.position, &mut tail[..frames]);
        for (i, s) in tail[..frames].iter_mut().enumerate() {
            *s *= 1.0 - (i + 1) as f32 / frames as f32;
        }
        self.ausblend_puffer = tail;

        for chunk in self.chunks.drain(..) {
            zurueckgeben(&self.rueckgabe, chunk.samples);
        }
        self.gain = 0.0;
    }

    /// Addiert alle Chunks im Bereich ab `start` auf `out`
    fn mische(&self, start: u64, out: &mut [f32]) {
        let ende = start + out.len() as u64;
        for chunk in &self.chunks {
            if chunk.ende() <= start || chunk.start >= ende {
                continue;
            }
            let von = chunk.start.max(start);
            let bis = chunk.ende().min(ende);
            for t in von..bis {
                out[(t - start) as usize] += chunk.samples[(t - chunk.start) as usize] * chunk.gain;
            }
        }
    }

    /// Rendert die naechsten `out.len()` Frames
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);

        let offen = self.ausblend_puffer.len() - self.ausblend_pos;
        let n = offen.min(out.len());
        for (o, s) in out[..n]
            .iter_mut()
            .zip(&self.ausblend_puffer[self.ausblend_pos..self.ausblend_pos + n])
        {
            *o += *s;
        }
        self.ausblend_pos += n;
        if self.ausblend_pos == self.ausblend_puffer.len() {
            self.ausblend_puffer.clear();
            self.ausblend_pos = 0;
        }

        self.mische(self.position, out);
        self.position += out.len() as u64;

        while self
            .chunks
            .front()
            .is_some_and(|c| c.ende() <= self.position)
        {
            if let Some(chunk) = self.chunks.pop_front() {
                zurueckgeben(&self.rueckgabe, chunk.samples);
            }
        }
    }
}

/// Konfiguration der Geraeteausgabe
#[derive(Debug, Clone, Default)]
pub struct PlaybackConfig {
    /// Namensteil des Ausgabegeraets, `None` = Standard
    pub geraet: Option<String>,
    /// Laengstes Ausblenden, fuer das Puffer reserviert wird
    pub max_ausblenden: Duration,
}

/// Senke fuer den Scheduler: Befehle an den Mixer des Ausgabegeraets
pub struct CpalPlaybackSink {
    tx: Sender<MixerBefehl>,
    device_rate: u32,
    rueckgabe: Option<Receiver<Vec<f32>>>,
}

impl CpalPlaybackSink {
    pub fn new(tx: Sender<MixerBefehl>, device_rate: u32) -> Self {
        Self {
            tx,
            device_rate,
            rueckgabe: None,
        }
    }

    /// Puffer aus dem Rueckkanal des Mixers wiederverwenden
    pub fn mit_rueckgabe(mut self, rx: Receiver<Vec<f32>>) -> Self {
        self.rueckgabe = Some(rx);
        self
    }

    /// Zeit auf der Uhr in Frame-Position, auf den naechsten Frame gerundet
    fn zu_frames(&self, zeit: Duration) -> u64 {
        ((zeit.as_nanos() * self.device_rate as u128 + 500_000_000) / 1_000_000_000) as u64
    }

    /// Ein zurueckgegebener Puffer, sonst ein neuer. Weitere
    /// zurueckgegebene Puffer werden hier freigegeben.
    fn puffer(&self) -> Vec<f32> {
        let Some(rx) = self.rueckgabe.as_ref() else {
            return Vec::new();
        };
        let mut zurueck = rx.try_iter();
        let mut puffer = zurueck.next().unwrap_or_default();
        zurueck.for_each(drop);
        puffer.clear();
        puffer
    }

    fn senden(&self, befehl: MixerBefehl) {
        if self.tx.send(befehl).is_err() {
            warn!("Ausgabegeraet geschlossen, Befehl verworfen");
        }
    }
}

impl PlaybackSink for CpalPlaybackSink {
    fn play(&mut self, _id: ChunkId, frame: &AudioFrame, start_at: Duration) {
        let start_frame = self.zu_frames(start_at);
        let ende = self.zu_frames(start_at + frame.duration()).max(start_frame);
        let laenge = (ende - start_frame) as usize;

        let mut samples = self.puffer();
        samples.extend(
            resample(frame.samples(), frame.sample_rate(), self.device_rate)
                .iter()
                .map(|&s| s as f32 / 32768.0),
        );
        // Umgetastete Laenge weicht um hoechstens ein Sample vom Frame-Raster ab
        let letztes = samples.last().copied().unwrap_or(0.0);
        samples.resize(laenge, letztes);

        self.senden(MixerBefehl::Abspielen {
            start_frame,
            samples,
        });
    }

    fn fade_out(&mut self, window: Duration) {
        let frames = self.zu_frames(window).max(1) as usize;
        self.senden(MixerBefehl::Ausblenden { frames });
    }

    fn set_gain(&mut self, gain: f32) {
        self.senden(MixerBefehl::Verstaerkung(gain));
    }
}

/// Geoeffnetes Ausgabegeraet, das beim Sessionende freigegeben wird
pub trait OutputDevice: Send {
    /// Gibt das Geraet frei. Idempotent.
    fn close(&mut self);
}

/// Ausgabegeraet ueber cpal
///
/// Der Stream lebt auf einem eigenen Thread bis `close()` oder Drop.
pub struct CpalPlayback {
    thread: Option<(JoinHandle<()>, Sender<()>)>,
    device_rate: u32,
}

impl CpalPlayback {
    /// Oeffnet das Ausgabegeraet.
    ///
    /// Liefert das Geraet, die Senke fuer den Scheduler und die Geraeteuhr.
    pub fn open(config: PlaybackConfig) -> AudioResult<(Self, CpalPlaybackSink, DeviceClock)> {
        let (befehl_tx, befehl_rx) = crossbeam_channel::unbounded::<MixerBefehl>();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<AudioResult<u32>>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let (rueck_tx, rueck_rx) = crossbeam_channel::bounded::<Vec<f32>>(RUECKGABE_KAPAZITAET);
        let frames = Arc::new(AtomicU64::new(0));

        let thread_frames = frames.clone();
        let handle = std::thread::Builder::new()
            .name("voxlink-wiedergabe".into())
            .spawn(move || {
                let stream = match open_output_stream(&config, befehl_rx, rueck_tx, thread_frames) {
                    Ok((stream, rate)) => {
                        let _ = ready_tx.send(Ok(rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = stop_rx.recv();
                drop(stream);
                debug!("Wiedergabe-Thread beendet");
            })
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

        let device_rate = match ready_rx.recv() {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(AudioError::StreamFehler(
                    "Wiedergabe-Thread abgebrochen".into(),
                ));
            }
        };

        info!(device_rate, "Ausgabegeraet geoeffnet");
        Ok((
            Self {
                thread: Some((handle, stop_tx)),
                device_rate,
            },
            CpalPlaybackSink::new(befehl_tx, device_rate).mit_rueckgabe(rueck_rx),
            DeviceClock::new(frames, device_rate),
        ))
    }

    pub fn device_rate(&self) -> u32 {
        self.device_rate
    }

}

impl OutputDevice for CpalPlayback {
    fn close(&mut self) {
        if let Some((handle, stop_tx)) = self.thread.take() {
            let _ = stop_tx.send(());
            if handle.join().is_err() {
                warn!("Wiedergabe-Thread mit Panic beendet");
            }
            info!("Ausgabegeraet geschlossen");
        }
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        self.close();
    }
}

/// Zustand des Ausgabe-Callbacks
struct Ausgabe {
    mixer: TimelineMixer,
    mono: Vec<f32>,
    befehle: Receiver<MixerBefehl>,
    frames: Arc<AtomicU64>,
    channels: usize,
}

impl Ausgabe {
    fn fuellen<T: Copy>(&mut self, data: &mut [T], konvertiere: impl Fn(f32) -> T) {
        while let Ok(befehl) = self.befehle.try_recv() {
            self.mixer.befehl(befehl);
        }
        let n = data.len() / self.channels;
        self.mono.resize(n, 0.0);
        self.mixer.render(&mut self.mono);
        self.frames.store(self.mixer.position(), Ordering::Release);

        for (frame, &s) in data.chunks_mut(self.channels).zip(self.mono.iter()) {
            frame.fill(konvertiere(s.clamp(-1.0, 1.0)));
        }
    }
}

fn open_output_stream(
    config: &PlaybackConfig,
    befehle: Receiver<MixerBefehl>,
    rueckgabe: Sender<Vec<f32>>,
    frames: Arc<AtomicU64>,
) -> AudioResult<(Stream, u32)> {
    let device = load_cpal_output_device(config.geraet.as_deref())?;
    let supported = device.default_output_config().map_err(config_fehler)?;
    let rate = supported.sample_rate().0;
    let channels = (supported.channels() as usize).max(1);
    let sample_format = supported.sample_format();
    let stream_config: StreamConfig = supported.into();

    let max_ausblenden =
        (config.max_ausblenden.as_nanos() * rate as u128 / 1_000_000_000) as usize;
    let mut ausgabe = Ausgabe {
        mixer: TimelineMixer::new(max_ausblenden).mit_rueckgabe(rueckgabe),
        mono: Vec::with_capacity(4096),
        befehle,
        frames,
        channels,
    };

    let err_fn = |err| error!("Playback-Fehler: {}", err);

    let stream = match sample_format {
        SampleFormat::F32 => device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                ausgabe.fuellen(data, |s| s);
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_output_stream(
            &stream_config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                ausgabe.fuellen(data, f32_zu_i16);
            },
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_output_stream(
            &stream_config,
            move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                ausgabe.fuellen(data, |s| (s * 32767.0 + 32768.0) as u16);
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

    debug!("Playback-Stream geoeffnet: {}Hz {}ch", rate, channels);
    Ok((stream, rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::clock::ManualClock;
    use crate::scheduler::{PlaybackScheduler, SchedulerConfig};

    fn abspielen(mixer: &mut TimelineMixer, start_frame: u64, samples: &[f32]) {
        mixer.befehl(MixerBefehl::Abspielen {
            start_frame,
            samples: samples.to_vec(),
        });
    }

    #[test]
    fn chunk_landet_an_position() {
        let mut mixer = TimelineMixer::new(16);
        abspielen(&mut mixer, 3, &[0.5, 0.5]);
        let mut out = [1.0f32; 6];
        mixer.render(&mut out);
        assert_eq!(out, [0.0, 0.0, 0.0, 0.5, 0.5, 0.0]);
        assert_eq!(mixer.position(), 6);
        assert_eq!(mixer.geplant(), 0);
    }

    #[test]
    fn chunk_ueber_puffergrenze() {
        let mut mixer = TimelineMixer::new(16);
        abspielen(&mut mixer, 2, &[0.1, 0.2, 0.3, 0.4]);
        let mut a = [0.0f32; 4];
        let mut b = [0.0f32; 4];
        mixer.render(&mut a);
        mixer.render(&mut b);
        assert_eq!(a, [0.0, 0.0, 0.1, 0.2]);
        assert_eq!(b, [0.3, 0.4, 0.0, 0.0]);
    }

    #[test]
    fn aufeinanderfolgende_chunks_lueckenlos() {
        let mut mixer = TimelineMixer::new(16);
        abspielen(&mut mixer, 0, &[0.25; 3]);
        abspielen(&mut mixer, 3, &[0.5; 3]);
        let mut out = [0.0f32; 6];
        mixer.render(&mut out);
        assert_eq!(out, [0.25, 0.25, 0.25, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn verpasster_chunk_wird_verworfen() {
        let mut mixer = TimelineMixer::new(16);
        let mut out = [0.0f32; 8];
        mixer.render(&mut out);
        abspielen(&mut mixer, 2, &[0.5; 3]);
        assert_eq!(mixer.geplant(), 0);
    }

    #[test]
    fn ausblenden_rampt_auf_null_und_verwirft() {
        let mut mixer = TimelineMixer::new(16);
        abspielen(&mut mixer, 0, &[1.0; 100]);
        mixer.befehl(MixerBefehl::Ausblenden { frames: 4 });
        assert_eq!(mixer.geplant(), 0);

        let mut out = [0.0f32; 6];
        mixer.render(&mut out);
        assert_eq!(out, [0.75, 0.5, 0.25, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn nach_ausblenden_stumm_bis_verstaerkung() {
        let mut mixer = TimelineMixer::new(16);
        mixer.befehl(MixerBefehl::Ausblenden { frames: 2 });
        abspielen(&mut mixer, 4, &[1.0; 2]);
        mixer.befehl(MixerBefehl::Verstaerkung(1.0));
        abspielen(&mut mixer, 6, &[1.0; 2]);

        let mut out = [0.0f32; 8];
        mixer.render(&mut out);
        assert_eq!(out, [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn senke_rechnet_in_frames() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut senke = CpalPlaybackSink::new(tx, 48000);
        let frame = AudioFrame::new(vec![16384i16; 240], 24000);
        senke.play(ChunkId(0), &frame, Duration::from_millis(50));
        senke.fade_out(Duration::from_millis(30));

        match rx.try_recv().unwrap() {
            MixerBefehl::Abspielen {
                start_frame,
                samples,
            } => {
                assert_eq!(start_frame, 2400);
                assert_eq!(samples.len(), 480);
                assert!((samples[0] - 0.5).abs() < 1e-6);
            }
            other => panic!("unerwartet: {other:?}"),
        }
        assert!(matches!(
            rx.try_recv().unwrap(),
            MixerBefehl::Ausblenden { frames: 1440 }
        ));
    }

    /// Plant drei 1024-Sample-Chunks bei 24 kHz ueber Scheduler und Senke
    /// und rendert die Zeitachse in Geraeterate
    fn drei_chunks_rendern(device_rate: u32) -> Vec<f32> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let senke = CpalPlaybackSink::new(tx, device_rate);
        let mut scheduler = PlaybackScheduler::new(
            SchedulerConfig::default(),
            Arc::new(ManualClock::new()),
            Box::new(senke),
        );
        for _ in 0..3 {
            let frame = AudioFrame::new(vec![8192i16; 1024], 24000);
            scheduler.schedule(frame, None).unwrap();
        }

        let mut mixer = TimelineMixer::new(16);
        for befehl in rx.try_iter() {
            mixer.befehl(befehl);
        }
        let mut out = vec![0.0f32; 10_000];
        mixer.render(&mut out);
        out
    }

    fn pruefe_lueckenlos(out: &[f32], start: usize, ende: usize) {
        for (i, &s) in out.iter().enumerate() {
            let erwartet = if (start..ende).contains(&i) { 0.25 } else { 0.0 };
            assert!(
                (s - erwartet).abs() < 1e-6,
                "Frame {i}: {s} statt {erwartet}"
            );
        }
    }

    #[test]
    fn geplante_chunks_lueckenlos_bei_48k() {
        // 50 ms Vorlauf, drei Chunks zu je 42.67 ms
        let out = drei_chunks_rendern(48000);
        pruefe_lueckenlos(&out, 2400, 8544);
    }

    #[test]
    fn geplante_chunks_lueckenlos_bei_44k1() {
        // 1024 Samples ergeben 1881.6 Geraete-Frames pro Chunk
        let out = drei_chunks_rendern(44100);
        pruefe_lueckenlos(&out, 2205, 7850);
    }

    #[test]
    fn senke_rundet_auf_frame_raster() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut senke = CpalPlaybackSink::new(tx, 48000);
        let frame = AudioFrame::new(vec![0i16; 1024], 24000);
        // 1024 Samples bei 24 kHz sind 42_666_666 ns
        senke.play(ChunkId(0), &frame, Duration::from_nanos(42_666_666));
        senke.play(ChunkId(1), &frame, Duration::from_nanos(85_333_332));

        let starts: Vec<(u64, usize)> = rx
            .try_iter()
            .map(|b| match b {
                MixerBefehl::Abspielen {
                    start_frame,
                    samples,
                } => (start_frame, samples.len()),
                other => panic!("unerwartet: {other:?}"),
            })
            .collect();
        assert_eq!(starts, vec![(2048, 2048), (4096, 2048)]);
    }

    #[test]
    fn abgespielte_puffer_gehen_zurueck() {
        let (rueck_tx, rueck_rx) = crossbeam_channel::bounded(4);
        let mut mixer = TimelineMixer::new(16).mit_rueckgabe(rueck_tx);
        abspielen(&mut mixer, 0, &[0.5; 3]);
        abspielen(&mut mixer, 10, &[0.5; 5]);

        let mut out = [0.0f32; 4];
        mixer.render(&mut out);
        assert_eq!(rueck_rx.try_recv().unwrap().len(), 3);
        assert!(rueck_rx.try_recv().is_err());

        mixer.befehl(MixerBefehl::Ausblenden { frames: 2 });
        assert_eq!(rueck_rx.try_recv().unwrap().len(), 5);

        // Verpasster Chunk wird ebenfalls zurueckgegeben
        abspielen(&mut mixer, 0, &[0.5; 2]);
        assert_eq!(rueck_rx.try_recv().unwrap().len(), 2);
    }

    #[test]
    fn senke_verwendet_puffer_wieder() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (rueck_tx, rueck_rx) = crossbeam_channel::bounded(4);
        let mut senke = CpalPlaybackSink::new(tx, 24000).mit_rueckgabe(rueck_rx);
        rueck_tx.send(Vec::with_capacity(4096)).unwrap();
        rueck_tx.send(vec![9.0; 10]).unwrap();

        let frame = AudioFrame::new(vec![16384i16; 240], 24000);
        senke.play(ChunkId(0), &frame, Duration::ZERO);

        match rx.try_recv().unwrap() {
            MixerBefehl::Abspielen { samples, .. } => {
                assert_eq!(samples.len(), 240);
                assert!(samples.capacity() >= 4096);
                assert!(samples.iter().all(|&s| (s - 0.5).abs() < 1e-6));
            }
            other => panic!("unerwartet: {other:?}"),
        }
        // Ueberzaehlige Puffer wurden abgeholt
        assert!(rueck_tx.try_send(Vec::new()).is_ok());
        assert_eq!(rueck_tx.len(), 1);
    }
}
