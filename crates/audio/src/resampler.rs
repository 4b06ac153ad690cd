//! Lineare Abtastratenkonvertierung fuer PCM16
//!
//! Bewusst einfach: lineare Interpolation zwischen Nachbarsamples, kein
//! Anti-Aliasing-Filter. Fuer Sprache bei 16-48 kHz ausreichend.

use std::borrow::Cow;

use voxlink_core::AudioFrame;

/// Konvertiert `input` von `from_rate` nach `to_rate`.
///
/// Gleiche Raten (oder eine Rate von 0) liefern die Eingabe unveraendert
/// zurueck, ohne Kopie. Die Ausgabelaenge ist
/// `floor(input.len() * to_rate / from_rate)`.
pub fn resample(input: &[i16], from_rate: u32, to_rate: u32) -> Cow<'_, [i16]> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return Cow::Borrowed(input);
    }

    let out_len = (input.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    if out_len == 0 {
        return Cow::Owned(Vec::new());
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let last = input.len() - 1;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = (pos.floor() as usize).min(last);
        let frac = pos - idx as f64;
        let a = input[idx] as f64;
        // Letztes Sample wird dupliziert
        let b = input[(idx + 1).min(last)] as f64;
        let wert = a + (b - a) * frac;
        out.push(wert.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16);
    }

    Cow::Owned(out)
}

/// Konvertiert einen ganzen Frame. Bei gleicher Rate wird nur der
/// `Arc` geklont.
pub fn resample_frame(frame: &AudioFrame, to_rate: u32) -> AudioFrame {
    match resample(frame.samples(), frame.sample_rate(), to_rate) {
        Cow::Borrowed(_) => frame.clone(),
        Cow::Owned(samples) => AudioFrame::new(samples, to_rate),
    }
}
