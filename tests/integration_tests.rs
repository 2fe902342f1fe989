//! Integration tests for key analysis and transposition

use keyshift::error::ErrorKind;
use keyshift::governor::{sweep_expired, TransientStore};
use keyshift::io::{Decode, Decoded};
use keyshift::{AudioError, KeyService, ServiceConfig, ValidationError};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f32::consts::PI;
use std::io::Cursor;
use std::path::Path;
use std::time::{Duration, SystemTime};

const SR: u32 = 44100;

/// Sum of sines at `freqs`, scaled to stay below full scale
fn tones(freqs: &[f32], secs: f32) -> Vec<f32> {
    let n = (secs * SR as f32) as usize;
    let gain = 0.8 / freqs.len() as f32;
    (0..n)
        .map(|i| {
            let t = i as f32 / SR as f32;
            freqs.iter().map(|f| gain * (2.0 * PI * f * t).sin()).sum()
        })
        .collect()
}

/// Encode mono samples as a 16-bit WAV file
fn wav_bytes(samples: &[f32]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SR,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Load a WAV stream and return (mono samples, sample_rate)
fn load_wav(bytes: &[u8]) -> (Vec<f32>, u32) {
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
    let spec = reader.spec();
    let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
    let samples: Vec<f32> = reader
        .samples::<i32>()
        .map(|s| s.unwrap() as f32 / max_value)
        .collect();
    let mono = samples
        .chunks(spec.channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();
    (mono, spec.sample_rate)
}

/// Dominant frequency from rising zero crossings in the middle half
fn dominant_frequency(x: &[f32], sample_rate: u32) -> f32 {
    let mid = &x[x.len() / 4..3 * x.len() / 4];
    let crossings = mid.windows(2).filter(|w| w[0] < 0.0 && w[1] >= 0.0).count();
    crossings as f32 * sample_rate as f32 / mid.len() as f32
}

/// Magnitudes of the non-negative frequency bins
fn magnitude_spectrum(x: &[f32]) -> Vec<f32> {
    let mut buf: Vec<Complex<f32>> = x.iter().map(|&s| Complex::new(s, 0.0)).collect();
    FftPlanner::new().plan_fft_forward(buf.len()).process(&mut buf);
    buf[..x.len() / 2].iter().map(|c| c.norm()).collect()
}

/// (frequency, magnitude) of the strongest bin above DC
fn strongest_bin(spectrum: &[f32], len: usize) -> (f32, f32) {
    let (bin, mag) = spectrum
        .iter()
        .copied()
        .enumerate()
        .skip(1)
        .fold((0, 0.0f32), |best, cur| if cur.1 > best.1 { cur } else { best });
    (bin as f32 * SR as f32 / len as f32, mag)
}

/// Largest magnitude within `width_hz` of `freq`
fn peak_near(spectrum: &[f32], len: usize, freq: f32, width_hz: f32) -> f32 {
    let hz_per_bin = SR as f32 / len as f32;
    let lo = ((freq - width_hz) / hz_per_bin).floor().max(0.0) as usize;
    let hi = (((freq + width_hz) / hz_per_bin).ceil() as usize).min(spectrum.len() - 1);
    spectrum[lo..=hi].iter().copied().fold(0.0, f32::max)
}

fn service_in(dir: &Path) -> KeyService {
    let config = ServiceConfig {
        temp_dir: dir.to_path_buf(),
        ..ServiceConfig::default()
    };
    KeyService::new(config).unwrap()
}

fn artifact_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[test]
fn test_analyze_a440_sine() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path());

    let estimate = service
        .analyze("a440.wav", &wav_bytes(&tones(&[440.0], 5.0)))
        .expect("Analysis should succeed");

    assert!(
        estimate.label == "A" || estimate.label == "Am",
        "detected {}",
        estimate.label
    );
    assert!(estimate.confidence > 0.0 && estimate.confidence <= 1.0);
    assert_eq!(artifact_count(dir.path()), 0);
}

#[test]
fn test_analyze_c_major_triad() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path());

    let estimate = service
        .analyze("triad.wav", &wav_bytes(&tones(&[261.63, 329.63, 392.0], 5.0)))
        .unwrap();

    assert_eq!(estimate.label, "C");
    assert!(estimate.confidence > 0.6, "confidence {}", estimate.confidence);
}

#[test]
fn test_analyze_silence_is_flat_and_unconfident() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path());

    let estimate = service
        .analyze("silence.wav", &wav_bytes(&vec![0.0; SR as usize * 2]))
        .unwrap();
    assert_eq!(estimate.label, "C");
    assert_eq!(estimate.confidence, 0.0);
}

#[test]
fn test_transpose_octave_up() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path());
    let input = tones(&[440.0], 3.0);

    let download = service
        .transpose("a440.wav", &wav_bytes(&input), 12, Some("wav"))
        .unwrap();
    assert_eq!(download.filename(), "a440_shifted_12.wav");
    assert_eq!(download.mime_type(), "audio/wav");

    let (output, sample_rate) = load_wav(&download.read().unwrap());
    assert_eq!(sample_rate, SR);
    assert_eq!(output.len(), input.len());
    let f = dominant_frequency(&output, sample_rate);
    assert!((f - 880.0).abs() < 25.0, "dominant frequency {}", f);

    download.complete();
    assert_eq!(artifact_count(dir.path()), 0);
}

#[test]
fn test_transpose_round_trip_restores_spectrum() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path());
    let input = tones(&[1000.0], 2.0);
    let input_spectrum = magnitude_spectrum(&input);
    let input_peak = peak_near(&input_spectrum, input.len(), 1000.0, 5.0);

    for shift in [-12, -7, -1, 1, 7, 12] {
        let there = service
            .transpose("tone.wav", &wav_bytes(&input), shift, Some("wav"))
            .unwrap();
        let there_bytes = there.read().unwrap();
        there.complete();

        let back = service
            .transpose("tone.wav", &there_bytes, -shift, Some("wav"))
            .unwrap();
        let (output, sample_rate) = load_wav(&back.read().unwrap());
        back.complete();

        assert_eq!(sample_rate, SR);
        assert_eq!(output.len(), input.len(), "shift {}", shift);

        let spectrum = magnitude_spectrum(&output);
        let (freq, _) = strongest_bin(&spectrum, output.len());
        assert!((freq - 1000.0).abs() < 3.0, "shift {}: peak at {} Hz", shift, freq);
        let peak = peak_near(&spectrum, output.len(), 1000.0, 5.0);
        assert!(
            peak > 0.7 * input_peak && peak < 1.1 * input_peak,
            "shift {}: peak magnitude {} of {}",
            shift,
            peak,
            input_peak
        );
    }
}

#[test]
fn test_octave_up_removes_content_beyond_nyquist() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path());

    // 15 kHz lands at 30 kHz, above the 22.05 kHz Nyquist limit; a folded
    // copy would appear at 44.1 - 30 = 14.1 kHz
    let input = tones(&[1000.0, 15000.0], 2.0);
    let input_spectrum = magnitude_spectrum(&input);
    let high_peak = peak_near(&input_spectrum, input.len(), 15000.0, 5.0);

    let download = service
        .transpose("mix.wav", &wav_bytes(&input), 12, Some("wav"))
        .unwrap();
    let (output, _) = load_wav(&download.read().unwrap());
    download.complete();

    let spectrum = magnitude_spectrum(&output);
    let (freq, _) = strongest_bin(&spectrum, output.len());
    assert!((freq - 2000.0).abs() < 5.0, "peak at {} Hz", freq);

    let alias = peak_near(&spectrum, output.len(), 14100.0, 50.0);
    assert!(
        alias < 0.05 * high_peak,
        "folded component keeps {:.1}% of the input",
        100.0 * alias / high_peak
    );
}

#[test]
fn test_wav_output_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path());
    let bytes = wav_bytes(&tones(&[261.63, 392.0], 1.0));

    let first = service.transpose("x.wav", &bytes, -3, Some("wav")).unwrap();
    let second = service.transpose("x.wav", &bytes, -3, Some("wav")).unwrap();
    assert_eq!(first.read().unwrap(), second.read().unwrap());
    first.complete();
    second.complete();
}

#[test]
fn test_mp3_is_the_default_output() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path());

    let download = service
        .transpose("song.wav", &wav_bytes(&tones(&[440.0], 3.0)), 2, None)
        .unwrap();
    assert_eq!(download.filename(), "song_shifted_2.mp3");
    assert_eq!(download.mime_type(), "audio/mpeg");

    // 320 kbps for 3 s, plus framing slack
    let size = download.size();
    assert!(size > 0 && size < 200_000, "mp3 size {}", size);
    download.complete();
}

#[test]
fn test_rejects_unsupported_extension() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path());

    let err = service.analyze("notes.txt", b"la la la").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(matches!(
        err,
        AudioError::Validation(ValidationError::UnsupportedExtension(ref ext)) if ext == "txt"
    ));
    assert_eq!(artifact_count(dir.path()), 0);
}

#[test]
fn test_rejects_out_of_range_shift() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path());

    let err = service
        .transpose("a.wav", &wav_bytes(&tones(&[440.0], 0.5)), 30, Some("wav"))
        .unwrap_err();
    assert!(matches!(
        err,
        AudioError::Validation(ValidationError::InvalidShift(30))
    ));
}

#[test]
fn test_corrupt_upload_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path());

    let err = service.analyze("broken.mp3", &[0xAB; 4096]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert!(!err.is_client_error());
    assert_eq!(artifact_count(dir.path()), 0);
}

/// Decoder that must never be reached
struct UnreachableDecoder;

impl Decode for UnreachableDecoder {
    fn decode_file(&self, path: &Path, _max_secs: Option<f32>) -> keyshift::Result<Decoded> {
        panic!("decoder invoked for {}", path.display());
    }
}

#[test]
fn test_oversize_upload_is_refused_before_decode() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServiceConfig {
        temp_dir: dir.path().to_path_buf(),
        max_upload_bytes: 1024,
        ..ServiceConfig::default()
    };
    let service = KeyService::with_decoder(UnreachableDecoder, config).unwrap();

    let err = service.analyze("big.wav", &[0u8; 1025]).unwrap_err();
    assert!(matches!(
        err,
        AudioError::Validation(ValidationError::TooLarge {
            size: 1025,
            limit: 1024
        })
    ));
    let err = service.transpose("big.mp3", &[0u8; 4096], 1, None).unwrap_err();
    assert!(err.is_client_error());
    assert_eq!(artifact_count(dir.path()), 0);
}

#[test]
fn test_retention_sweep_removes_abandoned_output() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path());

    // A download that is never completed stays in transient storage
    let download = service
        .transpose("a.wav", &wav_bytes(&tones(&[440.0], 0.5)), 1, Some("wav"))
        .unwrap();
    let path = download.artifact().path().to_path_buf();
    drop(download);
    assert!(path.exists());

    let store = TransientStore::open(dir.path()).unwrap();
    let now = SystemTime::now();
    let report = sweep_expired(store.dir(), Duration::from_secs(600), now).unwrap();
    assert_eq!(report.removed, 0);

    let later = now + Duration::from_secs(601);
    let report = sweep_expired(store.dir(), Duration::from_secs(600), later).unwrap();
    assert_eq!(report.removed, 1);
    assert!(!path.exists());
}
