//! Key detection algorithm
//!
//! Averages the chromagram into one 12-bin profile and correlates it with
//! each of the 24 Krumhansl-Kessler templates. Keys are ranked by
//! correlation, highest first; equal correlations keep template order
//! (majors before minors, then by root).
//!
//! # Reference
//!
//! Krumhansl, C. L., & Kessler, E. J. (1982). Tracing the Dynamic Changes in Perceived
//! Tonal Organization in a Spatial Representation of Musical Keys. *Psychological Review*,
//! 89(4), 334-368.

use super::{templates::KeyTemplates, KeyDetectionResult, TOP_KEYS};
use crate::analysis::result::Key;
use crate::error::{AudioError, Result};
use crate::features::chroma::Chromagram;

/// Sum of squared deviations below which a profile counts as flat
const MIN_VARIANCE: f64 = 1e-18;

/// Pearson correlation coefficient of two 12-bin profiles
///
/// Returns `None` when either profile has zero variance, where the
/// coefficient is undefined.
pub fn pearson_correlation(a: &[f32; 12], b: &[f32; 12]) -> Option<f64> {
    let mean_a = a.iter().map(|&x| x as f64).sum::<f64>() / 12.0;
    let mean_b = b.iter().map(|&x| x as f64).sum::<f64>() / 12.0;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x as f64 - mean_a;
        let dy = y as f64 - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if !(var_a > MIN_VARIANCE && var_b > MIN_VARIANCE) {
        return None;
    }
    let r = cov / (var_a.sqrt() * var_b.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Detect musical key from a chromagram
///
/// # Arguments
///
/// * `chromagram` - Pitch-class energies over time
/// * `templates` - Key templates (Krumhansl-Kessler profiles)
///
/// # Errors
///
/// Returns `AudioError::AnalysisError` if the chromagram has no frames.
///
/// # Example
///
/// ```no_run
/// use keyshift::config::AnalysisConfig;
/// use keyshift::features::chroma::extract_chroma;
/// use keyshift::features::key::{detect_key, KeyTemplates};
///
/// let samples = vec![0.0f32; 44100 * 5];
/// let chromagram = extract_chroma(&samples, 44100, &AnalysisConfig::default())?;
/// let result = detect_key(&chromagram, KeyTemplates::standard())?;
///
/// println!("Detected key: {}, confidence: {:.2}", result.key, result.confidence);
/// # Ok::<(), keyshift::AudioError>(())
/// ```
pub fn detect_key(chromagram: &Chromagram, templates: &KeyTemplates) -> Result<KeyDetectionResult> {
    log::debug!(
        "Detecting key from {} chroma frames",
        chromagram.frame_count()
    );

    let profile = chromagram
        .mean_profile()
        .ok_or_else(|| AudioError::AnalysisError("chromagram has no frames".to_string()))?;
    Ok(detect_key_from_profile(&profile, templates))
}

/// Rank all templates against a mean chroma profile
///
/// A zero-variance profile (silence, or equal energy in every pitch class)
/// has no defined correlation; the first template in ranking order is
/// returned with confidence 0.0 and `flat_profile` set.
pub fn detect_key_from_profile(profile: &[f32; 12], templates: &KeyTemplates) -> KeyDetectionResult {
    let mut scores: Vec<(Key, f64)> = Vec::with_capacity(templates.len());
    for template in templates.iter() {
        match pearson_correlation(profile, template.profile()) {
            Some(r) => scores.push((template.key(), r)),
            None => return flat_profile_result(templates),
        }
    }

    // Stable sort: ties keep template order
    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let best = scores[0].1;
    let ranking: Vec<(Key, f32)> = scores.iter().map(|&(k, r)| (k, r as f32)).collect();
    let result = KeyDetectionResult::from_ranking(ranking, best);

    log::debug!(
        "Key: {} (r={:.4}, confidence={:.2}), runners-up: {}",
        result.key,
        best,
        result.confidence,
        result
            .top_keys
            .iter()
            .skip(1)
            .map(|(k, r)| format!("{} ({:.3})", k, r))
            .collect::<Vec<_>>()
            .join(", ")
    );

    result
}

/// Fallback for an undefined correlation
///
/// Every template scores 0.0, so the ranking is the template order itself
/// and the reported key is its head: C major, the key that wins any other
/// all-way tie. This is deliberately not the alphabetically first label
/// ("A"); callers rely on the fallback matching the tie-break order.
fn flat_profile_result(templates: &KeyTemplates) -> KeyDetectionResult {
    log::warn!("Mean chroma profile has no variance; key is undefined, using fallback");

    let all_scores: Vec<(Key, f32)> = templates.iter().map(|t| (t.key(), 0.0)).collect();
    let key = all_scores.first().map(|&(k, _)| k).unwrap_or(Key::Major(0));
    KeyDetectionResult {
        key,
        correlation: 0.0,
        confidence: 0.0,
        top_keys: all_scores.iter().take(TOP_KEYS).copied().collect(),
        all_scores,
        flat_profile: true,
    }
}
