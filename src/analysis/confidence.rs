//! Confidence scoring
//!
//! A template correlation `c` in [-1, 1] is reported as
//! `clamp((c + 1) / 2, 0, 1)` rounded to two decimal places. Values near 0.5
//! mean the recording matched no key better than chance; this is a reporting
//! signal only and never rejects a result.

/// Correlation below which a result is flagged as weakly tonal
pub const WEAK_TONALITY_CORRELATION: f64 = 0.5;

/// Round to two decimal places
pub fn round_to_hundredths(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Map a Pearson correlation to a reported confidence in [0, 1]
///
/// Non-finite input maps to 0.0.
///
/// # Example
///
/// ```
/// use keyshift::analysis::confidence::correlation_to_confidence;
///
/// assert_eq!(correlation_to_confidence(1.0), 1.0);
/// assert_eq!(correlation_to_confidence(0.0), 0.5);
/// assert_eq!(correlation_to_confidence(-1.0), 0.0);
/// ```
pub fn correlation_to_confidence(correlation: f64) -> f32 {
    if !correlation.is_finite() {
        return 0.0;
    }
    round_to_hundredths(((correlation + 1.0) / 2.0).clamp(0.0, 1.0)) as f32
}

/// True if the best correlation is too low to call the key reliable
pub fn is_weak_tonality(correlation: f64) -> bool {
    !correlation.is_finite() || correlation < WEAK_TONALITY_CORRELATION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_mapping() {
        assert_eq!(correlation_to_confidence(0.834), 0.92);
        assert_eq!(correlation_to_confidence(0.6845), 0.84);
        assert_eq!(correlation_to_confidence(1.0 - 1e-12), 1.0);
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(correlation_to_confidence(1.5), 1.0);
        assert_eq!(correlation_to_confidence(-3.0), 0.0);
        assert_eq!(correlation_to_confidence(f64::NAN), 0.0);
    }

    #[test]
    fn test_weak_tonality() {
        assert!(is_weak_tonality(0.2));
        assert!(is_weak_tonality(f64::NAN));
        assert!(!is_weak_tonality(0.8));
    }
}
