//! Chroma normalization strategies

/// Sharpen a chroma vector to emphasize prominent semitones
///
/// # Arguments
///
/// * `chroma` - 12-element chroma vector
/// * `power` - Sharpening power (e.g., 1.5 or 2.0)
///
/// # Returns
///
/// Sharpened chroma vector, L2 normalized. An all-zero vector is returned
/// unchanged.
pub fn sharpen_chroma(chroma: &[f32; 12], power: f32) -> [f32; 12] {
    let mut out = [0.0f32; 12];
    for (o, &c) in out.iter_mut().zip(chroma.iter()) {
        *o = c.max(0.0).powf(power);
    }

    let norm = out.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for o in out.iter_mut() {
            *o /= norm;
        }
    }
    out
}
