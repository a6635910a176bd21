//! Shared scalar statistics helpers.
//!
//! Both the iteration-cap calibration and the drift corrector model sample
//! intensities as a normal distribution and tighten it by sigma clipping.

/// Maximum-likelihood normal fit: mean and (population) standard deviation.
///
/// Returns `None` for an empty sample.
pub fn fit_normal(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

/// Robust upper cutoff `mean + k·sigma` after iterative sigma clipping.
///
/// Each iteration refits the normal distribution and keeps only values below
/// the current cutoff. Stops early when the sample empties out, returning
/// the last fitted cutoff.
pub fn clipped_cutoff(values: &[f64], k: f64, iterations: usize) -> Option<f64> {
    let mut sample: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let mut cutoff = None;
    for _ in 0..iterations {
        let Some((mean, std)) = fit_normal(&sample) else {
            break;
        };
        cutoff = Some(mean + k * std);
        sample.retain(|v| *v < mean + k * std);
    }
    cutoff
}
