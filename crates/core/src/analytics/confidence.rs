/// Observation count at which the scorer grants full statistical weight.
const SATURATION_OBSERVATIONS: f64 = 5.0;

/// Evidence score in [0, 1]: success rate damped by sample size.
///
/// A single observation proves nothing and scores zero; weight grows
/// linearly until five observations and saturates there.
pub fn score(observations: usize, successes: usize) -> f64 {
    if observations < 2 {
        return 0.0;
    }
    let rate = successes as f64 / observations as f64;
    let weight = (observations as f64 / SATURATION_OBSERVATIONS).min(1.0);
    rate * weight
}
