/// Signed percentage change of `current` against the `previous` price.
///
/// A missing or zero baseline and a missing current price all yield 0:
/// partial upstream data is "no signal", never an error.
pub fn compute_delta(previous: Option<f64>, current: Option<f64>) -> f64 {
    let (Some(previous), Some(current)) = (previous, current) else {
        return 0.0;
    };
    if previous == 0.0 {
        return 0.0;
    }

    let quotient = round_half_up((current - previous) / previous, 4);
    let percent = quotient * 100.0;
    // Stored values carry at most two fractional digits; re-parsing the
    // rendered form scrubs binary noise from the multiplication.
    format!("{percent:.2}").parse().unwrap_or(percent)
}

/// Rounds half away from zero at `digits` fractional digits.
fn round_half_up(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    if value >= 0.0 {
        (value * scale + 0.5).floor() / scale
    } else {
        (value * scale - 0.5).ceil() / scale
    }
}
