use crate::history::RunRecord;

/// Oldest-first (run number, distance km) points for the history chart
pub fn distance_series(runs: &[RunRecord]) -> Vec<(f64, f64)> {
    runs.iter()
        .rev()
        .enumerate()
        .map(|(i, r)| ((i + 1) as f64, r.distance_km))
        .collect()
}

/// Compute X (run count) and Y (km) bounds for the history chart
pub fn compute_chart_params(coords: &[(f64, f64)]) -> (f64, f64) {
    let longest = coords.iter().map(|&(_, km)| km).fold(0.0, f64::max);
    let runs = coords.last().map(|c| c.0).unwrap_or(1.0).max(1.0);

    // leave headroom above the longest run, never a zero-height axis
    let top = if longest > 0.0 {
        ((longest + longest / 10.0) * 10.0).ceil() / 10.0
    } else {
        1.0
    };
    (runs, top)
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
