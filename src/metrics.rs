/// Flat energy estimate used for every run, kcal per km
pub const KCAL_PER_KM: f64 = 70.0;

/// Shown in place of a pace before there is enough data for one
pub const NO_PACE: &str = "--:--";

pub fn speed_kmh(distance_km: f64, elapsed_secs: u64) -> f64 {
    if elapsed_secs > 0 && distance_km > 0.0 {
        distance_km / (elapsed_secs as f64 / 3600.0)
    } else {
        0.0
    }
}

/// Minutes per kilometre
pub fn pace_min_per_km(distance_km: f64, elapsed_secs: u64) -> f64 {
    if distance_km > 0.0 && elapsed_secs > 0 {
        (elapsed_secs as f64 / 60.0) / distance_km
    } else {
        0.0
    }
}

pub fn calories_kcal(distance_km: f64) -> u32 {
    if distance_km > 0.0 {
        (distance_km * KCAL_PER_KM).round() as u32
    } else {
        0
    }
}

/// "MM:SS"; minutes keep counting past 59
pub fn format_elapsed(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// "M:SS" pace, or [`NO_PACE`] when there is none yet
pub fn format_pace(pace: f64) -> String {
    if !pace.is_finite() || pace <= 0.0 {
        return NO_PACE.to_string();
    }
    let mut minutes = pace.floor() as u64;
    let mut seconds = ((pace % 1.0) * 60.0).round() as u64;
    // 5.999 min rounds to 60s
    if seconds == 60 {
        minutes += 1;
        seconds = 0;
    }
    format!("{minutes}:{seconds:02}")
}

pub fn format_distance(distance_km: f64) -> String {
    format!("{distance_km:.2}")
}

pub fn format_speed(speed_kmh: f64) -> String {
    format!("{speed_kmh:.1}")
}

/// Live-display state derived after each accepted sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveMetrics {
    pub distance_km: f64,
    pub speed_kmh: f64,
    pub pace_min_per_km: f64,
    pub calories_kcal: u32,
    pub gps_points: usize,
}

impl LiveMetrics {
    pub fn compute(distance_km: f64, elapsed_secs: u64, gps_points: usize) -> Self {
        Self {
            distance_km,
            speed_kmh: speed_kmh(distance_km, elapsed_secs),
            pace_min_per_km: pace_min_per_km(distance_km, elapsed_secs),
            calories_kcal: calories_kcal(distance_km),
            gps_points,
        }
    }

    pub fn distance_label(&self) -> String {
        format_distance(self.distance_km)
    }

    pub fn pace_label(&self) -> String {
        format_pace(self.pace_min_per_km)
    }

    pub fn speed_label(&self) -> String {
        format_speed(self.speed_kmh)
    }
}
