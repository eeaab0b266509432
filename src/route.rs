use crate::geo::{haversine, LatLng};

/// Ordered, append-only sequence of accepted points for one session.
///
/// Keeps a running distance sum; adding only the newest segment gives the
/// same total as [`crate::geo::calc_dist`] over the full sequence.
#[derive(Debug, Clone, Default)]
pub struct Route {
    points: Vec<LatLng>,
    distance_km: f64,
}

impl Route {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point and return the new cumulative distance in km
    pub fn append(&mut self, point: LatLng) -> f64 {
        if let Some(last) = self.points.last() {
            self.distance_km += haversine(*last, point);
        }
        self.points.push(point);
        self.distance_km
    }

    /// Clear the route; only used at session start
    pub fn reset(&mut self) {
        self.points.clear();
        self.distance_km = 0.0;
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[LatLng] {
        &self.points
    }

    pub fn last(&self) -> Option<LatLng> {
        self.points.last().copied()
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::calc_dist;

    fn walk() -> Vec<LatLng> {
        vec![
            LatLng::new(17.3850, 78.4867),
            LatLng::new(17.3860, 78.4870),
            LatLng::new(17.3872, 78.4881),
            LatLng::new(17.3872, 78.4881),
            LatLng::new(17.3890, 78.4902),
        ]
    }

    #[test]
    fn test_new_route_is_empty() {
        let route = Route::new();
        assert!(route.is_empty());
        assert_eq!(route.len(), 0);
        assert_eq!(route.distance_km(), 0.0);
    }

    #[test]
    fn test_single_point_has_zero_distance() {
        let mut route = Route::new();
        assert_eq!(route.append(LatLng::new(1.0, 1.0)), 0.0);
        assert_eq!(route.len(), 1);
    }

    #[test]
    fn test_distance_is_monotonic() {
        let mut route = Route::new();
        let mut previous = 0.0;
        for p in walk() {
            let d = route.append(p);
            assert!(d >= previous);
            assert!(d >= 0.0);
            previous = d;
        }
    }

    #[test]
    fn test_running_sum_matches_full_summation() {
        let mut route = Route::new();
        for p in walk() {
            route.append(p);
        }
        assert!((route.distance_km() - calc_dist(route.points())).abs() < 1e-9);
    }

    #[test]
    fn test_points_preserve_append_order() {
        let mut route = Route::new();
        for p in walk() {
            route.append(p);
        }
        assert_eq!(route.points(), walk().as_slice());
        assert_eq!(route.last(), walk().last().copied());
    }

    #[test]
    fn test_reset_clears_points_and_distance() {
        let mut route = Route::new();
        for p in walk() {
            route.append(p);
        }
        route.reset();
        assert!(route.is_empty());
        assert_eq!(route.distance_km(), 0.0);
    }
}
