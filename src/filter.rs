use crate::geo::GeoPoint;

/// Fixes worse than this are held back until the route has a first point
pub const ACCURACY_GATE_M: f64 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum RejectReason {
    LowAccuracy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Rejected(RejectReason),
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted)
    }
}

/// Decide whether a sample may join the route.
///
/// Accuracy gating only applies to the very first fix of a session; once a
/// point is on the route every later sample is taken regardless of accuracy.
pub fn admit(sample: &GeoPoint, route_is_empty: bool) -> Admission {
    if route_is_empty && sample.accuracy_m > ACCURACY_GATE_M {
        Admission::Rejected(RejectReason::LowAccuracy)
    } else {
        Admission::Accepted
    }
}
