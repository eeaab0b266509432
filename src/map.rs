use crate::geo::{Bounds, LatLng};

/// Centre of India; used until the first fix arrives
pub const DEFAULT_CENTER: LatLng = LatLng {
    lat: 20.5937,
    lng: 78.9629,
};
pub const DEFAULT_ZOOM: u8 = 13;
/// Zoom used once the device has been located
pub const LOCATED_ZOOM: u8 = 15;
pub const MAX_ZOOM: u8 = 19;

/// What the tracker drives on whatever draws the route
pub trait MapView {
    fn set_center(&mut self, point: LatLng, zoom: u8);
    fn append_route_point(&mut self, point: LatLng);
    fn pan_to(&mut self, point: LatLng);
    fn fit_bounds(&mut self, bounds: Bounds);
    fn clear_route(&mut self);
}

// 360 degrees of longitude across one tile at zoom 0, viewport roughly one
// tile wide and half as tall
fn span_for_zoom(zoom: u8) -> (f64, f64) {
    let lng_span = 360.0 / f64::from(1u32 << zoom.min(MAX_ZOOM)) / 2.0;
    (lng_span / 2.0, lng_span)
}

/// Viewport plus the drawn polyline and "you are here" marker
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMap {
    pub center: LatLng,
    pub zoom: u8,
    pub route: Vec<LatLng>,
    pub marker: Option<LatLng>,
}

impl Default for RouteMap {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            route: Vec::new(),
            marker: None,
        }
    }
}

impl RouteMap {
    /// Half-extent of the visible area in degrees for the current zoom
    pub fn span_degrees(&self) -> (f64, f64) {
        span_for_zoom(self.zoom)
    }

    /// (south, north), (west, east) of the viewport
    pub fn viewport(&self) -> ([f64; 2], [f64; 2]) {
        let (lat_span, lng_span) = self.span_degrees();
        (
            [self.center.lat - lat_span, self.center.lat + lat_span],
            [self.center.lng - lng_span, self.center.lng + lng_span],
        )
    }
}

impl MapView for RouteMap {
    fn set_center(&mut self, point: LatLng, zoom: u8) {
        self.center = point;
        self.zoom = zoom.min(MAX_ZOOM);
        self.marker = Some(point);
    }

    fn append_route_point(&mut self, point: LatLng) {
        self.route.push(point);
        self.marker = Some(point);
    }

    fn pan_to(&mut self, point: LatLng) {
        self.center = point;
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        self.center = bounds.center();
        let lat_extent = (bounds.north_east.lat - bounds.south_west.lat).abs();
        let lng_extent = (bounds.north_east.lng - bounds.south_west.lng).abs();

        // zoom in while the whole box still fits
        let mut zoom = 0u8;
        while zoom < MAX_ZOOM {
            let (lat_span, lng_span) = span_for_zoom(zoom + 1);
            if lat_extent > lat_span * 2.0 || lng_extent > lng_span * 2.0 {
                break;
            }
            zoom += 1;
        }
        self.zoom = zoom;
    }

    fn clear_route(&mut self) {
        self.route.clear();
    }
}
