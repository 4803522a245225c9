//! Feed and detail URL construction.

use crate::viewport::Viewport;

/// Path of the bounds-filtered station feed, relative to the feed base URL.
pub const FEED_PATH: &str = "/geojson/stations";

/// The `bounds` query value: `swLng,swLat,neLng,neLat`.
///
/// `f64`'s `Display` prints the shortest string that round-trips, so the
/// engine's precision is forwarded untouched.
pub fn bounds_param(viewport: &Viewport) -> String {
    format!(
        "{},{},{},{}",
        viewport.sw_lng, viewport.sw_lat, viewport.ne_lng, viewport.ne_lat
    )
}

/// Feed URL for a viewport.
pub fn station_url(base: &str, viewport: &Viewport) -> String {
    format!(
        "{}{}?bounds={}",
        base.trim_end_matches('/'),
        FEED_PATH,
        bounds_param(viewport)
    )
}

/// Detail URL for a single station.
pub fn detail_url(base: &str, beacon_name: &str) -> String {
    format!("{}/station/{}.json", base.trim_end_matches('/'), beacon_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::LngLat;

    #[test]
    fn bounds_keep_order_and_precision() {
        let v = Viewport::new(LngLat::new(-122.7, 45.5), LngLat::new(-122.6, 45.6), 10.0);
        assert_eq!(bounds_param(&v), "-122.7,45.5,-122.6,45.6");
        assert_eq!(
            station_url("", &v),
            "/geojson/stations?bounds=-122.7,45.5,-122.6,45.6"
        );
    }

    #[test]
    fn full_precision_is_forwarded() {
        let v = Viewport::new(
            LngLat::new(-122.67648312345678, 45.523064),
            LngLat::new(-122.6, 45.60000000000001),
            12.0,
        );
        assert_eq!(
            bounds_param(&v),
            "-122.67648312345678,45.523064,-122.6,45.60000000000001"
        );
    }

    #[test]
    fn base_trailing_slash_is_not_doubled() {
        let v = Viewport::new(LngLat::new(0.0, 0.0), LngLat::new(1.0, 1.0), 3.0);
        assert_eq!(
            station_url("http://localhost:8990/", &v),
            "http://localhost:8990/geojson/stations?bounds=0,0,1,1"
        );
        assert_eq!(
            detail_url("http://localhost:8990/", "beacon-42"),
            "http://localhost:8990/station/beacon-42.json"
        );
    }
}
