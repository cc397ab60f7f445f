//! Search region and result page selection

use rand::Rng;

/// Rectangular search region in degrees, always inside
/// `[-180, 180] x [-90, 90]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Box of `half_width` x `half_height` degrees around a point, clamped
    /// to valid coordinates.
    pub fn around(latitude: f64, longitude: f64, half_width: f64, half_height: f64) -> Self {
        Self {
            min_lon: (longitude - half_width).max(-180.0),
            min_lat: (latitude - half_height).max(-90.0),
            max_lon: (longitude + half_width).min(180.0),
            max_lat: (latitude + half_height).min(90.0),
        }
    }

    /// `"minLon,minLat,maxLon,maxLat"`
    pub fn to_param_string(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

/// Deepest page worth asking for: the API refuses to page past
/// `max_results_cap` results.
pub fn page_limit(total_pages: u32, per_page: u32, max_results_cap: u32) -> u32 {
    if total_pages == 0 {
        return 0;
    }
    let reachable = (max_results_cap / per_page.max(1)).max(1);
    total_pages.min(reachable)
}

/// Uniform pick from `1..=limit`. `limit` must be at least 1.
pub fn choose_page<R: Rng + ?Sized>(limit: u32, rng: &mut R) -> u32 {
    rng.gen_range(1..=limit.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_box_stays_inside_world() {
        let samples = [
            (0.0, 0.0),
            (89.5, 179.5),
            (-89.5, -179.5),
            (90.0, 180.0),
            (-90.0, -180.0),
            (37.0, -122.0),
        ];

        for (lat, lon) in samples {
            let bbox = BoundingBox::around(lat, lon, 1.0, 1.0);
            assert!(bbox.min_lon >= -180.0 && bbox.max_lon <= 180.0, "{bbox:?}");
            assert!(bbox.min_lat >= -90.0 && bbox.max_lat <= 90.0, "{bbox:?}");
            assert!(bbox.min_lon <= bbox.max_lon, "{bbox:?}");
            assert!(bbox.min_lat <= bbox.max_lat, "{bbox:?}");
        }
    }

    #[test]
    fn test_box_param_order() {
        let bbox = BoundingBox::around(37.0, -122.0, 1.0, 1.0);
        assert_eq!(bbox.to_param_string(), "-123,36,-121,38");
    }

    #[test]
    fn test_clamped_edge() {
        let bbox = BoundingBox::around(89.5, 179.5, 1.0, 1.0);
        assert_eq!(bbox.max_lat, 90.0);
        assert_eq!(bbox.max_lon, 180.0);
        assert_eq!(bbox.min_lat, 88.5);
    }

    #[test]
    fn test_page_limit() {
        assert_eq!(page_limit(0, 21, 4000), 0);
        assert_eq!(page_limit(5, 21, 4000), 5);
        assert_eq!(page_limit(10_000, 21, 4000), 190);
        assert_eq!(page_limit(3, 500, 100), 1);
    }

    #[test]
    fn test_choose_page_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let page = choose_page(190, &mut rng);
            assert!((1..=190).contains(&page));
        }
        assert_eq!(choose_page(1, &mut rng), 1);
    }
}
