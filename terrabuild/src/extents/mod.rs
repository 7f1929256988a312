//! Geospatial extents.
//!
//! Provides [`GeospatialExtents`], the axis-aligned bounding box used for
//! every source, tile and composite in the pipeline. Extents carry an
//! `is_geographic` flag so that intersection tests can account for data
//! that wraps the date line.
//!
//! # Date Line Wraparound
//!
//! Geographic extents are expressed in degrees of longitude. A source that
//! spans `170..190` and a tile that spans `-180..-170` describe the same
//! piece of the globe. Intersection helpers therefore accept an `x_offset`
//! which is added to the *other* extents before testing:
//!
//! ```text
//!  tile:          [-180 ─── -170]
//!  source:                              [170 ─────── 190]
//!  source - 360:  [-190 ─────── -170]
//! ```

/// Longitude offsets tried when testing geographic extents for overlap.
///
/// The first entry is always `0.0` so the common, non-wrapping case is
/// tested first.
pub const WRAPAROUND_OFFSETS: [f64; 3] = [0.0, -360.0, 360.0];

/// Axis-aligned bounding box in a destination coordinate system.
///
/// # Invariant
///
/// A valid extents has `x_min <= x_max` and `y_min <= y_max`. The value
/// returned by [`GeospatialExtents::empty`] is deliberately invalid and acts
/// as the identity for [`GeospatialExtents::union`].
///
/// # Example
///
/// ```
/// use terrabuild::extents::GeospatialExtents;
///
/// let a = GeospatialExtents::new(0.0, 0.0, 10.0, 10.0, false);
/// let b = GeospatialExtents::new(5.0, 5.0, 15.0, 15.0, false);
///
/// assert!(a.intersects(&b, 0.0));
/// let i = a.intersection(&b, 0.0);
/// assert_eq!(i.x_min, 5.0);
/// assert_eq!(i.x_max, 10.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GeospatialExtents {
    /// Western bound.
    pub x_min: f64,
    /// Southern bound.
    pub y_min: f64,
    /// Eastern bound.
    pub x_max: f64,
    /// Northern bound.
    pub y_max: f64,
    /// Whether the coordinates are longitude/latitude degrees.
    pub is_geographic: bool,
}

impl GeospatialExtents {
    /// Create extents from explicit bounds.
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64, is_geographic: bool) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
            is_geographic,
        }
    }

    /// Create an empty (invalid) extents, the identity for [`union`](Self::union).
    pub fn empty() -> Self {
        Self {
            x_min: f64::MAX,
            y_min: f64::MAX,
            x_max: -f64::MAX,
            y_max: -f64::MAX,
            is_geographic: false,
        }
    }

    /// Returns true if the bounds are ordered on both axes.
    pub fn valid(&self) -> bool {
        self.x_min <= self.x_max && self.y_min <= self.y_max
    }

    /// Width along the x axis.
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Height along the y axis.
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Center point `(x, y)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.x_min + self.x_max) * 0.5,
            (self.y_min + self.y_max) * 0.5,
        )
    }

    /// Half the diagonal length.
    pub fn radius(&self) -> f64 {
        (self.width() * self.width() + self.height() * self.height()).sqrt() * 0.5
    }

    /// Ratio of height over width, used by the subdivision aspect guard.
    ///
    /// Returns `1.0` for degenerate zero-width extents.
    pub fn aspect_ratio(&self) -> f64 {
        let width = self.width();
        if width <= 0.0 {
            return 1.0;
        }
        self.height() / width
    }

    /// Returns a copy shifted along x by `x_offset`.
    pub fn offset_x(&self, x_offset: f64) -> Self {
        Self {
            x_min: self.x_min + x_offset,
            x_max: self.x_max + x_offset,
            ..*self
        }
    }

    /// Test whether `other`, shifted by `x_offset` along x, overlaps `self`.
    ///
    /// Touching edges count as intersecting, matching closed-interval
    /// semantics of tile boundaries.
    pub fn intersects(&self, other: &GeospatialExtents, x_offset: f64) -> bool {
        if !self.valid() || !other.valid() {
            return false;
        }
        let other = other.offset_x(x_offset);
        self.x_min.max(other.x_min) <= self.x_max.min(other.x_max)
            && self.y_min.max(other.y_min) <= self.y_max.min(other.y_max)
    }

    /// Intersection of `self` with `other` shifted by `x_offset`.
    ///
    /// The result is invalid (see [`valid`](Self::valid)) when the two do
    /// not overlap.
    pub fn intersection(&self, other: &GeospatialExtents, x_offset: f64) -> GeospatialExtents {
        let other = other.offset_x(x_offset);
        GeospatialExtents {
            x_min: self.x_min.max(other.x_min),
            y_min: self.y_min.max(other.y_min),
            x_max: self.x_max.min(other.x_max),
            y_max: self.y_max.min(other.y_max),
            is_geographic: self.is_geographic,
        }
    }

    /// Longitude offsets worth testing against `other`.
    ///
    /// Only geographic pairs wrap; everything else is tested in place.
    pub fn wraparound_offsets(&self, other: &GeospatialExtents) -> &'static [f64] {
        if self.is_geographic && other.is_geographic {
            &WRAPAROUND_OFFSETS
        } else {
            &WRAPAROUND_OFFSETS[..1]
        }
    }

    /// Test for overlap at any applicable wraparound offset.
    pub fn intersects_wrapped(&self, other: &GeospatialExtents) -> bool {
        self.wraparound_offsets(other)
            .iter()
            .any(|&offset| self.intersects(other, offset))
    }

    /// Smallest extents containing both `self` and `other`.
    pub fn union(&self, other: &GeospatialExtents) -> GeospatialExtents {
        if !other.valid() {
            return *self;
        }
        if !self.valid() {
            return *other;
        }
        GeospatialExtents {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
            is_geographic: self.is_geographic,
        }
    }

    /// Grow to include the point `(x, y)`.
    pub fn expand_by_point(&mut self, x: f64, y: f64) {
        self.x_min = self.x_min.min(x);
        self.y_min = self.y_min.min(y);
        self.x_max = self.x_max.max(x);
        self.y_max = self.y_max.max(y);
    }

    /// Returns true if `other` lies entirely within `self`.
    pub fn contains(&self, other: &GeospatialExtents) -> bool {
        other.valid()
            && self.x_min <= other.x_min
            && self.y_min <= other.y_min
            && self.x_max >= other.x_max
            && self.y_max >= other.y_max
    }

    /// Split at the midpoint into `[bottom_left, bottom_right, top_left, top_right]`.
    ///
    /// All four quadrants share the exact same midpoint value so their union
    /// reproduces `self` without gaps.
    pub fn split_quadrants(&self) -> [GeospatialExtents; 4] {
        let (cx, cy) = self.center();
        let g = self.is_geographic;
        [
            GeospatialExtents::new(self.x_min, self.y_min, cx, cy, g),
            GeospatialExtents::new(cx, self.y_min, self.x_max, cy, g),
            GeospatialExtents::new(self.x_min, cy, cx, self.y_max, g),
            GeospatialExtents::new(cx, cy, self.x_max, self.y_max, g),
        ]
    }

    /// Split along x into `[left, right]`.
    pub fn split_x(&self) -> [GeospatialExtents; 2] {
        let (cx, _) = self.center();
        let g = self.is_geographic;
        [
            GeospatialExtents::new(self.x_min, self.y_min, cx, self.y_max, g),
            GeospatialExtents::new(cx, self.y_min, self.x_max, self.y_max, g),
        ]
    }

    /// Split along y into `[bottom, top]`.
    pub fn split_y(&self) -> [GeospatialExtents; 2] {
        let (_, cy) = self.center();
        let g = self.is_geographic;
        [
            GeospatialExtents::new(self.x_min, self.y_min, self.x_max, cy, g),
            GeospatialExtents::new(self.x_min, cy, self.x_max, self.y_max, g),
        ]
    }
}

impl Default for GeospatialExtents {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Display for GeospatialExtents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}] - [{}, {}]",
            self.x_min, self.y_min, self.x_max, self.y_max
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> GeospatialExtents {
        GeospatialExtents::new(x0, y0, x1, y1, false)
    }

    #[test]
    fn test_empty_is_invalid() {
        assert!(!GeospatialExtents::empty().valid());
        assert!(GeospatialExtents::default().x_min > GeospatialExtents::default().x_max);
    }

    #[test]
    fn test_width_height_radius() {
        let e = square(0.0, 0.0, 30.0, 40.0);
        assert_eq!(e.width(), 30.0);
        assert_eq!(e.height(), 40.0);
        assert!((e.radius() - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_disjoint_do_not_intersect() {
        let a = square(0.0, 0.0, 10.0, 10.0);
        let b = square(20.0, 20.0, 30.0, 30.0);
        assert!(!a.intersects(&b, 0.0));
        assert!(!a.intersection(&b, 0.0).valid());
    }

    #[test]
    fn test_touching_edges_intersect() {
        let a = square(0.0, 0.0, 10.0, 10.0);
        let b = square(10.0, 0.0, 20.0, 10.0);
        assert!(a.intersects(&b, 0.0));
        let i = a.intersection(&b, 0.0);
        assert_eq!(i.width(), 0.0);
    }

    #[test]
    fn test_dateline_offset() {
        let tile = GeospatialExtents::new(-180.0, -10.0, -170.0, 10.0, true);
        let source = GeospatialExtents::new(175.0, -5.0, 185.0, 5.0, true);

        assert!(!tile.intersects(&source, 0.0));
        assert!(tile.intersects(&source, -360.0));
        assert!(tile.intersects_wrapped(&source));

        let i = tile.intersection(&source, -360.0);
        assert_eq!(i.x_min, -180.0);
        assert_eq!(i.x_max, -175.0);
    }

    #[test]
    fn test_projected_extents_do_not_wrap() {
        let tile = square(-180.0, -10.0, -170.0, 10.0);
        let source = square(175.0, -5.0, 185.0, 5.0);
        assert_eq!(tile.wraparound_offsets(&source), &[0.0]);
        assert!(!tile.intersects_wrapped(&source));
    }

    #[test]
    fn test_union_with_empty_is_identity() {
        let a = square(1.0, 2.0, 3.0, 4.0);
        assert_eq!(GeospatialExtents::empty().union(&a), a);
        assert_eq!(a.union(&GeospatialExtents::empty()), a);
    }

    #[test]
    fn test_quadrants_union_reproduces_parent() {
        let parent = square(0.0, 0.0, 100.0, 100.0);
        let quadrants = parent.split_quadrants();

        let union = quadrants
            .iter()
            .fold(GeospatialExtents::empty(), |acc, q| acc.union(q));
        assert_eq!(union.x_min, 0.0);
        assert_eq!(union.y_min, 0.0);
        assert_eq!(union.x_max, 100.0);
        assert_eq!(union.y_max, 100.0);

        // Shared midpoint
        assert_eq!(quadrants[0].x_max, quadrants[1].x_min);
        assert_eq!(quadrants[0].y_max, quadrants[2].y_min);
        assert_eq!(quadrants[3].x_min, 50.0);
        assert_eq!(quadrants[3].y_min, 50.0);
    }

    #[test]
    fn test_split_x_and_y() {
        let parent = square(0.0, 0.0, 100.0, 50.0);
        let [left, right] = parent.split_x();
        assert_eq!(left.x_max, 50.0);
        assert_eq!(right.x_min, 50.0);
        assert_eq!(left.height(), 50.0);

        let [bottom, top] = parent.split_y();
        assert_eq!(bottom.y_max, 25.0);
        assert_eq!(top.y_min, 25.0);
        assert_eq!(top.width(), 100.0);
    }

    #[test]
    fn test_aspect_ratio() {
        assert_eq!(square(0.0, 0.0, 10.0, 20.0).aspect_ratio(), 2.0);
        assert_eq!(square(0.0, 0.0, 0.0, 20.0).aspect_ratio(), 1.0);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn extents_strategy() -> impl Strategy<Value = GeospatialExtents> {
            (
                -1000.0..1000.0_f64,
                -1000.0..1000.0_f64,
                0.0..500.0_f64,
                0.0..500.0_f64,
            )
                .prop_map(|(x, y, w, h)| GeospatialExtents::new(x, y, x + w, y + h, false))
        }

        proptest! {
            #[test]
            fn test_intersects_is_symmetric(a in extents_strategy(), b in extents_strategy()) {
                prop_assert_eq!(a.intersects(&b, 0.0), b.intersects(&a, 0.0));
            }

            #[test]
            fn test_intersection_is_contained_in_both(
                a in extents_strategy(),
                b in extents_strategy()
            ) {
                let i = a.intersection(&b, 0.0);
                if a.intersects(&b, 0.0) {
                    prop_assert!(a.contains(&i), "{} not in {}", i, a);
                    prop_assert!(b.contains(&i), "{} not in {}", i, b);
                } else {
                    prop_assert!(!i.valid());
                }
            }

            #[test]
            fn test_quadrant_union_roundtrip(e in extents_strategy()) {
                let union = e
                    .split_quadrants()
                    .iter()
                    .fold(GeospatialExtents::empty(), |acc, q| acc.union(q));
                prop_assert_eq!(union, e);
            }
        }
    }
}
