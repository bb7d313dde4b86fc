//! Common swath and grid fixtures for resampling tests.

/// Swath layouts.
pub mod swath {
    /// Dimensions of a synthetic swath.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct SwathSpec {
        pub lines: usize,
        pub samples: usize,
        pub scan_height: usize,
        /// Latitude of the first row.
        pub north: f64,
        /// Longitude of the first column.
        pub west: f64,
        /// Degrees between adjacent pixel centres.
        pub step: f64,
    }

    impl SwathSpec {
        pub fn size(&self) -> usize {
            self.lines * self.samples
        }

        pub fn scan_count(&self) -> usize {
            self.lines.div_ceil(self.scan_height)
        }
    }

    /// Two scans of 2×3, for hand-checkable runs.
    pub const TINY: SwathSpec = SwathSpec {
        lines: 4,
        samples: 3,
        scan_height: 2,
        north: 1.0,
        west: 0.0,
        step: 1.0,
    };

    /// Ten-line scans, 1 km-like spacing over the central US.
    pub const MODIS_LIKE: SwathSpec = SwathSpec {
        lines: 40,
        samples: 64,
        scan_height: 10,
        north: 40.0,
        west: -100.0,
        step: 0.01,
    };

    /// Scan height that does not divide the line count.
    pub const RAGGED: SwathSpec = SwathSpec {
        lines: 7,
        samples: 5,
        scan_height: 3,
        north: 10.0,
        west: 10.0,
        step: 0.5,
    };
}

#[cfg(test)]
mod tests {
    use super::swath::*;

    #[test]
    fn test_swath_specs() {
        assert_eq!(TINY.size(), 12);
        assert_eq!(TINY.scan_count(), 2);
        assert_eq!(MODIS_LIKE.scan_count(), 4);
        assert_eq!(RAGGED.scan_count(), 3);
    }
}
