//! Utility functions and types shared across the crate.

/// Normalize an angle in degrees to the half-open interval `[0, 360)`.
#[inline]
pub(crate) fn normalize_azimuth(mut degrees: f64) -> f64 {
    if degrees < 0.0 {
        degrees += 360.0;
    }
    degrees
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_normalize_azimuth() {
        assert_eq!(normalize_azimuth(-90.0), 270.0);
        assert_eq!(normalize_azimuth(0.0), 0.0);
        assert_eq!(normalize_azimuth(359.5), 359.5);
    }
}
