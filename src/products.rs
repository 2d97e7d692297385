//! Derived 2-D products and their shared record type.
//!
//! Instead of a hierarchy of product classes there is a single record,
//! [`PolarProduct`], carrying the data matrix, the scan-wide metadata, and a
//! [`ProductKind`] tag with the product-specific fields. Matching on the tag is
//! exhaustive, so downstream consumers cannot silently ignore a new product
//! type.

use crate::{
    cartesian::{polar_to_cart, InterpOrder},
    error::{AnalysisError, Result},
    sweep::resample_rays,
    volume::VolumeInfo,
};
use chrono::NaiveDateTime;
use metfor::{Km, Meters, Quantity};
use ndarray::Array2;

/// What a product is, plus its type-specific metadata.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ProductKind {
    /// A single sweep at its antenna elevation.
    Ppi {
        /// Antenna elevation angle in degrees.
        elevation: f64,
        /// Position of the sweep in the scan order.
        tilt: usize,
    },
    /// A constant-altitude cut through the volume.
    Cappi {
        /// Target altitude above the radar.
        height: Meters,
        /// Range where near-field pseudo filling ended.
        start_range: Km,
        /// Range where beam blending ended.
        stop_range: Km,
    },
    /// Column maximum over a height interval.
    Cmax {
        /// Bottom of the reduced height interval.
        bottom: Km,
        /// Top of the reduced height interval.
        top: Km,
    },
    /// Vertically integrated liquid over a height interval.
    Vil {
        /// Bottom of the integrated height interval.
        bottom: Km,
        /// Top of the integrated height interval.
        top: Km,
    },
}

/// A derived polar product: rays-by-bins data plus metadata.
#[derive(Clone, Debug)]
pub struct PolarProduct {
    data: Array2<f64>,
    info: VolumeInfo,
    kind: ProductKind,
}

impl PolarProduct {
    pub(crate) fn new(data: Array2<f64>, info: VolumeInfo, kind: ProductKind) -> Self {
        PolarProduct { data, info, kind }
    }

    /// The product data, rays by bins, NaN for no-data.
    #[inline]
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Consume the product, keeping only the data matrix.
    #[inline]
    pub fn into_data(self) -> Array2<f64> {
        self.data
    }

    /// Scan-wide metadata of the source volume.
    #[inline]
    pub fn info(&self) -> &VolumeInfo {
        &self.info
    }

    /// The product tag and its type-specific fields.
    #[inline]
    pub fn kind(&self) -> ProductKind {
        self.kind
    }

    /// Number of azimuth rays.
    #[inline]
    pub fn num_rays(&self) -> usize {
        self.data.nrows()
    }

    /// Number of range bins.
    #[inline]
    pub fn num_bins(&self) -> usize {
        self.data.ncols()
    }

    /// Acquisition time of the source scan.
    #[inline]
    pub fn valid_time(&self) -> NaiveDateTime {
        self.info.valid_time()
    }

    /// The acquisition time rendered with a strftime-style format string.
    pub fn format_date(&self, format: &str) -> String {
        self.info.valid_time().format(format).to_string()
    }

    /// Resample the azimuth axis onto `rays` evenly spaced samples, same
    /// semantics as [`PolarSweep::resample`](crate::PolarSweep::resample).
    pub fn resample(&self, rays: usize) -> Array2<f64> {
        resample_rays(&self.data, rays)
    }

    /// Map this product onto a square cartesian grid of side `dim`, spanning
    /// the scan range in km on both axes.
    ///
    /// The grid side must be even and the angular and range steps of the source
    /// scan must be usable, otherwise the grid is refused.
    pub fn to_cart(&self, dim: usize, order: InterpOrder) -> Result<Array2<f64>> {
        if dim == 0 || dim % 2 != 0 {
            return Err(AnalysisError::InvalidGrid("dimension must be even"));
        }

        let angle_step = self.info.angle_step();
        let range_step = self.info.range_step().unpack();
        if !(angle_step > 0.0) || !(range_step > 0.0) {
            return Err(AnalysisError::InvalidGrid(
                "angle and range steps must be positive",
            ));
        }

        let scan_range = self.num_bins() as f64 * range_step;
        let diff = 2.0 * scan_range / dim as f64;
        let coords: Vec<f64> = (0..dim).map(|i| -scan_range + i as f64 * diff).collect();

        Ok(polar_to_cart(
            &self.data,
            angle_step,
            range_step,
            &coords,
            &coords,
            order,
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_data::constant_volume;
    use crate::volume::VolumeSource;

    #[test]
    fn format_date_renders_the_scan_time() {
        let volume = constant_volume(&[0.5, 1.5, 3.0], 30.0);
        let ppi = volume.ppi(0).unwrap();

        assert_eq!(ppi.format_date("%Y-%m-%d %H:%M"), "2023-06-01 10:15");
        assert_eq!(
            ppi.valid_time(),
            NaiveDateTime::parse_from_str("10:15:00 2023-06-01", crate::scan::SCAN_TIME_FORMAT)
                .unwrap()
        );
    }

    #[test]
    fn resample_round_trips_at_the_native_ray_count() {
        let volume = constant_volume(&[0.5, 1.5, 3.0], 30.0);
        let ppi = volume.ppi(0).unwrap();

        let resampled = ppi.resample(ppi.num_rays());
        assert_eq!(&resampled, ppi.data());
    }

    #[test]
    fn to_cart_refuses_odd_grids() {
        let volume = constant_volume(&[0.5, 1.5, 3.0], 30.0);
        let ppi = volume.ppi(0).unwrap();

        assert_eq!(
            ppi.to_cart(501, InterpOrder::Nearest).err().unwrap(),
            AnalysisError::InvalidGrid("dimension must be even")
        );
    }

    #[test]
    fn to_cart_produces_a_square_grid() {
        let volume = constant_volume(&[0.5, 1.5, 3.0], 30.0);
        let ppi = volume.ppi(0).unwrap();

        let cart = ppi.to_cart(100, InterpOrder::Nearest).unwrap();
        assert_eq!(cart.dim(), (100, 100));

        // The grid corner lies beyond the coverage circle.
        assert!(cart[[0, 0]].is_nan());
        // Near the centre the constant field comes through.
        assert_eq!(cart[[50, 50]], 30.0);
    }
}
