//! A stack of CAPPI levels and the volume products derived from it.
//!
//! [`InterpolatedVolume`] re-grids a polar volume onto constant-altitude
//! surfaces at a fixed vertical resolution. The stack stores a finite sentinel,
//! [`InterpolatedVolume::NO_DATA`], instead of NaN, because the VIL power-law
//! arithmetic cannot be allowed to propagate NaN through the column sums. The
//! sentinel is resolved back to no-data at the end of every derivation.

use crate::{
    error::{AnalysisError, Result},
    products::{PolarProduct, ProductKind},
    volume::{PolarVolume, VolumeInfo, VolumeSource},
};
use metfor::{Km, Meters, Quantity};
use ndarray::{Array2, Array3};

/// Convert reflectivity in dBZ to liquid water content via the standard
/// Z-LWC power law.
#[inline]
fn liquid_water_content(dbz: f64) -> f64 {
    (10f64.powf(dbz / 10.0) / 24000.0).powf(1.0 / 1.82)
}

/// A polar volume re-gridded onto constant-altitude levels.
#[derive(Clone, Debug)]
pub struct InterpolatedVolume {
    /// Shape (levels, rays, bins), no-data cells hold [`InterpolatedVolume::NO_DATA`].
    data: Array3<f64>,
    /// Level altitudes above the radar in metres, lowest first.
    levels: Vec<f64>,
    hmin: Km,
    hmax: Km,
    info: VolumeInfo,
}

impl InterpolatedVolume {
    /// The finite sentinel standing in for NaN inside the stack.
    pub const NO_DATA: f64 = -999.0;

    /// Build the height stack from `hmin` up to `hmax` in `vres` steps, all
    /// in km above the radar.
    ///
    /// Each level is a non-pseudo CAPPI, so cells outside the beam coverage at
    /// that altitude are genuinely no-data rather than copied from the nearest
    /// sweep. The level count is `floor((hmax - hmin) / vres)`; the bounds must
    /// leave room for at least one level.
    pub fn new(volume: &PolarVolume, hmin: Km, hmax: Km, vres: Km) -> Result<Self> {
        if !(vres.unpack() > 0.0) || hmax <= hmin {
            return Err(AnalysisError::InvalidBounds);
        }

        let num_levels = ((hmax.unpack() - hmin.unpack()) / vres.unpack()) as usize;
        if num_levels == 0 {
            return Err(AnalysisError::InvalidBounds);
        }

        let (num_rays, num_bins) = volume.dimensions();
        let mut data = Array3::zeros((num_levels, num_rays, num_bins));
        let mut levels = Vec::with_capacity(num_levels);

        for level in 0..num_levels {
            let height = (hmin.unpack() + level as f64 * vres.unpack()) * 1000.0;
            let slab = volume.cappi_raw(Meters(height), false);
            data.slice_mut(ndarray::s![level, .., ..]).assign(&slab);
            levels.push(height);
        }

        data.mapv_inplace(|v| if v.is_nan() { Self::NO_DATA } else { v });

        log::debug!(
            "interpolated volume: {} levels from {} m to {} m",
            num_levels,
            levels.first().unwrap(),
            levels.last().unwrap()
        );

        Ok(InterpolatedVolume {
            data,
            levels,
            hmin,
            hmax,
            info: volume.volume_info().clone(),
        })
    }

    /// The (levels, rays, bins) stack with the no-data sentinel in place.
    #[inline]
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// Level altitudes above the radar in metres, lowest first.
    #[inline]
    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    /// Bottom of the stack in km.
    #[inline]
    pub fn hmin(&self) -> Km {
        self.hmin
    }

    /// Top of the stack in km.
    #[inline]
    pub fn hmax(&self) -> Km {
        self.hmax
    }

    /// Resolve requested bounds (km) to a half-open level index window.
    ///
    /// `None` means the full stack. Explicit bounds must be increasing and
    /// inside `[hmin, hmax]`; the window runs from the first level at or above
    /// the lower bound through the last level at or below the upper bound.
    fn level_window(&self, bounds: Option<(Km, Km)>) -> Result<(usize, usize, Km, Km)> {
        let (low, high) = match bounds {
            None => (self.hmin, self.hmax),
            Some((low, high)) => {
                if low >= high || low < self.hmin || high > self.hmax {
                    return Err(AnalysisError::InvalidBounds);
                }
                (low, high)
            }
        };

        let low_m = low.unpack() * 1000.0;
        let high_m = high.unpack() * 1000.0;

        let start = self
            .levels
            .iter()
            .position(|&level| level >= low_m)
            .ok_or(AnalysisError::InvalidBounds)?;
        let stop = self.levels.len()
            - self
                .levels
                .iter()
                .rev()
                .position(|&level| level <= high_m)
                .ok_or(AnalysisError::InvalidBounds)?;

        if start >= stop {
            return Err(AnalysisError::InvalidBounds);
        }

        Ok((start, stop, low, high))
    }

    /// Column maximum over the selected height interval.
    ///
    /// With `absolute_max` the cell keeps whichever of the column maximum and
    /// minimum has the greater magnitude, preserving the sign of the strongest
    /// echo; this matters for signed moments such as radial velocity. Cells
    /// reducing to exactly 0.0 become NaN, the same zero-fill caveat as the
    /// CAPPI itself.
    pub fn cmax(&self, bounds: Option<(Km, Km)>, absolute_max: bool) -> Result<PolarProduct> {
        let (start, stop, low, high) = self.level_window(bounds)?;
        log::debug!("cmax level window [{}, {})", start, stop);

        let stack = self.data.slice(ndarray::s![start..stop, .., ..]);
        let (_, num_rays, num_bins) = stack.dim();

        let mut cmax = Array2::zeros((num_rays, num_bins));
        for ray in 0..num_rays {
            for bin in 0..num_bins {
                let mut maximum = f64::NEG_INFINITY;
                let mut minimum = f64::INFINITY;
                for level in stack.slice(ndarray::s![.., ray, bin]).iter() {
                    // The sentinel enters the reduction as zero, to be
                    // collapsed back to no-data afterwards.
                    let value = if *level == Self::NO_DATA { 0.0 } else { *level };
                    maximum = maximum.max(value);
                    minimum = minimum.min(value);
                }

                cmax[[ray, bin]] = if absolute_max && maximum < minimum.abs() {
                    minimum
                } else {
                    maximum
                };
            }
        }

        cmax.mapv_inplace(|v| if v == 0.0 { f64::NAN } else { v });

        Ok(PolarProduct::new(
            cmax,
            self.info.clone(),
            ProductKind::Cmax {
                bottom: low,
                top: high,
            },
        ))
    }

    /// Vertically integrated liquid over the selected height interval.
    ///
    /// Each level's reflectivity is converted to liquid water content with the
    /// standard power law and the column is summed. Levels holding the no-data
    /// sentinel map to one fixed constant under that conversion and are reset
    /// to zero before the sum, so missing levels do not bias the integral.
    /// Columns summing to exactly 0.0 become NaN.
    pub fn vil(&self, bounds: Option<(Km, Km)>) -> Result<PolarProduct> {
        let (start, stop, low, high) = self.level_window(bounds)?;
        log::debug!("vil level window [{}, {})", start, stop);

        let stack = self.data.slice(ndarray::s![start..stop, .., ..]);
        let (_, num_rays, num_bins) = stack.dim();

        let no_data_lwc = liquid_water_content(Self::NO_DATA);

        let mut vil = Array2::zeros((num_rays, num_bins));
        for ray in 0..num_rays {
            for bin in 0..num_bins {
                let mut sum = 0.0;
                for level in stack.slice(ndarray::s![.., ray, bin]).iter() {
                    let lwc = liquid_water_content(*level);
                    if lwc != no_data_lwc {
                        sum += lwc;
                    }
                }
                vil[[ray, bin]] = sum;
            }
        }

        vil.mapv_inplace(|v| if v == 0.0 { f64::NAN } else { v });

        Ok(PolarProduct::new(
            vil,
            self.info.clone(),
            ProductKind::Vil {
                bottom: low,
                top: high,
            },
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_data::{constant_volume, test_volume_info};
    use crate::utility::test_tools::*;

    fn stack_from_levels(levels: Vec<(f64, f64)>) -> InterpolatedVolume {
        // Build a stack directly: each entry is (altitude m, cell value).
        let num_levels = levels.len();
        let mut data = Array3::zeros((num_levels, 2, 2));
        let mut altitudes = Vec::new();
        for (i, (altitude, value)) in levels.into_iter().enumerate() {
            data.slice_mut(ndarray::s![i, .., ..]).fill(value);
            altitudes.push(altitude);
        }

        InterpolatedVolume {
            data,
            levels: altitudes,
            hmin: Km(0.0),
            hmax: Km(num_levels as f64),
            info: test_volume_info(Km(1.0), Km(2.0)),
        }
    }

    #[test]
    fn stack_construction_levels_and_sentinel() {
        let volume = constant_volume(&[0.5, 1.5, 3.0], 30.0);
        let stack = InterpolatedVolume::new(&volume, Km(0.0), Km(10.0), Km(1.0)).unwrap();

        assert_eq!(stack.levels().len(), 10);
        assert_eq!(stack.levels()[0], 0.0);
        assert_eq!(stack.levels()[9], 9000.0);

        // Level 0 sits below every beam at near range: non-pseudo CAPPI no-data,
        // stored as the sentinel.
        assert_eq!(stack.data()[[0, 0, 0]], InterpolatedVolume::NO_DATA);
    }

    #[test]
    fn stack_levels_start_at_the_lower_bound() {
        let volume = constant_volume(&[0.5, 1.5, 3.0], 30.0);
        let stack = InterpolatedVolume::new(&volume, Km(2.0), Km(6.0), Km(2.0)).unwrap();

        assert_eq!(stack.levels(), &[2000.0, 4000.0]);
    }

    #[test]
    fn degenerate_stacks_are_rejected() {
        let volume = constant_volume(&[0.5, 1.5, 3.0], 30.0);

        assert!(InterpolatedVolume::new(&volume, Km(5.0), Km(5.0), Km(1.0)).is_err());
        assert!(InterpolatedVolume::new(&volume, Km(5.0), Km(1.0), Km(1.0)).is_err());
        assert!(InterpolatedVolume::new(&volume, Km(0.0), Km(10.0), Km(0.0)).is_err());
        assert!(InterpolatedVolume::new(&volume, Km(0.0), Km(10.0), Km(11.0)).is_err());
    }

    #[test]
    fn cmax_rejects_malformed_bounds() {
        let volume = constant_volume(&[0.5, 1.5, 3.0], 30.0);
        let stack = InterpolatedVolume::new(&volume, Km(0.0), Km(10.0), Km(1.0)).unwrap();

        for bounds in [
            (Km(5.0), Km(5.0)),   // not increasing
            (Km(7.0), Km(3.0)),   // reversed
            (Km(-1.0), Km(5.0)),  // below the stack
            (Km(0.0), Km(11.0)),  // above the stack
        ]
        .iter()
        {
            assert_eq!(
                stack.cmax(Some(*bounds), true).err().unwrap(),
                AnalysisError::InvalidBounds
            );
        }
    }

    #[test]
    fn cmax_default_bounds_equal_the_full_window() {
        let volume = constant_volume(&[0.5, 1.5, 3.0], 30.0);
        let stack = InterpolatedVolume::new(&volume, Km(0.0), Km(10.0), Km(1.0)).unwrap();

        let full = stack.cmax(None, true).unwrap();
        let explicit = stack.cmax(Some((Km(0.0), Km(10.0))), true).unwrap();

        assert!(arrays_identical(full.data(), explicit.data()));
    }

    #[test]
    fn cmax_keeps_the_sign_of_the_strongest_echo() {
        let stack = stack_from_levels(vec![(0.0, 5.0), (1000.0, -8.0)]);

        let plain = stack.cmax(None, false).unwrap();
        assert_eq!(plain.data()[[0, 0]], 5.0);

        let absolute = stack.cmax(None, true).unwrap();
        assert_eq!(absolute.data()[[0, 0]], -8.0);
    }

    #[test]
    fn cmax_treats_sentinel_levels_as_absent() {
        let stack = stack_from_levels(vec![
            (0.0, InterpolatedVolume::NO_DATA),
            (1000.0, 12.5),
            (2000.0, InterpolatedVolume::NO_DATA),
        ]);

        let cmax = stack.cmax(None, true).unwrap();
        assert_eq!(cmax.data()[[1, 1]], 12.5);

        // All-sentinel columns reduce to zero, which is no-data.
        let empty = stack_from_levels(vec![
            (0.0, InterpolatedVolume::NO_DATA),
            (1000.0, InterpolatedVolume::NO_DATA),
        ]);
        let cmax = empty.cmax(None, true).unwrap();
        assert!(cmax.data()[[0, 0]].is_nan());
    }

    #[test]
    fn vil_sums_the_power_law_conversion() {
        let stack = stack_from_levels(vec![(0.0, 30.0), (1000.0, 30.0)]);

        let vil = stack.vil(None).unwrap();
        let expected = 2.0 * (10f64.powf(3.0) / 24000.0).powf(1.0 / 1.82);
        assert!(approx_equal(vil.data()[[0, 0]], expected, 1.0e-12));
    }

    #[test]
    fn vil_excludes_sentinel_levels_from_the_integral() {
        let with_gap = stack_from_levels(vec![
            (0.0, 30.0),
            (1000.0, InterpolatedVolume::NO_DATA),
            (2000.0, 30.0),
        ]);
        let without_gap = stack_from_levels(vec![(0.0, 30.0), (1000.0, 30.0)]);

        let gap_vil = with_gap.vil(None).unwrap();
        let solid_vil = without_gap.vil(None).unwrap();

        assert!(approx_equal(
            gap_vil.data()[[0, 0]],
            solid_vil.data()[[0, 0]],
            1.0e-12
        ));
    }

    #[test]
    fn vil_of_nothing_is_no_data() {
        let stack = stack_from_levels(vec![
            (0.0, InterpolatedVolume::NO_DATA),
            (1000.0, InterpolatedVolume::NO_DATA),
        ]);

        let vil = stack.vil(None).unwrap();
        assert!(vil.data()[[0, 0]].is_nan());
    }

    #[test]
    fn vil_is_non_negative_where_defined() {
        let volume = constant_volume(&[0.5, 1.5, 3.0], 30.0);
        let stack = InterpolatedVolume::new(&volume, Km(0.0), Km(10.0), Km(1.0)).unwrap();

        let vil = stack.vil(None).unwrap();
        for value in vil.data().iter() {
            assert!(value.is_nan() || *value >= 0.0);
        }
    }

    #[test]
    fn product_kinds_carry_the_effective_bounds() {
        let volume = constant_volume(&[0.5, 1.5, 3.0], 30.0);
        let stack = InterpolatedVolume::new(&volume, Km(0.0), Km(10.0), Km(1.0)).unwrap();

        match stack.cmax(Some((Km(1.0), Km(5.0))), true).unwrap().kind() {
            ProductKind::Cmax { bottom, top } => {
                assert_eq!(bottom, Km(1.0));
                assert_eq!(top, Km(5.0));
            }
            _ => panic!("expected a CMAX product"),
        }

        match stack.vil(None).unwrap().kind() {
            ProductKind::Vil { bottom, top } => {
                assert_eq!(bottom, Km(0.0));
                assert_eq!(top, Km(10.0));
            }
            _ => panic!("expected a VIL product"),
        }
    }
}
