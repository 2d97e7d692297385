//! One elevation's worth of radar data and its canonicalization steps.

use crate::{
    error::{AnalysisError, Result},
    scan::{RawScan, RawSlice},
};
use metfor::Km;
use ndarray::Array2;

/// A single elevation sweep: a rays-by-bins measurement matrix plus the
/// metadata needed to interpret it geometrically.
///
/// Values are measurement units (e.g. dBZ) with NaN marking no-data. Ray index
/// 0 points at azimuth 0 degrees and bin range grows with bin index.
#[derive(Clone, Debug)]
pub struct PolarSweep {
    data: Array2<f64>,
    elevation: f64,
    angle_step: f64,
    range_step: Km,
    tilt: usize,
}

impl PolarSweep {
    /// Build a sweep directly from decoded measurement values.
    pub fn new(
        data: Array2<f64>,
        elevation: f64,
        angle_step: f64,
        range_step: Km,
        tilt: usize,
    ) -> Self {
        PolarSweep {
            data,
            elevation,
            angle_step,
            range_step,
            tilt,
        }
    }

    /// Decode one raw slice of a scan into measurement values.
    ///
    /// Three steps, in the order the reader contract prescribes:
    ///
    /// 1. Azimuth alignment: the decoded index of the first recorded ray
    ///    determines how far the ray axis must be rotated so ray 0 lines up
    ///    with azimuth 0; the rotation amount is that index plus one position.
    /// 2. Bit-depth scaling: `value = min + raw * (max - min) / 2^depth`.
    /// 3. No-data masking: scaled values equal to `min` become NaN.
    pub fn decode(slice: &RawSlice, scan: &RawScan, tilt: usize) -> Result<PolarSweep> {
        let (nrays, nbins) = slice.samples.dim();
        if nrays == 0 || nbins == 0 {
            return Err(AnalysisError::ShapeMismatch("slice has no samples"));
        }
        if slice.rays.indices.len() != nrays {
            return Err(AnalysisError::ShapeMismatch(
                "ray index array does not match the sample rows",
            ));
        }

        let angle_step = scan.effective_angle_step(slice);
        let range_step = scan.effective_range_step(slice);

        let index_scale = slice.rays.count / 2f64.powi(slice.rays.depth as i32);
        let first_azimuth = (slice.rays.indices[0] * index_scale * angle_step).round() as i64;
        let roll = (first_azimuth + 1).rem_euclid(nrays as i64) as usize;

        let mut data = Array2::zeros((nrays, nbins));
        for ray in 0..nrays {
            data.row_mut((ray + roll) % nrays)
                .assign(&slice.samples.row(ray));
        }

        let span = (slice.max - slice.min) / 2f64.powi(slice.depth as i32);
        data.mapv_inplace(|raw| {
            let value = slice.min + raw * span;
            if value == slice.min {
                f64::NAN
            } else {
                value
            }
        });

        Ok(PolarSweep::new(
            data,
            slice.elevation,
            angle_step,
            range_step,
            tilt,
        ))
    }

    /// The measurement matrix, rays by bins.
    #[inline]
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Antenna elevation angle in degrees.
    #[inline]
    pub fn elevation(&self) -> f64 {
        self.elevation
    }

    /// Angular step in degrees per ray.
    #[inline]
    pub fn angle_step(&self) -> f64 {
        self.angle_step
    }

    /// Range step in km per bin.
    #[inline]
    pub fn range_step(&self) -> Km {
        self.range_step
    }

    /// Position of this sweep in the scan order.
    #[inline]
    pub fn tilt(&self) -> usize {
        self.tilt
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

    /// Resample the azimuth axis onto `target_rays` evenly spaced samples.
    ///
    /// Each range-bin column is treated as a function sampled at the native ray
    /// indices and linearly interpolated at `i * native / target` for each
    /// output ray i, clamping at the ends. The interpolation does NOT wrap
    /// across the 0/360 degree seam; resampling at the native ray count returns
    /// the data unchanged.
    pub fn resample(&self, target_rays: usize) -> Array2<f64> {
        resample_rays(&self.data, target_rays)
    }

    /// Right-pad the range axis out to `target_bins` with `fill`.
    ///
    /// Columns past the native bin count take the fill value; sweeps already at
    /// or beyond the target are returned unchanged.
    pub fn pad_range(&self, target_bins: usize, fill: f64) -> Array2<f64> {
        pad_bins(&self.data, target_bins, fill)
    }
}

/// Linear azimuth resampling shared by sweeps and products.
pub(crate) fn resample_rays(data: &Array2<f64>, target_rays: usize) -> Array2<f64> {
    let (native, nbins) = data.dim();
    let mut resampled = Array2::zeros((target_rays, nbins));

    for bin in 0..nbins {
        for out_ray in 0..target_rays {
            let position = out_ray as f64 * native as f64 / target_rays as f64;
            let below = position.floor() as usize;

            resampled[[out_ray, bin]] = if below + 1 >= native {
                data[[native - 1, bin]]
            } else {
                let fraction = position - below as f64;
                data[[below, bin]] * (1.0 - fraction) + data[[below + 1, bin]] * fraction
            };
        }
    }

    resampled
}

/// Right-pad the bin axis of a matrix with a fill value.
pub(crate) fn pad_bins(data: &Array2<f64>, target_bins: usize, fill: f64) -> Array2<f64> {
    let (nrays, nbins) = data.dim();
    if nbins >= target_bins {
        return data.clone();
    }

    let mut padded = Array2::from_elem((nrays, target_bins), fill);
    padded.slice_mut(ndarray::s![.., ..nbins]).assign(data);
    padded
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scan::RayInfo;
    use crate::utility::test_tools::*;
    use optional::none;

    fn test_scan(slices: Vec<RawSlice>) -> RawScan {
        RawScan {
            sensor_id: Some("WMO:00000".to_owned()),
            sensor_name: Some("Test Radar".to_owned()),
            location: Some((46.9, 7.5)),
            altitude: none(),
            moment: "dBZ".to_owned(),
            timestamp: "10:15:00 2023-06-01".to_owned(),
            num_elevations: slices.len(),
            stop_range: Km(4.0),
            range_step: Some(Km(1.0)),
            angle_step: Some(90.0),
            slices,
        }
    }

    fn test_slice() -> RawSlice {
        // 4 rays of 90 degrees each, 3 bins. Raw samples scale as
        // value = -32 + raw * 0.5 with depth 8, so raw 124 decodes to 30 dBZ
        // and raw 0 decodes to the minimum, i.e. no data.
        let samples = ndarray::arr2(&[
            [124.0, 124.0, 0.0],
            [126.0, 126.0, 126.0],
            [128.0, 128.0, 128.0],
            [130.0, 130.0, 130.0],
        ]);

        RawSlice {
            elevation: 0.5,
            samples,
            min: -32.0,
            max: 96.0,
            depth: 8,
            rays: RayInfo {
                // Decoded first azimuth: round(16384 * 4 / 65536 * 90) = 90,
                // so the ray axis rolls by (90 + 1) mod 4 = 3 rows.
                indices: vec![16384.0, 32768.0, 49152.0, 0.0],
                depth: 16,
                count: 4.0,
            },
            angle_step: None,
            range_step: None,
        }
    }

    #[test]
    fn decode_scales_rolls_and_masks() {
        let scan = test_scan(vec![test_slice()]);
        let sweep = PolarSweep::decode(&scan.slices[0], &scan, 0).unwrap();

        assert_eq!(sweep.num_rays(), 4);
        assert_eq!(sweep.num_bins(), 3);
        assert_eq!(sweep.angle_step(), 90.0);
        assert_eq!(sweep.range_step(), Km(1.0));

        // Raw row 0 lands on row 3 after the roll; its raw 0 sample decodes
        // to the minimum and is masked.
        let rolled_row_of_raw_0: usize = 91 % 4;
        assert_eq!(sweep.data()[[rolled_row_of_raw_0, 0]], 30.0);
        assert!(sweep.data()[[rolled_row_of_raw_0, 2]].is_nan());

        let rolled_row_of_raw_2: usize = (2 + 91) % 4;
        assert_eq!(sweep.data()[[rolled_row_of_raw_2, 1]], 32.0);
    }

    #[test]
    fn decode_rejects_mismatched_ray_info() {
        let mut slice = test_slice();
        slice.rays.indices.pop();
        let scan = test_scan(vec![slice]);

        assert_eq!(
            PolarSweep::decode(&scan.slices[0], &scan, 0).err().unwrap(),
            AnalysisError::ShapeMismatch("ray index array does not match the sample rows")
        );
    }

    #[test]
    fn resample_at_native_ray_count_is_the_identity() {
        let data = ndarray::arr2(&[
            [1.0, 2.0, 3.0],
            [4.0, 5.0, 6.0],
            [7.0, 8.0, 9.0],
            [10.0, 11.0, 12.0],
        ]);
        let sweep = PolarSweep::new(data.clone(), 0.5, 90.0, Km(1.0), 0);

        let resampled = sweep.resample(4);
        assert!(arrays_identical(&resampled, &data));
    }

    #[test]
    fn resample_doubles_by_linear_interpolation() {
        let data = ndarray::arr2(&[[0.0], [2.0], [4.0], [6.0]]);
        let sweep = PolarSweep::new(data, 0.5, 90.0, Km(1.0), 0);

        let resampled = sweep.resample(8);
        let expected = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 6.0];

        assert_eq!(resampled.dim(), (8, 1));
        for (ray, want) in expected.iter().enumerate() {
            assert!(approx_equal(resampled[[ray, 0]], *want, 1.0e-12));
        }
    }

    #[test]
    fn pad_range_fills_new_bins_only() {
        let data = ndarray::arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let sweep = PolarSweep::new(data.clone(), 0.5, 180.0, Km(1.0), 0);

        let padded = sweep.pad_range(4, f64::NAN);
        assert_eq!(padded.dim(), (2, 4));
        assert_eq!(padded[[0, 0]], 1.0);
        assert_eq!(padded[[1, 1]], 4.0);
        assert!(padded[[0, 2]].is_nan());
        assert!(padded[[1, 3]].is_nan());

        // Already wide enough: unchanged.
        assert!(arrays_identical(&sweep.pad_range(2, f64::NAN), &data));
    }
}
