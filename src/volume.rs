//! The canonical polar volume and the CAPPI extraction at its heart.
//!
//! A scan delivers one sweep per elevation, each with its own ray count and
//! range extent. [`PolarVolume`] canonicalizes them onto a common ray count and
//! bin count and stacks the result into a dense elevation-by-ray-by-bin cube,
//! which is immutable from then on: every product is a read-only derivation.
//!
//! The interesting derivation is the CAPPI. A constant-altitude surface cuts
//! through the fan of elevation beams, so the sweep pair that brackets the
//! target altitude changes as the scan moves outward in range: close to the
//! radar the surface sits above every beam, far out it sits below every beam,
//! and in between it is crossed by successively lower beam pairs. The walk
//! behind [`VolumeSource::cappi`] tracks exactly that progression bin column by
//! bin column and blends the bracketing sweeps by inverse distance to the
//! target altitude.

use crate::{
    beam::BeamGeometry,
    error::{AnalysisError, Result},
    products::{PolarProduct, ProductKind},
    scan::{MomentKind, RawScan, SCAN_TIME_FORMAT},
    sweep::{pad_bins, PolarSweep},
};
use chrono::NaiveDateTime;
use itertools::izip;
use metfor::{Km, Meters, Quantity};
use ndarray::{Array2, Array3, ArrayView2, Axis};
use optional::Optioned;
use std::str::FromStr;

/// The canonical ray count volumes are resampled to unless told otherwise.
pub const DEFAULT_RAY_COUNT: usize = 360;

/// Radar site information: identification and geographic position.
#[derive(Clone, Debug, Default)]
pub struct SensorInfo {
    id: Option<String>,
    name: Option<String>,
    /// Latitude and longitude.
    location: Option<(f64, f64)>,
    altitude: Optioned<Meters>,
}

impl SensorInfo {
    /// Create a new object with default values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to add a sensor identifier.
    #[inline]
    pub fn with_id<T>(mut self, id: T) -> Self
    where
        Option<String>: From<T>,
    {
        self.id = Option::from(id);
        self
    }

    /// Builder method to add a sensor name.
    #[inline]
    pub fn with_name<T>(mut self, name: T) -> Self
    where
        Option<String>: From<T>,
    {
        self.name = Option::from(name);
        self
    }

    /// Builder method to add a location as a (latitude, longitude) pair.
    #[inline]
    pub fn with_location<T>(mut self, coords: T) -> Self
    where
        Option<(f64, f64)>: From<T>,
    {
        self.location = Option::from(coords);
        self
    }

    /// Builder method to add the site altitude.
    #[inline]
    pub fn with_altitude<T, U>(mut self, altitude: T) -> Self
    where
        Optioned<U>: From<T>,
        U: optional::Noned + metfor::Length,
        Meters: From<U>,
    {
        let altitude: Optioned<U> = Optioned::from(altitude);
        let altitude: Optioned<Meters> = altitude.map_t(Meters::from);

        self.altitude = altitude;
        self
    }

    /// Sensor identifier, e.g. a WMO or vendor id.
    #[inline]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Human-readable sensor name.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Latitude and longitude in degrees.
    #[inline]
    pub fn location(&self) -> Option<(f64, f64)> {
        self.location
    }

    /// Site altitude in meters.
    #[inline]
    pub fn altitude(&self) -> Optioned<Meters> {
        self.altitude
    }

    /// The proj4 definition of an azimuthal-equidistant projection centred on
    /// the radar site, the natural working CRS for single-site products.
    ///
    /// None when the site location is unknown.
    pub fn aeqd_proj4(&self) -> Option<String> {
        self.location.map(|(lat, lon)| {
            format!(
                "+proj=aeqd +lat_0={} +lon_0={} +x_0=0 +y_0=0 +datum=WGS84 +units=m +no_defs",
                lat, lon
            )
        })
    }
}

/// Scan-wide metadata shared by a volume and every product derived from it.
#[derive(Clone, Debug)]
pub struct VolumeInfo {
    moment: Option<MomentKind>,
    angle_step: f64,
    range_step: Km,
    stop_range: Km,
    sensor: SensorInfo,
    valid_time: NaiveDateTime,
}

impl VolumeInfo {
    /// Assemble volume metadata from its parts.
    pub fn new(
        moment: Option<MomentKind>,
        angle_step: f64,
        range_step: Km,
        stop_range: Km,
        sensor: SensorInfo,
        valid_time: NaiveDateTime,
    ) -> Self {
        VolumeInfo {
            moment,
            angle_step,
            range_step,
            stop_range,
            sensor,
            valid_time,
        }
    }

    /// The measured quantity, when the reader's data-type string was recognized.
    #[inline]
    pub fn moment(&self) -> Option<MomentKind> {
        self.moment
    }

    /// Scan-wide angular step in degrees per ray.
    #[inline]
    pub fn angle_step(&self) -> f64 {
        self.angle_step
    }

    /// Scan-wide range step in km per bin.
    #[inline]
    pub fn range_step(&self) -> Km {
        self.range_step
    }

    /// Maximum range of the scan.
    #[inline]
    pub fn stop_range(&self) -> Km {
        self.stop_range
    }

    /// Radar site information.
    #[inline]
    pub fn sensor(&self) -> &SensorInfo {
        &self.sensor
    }

    /// Acquisition time of the scan.
    #[inline]
    pub fn valid_time(&self) -> NaiveDateTime {
        self.valid_time
    }
}

/// The capability contract of a volume of radar data.
///
/// Implemented once per supported radar-file family; products and the
/// interpolation engine only ever go through this surface, so new formats plug
/// in without touching the core.
pub trait VolumeSource {
    /// Canonical (rays, bins) dimensions of the volume.
    fn dimensions(&self) -> (usize, usize);

    /// The sweep at scan position `tilt` as a PPI product.
    fn ppi(&self, tilt: usize) -> Result<PolarProduct>;

    /// A constant-altitude cut through the volume at `height` above the radar.
    fn cappi(&self, height: Meters, pseudo: bool) -> PolarProduct;

    /// Scan-wide metadata.
    fn volume_info(&self) -> &VolumeInfo;

    /// Acquisition time of the scan.
    fn valid_time(&self) -> NaiveDateTime;
}

/// All sweeps of one scan, canonicalized onto a dense 3-D grid.
#[derive(Clone, Debug)]
pub struct PolarVolume {
    sweeps: Vec<PolarSweep>,
    /// Shape (elevations, rays, bins), lowest elevation first, NaN for no-data.
    data: Array3<f64>,
    num_rays: usize,
    num_bins: usize,
    info: VolumeInfo,
    beam: BeamGeometry,
}

impl PolarVolume {
    /// Decode a raw scan into a volume at the default canonical ray count.
    pub fn from_scan(scan: &RawScan) -> Result<Self> {
        Self::from_scan_with_ray_count(scan, DEFAULT_RAY_COUNT)
    }

    /// Decode a raw scan into a volume with `ray_count` canonical rays.
    pub fn from_scan_with_ray_count(scan: &RawScan, ray_count: usize) -> Result<Self> {
        if scan.slices.len() != scan.num_elevations {
            return Err(AnalysisError::ShapeMismatch(
                "slice count does not match the declared elevation count",
            ));
        }

        let sweeps: Vec<PolarSweep> = scan
            .slices
            .iter()
            .enumerate()
            .map(|(tilt, slice)| PolarSweep::decode(slice, scan, tilt))
            .collect::<Result<_>>()?;

        let moment = MomentKind::from_str(&scan.moment).ok();
        let valid_time = NaiveDateTime::parse_from_str(&scan.timestamp, SCAN_TIME_FORMAT)?;
        let sensor = SensorInfo::new()
            .with_id(scan.sensor_id.clone())
            .with_name(scan.sensor_name.clone())
            .with_location(scan.location)
            .with_altitude(scan.altitude);

        let info = VolumeInfo::new(
            moment,
            scan.angle_step.unwrap_or(1.0),
            scan.range_step.unwrap_or(Km(1.0)),
            scan.stop_range,
            sensor,
            valid_time,
        );

        Self::from_sweeps(sweeps, info, ray_count)
    }

    /// Canonicalize already-decoded sweeps into a volume.
    ///
    /// Every sweep is resampled onto `ray_count` rays and NaN-padded out to the
    /// widest sweep's bin count, then stacked lowest elevation first.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chrono::NaiveDateTime;
    /// use metfor::{Km, Meters};
    /// use ndarray::Array2;
    /// use radar_volume_analysis::{
    ///     MomentKind, PolarSweep, PolarVolume, SensorInfo, VolumeInfo, VolumeSource,
    ///     SCAN_TIME_FORMAT,
    /// };
    ///
    /// let sweeps: Vec<PolarSweep> = [0.5, 1.5, 3.0]
    ///     .iter()
    ///     .enumerate()
    ///     .map(|(tilt, &elevation)| {
    ///         PolarSweep::new(Array2::from_elem((360, 250), 30.0), elevation, 1.0, Km(1.0), tilt)
    ///     })
    ///     .collect();
    ///
    /// let info = VolumeInfo::new(
    ///     Some(MomentKind::Dbz),
    ///     1.0,
    ///     Km(1.0),
    ///     Km(250.0),
    ///     SensorInfo::new().with_name("Test Radar".to_owned()),
    ///     NaiveDateTime::parse_from_str("10:15:00 2023-06-01", SCAN_TIME_FORMAT).unwrap(),
    /// );
    ///
    /// let volume = PolarVolume::from_sweeps(sweeps, info, 360).unwrap();
    /// assert_eq!(volume.dimensions(), (360, 250));
    ///
    /// // Blending two identical sweeps returns their value whatever the weights.
    /// let cappi = volume.cappi(Meters(2000.0), true);
    /// assert_eq!(cappi.data()[[0, 100]], 30.0);
    /// ```
    pub fn from_sweeps(
        sweeps: Vec<PolarSweep>,
        info: VolumeInfo,
        ray_count: usize,
    ) -> Result<Self> {
        if sweeps.is_empty() {
            return Err(AnalysisError::EmptyScan);
        }

        let num_bins = sweeps.iter().map(PolarSweep::num_bins).max().unwrap();
        if ray_count == 0 || num_bins == 0 {
            return Err(AnalysisError::InvalidInput);
        }

        let mut data = Array3::zeros((sweeps.len(), ray_count, num_bins));
        for (elevation, sweep) in sweeps.iter().enumerate() {
            let mut level = sweep.resample(ray_count);
            if level.ncols() < num_bins {
                level = pad_bins(&level, num_bins, f64::NAN);
            }
            data.slice_mut(ndarray::s![elevation, .., ..]).assign(&level);
        }

        log::debug!(
            "canonicalized volume: {} elevations, {} rays, {} bins",
            sweeps.len(),
            ray_count,
            num_bins
        );

        Ok(PolarVolume {
            sweeps,
            data,
            num_rays: ray_count,
            num_bins,
            info,
            beam: BeamGeometry::default(),
        })
    }

    /// Builder method to substitute a different beam propagation model.
    #[inline]
    pub fn with_beam_geometry(mut self, beam: BeamGeometry) -> Self {
        self.beam = beam;
        self
    }

    /// The dense (elevations, rays, bins) cube.
    #[inline]
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// The decoded sweeps in scan order.
    #[inline]
    pub fn sweeps(&self) -> &[PolarSweep] {
        &self.sweeps
    }

    /// Number of elevation sweeps.
    #[inline]
    pub fn num_elevations(&self) -> usize {
        self.sweeps.len()
    }

    /// The beam propagation model used for height lookups.
    #[inline]
    pub fn beam_geometry(&self) -> BeamGeometry {
        self.beam
    }

    /// The canonicalized cube level for one tilt.
    ///
    /// Unlike [`VolumeSource::ppi`], which exposes the sweep at its native ray
    /// count, this is the resampled and padded level that enters the CAPPI
    /// computation.
    pub fn ppi_raw(&self, tilt: usize) -> Result<ArrayView2<f64>> {
        if tilt >= self.sweeps.len() {
            return Err(AnalysisError::InvalidInput);
        }
        Ok(self.data.index_axis(Axis(0), tilt))
    }

    /// A constant-altitude cut through the volume, as a bare matrix.
    ///
    /// See [`VolumeSource::cappi`] for the product-wrapping variant; the
    /// algorithm itself is described in the module docs.
    pub fn cappi_raw(&self, height: Meters, pseudo: bool) -> Array2<f64> {
        self.cappi_walk(height, pseudo).0
    }

    fn cappi_product(&self, height: Meters, pseudo: bool) -> PolarProduct {
        let (cappi, start_bin, stop_bin) = self.cappi_walk(height, pseudo);

        let range_step = self.info.range_step().unpack();
        PolarProduct::new(
            cappi,
            self.info.clone(),
            ProductKind::Cappi {
                height,
                start_range: Km(start_bin as f64 * range_step),
                stop_range: Km(stop_bin as f64 * range_step),
            },
        )
    }

    /// The CAPPI walk.
    ///
    /// Deviations of every beam from the target altitude are tabulated per
    /// elevation and bin, truncated to whole metres. The bin columns are then
    /// visited outward in range in three phases:
    ///
    /// 1. While even the highest beam is below the target, the surface is above
    ///    the whole fan: pseudo-fill from the highest sweep, or leave NaN.
    /// 2. Once the highest beam has crossed the target, successively lower beam
    ///    pairs bracket it. While the lower member of the current pair is below
    ///    the target, blend the pair weighted by the opposite member's absolute
    ///    deviation, so the nearer beam contributes more. NaN cells enter the
    ///    blend as zero.
    /// 3. When the lowest beam has crossed as well, the surface is below the
    ///    whole fan: pseudo-fill from the lowest sweep, or leave NaN. If the
    ///    walk ran out of bins before that happens, the final column is left
    ///    untouched.
    ///
    /// Each phase advances a single shared bin cursor, so every column is
    /// decided exactly once and the whole walk is linear in the bin count.
    /// Afterwards, cells equal to exactly 0.0 become NaN: a zero can only be a
    /// remnant of the zero fill. That rule also discards genuine zero
    /// measurements; a known caveat of the method.
    fn cappi_walk(&self, height: Meters, pseudo: bool) -> (Array2<f64>, usize, usize) {
        let num_elevations = self.sweeps.len();
        let (num_rays, num_bins) = (self.num_rays, self.num_bins);
        let last_bin = num_bins - 1;

        let mut cappi = Array2::from_elem((num_rays, num_bins), f64::NAN);

        let mut deviations = Array2::<i64>::zeros((num_elevations, num_bins));
        for (mut deviation_row, sweep) in izip!(deviations.outer_iter_mut(), &self.sweeps) {
            let profile = self.beam.beam_height_profile(
                sweep.elevation(),
                self.info.stop_range(),
                sweep.range_step(),
            );
            for (deviation, beam_height) in izip!(deviation_row.iter_mut(), profile) {
                *deviation = (Meters::from(beam_height).unpack() - height.unpack()) as i64;
            }
        }

        // Working copy with no-data zero-filled so it can enter the blends.
        let mut volume = self.data.clone();
        volume.mapv_inplace(|v| if v.is_nan() { 0.0 } else { v });

        let top = num_elevations - 1;
        let mut bin = 0;

        // Phase 1: the target is above the whole beam fan.
        while deviations[[top, bin]] < 0 && bin < last_bin {
            if pseudo {
                for ray in 0..num_rays {
                    cappi[[ray, bin]] = volume[[top, ray, bin]];
                }
            }
            bin += 1;
        }
        let start_bin = bin;

        // Phase 2: bracketing pairs, stepping down in elevation as the beams
        // climb past the target with range.
        for lower in (0..num_elevations.saturating_sub(1)).rev() {
            let upper = lower + 1;
            while deviations[[lower, bin]] < 0 && bin < last_bin {
                let weight_on_upper = deviations[[lower, bin]].abs() as f64;
                let weight_on_lower = deviations[[upper, bin]].abs() as f64;
                let total = weight_on_upper + weight_on_lower;

                for ray in 0..num_rays {
                    cappi[[ray, bin]] = (volume[[upper, ray, bin]] * weight_on_upper
                        + volume[[lower, ray, bin]] * weight_on_lower)
                        / total;
                }
                bin += 1;
            }
        }
        let stop_bin = bin;

        // Phase 3: the target is below the whole beam fan.
        if bin < last_bin {
            for bin in bin..num_bins {
                if pseudo {
                    for ray in 0..num_rays {
                        cappi[[ray, bin]] = volume[[0, ray, bin]];
                    }
                }
            }
        }

        log::trace!(
            "cappi at {:?}: pseudo fill ends at bin {}, blending ends at bin {}",
            height,
            start_bin,
            stop_bin
        );

        // Exact zeros are remnants of the zero fill, not measurements.
        cappi.mapv_inplace(|v| if v == 0.0 { f64::NAN } else { v });

        (cappi, start_bin, stop_bin)
    }
}

impl VolumeSource for PolarVolume {
    #[inline]
    fn dimensions(&self) -> (usize, usize) {
        (self.num_rays, self.num_bins)
    }

    fn ppi(&self, tilt: usize) -> Result<PolarProduct> {
        let sweep = self
            .sweeps
            .get(tilt)
            .ok_or(AnalysisError::InvalidInput)?;

        Ok(PolarProduct::new(
            sweep.data().clone(),
            self.info.clone(),
            ProductKind::Ppi {
                elevation: sweep.elevation(),
                tilt,
            },
        ))
    }

    fn cappi(&self, height: Meters, pseudo: bool) -> PolarProduct {
        self.cappi_product(height, pseudo)
    }

    #[inline]
    fn volume_info(&self) -> &VolumeInfo {
        &self.info
    }

    #[inline]
    fn valid_time(&self) -> NaiveDateTime {
        self.info.valid_time()
    }
}
