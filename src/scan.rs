//! The contract a radar-file reader must satisfy, as seen by this crate.
//!
//! File-format parsing itself is out of scope: a reader for a given radar-file
//! family (Rainbow 5, ODIM HDF5, ...) is an external collaborator that produces
//! one [`RawScan`] per scan file. The types here describe exactly what that
//! reader must yield, and nothing else about how it obtains it: per elevation
//! slice a matrix of raw integer samples with its bit-depth scaling, the ray
//! index array used to align azimuths, optional per-slice step overrides, and
//! scan-wide metadata. Decoding these raw samples into measurement values is
//! this crate's job, see [`PolarSweep::decode`](crate::PolarSweep::decode).

use metfor::{Km, Meters};
use optional::Optioned;
use strum_macros::{Display, EnumIter, EnumString};

/// The timestamp format scan-wide acquisition times are reported in.
pub const SCAN_TIME_FORMAT: &str = "%H:%M:%S %Y-%m-%d";

/// The measured quantity a scan carries.
///
/// Parsed from the reader's data-type string; the serialized names follow the
/// vendor convention.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display, EnumString, EnumIter)]
pub enum MomentKind {
    /// Equivalent reflectivity factor, dBZ.
    #[strum(serialize = "dBZ")]
    Dbz,
    /// Uncorrected reflectivity, dBuZ.
    #[strum(serialize = "dBuZ")]
    Dbuz,
    /// Radial velocity, m/s.
    #[strum(serialize = "V")]
    Velocity,
    /// Spectrum width, m/s.
    #[strum(serialize = "W")]
    SpectrumWidth,
    /// Differential reflectivity, dB.
    #[strum(serialize = "ZDR")]
    Zdr,
}

/// The ray index array of one elevation slice.
///
/// Sample i records, as a raw integer, where ray i of the sample matrix points.
/// Decoded indices are `round(raw * count / 2^depth * angle_step)`.
#[derive(Clone, Debug)]
pub struct RayInfo {
    /// Raw per-ray index samples, one per matrix row.
    pub indices: Vec<f64>,
    /// Bit depth of the index samples.
    pub depth: u32,
    /// Number of rays the index samples span.
    pub count: f64,
}

/// One elevation slice as delivered by the reader.
#[derive(Clone, Debug)]
pub struct RawSlice {
    /// Antenna elevation angle in degrees.
    pub elevation: f64,
    /// Raw integer measurement samples, rays (azimuth) by bins (range).
    pub samples: ndarray::Array2<f64>,
    /// Measurement value mapped to a raw sample of zero.
    pub min: f64,
    /// Measurement value mapped to the maximum raw sample.
    pub max: f64,
    /// Bit depth of the measurement samples.
    pub depth: u32,
    /// Ray index array for azimuth alignment.
    pub rays: RayInfo,
    /// Angular step override in degrees per ray, falls back to the scan-wide value.
    pub angle_step: Option<f64>,
    /// Range step override in km per bin, falls back to the scan-wide value.
    pub range_step: Option<Km>,
}

/// A whole scan as delivered by the reader: all slices plus scan-wide metadata.
#[derive(Clone, Debug)]
pub struct RawScan {
    /// Sensor identifier, e.g. a WMO or vendor id.
    pub sensor_id: Option<String>,
    /// Human-readable sensor name.
    pub sensor_name: Option<String>,
    /// Geographic position of the radar as (latitude, longitude) in degrees.
    pub location: Option<(f64, f64)>,
    /// Site altitude.
    pub altitude: Optioned<Meters>,
    /// Data-type string of the scanned moment, e.g. `"dBZ"`.
    pub moment: String,
    /// Acquisition time in [`SCAN_TIME_FORMAT`].
    pub timestamp: String,
    /// Number of elevation slices the scan declares; must match `slices`.
    pub num_elevations: usize,
    /// Maximum range of the scan in km.
    pub stop_range: Km,
    /// Scan-wide range step in km per bin; both this and the per-slice
    /// override may be absent, in which case 1 is assumed.
    pub range_step: Option<Km>,
    /// Scan-wide angular step in degrees per ray; both this and the per-slice
    /// override may be absent, in which case 1 is assumed.
    pub angle_step: Option<f64>,
    /// The elevation slices in scan order, lowest elevation first.
    pub slices: Vec<RawSlice>,
}

impl RawScan {
    /// The angular step for a slice, honoring the fallback chain
    /// slice -> scan -> 1.
    #[inline]
    pub fn effective_angle_step(&self, slice: &RawSlice) -> f64 {
        slice.angle_step.or(self.angle_step).unwrap_or(1.0)
    }

    /// The range step for a slice, honoring the fallback chain
    /// slice -> scan -> 1.
    #[inline]
    pub fn effective_range_step(&self, slice: &RawSlice) -> Km {
        slice.range_step.or(self.range_step).unwrap_or(Km(1.0))
    }
}
