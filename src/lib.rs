#![warn(missing_docs)]
//! Functions and data types for deriving 2-D meteorological products from 3-D
//! polar weather-radar scan volumes.
//!
//! A scan arrives as one sweep per elevation angle, each an azimuth-by-range
//! matrix. [`PolarVolume`] canonicalizes the sweeps onto a regular 3-D grid,
//! and from there everything is a pure, read-only derivation:
//!
//! * [`PolarVolume::cappi`](VolumeSource::cappi) cuts a constant-altitude
//!   surface through the beam fan, blending the bracketing sweeps by inverse
//!   distance to the target altitude ([`BeamGeometry`] supplies the
//!   curved-Earth beam heights).
//! * [`InterpolatedVolume`] stacks CAPPI levels into a height cube and reduces
//!   it to column maximum (CMAX) and vertically integrated liquid (VIL).
//! * [`polar_to_cart`] and [`CartesianImage`] map any polar product onto a
//!   cartesian grid for rendering, with reprojection delegated to an external
//!   [`CoordinateTransform`] implementation.
//!
//! File-format parsing, rendering, and projection math are deliberately
//! external; [`RawScan`] documents the contract a reader must satisfy.
//!
//! # Examples
//!
//! ```rust
//! use chrono::NaiveDateTime;
//! use metfor::{Km, Meters};
//! use ndarray::Array2;
//! use radar_volume_analysis::{
//!     InterpolatedVolume, MomentKind, PolarSweep, PolarVolume, SensorInfo, VolumeInfo,
//!     VolumeSource, SCAN_TIME_FORMAT,
//! };
//!
//! // Three sweeps of uniform 30 dBZ reflectivity.
//! let sweeps: Vec<PolarSweep> = [0.5, 1.5, 3.0]
//!     .iter()
//!     .enumerate()
//!     .map(|(tilt, &elevation)| {
//!         PolarSweep::new(Array2::from_elem((360, 250), 30.0), elevation, 1.0, Km(1.0), tilt)
//!     })
//!     .collect();
//!
//! let info = VolumeInfo::new(
//!     Some(MomentKind::Dbz),
//!     1.0,
//!     Km(1.0),
//!     Km(250.0),
//!     SensorInfo::new(),
//!     NaiveDateTime::parse_from_str("10:15:00 2023-06-01", SCAN_TIME_FORMAT).unwrap(),
//! );
//! let volume = PolarVolume::from_sweeps(sweeps, info, 360).unwrap();
//!
//! // A pseudo-CAPPI at 2 km altitude.
//! let cappi = volume.cappi(Meters(2000.0), true);
//! assert_eq!(cappi.data()[[180, 60]], 30.0);
//!
//! // Column maximum over the lowest 10 km.
//! let stack = InterpolatedVolume::new(&volume, Km(0.0), Km(10.0), Km(1.0)).unwrap();
//! let cmax = stack.cmax(None, true).unwrap();
//! assert_eq!(cmax.data()[[180, 60]], 30.0);
//! ```

//
// API
//
pub use crate::{
    beam::{BeamGeometry, EFFECTIVE_EARTH_RADIUS},
    cartesian::{
        polar_to_cart, BoundingBox, CartesianImage, CoordinateTransform, Crs, InterpOrder,
    },
    error::{AnalysisError, Result},
    interpolated::InterpolatedVolume,
    products::{PolarProduct, ProductKind},
    scan::{MomentKind, RawScan, RawSlice, RayInfo, SCAN_TIME_FORMAT},
    sweep::PolarSweep,
    volume::{PolarVolume, SensorInfo, VolumeInfo, VolumeSource, DEFAULT_RAY_COUNT},
};

//
// Modules
//
mod beam;
mod cartesian;
mod error;
mod interpolated;
mod products;
mod scan;
mod sweep;
#[cfg(test)]
mod test_data;
mod utility;
mod volume;
