//! Synthetic scans and volumes shared by the unit tests.

use crate::{
    scan::{MomentKind, SCAN_TIME_FORMAT},
    sweep::PolarSweep,
    volume::{PolarVolume, SensorInfo, VolumeInfo},
};
use chrono::NaiveDateTime;
use metfor::Km;
use ndarray::Array2;

pub fn test_volume_info(range_step: Km, stop_range: Km) -> VolumeInfo {
    VolumeInfo::new(
        Some(MomentKind::Dbz),
        1.0,
        range_step,
        stop_range,
        SensorInfo::new()
            .with_id("WMO:06999".to_owned())
            .with_name("Test Radar".to_owned())
            .with_location((46.9, 7.5)),
        NaiveDateTime::parse_from_str("10:15:00 2023-06-01", SCAN_TIME_FORMAT).unwrap(),
    )
}

/// A 360-ray, 250-bin, 1 km resolution volume with the same value everywhere.
pub fn constant_volume(elevations: &[f64], value: f64) -> PolarVolume {
    let sweeps = elevations
        .iter()
        .enumerate()
        .map(|(tilt, &elevation)| {
            PolarSweep::new(
                Array2::from_elem((360, 250), value),
                elevation,
                1.0,
                Km(1.0),
                tilt,
            )
        })
        .collect();

    PolarVolume::from_sweeps(sweeps, test_volume_info(Km(1.0), Km(250.0)), 360).unwrap()
}
