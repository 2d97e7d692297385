//! The beam-height model: where a radar ray actually is in the atmosphere.
//!
//! For an elevation angle `elev` and a slant range `x` the beam sits at
//! `x * tan(elev) + (R - sqrt(R^2 - x^2))` above the radar, where R is an
//! *effective* Earth radius that folds standard atmospheric refraction into the
//! geometry (the usual 4/3-radius model). The height profile is independent of
//! azimuth.

use metfor::{Km, Quantity};

/// The effective Earth radius used by the default beam model.
///
/// This is a model constant, not the geophysical radius: roughly 4/3 of the true
/// radius, which accounts for the standard-atmosphere bending of the beam.
pub const EFFECTIVE_EARTH_RADIUS: Km = Km(8493.0);

/// Geometry of a radar beam over a curved Earth.
///
/// The Earth-radius constant is an explicit parameter so alternate refraction
/// models can be substituted.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct BeamGeometry {
    effective_earth_radius: Km,
}

impl Default for BeamGeometry {
    fn default() -> Self {
        BeamGeometry {
            effective_earth_radius: EFFECTIVE_EARTH_RADIUS,
        }
    }
}

impl BeamGeometry {
    /// Create a beam model with a custom effective Earth radius.
    #[inline]
    pub fn new(effective_earth_radius: Km) -> Self {
        BeamGeometry {
            effective_earth_radius,
        }
    }

    /// The effective Earth radius of this model.
    #[inline]
    pub fn effective_earth_radius(&self) -> Km {
        self.effective_earth_radius
    }

    /// Height above the radar for every range bin of a sweep.
    ///
    /// Bin centres run from `range_step / 2` out to `stop_range` in `range_step`
    /// increments. For a fixed positive elevation the heights are strictly
    /// increasing with range; at zero elevation only the curvature term remains.
    /// Ranges must stay below the effective Earth radius, which always holds in
    /// practice since scan ranges are a few hundred kilometres at most.
    pub fn beam_height_profile(
        &self,
        elevation_degrees: f64,
        stop_range: Km,
        range_step: Km,
    ) -> Vec<Km> {
        let radius = self.effective_earth_radius.unpack();
        let step = range_step.unpack();
        let slope = elevation_degrees.to_radians().tan();

        let num_bins = (stop_range.unpack() / step).ceil() as usize;

        (0..num_bins)
            .map(|bin| {
                let x = step / 2.0 + bin as f64 * step;
                Km(x * slope + (radius - (radius * radius - x * x).sqrt()))
            })
            .collect()
    }
}
