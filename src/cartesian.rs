//! Mapping polar rasters onto cartesian grids, and the image type that owns
//! the result.
//!
//! The resampler works by inverse mapping: every output cell is converted back
//! to (azimuth, range), then to fractional (ray, bin) coordinates, and the
//! polar matrix is sampled there. Cells outside the scan's coverage circle come
//! out NaN. Reprojection and bounding boxes go through an external
//! [`CoordinateTransform`] implementation; this crate never links a projection
//! library itself.

use crate::{
    error::{AnalysisError, Result},
    products::PolarProduct,
    scan::MomentKind,
    utility::normalize_azimuth,
};
use metfor::Quantity;
use ndarray::{s, Array2};
use std::{fmt, str::FromStr};

/// Interpolation order for the inverse mapping.
///
/// Cubic uses a Catmull-Rom convolution kernel, which needs a full 4x4
/// neighborhood; cells whose neighborhood touches the matrix edge come out NaN.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InterpOrder {
    /// Nearest-neighbor lookup.
    Nearest,
    /// Bilinear interpolation.
    Linear,
    /// Catmull-Rom cubic convolution.
    Cubic,
}

impl Default for InterpOrder {
    fn default() -> Self {
        InterpOrder::Nearest
    }
}

/// Resample a polar matrix onto the cartesian grid spanned by `xs` and `ys`.
///
/// `angle_step` is in degrees per ray and `range_step` in the same length unit
/// as the grid coordinates. The output is indexed `[x, y]`. Before sampling,
/// the last ray row is duplicated and appended so query azimuths just below
/// 360 degrees stay in bounds instead of falling off the ray axis at the wrap.
pub fn polar_to_cart(
    polar: &Array2<f64>,
    angle_step: f64,
    range_step: f64,
    xs: &[f64],
    ys: &[f64],
    order: InterpOrder,
) -> Array2<f64> {
    let (num_rays, num_bins) = polar.dim();

    let mut extended = Array2::zeros((num_rays + 1, num_bins));
    extended.slice_mut(s![..num_rays, ..]).assign(polar);
    extended.row_mut(num_rays).assign(&polar.row(num_rays - 1));

    let mut cart = Array2::from_elem((xs.len(), ys.len()), f64::NAN);
    for (i, &x) in xs.iter().enumerate() {
        for (j, &y) in ys.iter().enumerate() {
            let azimuth = normalize_azimuth(y.atan2(x).to_degrees());
            let ray = azimuth / angle_step;
            let bin = x.hypot(y) / range_step;

            cart[[i, j]] = match order {
                InterpOrder::Nearest => sample_nearest(&extended, ray, bin),
                InterpOrder::Linear => sample_linear(&extended, ray, bin),
                InterpOrder::Cubic => sample_cubic(&extended, ray, bin),
            };
        }
    }

    cart
}

fn sample_nearest(matrix: &Array2<f64>, ray: f64, bin: f64) -> f64 {
    let (num_rays, num_bins) = matrix.dim();
    let ray = ray.round();
    let bin = bin.round();

    if ray < 0.0 || bin < 0.0 || ray > (num_rays - 1) as f64 || bin > (num_bins - 1) as f64 {
        f64::NAN
    } else {
        matrix[[ray as usize, bin as usize]]
    }
}

fn sample_linear(matrix: &Array2<f64>, ray: f64, bin: f64) -> f64 {
    let (num_rays, num_bins) = matrix.dim();
    if num_rays < 2 || num_bins < 2 {
        return sample_nearest(matrix, ray, bin);
    }
    if ray < 0.0 || bin < 0.0 || ray > (num_rays - 1) as f64 || bin > (num_bins - 1) as f64 {
        return f64::NAN;
    }

    let ray_0 = (ray.floor() as usize).min(num_rays - 2);
    let bin_0 = (bin.floor() as usize).min(num_bins - 2);
    let ray_frac = ray - ray_0 as f64;
    let bin_frac = bin - bin_0 as f64;

    let low = matrix[[ray_0, bin_0]] * (1.0 - bin_frac) + matrix[[ray_0, bin_0 + 1]] * bin_frac;
    let high =
        matrix[[ray_0 + 1, bin_0]] * (1.0 - bin_frac) + matrix[[ray_0 + 1, bin_0 + 1]] * bin_frac;

    low * (1.0 - ray_frac) + high * ray_frac
}

fn sample_cubic(matrix: &Array2<f64>, ray: f64, bin: f64) -> f64 {
    let (num_rays, num_bins) = matrix.dim();
    let ray_1 = ray.floor();
    let bin_1 = bin.floor();

    if ray_1 < 1.0
        || bin_1 < 1.0
        || ray_1 + 2.0 > (num_rays - 1) as f64
        || bin_1 + 2.0 > (num_bins - 1) as f64
    {
        return f64::NAN;
    }

    let ray_frac = ray - ray_1;
    let bin_frac = bin - bin_1;
    let ray_1 = ray_1 as usize;
    let bin_1 = bin_1 as usize;

    let mut rows = [0.0; 4];
    for (k, row_value) in rows.iter_mut().enumerate() {
        let row = ray_1 - 1 + k;
        let points = [
            matrix[[row, bin_1 - 1]],
            matrix[[row, bin_1]],
            matrix[[row, bin_1 + 1]],
            matrix[[row, bin_1 + 2]],
        ];
        *row_value = catmull_rom(points, bin_frac);
    }

    catmull_rom(rows, ray_frac)
}

fn catmull_rom(p: [f64; 4], t: f64) -> f64 {
    0.5 * (2.0 * p[1]
        + (p[2] - p[0]) * t
        + (2.0 * p[0] - 5.0 * p[1] + 4.0 * p[2] - p[3]) * t * t
        + (3.0 * p[1] - p[0] - 3.0 * p[2] + p[3]) * t * t * t)
}

/// A coordinate reference system, either by identifier or by definition string.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Crs {
    /// An EPSG code, e.g. `Crs::Epsg(4326)` for geographic WGS84.
    Epsg(u32),
    /// A proj4-style definition string.
    Definition(String),
}

impl FromStr for Crs {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.to_ascii_lowercase();
        if let Some(code) = lowered.strip_prefix("epsg:") {
            code.parse::<u32>()
                .map(Crs::Epsg)
                .map_err(|_| AnalysisError::UnsupportedCrs(s.to_owned()))
        } else if s.starts_with("+proj=") {
            Ok(Crs::Definition(s.to_owned()))
        } else {
            Err(AnalysisError::UnsupportedCrs(s.to_owned()))
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "epsg:{}", code),
            Crs::Definition(def) => write!(f, "{}", def),
        }
    }
}

/// The contract an external projection library must satisfy.
///
/// `transform` maps coordinate pairs from one CRS to another, element-wise,
/// returning new coordinate vectors of the same length.
pub trait CoordinateTransform {
    /// Transform every `(xs[i], ys[i])` pair from `source` to `dest`.
    fn transform(
        &self,
        source: &Crs,
        dest: &Crs,
        xs: &[f64],
        ys: &[f64],
    ) -> Result<(Vec<f64>, Vec<f64>)>;
}

/// A geographic bounding box as lon/lat corner pairs.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct BoundingBox {
    /// Upper-left corner, (lon, lat).
    pub upper_left: (f64, f64),
    /// Lower-right corner, (lon, lat).
    pub lower_right: (f64, f64),
}

/// A product resampled onto a cartesian grid, plus that grid's coordinates.
///
/// The grid spans the scan range in metres on both axes, centred on the radar.
/// Reprojection returns a new image rather than mutating in place, so several
/// consumers can safely hold the same image.
#[derive(Clone, Debug)]
pub struct CartesianImage {
    data: Array2<f64>,
    xx: Array2<f64>,
    yy: Array2<f64>,
    dim: usize,
    moment: Option<MomentKind>,
}

impl CartesianImage {
    /// Resample a product onto a `dim` by `dim` grid.
    ///
    /// The grid side must be even and the product must carry usable angular and
    /// range steps. Reflectivity products additionally mask non-positive values
    /// to NaN: at or below 0 dBZ there is nothing to render.
    pub fn new(product: &PolarProduct, dim: usize, order: InterpOrder) -> Result<Self> {
        if dim == 0 || dim % 2 != 0 {
            return Err(AnalysisError::InvalidGrid("dimension must be even"));
        }

        let angle_step = product.info().angle_step();
        let range_step = product.info().range_step().unpack() * 1000.0;
        if !(angle_step > 0.0) || !(range_step > 0.0) {
            return Err(AnalysisError::InvalidGrid(
                "angle and range steps must be positive",
            ));
        }

        let scan_range = product.num_bins() as f64 * range_step;
        let diff = 2.0 * scan_range / dim as f64;
        let coords: Vec<f64> = (0..dim).map(|i| -scan_range + i as f64 * diff).collect();

        let mut data = polar_to_cart(product.data(), angle_step, range_step, &coords, &coords, order);

        let moment = product.info().moment();
        if moment == Some(MomentKind::Dbz) {
            data.mapv_inplace(|v| if v <= 0.0 { f64::NAN } else { v });
        }

        let mut xx = Array2::zeros((dim, dim));
        let mut yy = Array2::zeros((dim, dim));
        for i in 0..dim {
            for j in 0..dim {
                xx[[i, j]] = coords[i];
                yy[[i, j]] = coords[j];
            }
        }

        Ok(CartesianImage {
            data,
            xx,
            yy,
            dim,
            moment,
        })
    }

    /// The resampled raster, indexed `[x, y]`.
    #[inline]
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// X coordinate of every cell, in the current CRS.
    #[inline]
    pub fn grid_x(&self) -> &Array2<f64> {
        &self.xx
    }

    /// Y coordinate of every cell, in the current CRS.
    #[inline]
    pub fn grid_y(&self) -> &Array2<f64> {
        &self.yy
    }

    /// Grid side length in cells.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The measured quantity of the source product, when known.
    #[inline]
    pub fn moment(&self) -> Option<MomentKind> {
        self.moment
    }

    /// Transform the grid coordinates from `source` to `dest`, producing a new
    /// image with the same data.
    pub fn reproject<T>(&self, transformer: &T, source: &Crs, dest: &Crs) -> Result<CartesianImage>
    where
        T: CoordinateTransform,
    {
        let xs: Vec<f64> = self.xx.iter().copied().collect();
        let ys: Vec<f64> = self.yy.iter().copied().collect();

        let (new_xs, new_ys) = transformer.transform(source, dest, &xs, &ys)?;

        let xx = Array2::from_shape_vec((self.dim, self.dim), new_xs).map_err(|_| {
            AnalysisError::ShapeMismatch("transformer changed the number of coordinates")
        })?;
        let yy = Array2::from_shape_vec((self.dim, self.dim), new_ys).map_err(|_| {
            AnalysisError::ShapeMismatch("transformer changed the number of coordinates")
        })?;

        Ok(CartesianImage {
            data: self.data.clone(),
            xx,
            yy,
            dim: self.dim,
            moment: self.moment,
        })
    }

    /// The geographic bounding box of the grid.
    ///
    /// The current coordinates are taken to be web-mercator metres and the grid
    /// extremes are transformed to geographic lon/lat.
    pub fn bounding_box<T>(&self, transformer: &T) -> Result<BoundingBox>
    where
        T: CoordinateTransform,
    {
        let web_mercator = Crs::Epsg(3857);
        let geographic = Crs::Epsg(4326);

        let min_x = self.xx.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_x = self.xx.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min_y = self.yy.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_y = self.yy.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let (ul_x, ul_y) =
            transform_point(transformer, &web_mercator, &geographic, min_x, max_y)?;
        let (lr_x, lr_y) =
            transform_point(transformer, &web_mercator, &geographic, max_x, min_y)?;

        Ok(BoundingBox {
            upper_left: (ul_x, ul_y),
            lower_right: (lr_x, lr_y),
        })
    }
}

fn transform_point<T>(
    transformer: &T,
    source: &Crs,
    dest: &Crs,
    x: f64,
    y: f64,
) -> Result<(f64, f64)>
where
    T: CoordinateTransform,
{
    let (xs, ys) = transformer.transform(source, dest, &[x], &[y])?;
    match (xs.first(), ys.first()) {
        (Some(&x), Some(&y)) => Ok((x, y)),
        _ => Err(AnalysisError::ShapeMismatch(
            "transformer returned no coordinates",
        )),
    }
}
