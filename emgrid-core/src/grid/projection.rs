//! Spherical map projections used by WRF domains
//!
//! Only the four projections WRF can place a domain on are supported, each evaluated
//! on a sphere. The projection origin is the domain centre, so the centre maps to
//! `(0, 0)` in projected metres.

use crate::errors::{EmgridError, EmgridResult};
use crate::field::FloatValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use super::EARTH_RADIUS;

/// Projection families understood by the pipeline
///
/// The discriminants are WRF's `MAP_PROJ` codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectionKind {
    LambertConformal = 1,
    PolarStereographic = 2,
    Mercator = 3,
    Equirectangular = 6,
}

impl ProjectionKind {
    /// Resolve a WRF `MAP_PROJ` code
    pub fn from_map_proj(code: i32) -> EmgridResult<Self> {
        match code {
            1 => Ok(ProjectionKind::LambertConformal),
            2 => Ok(ProjectionKind::PolarStereographic),
            3 => Ok(ProjectionKind::Mercator),
            6 => Ok(ProjectionKind::Equirectangular),
            _ => Err(EmgridError::UnsupportedProjection { code }),
        }
    }

    /// Short PROJ-style name of the projection
    pub fn proj_name(&self) -> &'static str {
        match self {
            ProjectionKind::LambertConformal => "lcc",
            ProjectionKind::PolarStereographic => "stere",
            ProjectionKind::Mercator => "merc",
            ProjectionKind::Equirectangular => "eqc",
        }
    }
}

/// Projection metadata of a target domain
///
/// Mirrors the global attributes of a WPS `geo_em` file. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSpec {
    /// WRF `MAP_PROJ` code, resolved by [`ProjectionSpec::kind`]
    pub map_proj: i32,
    /// Latitude of the domain centre (degrees)
    pub center_lat: FloatValue,
    /// Longitude of the domain centre, also the standard longitude (degrees)
    pub center_lon: FloatValue,
    /// First standard parallel (degrees)
    pub true_lat1: FloatValue,
    /// Second standard parallel (degrees), Lambert conformal only
    pub true_lat2: Option<FloatValue>,
    /// Radius of the spherical Earth (m)
    pub earth_radius: FloatValue,
    pub rows: usize,
    pub cols: usize,
    /// Cell size along x (m)
    pub dx: FloatValue,
    /// Cell size along y (m)
    pub dy: FloatValue,
}

impl ProjectionSpec {
    pub fn kind(&self) -> EmgridResult<ProjectionKind> {
        ProjectionKind::from_map_proj(self.map_proj)
    }

    /// Build a spec from the global attributes of a domain description file
    ///
    /// Expects `MAP_PROJ`, `MOAD_CEN_LAT`, `STAND_LON`, `TRUELAT1`, `TRUELAT2`,
    /// `DX`, `DY`, `i_parent_end` (columns) and `j_parent_end` (rows).
    pub fn from_domain_attributes(attrs: &HashMap<String, FloatValue>) -> EmgridResult<Self> {
        let get = |key: &str| {
            attrs
                .get(key)
                .copied()
                .ok_or_else(|| EmgridError::Config(format!("missing domain attribute {}", key)))
        };
        let cols = get("i_parent_end")?;
        let rows = get("j_parent_end")?;
        if cols < 1.0 || rows < 1.0 || cols.fract() != 0.0 || rows.fract() != 0.0 {
            return Err(EmgridError::Config(format!(
                "domain shape must be positive integers, got {} x {}",
                rows, cols
            )));
        }

        Ok(Self {
            map_proj: get("MAP_PROJ")? as i32,
            center_lat: get("MOAD_CEN_LAT")?,
            center_lon: get("STAND_LON")?,
            true_lat1: get("TRUELAT1")?,
            true_lat2: attrs.get("TRUELAT2").copied(),
            earth_radius: EARTH_RADIUS,
            rows: rows as usize,
            cols: cols as usize,
            dx: get("DX")?,
            dy: get("DY")?,
        })
    }
}

/// A projection with its constants resolved
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    LambertConformal {
        radius: FloatValue,
        lon0: FloatValue,
        n: FloatValue,
        f: FloatValue,
        rho0: FloatValue,
    },
    PolarStereographic {
        radius: FloatValue,
        lon0: FloatValue,
        /// +1 for the north pole, -1 for the south pole
        hemisphere: FloatValue,
        /// `1 + sin(|true latitude|)`
        scale: FloatValue,
        y0: FloatValue,
    },
    Mercator {
        radius: FloatValue,
        lon0: FloatValue,
        k0: FloatValue,
        y0: FloatValue,
    },
    Equirectangular {
        radius: FloatValue,
        lon0: FloatValue,
        lat0: FloatValue,
        cos_ts: FloatValue,
    },
}

/// Wrap a longitude difference (radians) into `[-PI, PI]`
fn wrap_longitude(delta: FloatValue) -> FloatValue {
    let mut d = delta;
    while d > PI {
        d -= 2.0 * PI;
    }
    while d < -PI {
        d += 2.0 * PI;
    }
    d
}

fn invalid_parallel(reason: &str) -> EmgridError {
    EmgridError::Config(format!("invalid standard parallel: {}", reason))
}

impl Projection {
    /// Resolve the projection constants for a spec
    pub fn from_spec(spec: &ProjectionSpec) -> EmgridResult<Self> {
        let kind = spec.kind()?;
        let radius = spec.earth_radius;
        let lon0 = spec.center_lon.to_radians();
        let lat0 = spec.center_lat.to_radians();
        let lat1 = spec.true_lat1.to_radians();

        let projection = match kind {
            ProjectionKind::LambertConformal => {
                let lat2 = spec.true_lat2.unwrap_or(spec.true_lat1).to_radians();
                if lat1.abs() >= FRAC_PI_2 || lat2.abs() >= FRAC_PI_2 {
                    return Err(invalid_parallel("Lambert parallels must not be poles"));
                }
                let n = if (lat1 - lat2).abs() < 1e-10 {
                    lat1.sin()
                } else {
                    (lat1.cos() / lat2.cos()).ln()
                        / ((FRAC_PI_4 + lat2 / 2.0).tan() / (FRAC_PI_4 + lat1 / 2.0).tan()).ln()
                };
                if n.abs() < 1e-12 {
                    return Err(invalid_parallel("Lambert cone constant is zero"));
                }
                let f = lat1.cos() * (FRAC_PI_4 + lat1 / 2.0).tan().powf(n) / n;
                let rho0 = radius * f / (FRAC_PI_4 + lat0 / 2.0).tan().powf(n);
                Projection::LambertConformal {
                    radius,
                    lon0,
                    n,
                    f,
                    rho0,
                }
            }
            ProjectionKind::PolarStereographic => {
                let hemisphere = if spec.true_lat1 >= 0.0 { 1.0 } else { -1.0 };
                let scale = 1.0 + (hemisphere * lat1).sin();
                let rho = radius * scale * (FRAC_PI_4 - hemisphere * lat0 / 2.0).tan();
                Projection::PolarStereographic {
                    radius,
                    lon0,
                    hemisphere,
                    scale,
                    y0: -hemisphere * rho,
                }
            }
            ProjectionKind::Mercator => {
                let k0 = lat1.cos();
                if k0 <= 0.0 {
                    return Err(invalid_parallel("Mercator true latitude must not be a pole"));
                }
                Projection::Mercator {
                    radius,
                    lon0,
                    k0,
                    y0: radius * k0 * (FRAC_PI_4 + lat0 / 2.0).tan().ln(),
                }
            }
            ProjectionKind::Equirectangular => Projection::Equirectangular {
                radius,
                lon0,
                lat0,
                cos_ts: lat1.cos(),
            },
        };
        Ok(projection)
    }

    pub fn kind(&self) -> ProjectionKind {
        match self {
            Projection::LambertConformal { .. } => ProjectionKind::LambertConformal,
            Projection::PolarStereographic { .. } => ProjectionKind::PolarStereographic,
            Projection::Mercator { .. } => ProjectionKind::Mercator,
            Projection::Equirectangular { .. } => ProjectionKind::Equirectangular,
        }
    }

    /// Geographic (degrees) to projected (m)
    pub fn forward(&self, lon: FloatValue, lat: FloatValue) -> (FloatValue, FloatValue) {
        let lam = lon.to_radians();
        let phi = lat.to_radians();
        match *self {
            Projection::LambertConformal {
                radius,
                lon0,
                n,
                f,
                rho0,
            } => {
                let rho = radius * f / (FRAC_PI_4 + phi / 2.0).tan().powf(n);
                let theta = n * wrap_longitude(lam - lon0);
                (rho * theta.sin(), rho0 - rho * theta.cos())
            }
            Projection::PolarStereographic {
                radius,
                lon0,
                hemisphere,
                scale,
                y0,
            } => {
                let rho = radius * scale * (FRAC_PI_4 - hemisphere * phi / 2.0).tan();
                let delta = wrap_longitude(lam - lon0);
                (rho * delta.sin(), -hemisphere * rho * delta.cos() - y0)
            }
            Projection::Mercator {
                radius,
                lon0,
                k0,
                y0,
            } => (
                radius * k0 * wrap_longitude(lam - lon0),
                radius * k0 * (FRAC_PI_4 + phi / 2.0).tan().ln() - y0,
            ),
            Projection::Equirectangular {
                radius,
                lon0,
                lat0,
                cos_ts,
            } => (
                radius * wrap_longitude(lam - lon0) * cos_ts,
                radius * (phi - lat0),
            ),
        }
    }

    /// Projected (m) to geographic (degrees)
    pub fn inverse(&self, x: FloatValue, y: FloatValue) -> (FloatValue, FloatValue) {
        let (lam, phi) = match *self {
            Projection::LambertConformal {
                radius,
                lon0,
                n,
                f,
                rho0,
            } => {
                let sign = n.signum();
                let rho = sign * (x * x + (rho0 - y) * (rho0 - y)).sqrt();
                let theta = (sign * x).atan2(sign * (rho0 - y));
                let phi = if rho == 0.0 {
                    sign * FRAC_PI_2
                } else {
                    2.0 * (radius * f / rho).powf(1.0 / n).atan() - FRAC_PI_2
                };
                (lon0 + theta / n, phi)
            }
            Projection::PolarStereographic {
                radius,
                lon0,
                hemisphere,
                scale,
                y0,
            } => {
                let y = y + y0;
                let rho = (x * x + y * y).sqrt();
                let phi = hemisphere * (FRAC_PI_2 - 2.0 * (rho / (radius * scale)).atan());
                (lon0 + x.atan2(-hemisphere * y), phi)
            }
            Projection::Mercator {
                radius,
                lon0,
                k0,
                y0,
            } => (
                lon0 + x / (radius * k0),
                2.0 * ((y + y0) / (radius * k0)).exp().atan() - FRAC_PI_2,
            ),
            Projection::Equirectangular {
                radius,
                lon0,
                lat0,
                cos_ts,
            } => (lon0 + x / (radius * cos_ts), lat0 + y / radius),
        };
        (wrap_longitude(lam).to_degrees(), phi.to_degrees())
    }
}
