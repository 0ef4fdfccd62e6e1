//! Universal Transverse Mercator on the WGS-84 ellipsoid.
//!
//! Forward and inverse use the Krüger series in the third flattening `n`,
//! truncated after the n³ terms (sub-millimetre inside a zone).

use std::fmt;

use serde::Serialize;

use super::wgs84;

/// Central scale factor.
pub const K0: f64 = 0.9996;

pub const FALSE_EASTING_M: f64 = 500_000.0;

/// Added to northings in the southern hemisphere.
pub const FALSE_NORTHING_SOUTH_M: f64 = 10_000_000.0;

/// Third flattening.
const N: f64 = wgs84::F / (2.0 - wgs84::F);
const N2: f64 = N * N;
const N3: f64 = N2 * N;

/// Rectifying radius.
const A_RECT: f64 = wgs84::A / (1.0 + N) * (1.0 + N2 / 4.0 + N2 * N2 / 64.0);

const ALPHA: [f64; 3] = [
    N / 2.0 - 2.0 / 3.0 * N2 + 5.0 / 16.0 * N3,
    13.0 / 48.0 * N2 - 3.0 / 5.0 * N3,
    61.0 / 240.0 * N3,
];

const BETA: [f64; 3] = [
    N / 2.0 - 2.0 / 3.0 * N2 + 37.0 / 96.0 * N3,
    1.0 / 48.0 * N2 + 1.0 / 15.0 * N3,
    17.0 / 480.0 * N3,
];

const DELTA: [f64; 3] = [
    2.0 * N - 2.0 / 3.0 * N2 - 2.0 * N3,
    7.0 / 3.0 * N2 - 8.0 / 5.0 * N3,
    56.0 / 15.0 * N3,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UtmZone {
    /// 1..=60
    pub number: u8,
    pub north: bool,
}

impl UtmZone {
    /// The zone containing a geographic point, including the Norway and Svalbard
    /// exceptions.
    pub fn containing(lat_deg: f64, lon_deg: f64) -> Self {
        // 180° itself belongs to zone 60.
        let mut number = (((lon_deg + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8;

        if (56.0..64.0).contains(&lat_deg) && (3.0..12.0).contains(&lon_deg) {
            number = 32;
        }

        if (72.0..=84.0).contains(&lat_deg) && (0.0..42.0).contains(&lon_deg) {
            number = if lon_deg < 9.0 {
                31
            } else if lon_deg < 21.0 {
                33
            } else if lon_deg < 33.0 {
                35
            } else {
                37
            };
        }

        Self {
            number,
            north: lat_deg >= 0.0,
        }
    }

    #[inline]
    pub fn central_meridian_deg(&self) -> f64 {
        f64::from(self.number) * 6.0 - 183.0
    }

    #[inline]
    fn false_northing(&self) -> f64 {
        if self.north {
            0.0
        } else {
            FALSE_NORTHING_SOUTH_M
        }
    }
}

impl fmt::Display for UtmZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.number, if self.north { 'N' } else { 'S' })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UtmCoordinate {
    pub zone: UtmZone,
    pub easting: f64,
    pub northing: f64,
}

/// Project into the point's own zone.
pub fn to_utm(lat_deg: f64, lon_deg: f64) -> UtmCoordinate {
    to_utm_in_zone(lat_deg, lon_deg, UtmZone::containing(lat_deg, lon_deg))
}

/// Project into a fixed zone, which may not be the one containing the point.
pub fn to_utm_in_zone(lat_deg: f64, lon_deg: f64, zone: UtmZone) -> UtmCoordinate {
    let phi = lat_deg.to_radians();
    let lambda = (lon_deg - zone.central_meridian_deg()).to_radians();

    // Conformal latitude, expressed through t = tan(chi).
    let c = 2.0 * N.sqrt() / (1.0 + N);
    let sin_phi = phi.sin();
    let t = (sin_phi.atanh() - c * (c * sin_phi).atanh()).sinh();

    let xi_p = t.atan2(lambda.cos());
    let eta_p = (lambda.sin() / (1.0 + t * t).sqrt()).atanh();

    let mut xi = xi_p;
    let mut eta = eta_p;
    for (j, alpha) in ALPHA.iter().enumerate() {
        let k = 2.0 * (j + 1) as f64;
        xi += alpha * (k * xi_p).sin() * (k * eta_p).cosh();
        eta += alpha * (k * xi_p).cos() * (k * eta_p).sinh();
    }

    UtmCoordinate {
        zone,
        easting: FALSE_EASTING_M + K0 * A_RECT * eta,
        northing: zone.false_northing() + K0 * A_RECT * xi,
    }
}

/// Inverse projection. Returns `(lat_deg, lon_deg)`.
pub fn from_utm(coord: &UtmCoordinate) -> (f64, f64) {
    let xi = (coord.northing - coord.zone.false_northing()) / (K0 * A_RECT);
    let eta = (coord.easting - FALSE_EASTING_M) / (K0 * A_RECT);

    let mut xi_p = xi;
    let mut eta_p = eta;
    for (j, beta) in BETA.iter().enumerate() {
        let k = 2.0 * (j + 1) as f64;
        xi_p -= beta * (k * xi).sin() * (k * eta).cosh();
        eta_p -= beta * (k * xi).cos() * (k * eta).sinh();
    }

    let chi = (xi_p.sin() / eta_p.cosh()).asin();

    let mut phi = chi;
    for (j, delta) in DELTA.iter().enumerate() {
        let k = 2.0 * (j + 1) as f64;
        phi += delta * (k * chi).sin();
    }

    let lambda = eta_p.sinh().atan2(xi_p.cos());

    (
        phi.to_degrees(),
        coord.zone.central_meridian_deg() + lambda.to_degrees(),
    )
}
