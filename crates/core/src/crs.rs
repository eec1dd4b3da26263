// WGS84 ↔ British National Grid conversion
//
// The forward path is: WGS84 geodetic → ECEF cartesian on the GRS80/WGS84
// ellipsoid → seven-parameter Helmert shift to OSGB36 → geodetic on the
// Airy 1830 ellipsoid → transverse Mercator with the National Grid
// constants. The inverse runs the same steps backwards with the Helmert
// parameters negated
//
// The Helmert shift is the published OSGB36 approximation, good to a few
// metres absolute. Forward followed by inverse agrees with the input to
// well under a centimetre. No bounds checking is done: points outside
// Great Britain are run through the same formulas

use crate::error::Result;
use crate::types::{Coordinate, Crs};
use std::f64::consts::PI;

/// Ellipsoid semi-major and semi-minor axes (metres)
#[derive(Debug, Clone, Copy)]
struct Ellipsoid {
    a: f64,
    b: f64,
}

impl Ellipsoid {
    fn e2(&self) -> f64 {
        1.0 - (self.b * self.b) / (self.a * self.a)
    }
}

const WGS84: Ellipsoid = Ellipsoid {
    a: 6_378_137.000,
    b: 6_356_752.314_245,
};

const AIRY_1830: Ellipsoid = Ellipsoid {
    a: 6_377_563.396,
    b: 6_356_256.909,
};

/// National Grid projection constants
const F0: f64 = 0.999_601_271_7;
const LAT0_DEG: f64 = 49.0;
const LON0_DEG: f64 = -2.0;
const E0: f64 = 400_000.0;
const N0: f64 = -100_000.0;

/// WGS84 → OSGB36 Helmert parameters: translations in metres, scale in ppm,
/// rotations in arc-seconds
const TX: f64 = -446.448;
const TY: f64 = 125.157;
const TZ: f64 = -542.060;
const S_PPM: f64 = 20.4894;
const RX_SEC: f64 = -0.1502;
const RY_SEC: f64 = -0.2470;
const RZ_SEC: f64 = -0.8421;

/// Convert `(x, y)` from `source` to `target`.
///
/// Geographic inputs take `x` = longitude, `y` = latitude in decimal
/// degrees; BNG inputs take `x` = easting, `y` = northing in metres.
pub fn convert(x: f64, y: f64, source: Crs, target: Crs) -> Coordinate {
    // EPSG:4326 and CRS:84 share a datum; only the WMS axis order differs
    if source == target || (source.is_geographic() && target.is_geographic()) {
        return Coordinate::new(x, y, target);
    }

    match target {
        Crs::BritishNationalGrid => {
            let (easting, northing) = wgs84_to_bng(x, y);
            Coordinate::new(easting, northing, target)
        }
        Crs::Epsg4326 | Crs::Crs84 => {
            let (lon, lat) = bng_to_wgs84(x, y);
            Coordinate::new(lon, lat, target)
        }
    }
}

/// String-boundary variant: unknown identifiers fail with `UnsupportedCrs`.
pub fn convert_codes(x: f64, y: f64, source: &str, target: &str) -> Result<Coordinate> {
    let source: Crs = source.parse()?;
    let target: Crs = target.parse()?;
    Ok(convert(x, y, source, target))
}

/// WGS84 longitude/latitude (degrees) → BNG easting/northing (metres)
pub fn wgs84_to_bng(lon: f64, lat: f64) -> (f64, f64) {
    let (cx, cy, cz) = geodetic_to_cartesian(lat.to_radians(), lon.to_radians(), WGS84);
    let (cx, cy, cz) = helmert(cx, cy, cz, 1.0);
    let (lat, lon) = cartesian_to_geodetic(cx, cy, cz, AIRY_1830);
    project(lat, lon)
}

/// BNG easting/northing (metres) → WGS84 longitude/latitude (degrees)
pub fn bng_to_wgs84(easting: f64, northing: f64) -> (f64, f64) {
    let (lat, lon) = unproject(easting, northing);
    let (cx, cy, cz) = geodetic_to_cartesian(lat, lon, AIRY_1830);
    let (cx, cy, cz) = helmert(cx, cy, cz, -1.0);
    let (lat, lon) = cartesian_to_geodetic(cx, cy, cz, WGS84);
    (lon.to_degrees(), lat.to_degrees())
}

fn geodetic_to_cartesian(lat: f64, lon: f64, ellipsoid: Ellipsoid) -> (f64, f64, f64) {
    let e2 = ellipsoid.e2();
    let (sin_lat, cos_lat) = lat.sin_cos();
    let nu = ellipsoid.a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    (
        nu * cos_lat * lon.cos(),
        nu * cos_lat * lon.sin(),
        nu * (1.0 - e2) * sin_lat,
    )
}

fn cartesian_to_geodetic(x: f64, y: f64, z: f64, ellipsoid: Ellipsoid) -> (f64, f64) {
    let e2 = ellipsoid.e2();
    let p = x.hypot(y);
    let mut lat = z.atan2(p * (1.0 - e2));
    for _ in 0..10 {
        let sin_lat = lat.sin();
        let nu = ellipsoid.a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let next = (z + e2 * nu * sin_lat).atan2(p);
        if (next - lat).abs() < 1e-14 {
            lat = next;
            break;
        }
        lat = next;
    }
    (lat, y.atan2(x))
}

/// Small-angle Helmert transform; `sign` = -1 applies the inverse.
fn helmert(x: f64, y: f64, z: f64, sign: f64) -> (f64, f64, f64) {
    let arcsec = PI / (180.0 * 3600.0);
    let s = 1.0 + sign * S_PPM * 1e-6;
    let (rx, ry, rz) = (
        sign * RX_SEC * arcsec,
        sign * RY_SEC * arcsec,
        sign * RZ_SEC * arcsec,
    );
    let (tx, ty, tz) = (sign * TX, sign * TY, sign * TZ);
    (
        tx + s * x - rz * y + ry * z,
        ty + rz * x + s * y - rx * z,
        tz - ry * x + rx * y + s * z,
    )
}

/// Meridional arc from the true origin to `lat`, scaled by F0
fn meridional_arc(lat: f64) -> f64 {
    let Ellipsoid { a, b } = AIRY_1830;
    let n = (a - b) / (a + b);
    let (n2, n3) = (n * n, n * n * n);
    let lat0 = LAT0_DEG.to_radians();
    let d = lat - lat0;
    let s = lat + lat0;
    b * F0
        * ((1.0 + n + 1.25 * n2 + 1.25 * n3) * d
            - (3.0 * n + 3.0 * n2 + 21.0 / 8.0 * n3) * d.sin() * s.cos()
            + (15.0 / 8.0 * n2 + 15.0 / 8.0 * n3) * (2.0 * d).sin() * (2.0 * s).cos()
            - 35.0 / 24.0 * n3 * (3.0 * d).sin() * (3.0 * s).cos())
}

/// Radii of curvature (nu, rho) and eta² at `lat` on Airy 1830, scaled by F0
fn curvature(lat: f64) -> (f64, f64, f64) {
    let Ellipsoid { a, .. } = AIRY_1830;
    let e2 = AIRY_1830.e2();
    let sin2 = lat.sin().powi(2);
    let nu = a * F0 / (1.0 - e2 * sin2).sqrt();
    let rho = a * F0 * (1.0 - e2) / (1.0 - e2 * sin2).powf(1.5);
    (nu, rho, nu / rho - 1.0)
}

/// OSGB36 geodetic (radians) → National Grid easting/northing
fn project(lat: f64, lon: f64) -> (f64, f64) {
    let (sin_lat, cos_lat) = lat.sin_cos();
    let tan2 = lat.tan().powi(2);
    let tan4 = tan2 * tan2;
    let (nu, rho, eta2) = curvature(lat);

    let i = meridional_arc(lat) + N0;
    let ii = nu / 2.0 * sin_lat * cos_lat;
    let iii = nu / 24.0 * sin_lat * cos_lat.powi(3) * (5.0 - tan2 + 9.0 * eta2);
    let iiia = nu / 720.0 * sin_lat * cos_lat.powi(5) * (61.0 - 58.0 * tan2 + tan4);
    let iv = nu * cos_lat;
    let v = nu / 6.0 * cos_lat.powi(3) * (nu / rho - tan2);
    let vi = nu / 120.0
        * cos_lat.powi(5)
        * (5.0 - 18.0 * tan2 + tan4 + 14.0 * eta2 - 58.0 * tan2 * eta2);

    let dl = lon - LON0_DEG.to_radians();
    let northing = i + ii * dl.powi(2) + iii * dl.powi(4) + iiia * dl.powi(6);
    let easting = E0 + iv * dl + v * dl.powi(3) + vi * dl.powi(5);
    (easting, northing)
}

/// National Grid easting/northing → OSGB36 geodetic (radians)
fn unproject(easting: f64, northing: f64) -> (f64, f64) {
    let a = AIRY_1830.a;
    let mut lat = LAT0_DEG.to_radians();
    let mut m = 0.0;
    // Converges in a handful of iterations for any sane northing
    for _ in 0..100 {
        lat += (northing - N0 - m) / (a * F0);
        m = meridional_arc(lat);
        if (northing - N0 - m).abs() < 1e-5 {
            break;
        }
    }

    let cos_lat = lat.cos();
    let tan = lat.tan();
    let (tan2, tan4, tan6) = (tan.powi(2), tan.powi(4), tan.powi(6));
    let (nu, rho, eta2) = curvature(lat);

    let vii = tan / (2.0 * rho * nu);
    let viii = tan / (24.0 * rho * nu.powi(3)) * (5.0 + 3.0 * tan2 + eta2 - 9.0 * tan2 * eta2);
    let ix = tan / (720.0 * rho * nu.powi(5)) * (61.0 + 90.0 * tan2 + 45.0 * tan4);
    let x = 1.0 / (cos_lat * nu);
    let xi = 1.0 / (cos_lat * 6.0 * nu.powi(3)) * (nu / rho + 2.0 * tan2);
    let xii = 1.0 / (cos_lat * 120.0 * nu.powi(5)) * (5.0 + 28.0 * tan2 + 24.0 * tan4);
    let xiia = 1.0 / (cos_lat * 5040.0 * nu.powi(7))
        * (61.0 + 662.0 * tan2 + 1320.0 * tan4 + 720.0 * tan6);

    let de = easting - E0;
    let lat = lat - vii * de.powi(2) + viii * de.powi(4) - ix * de.powi(6);
    let lon = LON0_DEG.to_radians() + x * de - xi * de.powi(3) + xii * de.powi(5) - xiia * de.powi(7);
    (lat, lon)
}
