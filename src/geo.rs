//! Geographic helpers: DMS → decimal degrees and WGS84 ↔ UTM projection.
//!
//! Projection goes through proj4rs with PROJ definition strings, one
//! `+proj=utm` definition per zone and hemisphere.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::error::Error;
use crate::record::{Hemisphere, ProjectedCoord};

/// Projection service used by the extractor.
pub trait Projector {
    /// Project a geographic point. `zone` forces a zone; `None` picks it from the longitude.
    fn project(&self, latitude: f64, longitude: f64, zone: Option<u8>) -> Result<ProjectedCoord, Error>;

    /// Inverse projection back to `(latitude, longitude)`.
    fn unproject(&self, coord: &ProjectedCoord) -> Result<(f64, f64), Error>;
}

/// Universal Transverse Mercator on a named ellipsoid.
#[derive(Debug, Clone)]
pub struct Utm {
    ellipsoid: &'static str,
}

impl Default for Utm {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl Utm {
    pub fn wgs84() -> Self {
        Self { ellipsoid: "WGS84" }
    }

    fn geographic(&self) -> Result<Proj, Error> {
        proj(&format!("+proj=longlat +ellps={} +no_defs", self.ellipsoid))
    }

    fn zone(&self, zone: u8, hemisphere: Hemisphere) -> Result<Proj, Error> {
        let south = match hemisphere {
            Hemisphere::North => "",
            Hemisphere::South => " +south",
        };
        proj(&format!(
            "+proj=utm +zone={zone}{south} +ellps={} +units=m +no_defs",
            self.ellipsoid
        ))
    }
}

fn proj(definition: &str) -> Result<Proj, Error> {
    Proj::from_proj_string(definition)
        .map_err(|e| Error::Conversion(format!("invalid projection '{definition}': {e:?}")))
}

impl Projector for Utm {
    fn project(&self, latitude: f64, longitude: f64, zone: Option<u8>) -> Result<ProjectedCoord, Error> {
        check_domain(latitude, longitude)?;
        if latitude.abs() >= 90.0 {
            return Err(Error::Conversion(format!(
                "latitude {latitude} cannot be represented in UTM"
            )));
        }
        let zone = match zone {
            Some(z @ 1..=60) => z,
            Some(z) => return Err(Error::Conversion(format!("invalid UTM zone {z}"))),
            None => zone_for_longitude(longitude),
        };

        let d_lambda = normalize_radians(longitude.to_radians() - central_meridian(zone).to_radians());
        if d_lambda.abs() >= std::f64::consts::FRAC_PI_2 {
            return Err(Error::Conversion(format!(
                "longitude {longitude} is too far from zone {zone}"
            )));
        }

        let hemisphere = Hemisphere::from_latitude(latitude);
        // Geographic coordinates are (x = lon, y = lat) in radians
        let mut point = (longitude.to_radians(), latitude.to_radians(), 0.0);
        transform(&self.geographic()?, &self.zone(zone, hemisphere)?, &mut point).map_err(|e| {
            Error::Conversion(format!("projection failed for ({latitude}, {longitude}): {e:?}"))
        })?;
        let (easting, northing, _) = point;

        if !easting.is_finite() || !northing.is_finite() {
            return Err(Error::Conversion(format!(
                "non-finite projection for ({latitude}, {longitude})"
            )));
        }

        Ok(ProjectedCoord {
            easting,
            northing,
            zone,
            hemisphere,
        })
    }

    fn unproject(&self, coord: &ProjectedCoord) -> Result<(f64, f64), Error> {
        if !(1..=60).contains(&coord.zone) {
            return Err(Error::Conversion(format!("invalid UTM zone {}", coord.zone)));
        }

        let mut point = (coord.easting, coord.northing, 0.0);
        transform(&self.zone(coord.zone, coord.hemisphere)?, &self.geographic()?, &mut point)
            .map_err(|e| Error::Conversion(format!("inverse projection failed: {e:?}")))?;

        let (latitude, longitude) = (point.1.to_degrees(), point.0.to_degrees());
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(Error::Conversion("non-finite inverse projection".into()));
        }
        Ok((latitude, longitude))
    }
}

/// Convert a geographic point to UTM using WGS84 and the 6° zone rule.
pub fn convert(latitude: f64, longitude: f64) -> Result<ProjectedCoord, Error> {
    Utm::wgs84().project(latitude, longitude, None)
}

/// Zone from longitude by the plain 6° band rule (no Norway/Svalbard exceptions).
pub fn zone_for_longitude(longitude: f64) -> u8 {
    let zone = ((longitude + 180.0) / 6.0).floor() as i32 + 1;
    zone.clamp(1, 60) as u8
}

/// Longitude of the zone's central meridian, in degrees.
pub fn central_meridian(zone: u8) -> f64 {
    f64::from(zone) * 6.0 - 183.0
}

/// Combine degree/minute/second components and a hemisphere reference
/// (`N`, `S`, `E`, `W`) into signed decimal degrees.
pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64, reference: char) -> Result<f64, Error> {
    if !(degrees.is_finite() && minutes.is_finite() && seconds.is_finite()) {
        return Err(Error::Conversion(format!(
            "non-finite DMS component ({degrees}, {minutes}, {seconds})"
        )));
    }
    if !(0.0..60.0).contains(&minutes) || !(0.0..60.0).contains(&seconds) {
        log::warn!("DMS minutes/seconds out of range ({minutes}, {seconds}), continuing");
    }

    let decimal = degrees + minutes / 60.0 + seconds / 3600.0;
    match reference.to_ascii_uppercase() {
        'N' | 'E' => Ok(decimal),
        'S' | 'W' => Ok(-decimal),
        other => Err(Error::Conversion(format!("unknown GPS reference '{other}'"))),
    }
}

fn check_domain(latitude: f64, longitude: f64) -> Result<(), Error> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(Error::Conversion(format!(
            "non-finite coordinates ({latitude}, {longitude})"
        )));
    }
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(Error::Conversion(format!(
            "coordinates out of range ({latitude}, {longitude})"
        )));
    }
    Ok(())
}

fn normalize_radians(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    (angle + PI).rem_euclid(TAU) - PI
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} ± {tolerance}, got {actual}"
        );
    }

    // ── dms_to_decimal ────────────────────────────────────────────────

    #[test]
    fn dms_north_east() {
        assert_close(dms_to_decimal(10.0, 30.0, 0.0, 'N').unwrap(), 10.5, 1e-12);
        assert_close(dms_to_decimal(75.0, 45.0, 0.0, 'E').unwrap(), 75.75, 1e-12);
    }

    #[test]
    fn dms_south_west() {
        assert_close(dms_to_decimal(10.0, 30.0, 0.0, 'S').unwrap(), -10.5, 1e-12);
        assert_close(dms_to_decimal(75.0, 45.0, 0.0, 'W').unwrap(), -75.75, 1e-12);
    }

    #[test]
    fn dms_seconds_and_lowercase_reference() {
        assert_close(dms_to_decimal(45.0, 0.0, 36.0, 'n').unwrap(), 45.01, 1e-12);
    }

    #[test]
    fn dms_invalid_reference() {
        assert!(matches!(dms_to_decimal(10.0, 30.0, 0.0, 'X'), Err(Error::Conversion(_))));
    }

    #[test]
    fn dms_non_finite() {
        assert!(dms_to_decimal(f64::NAN, 0.0, 0.0, 'N').is_err());
    }

    // ── zones ─────────────────────────────────────────────────────────

    #[test]
    fn zone_rule() {
        assert_eq!(zone_for_longitude(-180.0), 1);
        assert_eq!(zone_for_longitude(-93.0), 15);
        assert_eq!(zone_for_longitude(-74.006), 18);
        assert_eq!(zone_for_longitude(0.0), 31);
        assert_eq!(zone_for_longitude(151.2093), 56);
        assert_eq!(zone_for_longitude(180.0), 60);
    }

    #[test]
    fn central_meridians() {
        assert_eq!(central_meridian(1), -177.0);
        assert_eq!(central_meridian(15), -93.0);
        assert_eq!(central_meridian(31), 3.0);
    }

    // ── convert ───────────────────────────────────────────────────────

    #[test]
    fn convert_new_york() {
        let p = convert(40.7128, -74.0060).unwrap();
        assert_eq!(p.zone, 18);
        assert_eq!(p.hemisphere, Hemisphere::North);
        assert!((583_000.0..=585_000.0).contains(&p.easting), "easting {}", p.easting);
        assert!((4_506_000.0..=4_508_000.0).contains(&p.northing), "northing {}", p.northing);
    }

    #[test]
    fn convert_sydney() {
        let p = convert(-33.8688, 151.2093).unwrap();
        assert_eq!(p.zone, 56);
        assert_eq!(p.hemisphere, Hemisphere::South);
        assert!((333_000.0..=335_000.0).contains(&p.easting), "easting {}", p.easting);
        assert!((6_249_000.0..=6_251_000.0).contains(&p.northing), "northing {}", p.northing);
    }

    #[test]
    fn convert_on_central_meridian() {
        // 45°N on the central meridian of zone 15: easting is exactly the false easting
        // and northing is k0 times the meridian arc length.
        let p = convert(45.0, -93.0).unwrap();
        assert_eq!(p.zone, 15);
        assert_close(p.easting, 500_000.0, 1e-3);
        assert_close(p.northing, 4_982_950.4, 1.0);
    }

    #[test]
    fn convert_equator_origin() {
        let p = convert(0.0, 3.0).unwrap();
        assert_eq!(p.zone, 31);
        assert_eq!(p.hemisphere, Hemisphere::North);
        assert_close(p.easting, 500_000.0, 1e-3);
        assert_close(p.northing, 0.0, 1e-3);
    }

    #[test]
    fn convert_out_of_range() {
        assert!(matches!(convert(95.0, 0.0), Err(Error::Conversion(_))));
        assert!(matches!(convert(0.0, 185.0), Err(Error::Conversion(_))));
        assert!(matches!(convert(f64::NAN, 0.0), Err(Error::Conversion(_))));
    }

    #[test]
    fn convert_poles_fail() {
        assert!(matches!(convert(90.0, 10.0), Err(Error::Conversion(_))));
        assert!(matches!(convert(-90.0, 10.0), Err(Error::Conversion(_))));
    }

    #[test]
    fn forced_zone_must_be_valid() {
        let utm = Utm::wgs84();
        assert!(utm.project(10.0, 10.0, Some(0)).is_err());
        assert!(utm.project(10.0, 10.0, Some(61)).is_err());
        let p = utm.project(10.0, 11.9, Some(32)).unwrap();
        assert_eq!(p.zone, 32);
    }

    #[test]
    fn round_trip_recovers_point() {
        let utm = Utm::wgs84();
        let points = [
            (45.0, -93.0),
            (40.7128, -74.0060),
            (-33.8688, 151.2093),
            (-23.55, -46.63),
            (64.1466, -21.9426),
            (0.0001, 0.0001),
            (-79.9, 179.9),
            (83.9, -179.9),
            (51.4779, -0.0015),
        ];
        for (lat, lon) in points {
            let projected = utm.project(lat, lon, None).unwrap();
            let (lat2, lon2) = utm.unproject(&projected).unwrap();
            assert_close(lat2, lat, 1e-7);
            assert_close(lon2, lon, 1e-7);
        }
    }
}
