//! GPX track parsing
//!
//! The companion ships one pre-recorded track. It is decoded once at startup
//! into an ordered coordinate list; only latitude and longitude are read,
//! elevation, timestamps and extensions are ignored.
//!
//! A point that lacks its `lat` or `lon` attribute makes the GPX reader
//! reject the document, so a single malformed point fails the whole file.

use crate::{Coordinate, MapError, Result, utils};

/// Name shown for tracks whose GPX carries none
const DEFAULT_TRACK_NAME: &str = "Route";

/// The decoded track with precomputed metadata
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    /// Display name (GPX track or route name)
    name: String,
    /// Points in file order
    points: Vec<Coordinate>,
    /// Cached length in meters (computed once during construction)
    cached_length: f64,
}

impl Track {
    /// Build a track from already decoded points
    ///
    /// Returns `MalformedTrack` when `points` is empty.
    pub fn new(name: impl Into<String>, points: Vec<Coordinate>) -> Result<Self> {
        if points.is_empty() {
            return Err(MapError::MalformedTrack(
                "no coordinate points found".to_string(),
            ));
        }
        let cached_length = utils::path_length(&points);
        Ok(Self {
            name: name.into(),
            points,
            cached_length,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    /// Length in meters along the points
    #[inline]
    pub fn length_meters(&self) -> f64 {
        self.cached_length
    }

    /// Popup label, e.g. `Flåmsbana (20.2 km)`
    pub fn label(&self) -> String {
        let km = self.cached_length / 1000.0;
        if km < 1.0 {
            format!("{} ({:.0} m)", self.name, self.cached_length)
        } else {
            format!("{} ({:.1} km)", self.name, km)
        }
    }
}

/// Parse GPX text into a [`Track`]
///
/// Track points from every track and segment are taken in file order. Route
/// points are used only when the file has no track points.
pub fn parse_track(text: &str) -> Result<Track> {
    #[cfg(feature = "profiling")]
    profiling::scope!("track::parse");

    let gpx = gpx::read(text.as_bytes()).map_err(|e| MapError::MalformedTrack(e.to_string()))?;

    let mut name: Option<String> = None;
    let mut points = Vec::new();

    for track in &gpx.tracks {
        for segment in &track.segments {
            for waypoint in &segment.points {
                points.push(waypoint_coordinate(waypoint)?);
            }
        }
        if name.is_none() {
            name = track.name.clone();
        }
    }

    if points.is_empty() {
        for route in &gpx.routes {
            for waypoint in &route.points {
                points.push(waypoint_coordinate(waypoint)?);
            }
            if name.is_none() {
                name = route.name.clone();
            }
        }
    }

    let name = name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_TRACK_NAME.to_string());

    Track::new(name, points)
}

/// Parse a track, logging and swallowing any failure
///
/// This is the boundary used by the map: a missing or broken track means no
/// track overlay, never a failed map.
pub fn load_track(text: &str) -> Option<Track> {
    match parse_track(text) {
        Ok(track) => {
            tracing::info!(
                "Loaded track '{}' with {} points ({:.0} m)",
                track.name(),
                track.points().len(),
                track.length_meters()
            );
            Some(track)
        }
        Err(e) => {
            tracing::warn!("Skipping track overlay: {e}");
            None
        }
    }
}

fn waypoint_coordinate(waypoint: &gpx::Waypoint) -> Result<Coordinate> {
    let coordinate = Coordinate::from(waypoint.point());
    if !coordinate.is_valid() {
        return Err(MapError::MalformedTrack(format!(
            "point out of range: ({}, {})",
            coordinate.latitude, coordinate.longitude
        )));
    }
    Ok(coordinate)
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREE_POINTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="fjord-map-tests" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>Flamsbana</name>
    <trkseg>
      <trkpt lat="60.7353" lon="7.1233"><ele>866</ele></trkpt>
      <trkpt lat="60.7500" lon="7.1350"/>
      <trkpt lat="60.8630" lon="7.1130"><ele>2</ele></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    const MISSING_LONGITUDE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="fjord-map-tests" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <trkseg>
      <trkpt lat="60.7353" lon="7.1233"/>
      <trkpt lat="60.7500" lon="7.1350"/>
      <trkpt lat="60.8000"/>
      <trkpt lat="60.8630" lon="7.1130"/>
    </trkseg>
  </trk>
</gpx>"#;

    const NO_POINTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="fjord-map-tests" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>Empty</name>
    <trkseg></trkseg>
  </trk>
</gpx>"#;

    const ROUTE_ONLY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="fjord-map-tests" xmlns="http://www.topografix.com/GPX/1/1">
  <rte>
    <name>Aurlandsvegen</name>
    <rtept lat="60.9050" lon="7.1900"/>
    <rtept lat="60.8900" lon="7.2500"/>
  </rte>
</gpx>"#;

    #[test]
    fn test_parse_preserves_file_order() {
        let track = parse_track(THREE_POINTS).unwrap();
        assert_eq!(track.name(), "Flamsbana");
        assert_eq!(
            track.points(),
            &[
                Coordinate::new(60.7353, 7.1233),
                Coordinate::new(60.75, 7.135),
                Coordinate::new(60.863, 7.113),
            ]
        );
        assert!(track.length_meters() > 10_000.0);
        assert!(track.label().starts_with("Flamsbana ("));
    }

    #[test]
    fn test_missing_longitude_fails_whole_file() {
        let result = parse_track(MISSING_LONGITUDE);
        assert!(matches!(result, Err(MapError::MalformedTrack(_))));
        assert!(load_track(MISSING_LONGITUDE).is_none());
    }

    #[test]
    fn test_zero_points_is_malformed_but_not_fatal() {
        assert!(matches!(
            parse_track(NO_POINTS),
            Err(MapError::MalformedTrack(_))
        ));
        assert!(load_track(NO_POINTS).is_none());
    }

    #[test]
    fn test_garbage_input() {
        assert!(load_track("this is not a gpx file").is_none());
        assert!(load_track("").is_none());
    }

    #[test]
    fn test_route_points_fallback() {
        let track = parse_track(ROUTE_ONLY).unwrap();
        assert_eq!(track.name(), "Aurlandsvegen");
        assert_eq!(track.points().len(), 2);
    }

    #[test]
    fn test_new_rejects_empty() {
        assert!(Track::new("x", Vec::new()).is_err());
        let track = Track::new("short", vec![Coordinate::new(60.0, 7.0)]).unwrap();
        assert_eq!(track.length_meters(), 0.0);
        assert_eq!(track.label(), "short (0 m)");
    }
}
