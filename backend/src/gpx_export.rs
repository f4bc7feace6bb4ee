use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};
use shared::Coordinate;

use crate::error::ExportError;

/// Encode a navigation path as a base64 GPX 1.1 track.
pub fn encode_path_as_gpx(name: &str, path: &[Coordinate]) -> Result<String, ExportError> {
    if path.is_empty() {
        return Err(ExportError::EmptyPath);
    }

    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some("greenpath".into()),
        ..Default::default()
    };
    let mut track = Track {
        name: Some(name.to_string()),
        ..Default::default()
    };

    let mut segment = TrackSegment::new();
    segment.points.extend(path.iter().map(to_waypoint));
    track.segments.push(segment);
    gpx.tracks.push(track);

    let mut buffer = Vec::new();
    gpx::write(&gpx, &mut buffer)?;
    Ok(BASE64.encode(buffer))
}

fn to_waypoint(coord: &Coordinate) -> Waypoint {
    Waypoint::new(Point::new(coord.lng, coord.lat))
}
