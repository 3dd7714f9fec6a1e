//! Simple-feature validity checks for uploaded geometries.
//!
//! `geo_types` closes polygon rings on construction, so an unclosed ring in the
//! uploaded file is rejected while decoding (see `geojson_features`). The ring
//! closure check below still guards geometries built by other means.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::coordinate_position::{CoordPos, CoordinatePosition};
use geo::dimensions::Dimensions;
use geo::{BoundingRect, Coord, CoordsIter, Geometry, Intersects, Line, LineString, MultiPolygon, Polygon, Relate};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidReason {
    #[error("non-finite coordinate ({x}, {y})")]
    NonFiniteCoordinate { x: f64, y: f64 },

    #[error("too few distinct points")]
    TooFewPoints,

    #[error("polygon ring is not closed")]
    RingNotClosed,

    #[error("ring self-intersects near ({x}, {y})")]
    SelfIntersection { x: f64, y: f64 },

    #[error("hole lies outside the shell")]
    HoleOutsideShell,

    #[error("hole crosses the shell or another hole")]
    RingsCross,

    #[error("hole is nested inside another hole")]
    NestedHoles,

    #[error("multipolygon members {0} and {1} overlap")]
    OverlappingPolygons(usize, usize),

    #[error("multipolygon members {0} and {1} share an edge")]
    SharedEdge(usize, usize),
}

/// True when the geometry satisfies the simple-feature validity rules.
pub fn is_valid(geometry: &Geometry<f64>) -> bool {
    validate(geometry).is_ok()
}

/// Check a geometry, reporting the first problem found.
pub fn validate(geometry: &Geometry<f64>) -> Result<(), InvalidReason> {
    if let Some(c) = first_non_finite(geometry) {
        return Err(InvalidReason::NonFiniteCoordinate { x: c.x, y: c.y });
    }

    match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => Ok(()),
        Geometry::Line(line) => validate_line_string(&LineString::from(*line)),
        Geometry::LineString(ls) => validate_line_string(ls),
        Geometry::MultiLineString(mls) => mls.0.iter().try_for_each(validate_line_string),
        Geometry::Polygon(poly) => validate_polygon(poly),
        Geometry::MultiPolygon(mp) => validate_multi_polygon(mp),
        Geometry::Rect(rect) => validate_polygon(&rect.to_polygon()),
        Geometry::Triangle(tri) => validate_polygon(&tri.to_polygon()),
        Geometry::GeometryCollection(gc) => gc.0.iter().try_for_each(validate),
    }
}

pub(crate) fn first_non_finite(geometry: &Geometry<f64>) -> Option<Coord<f64>> {
    geometry
        .coords_iter()
        .find(|c| !c.x.is_finite() || !c.y.is_finite())
}

fn validate_line_string(ls: &LineString<f64>) -> Result<(), InvalidReason> {
    if ls.0.is_empty() {
        return Ok(());
    }
    if distinct_point_count(&ls.0) < 2 {
        return Err(InvalidReason::TooFewPoints);
    }
    Ok(())
}

fn validate_polygon(poly: &Polygon<f64>) -> Result<(), InvalidReason> {
    let shell = poly.exterior();
    if shell.0.is_empty() {
        return if poly.interiors().is_empty() {
            Ok(())
        } else {
            Err(InvalidReason::HoleOutsideShell)
        };
    }

    validate_ring(shell)?;
    for hole in poly.interiors() {
        validate_ring(hole)?;
    }

    let shell_area = Polygon::new(shell.clone(), vec![]);
    for (i, hole) in poly.interiors().iter().enumerate() {
        if hole
            .coords()
            .any(|c| shell_area.coordinate_position(c) == CoordPos::Outside)
        {
            return Err(InvalidReason::HoleOutsideShell);
        }
        if rings_cross(shell, hole) {
            return Err(InvalidReason::RingsCross);
        }

        for other in poly.interiors().iter().skip(i + 1) {
            if rings_cross(hole, other) {
                return Err(InvalidReason::RingsCross);
            }
            if ring_inside(hole, other) || ring_inside(other, hole) {
                return Err(InvalidReason::NestedHoles);
            }
        }
    }

    Ok(())
}

fn validate_multi_polygon(mp: &MultiPolygon<f64>) -> Result<(), InvalidReason> {
    for poly in &mp.0 {
        validate_polygon(poly)?;
    }

    for (i, a) in mp.0.iter().enumerate() {
        for (j, b) in mp.0.iter().enumerate().skip(i + 1) {
            let bboxes_meet = match (a.bounding_rect(), b.bounding_rect()) {
                (Some(ra), Some(rb)) => ra.intersects(&rb),
                _ => false,
            };
            if !bboxes_meet {
                continue;
            }
            let matrix = a.relate(b);
            if matrix.is_intersects() && !matrix.is_touches() {
                return Err(InvalidReason::OverlappingPolygons(i, j));
            }
            // Members may only touch at points
            if matrix.get(CoordPos::OnBoundary, CoordPos::OnBoundary) == Dimensions::OneDimensional {
                return Err(InvalidReason::SharedEdge(i, j));
            }
        }
    }

    Ok(())
}

fn validate_ring(ring: &LineString<f64>) -> Result<(), InvalidReason> {
    if ring.0.len() < 4 {
        return Err(InvalidReason::TooFewPoints);
    }
    if !ring.is_closed() {
        return Err(InvalidReason::RingNotClosed);
    }
    if distinct_point_count(&ring.0) < 3 {
        return Err(InvalidReason::TooFewPoints);
    }

    let segments = non_degenerate_segments(ring);
    let n = segments.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(segments[i], segments[j]) {
                None => {}
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    return Err(InvalidReason::SelfIntersection {
                        x: intersection.x,
                        y: intersection.y,
                    });
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    return Err(InvalidReason::SelfIntersection {
                        x: intersection.start.x,
                        y: intersection.start.y,
                    });
                }
            }
        }
    }

    Ok(())
}

// Rings may touch at isolated points but never cross or share an edge.
fn rings_cross(a: &LineString<f64>, b: &LineString<f64>) -> bool {
    let segs_a = non_degenerate_segments(a);
    let segs_b = non_degenerate_segments(b);
    segs_a.iter().any(|sa| {
        segs_b.iter().any(|sb| {
            matches!(
                line_intersection(*sa, *sb),
                Some(LineIntersection::SinglePoint { is_proper: true, .. })
                    | Some(LineIntersection::Collinear { .. })
            )
        })
    })
}

fn ring_inside(inner: &LineString<f64>, outer: &LineString<f64>) -> bool {
    let area = Polygon::new(outer.clone(), vec![]);
    inner
        .coords()
        .any(|c| area.coordinate_position(c) == CoordPos::Inside)
}

fn non_degenerate_segments(ring: &LineString<f64>) -> Vec<Line<f64>> {
    ring.lines().filter(|l| l.start != l.end).collect()
}

fn distinct_point_count(coords: &[Coord<f64>]) -> usize {
    let mut sorted: Vec<Coord<f64>> = coords.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup();
    sorted.len()
}
