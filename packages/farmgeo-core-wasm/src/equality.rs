//! Geometric equality: two geometries are equal when they cover the same point
//! set, independent of vertex order, ring start, ring orientation and part
//! order, with coordinates compared within a tolerance.

use std::cmp::Ordering;

use geo::{Coord, Geometry, LineString, Polygon, Relate};

use crate::error::ComparisonFailure;
use crate::validity::{first_non_finite, is_valid};

/// Dimension-tagged canonical form of a geometry.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Canonical {
    Points(Vec<Coord<f64>>),
    Lines(Vec<Vec<Coord<f64>>>),
    Polygons(Vec<Vec<Vec<Coord<f64>>>>),
}

/// Confirm the equality predicate can be evaluated on `geometry`.
pub fn check_comparable(geometry: &Geometry<f64>) -> Result<(), ComparisonFailure> {
    if let Geometry::GeometryCollection(_) = geometry {
        return Err(ComparisonFailure::UnsupportedType("GeometryCollection"));
    }
    if let Some(c) = first_non_finite(geometry) {
        return Err(ComparisonFailure::NonFiniteCoordinate { x: c.x, y: c.y });
    }
    Ok(())
}

/// Symmetric geometric equality.
pub fn geometries_equal(
    a: &Geometry<f64>,
    b: &Geometry<f64>,
    tolerance: f64,
) -> Result<bool, ComparisonFailure> {
    check_comparable(a)?;
    check_comparable(b)?;

    let ca = canonicalize(a);
    let cb = canonicalize(b);
    // The exact canonical order can split coordinates that sit within the tolerance,
    // so a miss there falls through to pairwise matching.
    if canonical_eq(&ca, &cb, tolerance) || tolerant_eq(&ca, &cb, tolerance) {
        return Ok(true);
    }
    if std::mem::discriminant(&ca) != std::mem::discriminant(&cb) || ca.is_empty() || cb.is_empty() {
        return Ok(false);
    }

    // Same point set written with different vertices, e.g. an extra collinear vertex.
    // Relate is only trusted on valid input.
    if is_valid(a) && is_valid(b) {
        return Ok(a.relate(b).is_equal_topo());
    }
    Ok(false)
}

impl Canonical {
    fn is_empty(&self) -> bool {
        match self {
            Canonical::Points(p) => p.is_empty(),
            Canonical::Lines(l) => l.is_empty(),
            Canonical::Polygons(p) => p.is_empty(),
        }
    }
}

pub(crate) fn canonicalize(geometry: &Geometry<f64>) -> Canonical {
    match geometry {
        Geometry::Point(p) => Canonical::Points(vec![p.0]),
        Geometry::MultiPoint(mp) => {
            let mut coords: Vec<Coord<f64>> = mp.0.iter().map(|p| p.0).collect();
            coords.sort_by(cmp_coord);
            coords.dedup();
            Canonical::Points(coords)
        }
        Geometry::Line(line) => Canonical::Lines(vec![canonical_path(&[line.start, line.end])]),
        Geometry::LineString(ls) => Canonical::Lines(canonical_lines(std::slice::from_ref(ls))),
        Geometry::MultiLineString(mls) => Canonical::Lines(canonical_lines(&mls.0)),
        Geometry::Polygon(poly) => Canonical::Polygons(canonical_polygons(std::slice::from_ref(poly))),
        Geometry::MultiPolygon(mp) => Canonical::Polygons(canonical_polygons(&mp.0)),
        Geometry::Rect(rect) => Canonical::Polygons(canonical_polygons(&[rect.to_polygon()])),
        Geometry::Triangle(tri) => Canonical::Polygons(canonical_polygons(&[tri.to_polygon()])),
        // Rejected by check_comparable before we get here
        Geometry::GeometryCollection(_) => Canonical::Points(Vec::new()),
    }
}

fn canonical_lines(lines: &[LineString<f64>]) -> Vec<Vec<Coord<f64>>> {
    let mut parts: Vec<Vec<Coord<f64>>> = lines
        .iter()
        .filter(|ls| !ls.0.is_empty())
        .map(|ls| canonical_path(&ls.0))
        .collect();
    parts.sort_by(|a, b| cmp_seq(a, b));
    parts
}

fn canonical_polygons(polygons: &[Polygon<f64>]) -> Vec<Vec<Vec<Coord<f64>>>> {
    let mut parts: Vec<Vec<Vec<Coord<f64>>>> = polygons
        .iter()
        .filter(|p| !p.exterior().0.is_empty())
        .map(|p| {
            let mut holes: Vec<Vec<Coord<f64>>> = p.interiors().iter().map(canonical_ring).collect();
            holes.sort_by(|a, b| cmp_seq(a, b));
            let mut rings = Vec::with_capacity(holes.len() + 1);
            rings.push(canonical_ring(p.exterior()));
            rings.extend(holes);
            rings
        })
        .collect();
    parts.sort_by(|a, b| cmp_rings(a, b));
    parts
}

// Open path: drop consecutive repeats, then pick the smaller of the two directions.
fn canonical_path(coords: &[Coord<f64>]) -> Vec<Coord<f64>> {
    let mut path = coords.to_vec();
    path.dedup();
    let mut reversed = path.clone();
    reversed.reverse();
    if cmp_seq(&reversed, &path) == Ordering::Less {
        reversed
    } else {
        path
    }
}

// Closed ring: drop the closing point and repeats, then pick the smallest rotation
// over both orientations.
fn canonical_ring(ring: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut coords = ring.0.clone();
    coords.dedup();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    if coords.is_empty() {
        return coords;
    }

    let mut reversed = coords.clone();
    reversed.reverse();

    let mut best: Option<Vec<Coord<f64>>> = None;
    for candidate in [coords, reversed] {
        for shift in 0..candidate.len() {
            let mut rotated = candidate.clone();
            rotated.rotate_left(shift);
            let better = match &best {
                Some(current) => cmp_seq(&rotated, current) == Ordering::Less,
                None => true,
            };
            if better {
                best = Some(rotated);
            }
        }
    }
    best.unwrap_or_default()
}

fn cmp_coord(a: &Coord<f64>, b: &Coord<f64>) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}

fn cmp_seq(a: &[Coord<f64>], b: &[Coord<f64>]) -> Ordering {
    for (ca, cb) in a.iter().zip(b) {
        let ord = cmp_coord(ca, cb);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn cmp_rings(a: &[Vec<Coord<f64>>], b: &[Vec<Coord<f64>>]) -> Ordering {
    for (ra, rb) in a.iter().zip(b) {
        let ord = cmp_seq(ra, rb);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn canonical_eq(a: &Canonical, b: &Canonical, tolerance: f64) -> bool {
    match (a, b) {
        (Canonical::Points(pa), Canonical::Points(pb)) => seq_eq(pa, pb, tolerance),
        (Canonical::Lines(la), Canonical::Lines(lb)) => {
            la.len() == lb.len() && la.iter().zip(lb).all(|(x, y)| seq_eq(x, y, tolerance))
        }
        (Canonical::Polygons(pa), Canonical::Polygons(pb)) => {
            pa.len() == pb.len()
                && pa.iter().zip(pb).all(|(ra, rb)| {
                    ra.len() == rb.len() && ra.iter().zip(rb).all(|(x, y)| seq_eq(x, y, tolerance))
                })
        }
        _ => false,
    }
}

fn coord_eq(a: &Coord<f64>, b: &Coord<f64>, tolerance: f64) -> bool {
    (a.x - b.x).abs() <= tolerance && (a.y - b.y).abs() <= tolerance
}

fn seq_eq(a: &[Coord<f64>], b: &[Coord<f64>], tolerance: f64) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(ca, cb)| coord_eq(ca, cb, tolerance))
}

fn tolerant_eq(a: &Canonical, b: &Canonical, tolerance: f64) -> bool {
    match (a, b) {
        (Canonical::Points(pa), Canonical::Points(pb)) => {
            covers(pa, pb, tolerance) && covers(pb, pa, tolerance)
        }
        (Canonical::Lines(la), Canonical::Lines(lb)) => match_parts(la, lb, |x, y| path_eq(x, y, tolerance)),
        (Canonical::Polygons(pa), Canonical::Polygons(pb)) => {
            match_parts(pa, pb, |x, y| polygon_eq(x, y, tolerance))
        }
        _ => false,
    }
}

// Every point of `a` has a counterpart in `b`
fn covers(a: &[Coord<f64>], b: &[Coord<f64>], tolerance: f64) -> bool {
    a.iter().all(|ca| b.iter().any(|cb| coord_eq(ca, cb, tolerance)))
}

// Greedy one-to-one pairing of parts (or holes)
fn match_parts<T>(a: &[T], b: &[T], eq: impl Fn(&T, &T) -> bool) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|part| {
        match (0..b.len()).find(|&j| !used[j] && eq(part, &b[j])) {
            Some(j) => {
                used[j] = true;
                true
            }
            None => false,
        }
    })
}

fn path_eq(a: &[Coord<f64>], b: &[Coord<f64>], tolerance: f64) -> bool {
    seq_eq(a, b, tolerance)
        || (a.len() == b.len() && a.iter().zip(b.iter().rev()).all(|(ca, cb)| coord_eq(ca, cb, tolerance)))
}

// Rings without their closing point: any rotation of `b`, in either orientation.
fn ring_eq(a: &[Coord<f64>], b: &[Coord<f64>], tolerance: f64) -> bool {
    let n = a.len();
    if n != b.len() {
        return false;
    }
    if n == 0 {
        return true;
    }
    (0..n).any(|shift| {
        (0..n).all(|i| coord_eq(&a[i], &b[(shift + i) % n], tolerance))
            || (0..n).all(|i| coord_eq(&a[i], &b[(shift + n - i) % n], tolerance))
    })
}

// Shell first, then holes in any order
fn polygon_eq(a: &[Vec<Coord<f64>>], b: &[Vec<Coord<f64>>], tolerance: f64) -> bool {
    match (a.split_first(), b.split_first()) {
        (Some((shell_a, holes_a)), Some((shell_b, holes_b))) => {
            ring_eq(shell_a, shell_b, tolerance)
                && match_parts(holes_a, holes_b, |x, y| ring_eq(x, y, tolerance))
        }
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon, GeometryCollection, MultiPoint, MultiPolygon};

    const TOL: f64 = 1e-9;

    fn square() -> Polygon<f64> {
        polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)]
    }

    #[test]
    fn ring_rotation_and_orientation_do_not_matter() {
        let rotated = polygon![(x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0), (x: 1.0, y: 0.0)];
        let clockwise = polygon![(x: 0.0, y: 0.0), (x: 0.0, y: 1.0), (x: 1.0, y: 1.0), (x: 1.0, y: 0.0)];
        let base = Geometry::Polygon(square());
        assert!(geometries_equal(&base, &Geometry::Polygon(rotated), TOL).unwrap());
        assert!(geometries_equal(&base, &Geometry::Polygon(clockwise), TOL).unwrap());
    }

    #[test]
    fn coordinates_within_tolerance_are_equal() {
        let nudged = polygon![(x: 0.0, y: 0.0), (x: 1.0 + 1e-12, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let moved = polygon![(x: 0.0, y: 0.0), (x: 1.1, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let base = Geometry::Polygon(square());
        assert!(geometries_equal(&base, &Geometry::Polygon(nudged), TOL).unwrap());
        assert!(!geometries_equal(&base, &Geometry::Polygon(moved), TOL).unwrap());
    }

    #[test]
    fn nudging_the_smallest_vertex_stays_equal() {
        let nudged = polygon![(x: 1e-12, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let a = Geometry::Polygon(square());
        let b = Geometry::Polygon(nudged);
        assert!(geometries_equal(&a, &b, TOL).unwrap());
        assert!(geometries_equal(&b, &a, TOL).unwrap());
    }

    #[test]
    fn holes_match_in_any_order_within_tolerance() {
        let a = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [
                [(x: 1.0, y: 1.0), (x: 2.0, y: 1.0), (x: 2.0, y: 2.0), (x: 1.0, y: 2.0)],
                [(x: 1.0, y: 5.0), (x: 2.0, y: 5.0), (x: 2.0, y: 6.0), (x: 1.0, y: 6.0)],
            ],
        );
        let b = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [
                [(x: 1.0, y: 5.0), (x: 2.0, y: 5.0), (x: 2.0, y: 6.0), (x: 1.0, y: 6.0)],
                [(x: 1.0 - 1e-12, y: 1.0), (x: 2.0, y: 1.0), (x: 2.0, y: 2.0), (x: 1.0, y: 2.0)],
            ],
        );
        assert!(geometries_equal(&Geometry::Polygon(a), &Geometry::Polygon(b), TOL).unwrap());
    }

    #[test]
    fn extra_collinear_vertex_is_still_equal() {
        let with_midpoint = polygon![
            (x: 0.0, y: 0.0), (x: 0.5, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)
        ];
        let a = Geometry::Polygon(square());
        let b = Geometry::Polygon(with_midpoint);
        assert!(geometries_equal(&a, &b, TOL).unwrap());
        assert!(geometries_equal(&b, &a, TOL).unwrap());
    }

    #[test]
    fn single_part_multi_equals_its_part() {
        let mp = Geometry::MultiPolygon(MultiPolygon::new(vec![square()]));
        assert!(geometries_equal(&Geometry::Polygon(square()), &mp, TOL).unwrap());
    }

    #[test]
    fn reversed_line_is_equal() {
        let a = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 2.0), (x: 3.0, y: 3.0)];
        let mut b = a.clone();
        b.0.reverse();
        assert!(geometries_equal(&Geometry::LineString(a), &Geometry::LineString(b), TOL).unwrap());
    }

    #[test]
    fn multipoint_is_a_set() {
        let a = MultiPoint::new(vec![point!(x: 1.0, y: 1.0), point!(x: 2.0, y: 2.0)]);
        let b = MultiPoint::new(vec![point!(x: 2.0, y: 2.0), point!(x: 1.0, y: 1.0), point!(x: 2.0, y: 2.0)]);
        assert!(geometries_equal(&Geometry::MultiPoint(a), &Geometry::MultiPoint(b), TOL).unwrap());
    }

    #[test]
    fn different_dimensions_are_not_equal() {
        let p = Geometry::Point(point!(x: 0.0, y: 0.0));
        let ls = Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 0.0, y: 0.0)]);
        assert!(!geometries_equal(&p, &ls, TOL).unwrap());
    }

    #[test]
    fn collections_cannot_be_compared() {
        let gc = Geometry::GeometryCollection(GeometryCollection::new_from(vec![]));
        let p = Geometry::Point(point!(x: 0.0, y: 0.0));
        assert_eq!(
            geometries_equal(&p, &gc, TOL),
            Err(ComparisonFailure::UnsupportedType("GeometryCollection"))
        );
    }

    #[test]
    fn equality_is_symmetric() {
        let shapes = vec![
            Geometry::Polygon(square()),
            Geometry::MultiPolygon(MultiPolygon::new(vec![square()])),
            Geometry::Point(point!(x: 0.0, y: 0.0)),
            Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]),
        ];
        for a in &shapes {
            for b in &shapes {
                assert_eq!(
                    geometries_equal(a, b, TOL).unwrap(),
                    geometries_equal(b, a, TOL).unwrap()
                );
            }
        }
    }
}
