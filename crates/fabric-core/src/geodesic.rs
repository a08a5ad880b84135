//! Geodesic subdivision of the icosahedron.
//!
//! Every icosahedron face is split into a triangular lattice of the given
//! frequency and the lattice points are pushed out to the unit sphere.
//! Points on shared edges and corners are keyed by their barycentric
//! weights over corner indices, so neighbouring faces agree on them.

use glam::DVec3;
use std::collections::{BTreeMap, BTreeSet};

/// One sphere vertex and its neighbours, wound counter-clockwise seen from
/// outside.
#[derive(Debug, Clone)]
pub(crate) struct Vertex {
    pub location: DVec3,
    pub nearby: Vec<usize>,
}

/// Lattice weights per icosahedron corner, zero weights dropped.
type Key = Vec<(usize, usize)>;

/// Unit geodesic sphere with `10 f² + 2` vertices and `30 f²` edges. The
/// twelve icosahedron corners come first and have five neighbours.
pub(crate) fn sphere(frequency: usize) -> Vec<Vertex> {
    let frequency = frequency.max(1);
    let corners = icosahedron();
    let mut index: BTreeMap<Key, usize> = BTreeMap::new();
    let mut locations: Vec<DVec3> = Vec::new();
    for (walk, corner) in corners.iter().enumerate() {
        index.insert(vec![(walk, frequency)], walk);
        locations.push(corner.normalize());
    }

    let mut edges: BTreeSet<(usize, usize)> = BTreeSet::new();
    for face in faces(&corners) {
        let mut point = |i: usize, j: usize| {
            let weights = [i, j, frequency - i - j];
            let mut key: Key = face
                .iter()
                .zip(weights)
                .filter(|(_, weight)| *weight > 0)
                .map(|(corner, weight)| (*corner, weight))
                .collect();
            key.sort_unstable();
            *index.entry(key).or_insert_with(|| {
                let sum = face
                    .iter()
                    .zip(weights)
                    .fold(DVec3::ZERO, |sum, (corner, weight)| sum + corners[*corner] * weight as f64);
                locations.push(sum.normalize());
                locations.len() - 1
            })
        };
        for i in 0..frequency {
            for j in 0..frequency - i {
                let here = point(i, j);
                let up = point(i + 1, j);
                let across = point(i, j + 1);
                for (a, b) in [(here, up), (here, across), (up, across)] {
                    edges.insert((a.min(b), a.max(b)));
                }
            }
        }
    }

    let mut vertices: Vec<Vertex> = locations
        .into_iter()
        .map(|location| Vertex {
            location,
            nearby: Vec::new(),
        })
        .collect();
    for (a, b) in edges {
        vertices[a].nearby.push(b);
        vertices[b].nearby.push(a);
    }
    let snapshot: Vec<DVec3> = vertices.iter().map(|v| v.location).collect();
    for vertex in &mut vertices {
        wind(vertex, &snapshot);
    }
    vertices
}

/// Sort neighbours by angle around the outward normal.
fn wind(vertex: &mut Vertex, locations: &[DVec3]) {
    let normal = vertex.location;
    let Some(&first) = vertex.nearby.first() else {
        return;
    };
    let tangent = |other: usize| {
        let to = locations[other] - normal;
        to - normal * to.dot(normal)
    };
    let u = tangent(first).normalize_or_zero();
    let v = normal.cross(u);
    let angle = |other: usize| {
        let to = tangent(other);
        to.dot(v).atan2(to.dot(u))
    };
    vertex
        .nearby
        .sort_by(|a, b| angle(*a).total_cmp(&angle(*b)));
}

fn icosahedron() -> [DVec3; 12] {
    let phi = (1.0 + 5f64.sqrt()) / 2.0;
    let mut corners = [DVec3::ZERO; 12];
    let mut walk = 0;
    for a in [-1.0, 1.0] {
        for b in [-phi, phi] {
            corners[walk] = DVec3::new(0.0, a, b);
            corners[walk + 1] = DVec3::new(a, b, 0.0);
            corners[walk + 2] = DVec3::new(b, 0.0, a);
            walk += 3;
        }
    }
    corners
}

/// The twenty triangles: triples of corners at edge distance from each
/// other.
fn faces(corners: &[DVec3; 12]) -> Vec<[usize; 3]> {
    // Edges are 2 long before normalising; the next distance is 2φ.
    let adjacent = |a: usize, b: usize| corners[a].distance_squared(corners[b]) < 5.0;
    let mut faces = Vec::with_capacity(20);
    for a in 0..12 {
        for b in a + 1..12 {
            if !adjacent(a, b) {
                continue;
            }
            for c in b + 1..12 {
                if adjacent(a, c) && adjacent(b, c) {
                    faces.push([a, b, c]);
                }
            }
        }
    }
    faces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icosahedron_has_twenty_faces() {
        assert_eq!(faces(&icosahedron()).len(), 20);
    }

    #[test]
    fn counts_follow_the_frequency() {
        for frequency in 1..=4 {
            let vertices = sphere(frequency);
            assert_eq!(vertices.len(), 10 * frequency * frequency + 2);
            let degree: usize = vertices.iter().map(|v| v.nearby.len()).sum();
            assert_eq!(degree, 2 * 30 * frequency * frequency);
            let corners = vertices.iter().filter(|v| v.nearby.len() == 5).count();
            assert_eq!(corners, 12);
        }
    }

    #[test]
    fn vertices_lie_on_the_unit_sphere() {
        for vertex in sphere(3) {
            assert!((vertex.location.length() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn neighbours_wind_around_each_vertex() {
        let vertices = sphere(2);
        for vertex in &vertices {
            let n = vertex.nearby.len();
            for walk in 0..n {
                let a = vertices[vertex.nearby[walk]].location - vertex.location;
                let b = vertices[vertex.nearby[(walk + 1) % n]].location - vertex.location;
                assert!(a.cross(b).dot(vertex.location) > 0.0);
            }
        }
    }
}
