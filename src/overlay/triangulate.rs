//! Ear-clipping triangulation of simple polygons.
//!
//! Produces `3 * (n - 2)` indices into the input vertex list for a simple
//! polygon of `n` vertices, in either winding (detected from the signed
//! area). Degenerate or self-intersecting inputs fall back to a fan from
//! vertex 0, which always yields output (correct only for convex shapes,
//! but the renderer survives it).

use crate::geom::Vec2;

/// Cross-product tolerance below which a corner counts as collinear.
const EPSILON: f64 = 1e-12;

/// Triangulate `vertices` into index triples.
///
/// Fewer than three vertices produce no triangles; exactly three produce
/// the identity triangle.
pub fn triangulate(vertices: &[Vec2]) -> Vec<u32> {
    let n = vertices.len();
    if n < 3 {
        return Vec::new();
    }
    if n == 3 {
        return vec![0, 1, 2];
    }

    let ccw = signed_area_polygon(vertices) > 0.0;

    let mut active: Vec<u32> = (0..n as u32).collect();
    let mut triangles = Vec::with_capacity(3 * (n - 2));

    // Each ear removes one vertex; twice the vertex count of attempts
    // means the polygon is not simple and we bail to the fan.
    let max_iterations = 2 * n;
    let mut iterations = 0;

    while active.len() > 3 && iterations < max_iterations {
        let mut clipped = false;

        for i in 0..active.len() {
            if !is_ear(vertices, &active, i, ccw) {
                continue;
            }

            let prev = if i == 0 { active.len() - 1 } else { i - 1 };
            let next = if i == active.len() - 1 { 0 } else { i + 1 };
            triangles.push(active[prev]);
            triangles.push(active[i]);
            triangles.push(active[next]);
            active.remove(i);

            clipped = true;
            break;
        }

        if !clipped {
            // No ear anywhere: degenerate input. Fan out what remains.
            for i in 1..active.len() - 1 {
                triangles.push(active[0]);
                triangles.push(active[i]);
                triangles.push(active[i + 1]);
            }
            return triangles;
        }

        iterations += 1;
    }

    if active.len() == 3 {
        triangles.push(active[0]);
        triangles.push(active[1]);
        triangles.push(active[2]);
    }

    triangles
}

/// An ear is a convex corner whose triangle contains no other active vertex.
fn is_ear(vertices: &[Vec2], active: &[u32], i: usize, ccw: bool) -> bool {
    let n = active.len();
    let prev = if i == 0 { n - 1 } else { i - 1 };
    let next = if i == n - 1 { 0 } else { i + 1 };

    let a = vertices[active[prev] as usize];
    let b = vertices[active[i] as usize];
    let c = vertices[active[next] as usize];

    if !is_convex(a, b, c, ccw) {
        return false;
    }

    for (j, &index) in active.iter().enumerate() {
        if j == prev || j == i || j == next {
            continue;
        }
        if point_in_triangle(vertices[index as usize], a, b, c) {
            return false;
        }
    }
    true
}

fn is_convex(a: Vec2, b: Vec2, c: Vec2, ccw: bool) -> bool {
    let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
    if ccw {
        cross > EPSILON
    } else {
        cross < -EPSILON
    }
}

/// Same-sign barycentric containment (boundary counts as inside).
fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let d1 = signed_area(p, a, b);
    let d2 = signed_area(p, b, c);
    let d3 = signed_area(p, c, a);

    let has_negative = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_positive = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_negative && has_positive)
}

fn signed_area(a: Vec2, b: Vec2, c: Vec2) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Twice the signed area of the polygon; positive for counter-clockwise.
fn signed_area_polygon(vertices: &[Vec2]) -> f64 {
    let mut area = 0.0;
    for i in 0..vertices.len() {
        let j = (i + 1) % vertices.len();
        area += vertices[i].x * vertices[j].y - vertices[j].x * vertices[i].y;
    }
    area
}

// =============================================================================
// Tests
// =============================================================================
