use bevy::math::Vec2;

/// Point where segment `a1 -> a2` meets segment `b1 -> b2`.
///
/// Endpoints count as touching. Parallel or degenerate segments never intersect.
pub fn segment_intersection(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> Option<Vec2> {
    let da = a2 - a1;
    let db = b2 - b1;
    let denom = da.perp_dot(db);

    if denom.abs() < 1e-9 {
        return None;
    }

    let v = b1 - a1;
    let t = v.perp_dot(db) / denom;
    let u = v.perp_dot(da) / denom;

    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(a1 + da * t)
    } else {
        None
    }
}

pub fn segments_intersect(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> bool {
    segment_intersection(a1, a2, b1, b2).is_some()
}

pub fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let ap = p - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-8 {
        return ap.length();
    }
    let t = (ap.dot(ab) / len_sq).clamp(0.0, 1.0);
    (a + ab * t - p).length()
}

/// Elastic reflection of `v` about the unit normal `n`.
pub fn reflect(v: Vec2, n: Vec2) -> Vec2 {
    v - n * (2.0 * v.dot(n))
}

/// Unit normal of a cross line, pointing in the driving direction.
pub fn forward_normal(left: Vec2, right: Vec2) -> Vec2 {
    (left - right).perp().normalize_or_zero()
}

/// Unit heading vector for an angle in radians.
pub fn heading(angle: f32) -> Vec2 {
    Vec2::from_angle(angle)
}
