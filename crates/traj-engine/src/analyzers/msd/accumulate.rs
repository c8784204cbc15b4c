use traj_core::geom::Vec3;

/// Per-axis squared displacement between an origin and the current sample.
#[inline]
pub(crate) fn squared_displacement(origin: Vec3, now: Vec3) -> [f64; 3] {
    let d = now.sub(origin);
    [d.x * d.x, d.y * d.y, d.z * d.z]
}

/// Per-axis products `a_x b_x`, `a_y b_y`, `a_z b_z`.
#[inline]
pub(crate) fn dot_components(origin: Vec3, now: Vec3) -> [f64; 3] {
    [origin.x * now.x, origin.y * now.y, origin.z * now.z]
}
