// eos_core/src/frames.rs
//
// Pose composition over the [px, py, pz, qw, qx, qy, qz] layout, with the
// analytic Jacobians the sensor binding places against the filter state.
// The math works on raw quaternion components (no renormalisation), so the
// Jacobians are exact derivatives of the composition as written.

use crate::types::{PoseMatrix, PoseVector};
use nalgebra::{Matrix3, Matrix4, SMatrix, Vector3, Vector4};

/// The identity pose: zero translation, unit quaternion.
pub fn identity_pose() -> PoseVector {
    let mut pose = PoseVector::zeros();
    pose[3] = 1.0;
    pose
}

fn position_of(pose: &PoseVector) -> Vector3<f64> {
    Vector3::new(pose[0], pose[1], pose[2])
}

fn quaternion_of(pose: &PoseVector) -> Vector4<f64> {
    Vector4::new(pose[3], pose[4], pose[5], pose[6])
}

/// Rotation matrix of the quaternion (a, b, c, d) = (w, x, y, z).
fn rotation_matrix(q: &Vector4<f64>) -> Matrix3<f64> {
    let (a, b, c, d) = (q[0], q[1], q[2], q[3]);
    Matrix3::new(
        a * a + b * b - c * c - d * d,
        2.0 * (b * c - a * d),
        2.0 * (b * d + a * c),
        2.0 * (b * c + a * d),
        a * a - b * b + c * c - d * d,
        2.0 * (c * d - a * b),
        2.0 * (b * d - a * c),
        2.0 * (c * d + a * b),
        a * a - b * b - c * c + d * d,
    )
}

/// Jacobian of `R(q) v` with respect to the four quaternion components.
fn rotate_by_dq(q: &Vector4<f64>, v: &Vector3<f64>) -> SMatrix<f64, 3, 4> {
    let (a, b, c, d) = (q[0], q[1], q[2], q[3]);
    let (vx, vy, vz) = (v[0], v[1], v[2]);
    SMatrix::<f64, 3, 4>::new(
        2.0 * (a * vx - d * vy + c * vz),
        2.0 * (b * vx + c * vy + d * vz),
        2.0 * (-c * vx + b * vy + a * vz),
        2.0 * (-d * vx - a * vy + b * vz),
        2.0 * (d * vx + a * vy - b * vz),
        2.0 * (c * vx - b * vy - a * vz),
        2.0 * (b * vx + c * vy + d * vz),
        2.0 * (a * vx - d * vy + c * vz),
        2.0 * (-c * vx + b * vy + a * vz),
        2.0 * (d * vx + a * vy - b * vz),
        2.0 * (-a * vx + d * vy - c * vz),
        2.0 * (b * vx + c * vy + d * vz),
    )
}

/// Hamilton product `p * q` over (w, x, y, z) component vectors.
fn quaternion_product(p: &Vector4<f64>, q: &Vector4<f64>) -> Vector4<f64> {
    Vector4::new(
        p[0] * q[0] - p[1] * q[1] - p[2] * q[2] - p[3] * q[3],
        p[0] * q[1] + p[1] * q[0] + p[2] * q[3] - p[3] * q[2],
        p[0] * q[2] - p[1] * q[3] + p[2] * q[0] + p[3] * q[1],
        p[0] * q[3] + p[1] * q[2] - p[2] * q[1] + p[3] * q[0],
    )
}

/// Jacobian of `p * q` with respect to `p` (the right-multiplication matrix
/// of `q`).
fn product_by_dleft(q: &Vector4<f64>) -> Matrix4<f64> {
    let (w, x, y, z) = (q[0], q[1], q[2], q[3]);
    Matrix4::new(
        w, -x, -y, -z, //
        x, w, z, -y, //
        y, -z, w, x, //
        z, y, -x, w,
    )
}

/// Jacobian of `p * q` with respect to `q` (the left-multiplication matrix
/// of `p`).
fn product_by_dright(p: &Vector4<f64>) -> Matrix4<f64> {
    let (w, x, y, z) = (p[0], p[1], p[2], p[3]);
    Matrix4::new(
        w, -x, -y, -z, //
        x, w, -z, y, //
        y, z, w, -x, //
        z, -y, x, w,
    )
}

/// Expresses `offset` (a pose in the `base` frame) in the frame `base` is
/// expressed in: translation rotated and shifted, orientations multiplied.
pub fn compose_frames(base: &PoseVector, offset: &PoseVector) -> PoseVector {
    let qb = quaternion_of(base);
    let position = position_of(base) + rotation_matrix(&qb) * position_of(offset);
    let orientation = quaternion_product(&qb, &quaternion_of(offset));
    let mut global = PoseVector::zeros();
    global.fixed_rows_mut::<3>(0).copy_from(&position);
    global.fixed_rows_mut::<4>(3).copy_from(&orientation);
    global
}

/// `compose_frames` plus the 7x7 Jacobians with respect to each operand.
pub fn compose_frames_with_jacobians(
    base: &PoseVector,
    offset: &PoseVector,
) -> (PoseVector, PoseMatrix, PoseMatrix) {
    let qb = quaternion_of(base);
    let qo = quaternion_of(offset);
    let po = position_of(offset);
    let global = compose_frames(base, offset);

    let mut j_base = PoseMatrix::zeros();
    j_base
        .fixed_view_mut::<3, 3>(0, 0)
        .copy_from(&Matrix3::identity());
    j_base
        .fixed_view_mut::<3, 4>(0, 3)
        .copy_from(&rotate_by_dq(&qb, &po));
    j_base
        .fixed_view_mut::<4, 4>(3, 3)
        .copy_from(&product_by_dleft(&qo));

    let mut j_offset = PoseMatrix::zeros();
    j_offset
        .fixed_view_mut::<3, 3>(0, 0)
        .copy_from(&rotation_matrix(&qb));
    j_offset
        .fixed_view_mut::<4, 4>(3, 3)
        .copy_from(&product_by_dright(&qb));

    (global, j_base, j_offset)
}
