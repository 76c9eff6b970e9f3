//! Torsion geometry.
//!
//! - `dihedral` measures the IUPAC torsion angle of four points, in radians,
//!   in `(-π, π]`.
//! - `place_atom` is the inverse: given three placed atoms and internal
//!   coordinates (bond length, bond angle, torsion) it returns the fourth
//!   (natural extension reference frame).

use nalgebra::Vector3;

/// Torsion angle `p0-p1-p2-p3` in radians.
pub fn dihedral(p0: [f64; 3], p1: [f64; 3], p2: [f64; 3], p3: [f64; 3]) -> f64 {
    let p0 = Vector3::from(p0);
    let p1 = Vector3::from(p1);
    let p2 = Vector3::from(p2);
    let p3 = Vector3::from(p3);

    let b1 = p1 - p0;
    let b2 = p2 - p1;
    let b3 = p3 - p2;

    let n1 = b1.cross(&b2);
    let n2 = b2.cross(&b3);

    let y = b2.norm() * b1.dot(&n2);
    let x = n1.dot(&n2);
    y.atan2(x)
}

/// Place atom `d` so that `|cd| = bond`, `∠bcd = angle` and torsion `abcd = torsion`.
///
/// Angles are in radians. `a`, `b`, `c` must not be collinear.
pub fn place_atom(a: [f64; 3], b: [f64; 3], c: [f64; 3], bond: f64, angle: f64, torsion: f64) -> [f64; 3] {
    let a = Vector3::from(a);
    let b = Vector3::from(b);
    let c = Vector3::from(c);

    let bc = (c - b).normalize();
    let n = (b - a).cross(&bc).normalize();
    let m = n.cross(&bc);

    let d = c - bc * (bond * angle.cos())
        + m * (bond * angle.sin() * torsion.cos())
        + n * (bond * angle.sin() * torsion.sin());
    [d.x, d.y, d.z]
}

/// Wrap an angle into `(-π, π]`.
pub fn wrap_angle(theta: f64) -> f64 {
    let two_pi = std::f64::consts::TAU;
    let mut t = theta % two_pi;
    if t <= -std::f64::consts::PI {
        t += two_pi;
    } else if t > std::f64::consts::PI {
        t -= two_pi;
    }
    t
}
