//! Seeded synthetic peptide trajectories.
//!
//! A backbone-only poly-alanine chain (`N`, `CA`, `C` per residue) whose
//! per-residue (φ, ψ) pairs hop between a helical and an extended basin:
//!
//! - each residue follows its own sticky two-state Markov chain
//! - angles are the basin centre plus Gaussian noise
//! - ω is fixed at 180° (trans peptide bonds)
//!
//! Coordinates are built from internal coordinates with ideal bond lengths and
//! angles, so the featurizer recovers exactly the sampled torsions.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::error::AppError;
use crate::io::{Frame, Topology, TopologyAtom};
use crate::math::{place_atom, wrap_angle};

/// Backbone bond lengths (Å).
const BOND_N_CA: f64 = 1.458;
const BOND_CA_C: f64 = 1.525;
const BOND_C_N: f64 = 1.329;

/// Backbone bond angles (degrees).
const ANGLE_N_CA_C: f64 = 111.2;
const ANGLE_CA_C_N: f64 = 116.2;
const ANGLE_C_N_CA: f64 = 121.7;

/// Basin centres (φ, ψ) in degrees.
const HELIX: (f64, f64) = (-60.0, -45.0);
const SHEET: (f64, f64) = (-120.0, 130.0);

/// Generator parameters.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub n_trajectories: usize,
    pub n_frames: usize,
    pub n_residues: usize,
    pub seed: u64,
    /// Per-frame probability that a residue switches basin.
    pub switch_prob: f64,
    /// Standard deviation of the angular noise, degrees.
    pub noise_deg: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_trajectories: 4,
            n_frames: 1000,
            n_residues: 22,
            seed: 42,
            switch_prob: 0.02,
            noise_deg: 12.0,
        }
    }
}

/// One generated trajectory plus the torsions it was built from.
#[derive(Debug, Clone)]
pub struct SyntheticTrajectory {
    pub frames: Vec<Frame>,
    /// Per frame, per residue `(φ, ψ)` in radians.
    pub torsions: Vec<Vec<(f64, f64)>>,
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.n_trajectories == 0 || self.n_frames == 0 {
            return Err(AppError::argument("Synthetic dataset needs at least one trajectory and one frame."));
        }
        if self.n_residues < 3 {
            return Err(AppError::argument("Synthetic peptide needs at least 3 residues."));
        }
        if !(0.0..=1.0).contains(&self.switch_prob) {
            return Err(AppError::argument("Switch probability must lie in [0, 1]."));
        }
        if !(self.noise_deg.is_finite() && self.noise_deg >= 0.0) {
            return Err(AppError::argument("Angular noise must be a non-negative number."));
        }
        Ok(())
    }

    /// Seed of trajectory `index`.
    fn trajectory_seed(&self, index: usize) -> u64 {
        self.seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(index as u64)
    }
}

/// Backbone topology: residues `1..=n`, chain `A`, atoms `N`, `CA`, `C`.
pub fn peptide_topology(n_residues: usize) -> Topology {
    let atoms = (1..=n_residues)
        .flat_map(|r| {
            ["N", "CA", "C"].map(|name| TopologyAtom {
                name: name.to_string(),
                residue_name: "ALA".to_string(),
                residue_seq: r as i32,
                chain_id: 'A',
            })
        })
        .collect();
    Topology { atoms }
}

/// Cartesian backbone for the given per-residue torsions (radians).
///
/// `φ` of the first residue and `ψ` of the last are undefined and ignored.
pub fn build_backbone(torsions: &[(f64, f64)]) -> Frame {
    let omega = std::f64::consts::PI;
    let mut frame: Frame = Vec::with_capacity(3 * torsions.len());

    let n0 = [0.0, 0.0, 0.0];
    let ca0 = [BOND_N_CA, 0.0, 0.0];
    let c0 = place_atom([0.0, 1.0, 0.0], n0, ca0, BOND_CA_C, ANGLE_N_CA_C.to_radians(), 0.0);
    frame.extend([n0, ca0, c0]);

    for i in 1..torsions.len() {
        let [n_prev, ca_prev, c_prev] = [frame[3 * i - 3], frame[3 * i - 2], frame[3 * i - 1]];
        let psi_prev = torsions[i - 1].1;
        let phi = torsions[i].0;

        let n = place_atom(n_prev, ca_prev, c_prev, BOND_C_N, ANGLE_CA_C_N.to_radians(), psi_prev);
        let ca = place_atom(ca_prev, c_prev, n, BOND_N_CA, ANGLE_C_N_CA.to_radians(), omega);
        let c = place_atom(c_prev, n, ca, BOND_CA_C, ANGLE_N_CA_C.to_radians(), phi);
        frame.extend([n, ca, c]);
    }
    frame
}

/// Generate one trajectory.
pub fn generate_trajectory(config: &SyntheticConfig, index: usize) -> Result<SyntheticTrajectory, AppError> {
    let mut rng = StdRng::seed_from_u64(config.trajectory_seed(index));
    let noise = Normal::new(0.0, config.noise_deg.to_radians())
        .map_err(|e| AppError::numerical(format!("Noise distribution error: {e}")))?;

    let mut helical: Vec<bool> = (0..config.n_residues).map(|_| rng.gen_bool(0.5)).collect();
    let mut frames = Vec::with_capacity(config.n_frames);
    let mut torsions = Vec::with_capacity(config.n_frames);

    for _ in 0..config.n_frames {
        let angles: Vec<(f64, f64)> = helical
            .iter()
            .map(|&h| {
                let (phi, psi) = if h { HELIX } else { SHEET };
                (
                    wrap_angle(phi.to_radians() + noise.sample(&mut rng)),
                    wrap_angle(psi.to_radians() + noise.sample(&mut rng)),
                )
            })
            .collect();
        frames.push(build_backbone(&angles));
        torsions.push(angles);

        for h in helical.iter_mut() {
            if rng.gen_bool(config.switch_prob) {
                *h = !*h;
            }
        }
    }

    Ok(SyntheticTrajectory { frames, torsions })
}

/// Reference structure written as the topology file (ideal helix).
pub fn reference_frame(n_residues: usize) -> Frame {
    let helix = (HELIX.0.to_radians(), HELIX.1.to_radians());
    build_backbone(&vec![helix; n_residues])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DihedralType;
    use crate::featurize::build_dihedrals;
    use crate::math::dihedral;

    fn small() -> SyntheticConfig {
        SyntheticConfig {
            n_trajectories: 1,
            n_frames: 20,
            n_residues: 5,
            ..SyntheticConfig::default()
        }
    }

    fn angle_diff(a: f64, b: f64) -> f64 {
        wrap_angle(a - b).abs()
    }

    #[test]
    fn measured_dihedrals_match_generated_torsions() {
        let config = small();
        let traj = generate_trajectory(&config, 0).unwrap();
        let top = peptide_topology(config.n_residues);
        let phi = build_dihedrals(&top, &[DihedralType::Phi]);
        let psi = build_dihedrals(&top, &[DihedralType::Psi]);
        assert_eq!(phi.len(), 4);
        assert_eq!(psi.len(), 4);

        for (frame, torsions) in traj.frames.iter().zip(&traj.torsions) {
            for d in &phi {
                let [a, b, c, e] = d.atoms;
                let r = (d.residue - 1) as usize;
                let measured = dihedral(frame[a], frame[b], frame[c], frame[e]);
                assert!(angle_diff(measured, torsions[r].0) < 1e-9);
            }
            for d in &psi {
                let [a, b, c, e] = d.atoms;
                let r = (d.residue - 1) as usize;
                let measured = dihedral(frame[a], frame[b], frame[c], frame[e]);
                assert!(angle_diff(measured, torsions[r].1) < 1e-9);
            }
        }
    }

    #[test]
    fn bond_lengths_are_ideal() {
        let frame = reference_frame(4);
        let dist = |a: [f64; 3], b: [f64; 3]| ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt();
        assert!((dist(frame[0], frame[1]) - BOND_N_CA).abs() < 1e-9);
        assert!((dist(frame[1], frame[2]) - BOND_CA_C).abs() < 1e-9);
        assert!((dist(frame[2], frame[3]) - BOND_C_N).abs() < 1e-9);
    }

    #[test]
    fn same_seed_same_trajectory() {
        let config = small();
        let a = generate_trajectory(&config, 1).unwrap();
        let b = generate_trajectory(&config, 1).unwrap();
        let c = generate_trajectory(&config, 2).unwrap();
        assert_eq!(a.frames, b.frames);
        assert_ne!(a.frames, c.frames);
    }

    #[test]
    fn invalid_sizes_are_rejected() {
        let mut config = small();
        config.n_residues = 2;
        assert!(config.validate().is_err());
        config.n_residues = 5;
        config.n_frames = 0;
        assert!(config.validate().is_err());
    }
}
