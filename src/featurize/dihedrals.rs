//! Dihedral definitions derived from a topology.
//!
//! Backbone torsions between residue `i` and its chain neighbours:
//!
//! - `phi(i)   = C(i-1) - N(i) - CA(i) - C(i)`
//! - `psi(i)   = N(i) - CA(i) - C(i) - N(i+1)`
//! - `omega(i) = CA(i) - C(i) - N(i+1) - CA(i+1)`
//! - `alpha(i) = CA(i-1) - CA(i) - CA(i+1) - CA(i+2)`
//!
//! Neighbours must share a chain. A torsion whose atoms are missing (caps,
//! ligands, incomplete residues) is skipped.

use crate::domain::{DihedralSpec, DihedralType};
use crate::io::{Residue, Topology};

/// All dihedrals of the requested types, grouped by type in the given order.
pub fn build_dihedrals(topology: &Topology, types: &[DihedralType]) -> Vec<DihedralSpec> {
    let residues = topology.residues();
    let mut out = Vec::new();
    for &kind in types {
        for i in 0..residues.len() {
            if let Some(atoms) = dihedral_atoms(topology, &residues, i, kind) {
                out.push(DihedralSpec {
                    kind,
                    residue: residues[i].seq,
                    atoms,
                });
            }
        }
    }
    out
}

fn dihedral_atoms(topology: &Topology, residues: &[Residue], i: usize, kind: DihedralType) -> Option<[usize; 4]> {
    let at = |offset: isize, name: &str| -> Option<usize> {
        let j = i.checked_add_signed(offset)?;
        let residue = residues.get(j)?;
        if residue.chain_id != residues[i].chain_id {
            return None;
        }
        topology.atom_in(residue, name)
    };

    match kind {
        DihedralType::Phi => Some([at(-1, "C")?, at(0, "N")?, at(0, "CA")?, at(0, "C")?]),
        DihedralType::Psi => Some([at(0, "N")?, at(0, "CA")?, at(0, "C")?, at(1, "N")?]),
        DihedralType::Omega => Some([at(0, "CA")?, at(0, "C")?, at(1, "N")?, at(1, "CA")?]),
        DihedralType::Alpha => Some([at(-1, "CA")?, at(0, "CA")?, at(1, "CA")?, at(2, "CA")?]),
    }
}
