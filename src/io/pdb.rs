//! PDB topology and multi-model trajectory files.
//!
//! Only the fixed-column `ATOM`/`HETATM`, `MODEL` and `ENDMDL` records are
//! interpreted; everything else (`REMARK`, `CRYST1`, `TER`, `CONECT`, ...) is
//! skipped. A file without `MODEL` records is a single frame.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::AppError;

/// Cartesian coordinates of one frame, in Å, one entry per topology atom.
pub type Frame = Vec<[f64; 3]>;

#[derive(Debug, Clone, PartialEq)]
pub struct TopologyAtom {
    pub name: String,
    pub residue_name: String,
    pub residue_seq: i32,
    pub chain_id: char,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    pub atoms: Vec<TopologyAtom>,
}

/// A contiguous run of atoms sharing chain id and residue number.
#[derive(Debug, Clone, PartialEq)]
pub struct Residue {
    pub chain_id: char,
    pub seq: i32,
    pub name: String,
    /// Indices into `Topology::atoms`.
    pub atoms: Vec<usize>,
}

impl Topology {
    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// Residues in file order.
    pub fn residues(&self) -> Vec<Residue> {
        let mut out: Vec<Residue> = Vec::new();
        for (idx, atom) in self.atoms.iter().enumerate() {
            match out.last_mut() {
                Some(r) if r.chain_id == atom.chain_id && r.seq == atom.residue_seq => r.atoms.push(idx),
                _ => out.push(Residue {
                    chain_id: atom.chain_id,
                    seq: atom.residue_seq,
                    name: atom.residue_name.clone(),
                    atoms: vec![idx],
                }),
            }
        }
        out
    }

    /// Index of the named atom inside a residue.
    pub fn atom_in(&self, residue: &Residue, name: &str) -> Option<usize> {
        residue.atoms.iter().copied().find(|&i| self.atoms[i].name == name)
    }
}

/// A trajectory: frames read from one file.
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub source: String,
    pub frames: Vec<Frame>,
}

impl Trajectory {
    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }
}

/// Read a topology from the first model of a PDB file.
pub fn read_topology(path: &Path) -> Result<Topology, AppError> {
    let file = File::open(path).map_err(|e| AppError::read(path, e))?;
    parse_topology(BufReader::new(file), path)
}

pub fn parse_topology<R: BufRead>(reader: R, path: &Path) -> Result<Topology, AppError> {
    let mut atoms = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| AppError::read(path, e))?;
        if line.starts_with("ENDMDL") || line.starts_with("END ") || line.trim_end() == "END" {
            break;
        }
        if !is_atom_record(&line) {
            continue;
        }
        atoms.push(parse_atom(&line).map_err(|msg| AppError::parse(path, format!("line {}: {msg}", idx + 1)))?);
    }
    if atoms.is_empty() {
        return Err(AppError::parse(path, "no ATOM/HETATM records found"));
    }
    Ok(Topology { atoms })
}

/// Read every frame of a PDB trajectory, checking the atom count of each.
pub fn read_trajectory(path: &Path, n_atoms: usize) -> Result<Trajectory, AppError> {
    let file = File::open(path).map_err(|e| AppError::read(path, e))?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let frames = parse_frames(BufReader::new(file), path, n_atoms)?;
    Ok(Trajectory { source, frames })
}

pub fn parse_frames<R: BufRead>(reader: R, path: &Path, n_atoms: usize) -> Result<Vec<Frame>, AppError> {
    let mut frames = Vec::new();
    let mut current: Frame = Vec::with_capacity(n_atoms);

    let push_frame = |frame: &mut Frame, frames: &mut Vec<Frame>| -> Result<(), AppError> {
        if frame.len() != n_atoms {
            return Err(AppError::contract(format!(
                "'{}' frame {} has {} atoms, topology has {n_atoms}.",
                path.display(),
                frames.len(),
                frame.len()
            )));
        }
        frames.push(std::mem::replace(frame, Vec::with_capacity(n_atoms)));
        Ok(())
    };

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| AppError::read(path, e))?;
        if line.starts_with("ENDMDL") {
            push_frame(&mut current, &mut frames)?;
        } else if is_atom_record(&line) {
            let xyz = parse_coords(&line).map_err(|msg| AppError::parse(path, format!("line {}: {msg}", idx + 1)))?;
            current.push(xyz);
        }
    }
    if !current.is_empty() {
        push_frame(&mut current, &mut frames)?;
    }
    if frames.is_empty() {
        return Err(AppError::parse(path, "no frames found"));
    }
    Ok(frames)
}

/// Write frames as a multi-model PDB.
pub fn write_frames<W: Write>(out: &mut W, topology: &Topology, frames: &[Frame]) -> std::io::Result<()> {
    for (model, frame) in frames.iter().enumerate() {
        writeln!(out, "MODEL     {:>4}", model + 1)?;
        for (serial, (atom, xyz)) in topology.atoms.iter().zip(frame).enumerate() {
            writeln!(out, "{}", format_atom(serial + 1, atom, *xyz))?;
        }
        writeln!(out, "ENDMDL")?;
    }
    writeln!(out, "END")
}

/// Write a single-frame topology PDB.
pub fn write_topology<W: Write>(out: &mut W, topology: &Topology, frame: &Frame) -> std::io::Result<()> {
    for (serial, (atom, xyz)) in topology.atoms.iter().zip(frame).enumerate() {
        writeln!(out, "{}", format_atom(serial + 1, atom, *xyz))?;
    }
    writeln!(out, "END")
}

fn format_atom(serial: usize, atom: &TopologyAtom, xyz: [f64; 3]) -> String {
    // Names shorter than four characters start in column 14.
    let name = if atom.name.len() < 4 {
        format!(" {:<3}", atom.name)
    } else {
        atom.name.clone()
    };
    let element = atom.name.chars().next().unwrap_or('X');
    format!(
        "ATOM  {:>5} {:<4} {:>3} {}{:>4}    {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}",
        serial % 100_000,
        name,
        atom.residue_name,
        atom.chain_id,
        atom.residue_seq,
        xyz[0],
        xyz[1],
        xyz[2],
        1.0,
        0.0,
        element
    )
}

fn is_atom_record(line: &str) -> bool {
    line.starts_with("ATOM  ") || line.starts_with("HETATM")
}

fn parse_atom(line: &str) -> Result<TopologyAtom, String> {
    let name = column(line, 12, 16)?.trim().to_string();
    let residue_name = column(line, 17, 20)?.trim().to_string();
    let chain_id = line.get(21..22).and_then(|s| s.chars().next()).unwrap_or(' ');
    let residue_seq = column(line, 22, 26)?
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("invalid residue number: {e}"))?;
    if name.is_empty() {
        return Err("empty atom name".to_string());
    }
    Ok(TopologyAtom {
        name,
        residue_name,
        residue_seq,
        chain_id,
    })
}

fn parse_coords(line: &str) -> Result<[f64; 3], String> {
    let mut xyz = [0.0; 3];
    for (k, (a, b)) in [(30, 38), (38, 46), (46, 54)].into_iter().enumerate() {
        xyz[k] = column(line, a, b)?
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid coordinate: {e}"))?;
    }
    Ok(xyz)
}

fn column(line: &str, start: usize, end: usize) -> Result<&str, String> {
    line.get(start..end)
        .ok_or_else(|| format!("record too short for columns {}-{}", start + 1, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn two_atom_topology() -> Topology {
        Topology {
            atoms: vec![
                TopologyAtom {
                    name: "N".into(),
                    residue_name: "ALA".into(),
                    residue_seq: 1,
                    chain_id: 'A',
                },
                TopologyAtom {
                    name: "CA".into(),
                    residue_name: "ALA".into(),
                    residue_seq: 1,
                    chain_id: 'A',
                },
            ],
        }
    }

    #[test]
    fn written_frames_parse_back() {
        let top = two_atom_topology();
        let frames = vec![
            vec![[0.0, 1.0, 2.0], [1.5, -0.25, 3.125]],
            vec![[10.0, 11.0, 12.0], [-1.5, 0.0, 0.5]],
        ];
        let mut buf = Vec::new();
        write_frames(&mut buf, &top, &frames).unwrap();

        let parsed_top = parse_topology(Cursor::new(&buf), Path::new("t.pdb")).unwrap();
        assert_eq!(parsed_top, top);

        let parsed = parse_frames(Cursor::new(&buf), Path::new("t.pdb"), 2).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!((parsed[0][1][2] - 3.125).abs() < 1e-3);
        assert!((parsed[1][1][0] + 1.5).abs() < 1e-3);
    }

    #[test]
    fn single_model_file_is_one_frame() {
        let top = two_atom_topology();
        let mut buf = Vec::new();
        write_topology(&mut buf, &top, &vec![[0.0; 3], [1.0; 3]]).unwrap();
        let parsed = parse_frames(Cursor::new(&buf), Path::new("t.pdb"), 2).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn atom_count_mismatch_is_a_contract_error() {
        let top = two_atom_topology();
        let mut buf = Vec::new();
        write_frames(&mut buf, &top, &[vec![[0.0; 3], [1.0; 3]]]).unwrap();
        let err = parse_frames(Cursor::new(&buf), Path::new("t.pdb"), 3).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn residues_group_consecutive_atoms() {
        let mut top = two_atom_topology();
        top.atoms.push(TopologyAtom {
            name: "N".into(),
            residue_name: "GLY".into(),
            residue_seq: 2,
            chain_id: 'A',
        });
        let residues = top.residues();
        assert_eq!(residues.len(), 2);
        assert_eq!(residues[0].atoms, vec![0, 1]);
        assert_eq!(top.atom_in(&residues[0], "CA"), Some(1));
        assert_eq!(residues[1].name, "GLY");
    }
}
