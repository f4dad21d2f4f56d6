use crate::mat::Mat;
use std::str::FromStr;

/// How the raw log-ratio matrix is mapped to a similarity matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    AddMin,
    Exponentiate,
    ScaleMax1,
}

impl FromStr for Normalization {
    type Err = &'static str;
    fn from_str(normalization: &str) -> Result<Self, Self::Err> {
        match normalization {
            "ADD_MIN" => Ok(Normalization::AddMin),
            "EXPONENTIATE" => Ok(Normalization::Exponentiate),
            "SCALE_MAX_1" => Ok(Normalization::ScaleMax1),
            _ => Err("Invalid normalization; should be one of ADD_MIN, EXPONENTIATE, SCALE_MAX_1"),
        }
    }
}

/// Normalizes the raw `S_diff - S_same` log-ratio matrix in place. The result
/// is symmetric with a zero diagonal, and larger entries mean more similar
/// cells.
pub fn normalize(sim_mat: &mut Mat, normalization: Normalization) {
    log::trace!("Normalizing similarity matrix...");
    match normalization {
        Normalization::AddMin => {
            sim_mat.scale(-1.0);
            let offset = sim_mat.min().abs();
            sim_mat.shift(offset);
        }
        Normalization::Exponentiate => {
            sim_mat.map_inplace(|x| 1.0 / (1.0 + x.exp()));
            sim_mat.fill_diagonal(0.0);
        }
        Normalization::ScaleMax1 => {
            sim_mat.fill_diagonal(0.0);
            let max = sim_mat.max();
            if max != 0.0 {
                sim_mat.scale(1.0 / max);
            }
        }
    }
    sim_mat.fill_diagonal(0.0);
}
