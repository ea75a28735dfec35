//! Interchange format for finalized constraint systems.
//!
//! This is the shape verification-key derivation consumes. Coefficients are canonical
//! decimal strings of the field element in `[0, p)`, so the same logical coefficient has
//! exactly one encoding no matter which backend produced it.

use serde::{Deserialize, Serialize};

use crate::constants::GENERIC_GATE_NAME;

/// A cell of the gate grid. In [`GateJson::wires`] it is the next cell of the copy cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WireJson {
    pub row: usize,
    pub col: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateJson {
    /// `"Generic"` or the name of a custom gate.
    pub kind: String,
    pub wires: Vec<WireJson>,
    pub coeffs: Vec<String>,
}

impl GateJson {
    pub fn is_generic(&self) -> bool {
        self.kind == GENERIC_GATE_NAME
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintSystemJson {
    pub gates: Vec<GateJson>,
    pub public_input_size: usize,
    pub rows: usize,
    pub digest: String,
}

impl ConstraintSystemJson {
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Number of gates per kind, in order of first appearance.
    pub fn gate_summary(&self) -> Vec<(String, usize)> {
        let mut summary: Vec<(String, usize)> = Vec::new();
        for gate in &self.gates {
            match summary.iter_mut().find(|(kind, _)| *kind == gate.kind) {
                Some((_, count)) => *count += 1,
                None => summary.push((gate.kind.clone(), 1)),
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConstraintSystemJson {
        let gate = |kind: &str, row: usize| GateJson {
            kind: kind.to_string(),
            wires: (0..3).map(|col| WireJson { row, col }).collect(),
            coeffs: vec!["1".into(), "0".into()],
        };
        ConstraintSystemJson {
            gates: vec![gate("Generic", 0), gate("RangeCheck0", 1), gate("Generic", 2)],
            public_input_size: 1,
            rows: 3,
            digest: "00".repeat(32),
        }
    }

    #[test]
    fn field_names_follow_export_contract() {
        let json = sample().to_json_string().unwrap();
        assert!(json.contains("\"publicInputSize\":1"));
        assert!(json.contains("\"rows\":3"));
        assert!(json.contains("\"coeffs\":[\"1\",\"0\"]"));
        assert!(json.contains("\"wires\":[{\"row\":0,\"col\":0}"));
    }

    #[test]
    fn gate_summary_counts_by_kind() {
        let summary = sample().gate_summary();
        assert_eq!(
            summary,
            vec![("Generic".to_string(), 2), ("RangeCheck0".to_string(), 1)]
        );
        assert!(sample().gates[0].is_generic());
    }
}
