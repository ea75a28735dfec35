/// Number of wire columns per row that take part in the copy-constraint permutation.
pub const PERMUTED_COLUMNS: usize = 7;
/// Wire columns read by a generic gate: left, right, output.
pub const GENERIC_WIRES: usize = 3;
/// Coefficients of a generic gate: `[qL, qR, qO, qM, qC]`.
pub const GENERIC_COEFFS: usize = 5;
/// Column in which public inputs are laid out, one per row.
pub const PUBLIC_INPUT_COLUMN: usize = 0;
/// Name under which generic gates are exported.
pub const GENERIC_GATE_NAME: &str = "Generic";
