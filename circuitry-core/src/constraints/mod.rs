pub mod cvar;
pub mod layout;
pub mod ops;
pub mod reducer;
pub mod witness;
