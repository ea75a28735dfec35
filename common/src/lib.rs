pub mod constants;
pub mod export;
pub mod serializable;
