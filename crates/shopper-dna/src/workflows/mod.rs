pub mod orders;
pub mod rfm;
