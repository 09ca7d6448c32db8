pub mod random;
pub mod tempfiles;
