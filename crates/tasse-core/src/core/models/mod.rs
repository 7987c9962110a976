pub mod atom;
pub mod topology;
