// Pipeline processing: note parsing, validation and normalization

pub mod normalize;
pub mod parser;
pub mod quality_gate;
