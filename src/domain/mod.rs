// Domain layer: passenger vocabularies, request/feature types and the ports the
// serving and training paths are written against.

pub mod model;
pub mod ports;
