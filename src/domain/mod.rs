// Domain layer: cluster models and the port the jobs are written against.

pub mod model;
pub mod ports;
