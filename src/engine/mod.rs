pub mod axis;
pub mod bucket;
pub mod node_test;
pub mod path;
pub mod runtime;
pub mod sequence;
pub mod set_ops;
