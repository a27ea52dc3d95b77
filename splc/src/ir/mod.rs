pub mod ast;
pub mod call_graph;
pub mod flat;
pub mod flatten;
pub mod inline;
pub mod labels;
pub mod linearize;
pub mod opt;
pub mod scope;
pub mod semantics;
