pub mod format;
pub mod node_table;
pub mod results;
pub mod special_output;
pub mod steady_flow;
