pub mod call_graph;
pub mod cfg_analyzer;
pub mod dead_func;
pub mod init_lattice;
pub mod uninit;
pub mod verify;
