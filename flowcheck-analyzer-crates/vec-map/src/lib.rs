mod has_id;
mod vec_map;

pub use has_id::HasId;
pub use vec_map::VecMap;
