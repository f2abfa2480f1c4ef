mod backtrack_trait;
mod trail;

pub use backtrack_trait::Backtrack;
pub use trail::Trail;
