pub mod ref_store;

pub use ref_store::RefVec;
