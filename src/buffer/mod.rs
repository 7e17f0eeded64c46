/// Index of a slot in the buffer frame pool, in range `[0, pool_size)`.
pub type FrameId = usize;

pub mod bufferpool;
pub mod frame;
pub mod pagetable;
pub mod replacer;
