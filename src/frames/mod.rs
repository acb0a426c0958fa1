pub mod controller;
pub mod encode;
pub mod loop_worker;
pub mod ring_buffer;
pub mod source;

pub use controller::FrameSampler;
pub use encode::{encode_frame, snapshot};
pub use ring_buffer::FrameRingBuffer;
pub use source::VideoSource;
