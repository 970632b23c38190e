pub mod frame_codec;
pub mod image_io;
pub mod source;
pub mod table;

pub use image_io::{load_image, save_tiff};
pub use source::{FrameSource, ImageSequence};
