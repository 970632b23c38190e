use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::Array2;

use crate::consts::FRAME_MAGIC;
use crate::error::{Result, TransitError};
use crate::frame::Frame;

/// Write a frame as magic + u32 height + u32 width + little-endian f32 pixels.
///
/// The encoding is lossless so a cached calibration frame reloads
/// bit-for-bit identical to the one that was computed.
pub fn write_frame(w: &mut impl Write, frame: &Frame) -> Result<()> {
    let (h, width) = frame.shape();
    w.write_all(FRAME_MAGIC)?;
    w.write_u32::<LittleEndian>(h as u32)?;
    w.write_u32::<LittleEndian>(width as u32)?;
    for &v in frame.data.iter() {
        w.write_f32::<LittleEndian>(v)?;
    }
    Ok(())
}

/// Read a frame written by [`write_frame`].
pub fn read_frame(r: &mut impl Read) -> Result<Frame> {
    let mut magic = [0u8; 8];
    r.read_exact(&mut magic)?;
    if &magic != FRAME_MAGIC {
        return Err(TransitError::InvalidArtifact(
            "bad frame magic".to_string(),
        ));
    }

    let h = r.read_u32::<LittleEndian>()? as usize;
    let w = r.read_u32::<LittleEndian>()? as usize;
    let count = h
        .checked_mul(w)
        .filter(|n| n.checked_mul(4).is_some())
        .ok_or_else(|| TransitError::InvalidArtifact(format!("frame size {h}x{w} overflows")))?;

    // Header sizes are untrusted: allocate only what the payload provides.
    let mut raw = Vec::new();
    r.by_ref().take((count * 4) as u64).read_to_end(&mut raw)?;
    if raw.len() != count * 4 {
        return Err(TransitError::InvalidArtifact(format!(
            "frame {h}x{w} needs {} pixel bytes, found {}",
            count * 4,
            raw.len()
        )));
    }
    let mut pixels = vec![0.0f32; count];
    LittleEndian::read_f32_into(&raw, &mut pixels);

    let data = Array2::from_shape_vec((h, w), pixels)
        .map_err(|e| TransitError::InvalidArtifact(e.to_string()))?;
    Ok(Frame::new(data))
}
