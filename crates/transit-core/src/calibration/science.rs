use crate::error::Result;
use crate::frame::Frame;

use super::master::subtract_references;

/// The master frames used to reduce science exposures. Any of them may be
/// absent, in which case that correction is skipped.
#[derive(Clone, Debug, Default)]
pub struct CalibrationSet {
    pub bias: Option<Frame>,
    pub dark: Option<Frame>,
    pub flat: Option<Frame>,
}

impl CalibrationSet {
    pub fn is_empty(&self) -> bool {
        self.bias.is_none() && self.dark.is_none() && self.flat.is_none()
    }

    /// Reduce a raw science frame: `(raw - bias - dark) / flat`.
    ///
    /// Frame metadata is carried over unchanged.
    pub fn apply(&self, raw: &Frame) -> Result<Frame> {
        let mut out = subtract_references(raw, self.bias.as_ref(), self.dark.as_ref())?;
        if let Some(flat) = &self.flat {
            raw.ensure_same_shape(flat)?;
            out.data /= &flat.data;
        }
        Ok(out)
    }
}
