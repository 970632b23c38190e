use rayon::prelude::*;
use tracing::info;

use crate::cache::{artifact_key, ArtifactKind, ResultCache};
use crate::consts::PARALLEL_FRAME_THRESHOLD;
use crate::error::Result;
use crate::frame::Frame;
use crate::io::source::FrameSource;
use crate::stack::sigma_clip::SigmaClipParams;

use super::master::{combine_bias, combine_dark, combine_flat};

/// Builds master calibration frames, memoized in a [`ResultCache`].
///
/// Each builder looks up its output name first; the raw source is only
/// read when nothing is cached or `force_recompute` is set.
pub struct CalibrationSynthesizer<'a> {
    cache: &'a ResultCache,
    params: SigmaClipParams,
    force_recompute: bool,
}

impl<'a> CalibrationSynthesizer<'a> {
    pub fn new(cache: &'a ResultCache, params: SigmaClipParams, force_recompute: bool) -> Self {
        Self {
            cache,
            params,
            force_recompute,
        }
    }

    pub fn build_bias(&self, name: &str, source: &dyn FrameSource) -> Result<Frame> {
        self.build(name, || {
            info!(name, frames = source.len(), "Building master bias");
            let frames = read_stack(source)?;
            combine_bias(&frames, &self.params)
        })
    }

    pub fn build_dark(
        &self,
        name: &str,
        source: &dyn FrameSource,
        bias: Option<&Frame>,
    ) -> Result<Frame> {
        self.build(name, || {
            info!(
                name,
                frames = source.len(),
                bias = bias.is_some(),
                "Building master dark"
            );
            let frames = read_stack(source)?;
            combine_dark(&frames, bias, &self.params)
        })
    }

    pub fn build_flat(
        &self,
        name: &str,
        source: &dyn FrameSource,
        bias: Option<&Frame>,
        dark: Option<&Frame>,
    ) -> Result<Frame> {
        self.build(name, || {
            info!(
                name,
                frames = source.len(),
                bias = bias.is_some(),
                dark = dark.is_some(),
                "Building master flat"
            );
            let frames = read_stack(source)?;
            combine_flat(&frames, bias, dark, &self.params)
        })
    }

    fn build<F>(&self, name: &str, compute: F) -> Result<Frame>
    where
        F: FnOnce() -> Result<Frame>,
    {
        let key = artifact_key(name, ArtifactKind::CalibrationFrame);
        let mut frame = self
            .cache
            .get_or_compute(&key, self.force_recompute, compute)?;
        frame.metadata.name = Some(name.to_string());
        Ok(frame)
    }
}

/// Materialize a whole stack. Any unreadable frame aborts the read.
fn read_stack(source: &dyn FrameSource) -> Result<Vec<Frame>> {
    if source.len() >= PARALLEL_FRAME_THRESHOLD {
        (0..source.len())
            .into_par_iter()
            .map(|i| source.read_frame(i))
            .collect()
    } else {
        source.read_all()
    }
}
