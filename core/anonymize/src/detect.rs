//! Detector seam and letterbox preprocessing.

use image::imageops::{self, FilterType};
use ndarray::Array4;

use crate::canonical::CanonicalImage;
use crate::error::Error;

/// Network input tensor: shape (1, 3, height, width), RGB channel order,
/// values normalized to [0, 1].
pub type NetworkInput = Array4<f32>;

/// Raw per-anchor output of a detection network.
///
/// Channel-major layout: all `cx` values are contiguous, then all `cy`,
/// `w`, `h`, and the scores, not interleaved per proposal. Channels 0
/// through 4 are cx, cy, w, h, score; further channels are ignored.
pub struct ProposalTensor {
    data: Vec<f32>,
    num_proposals: usize,
    num_channels: usize,
}

impl ProposalTensor {
    /// Wrap a channel-major buffer of `num_channels × num_proposals`
    /// values. At least five channels are required.
    pub fn new(data: Vec<f32>, num_proposals: usize, num_channels: usize) -> Result<Self, Error> {
        if num_channels < 5 {
            return Err(Error::Internal(format!(
                "proposal tensor has {num_channels} channels, need at least 5"
            )));
        }
        if data.len() != num_proposals * num_channels {
            return Err(Error::Internal(format!(
                "proposal tensor holds {} values, expected {} ({} proposals x {} channels)",
                data.len(),
                num_proposals * num_channels,
                num_proposals,
                num_channels
            )));
        }
        Ok(Self {
            data,
            num_proposals,
            num_channels,
        })
    }

    /// Number of proposals (anchors).
    pub fn num_proposals(&self) -> usize {
        self.num_proposals
    }

    /// Number of channels per proposal.
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// One channel's values across all proposals.
    pub fn channel(&self, c: usize) -> &[f32] {
        &self.data[c * self.num_proposals..(c + 1) * self.num_proposals]
    }
}

/// Geometry of the aspect-preserving letterbox resize, needed to map
/// network-space boxes back to image space.
#[derive(Debug, Clone, Copy)]
pub struct Letterbox {
    /// Source width / resized content width.
    pub ratio_w: f32,
    /// Source height / resized content height.
    pub ratio_h: f32,
    /// Horizontal padding on the left of the content, in network pixels.
    pub pad_w: f32,
    /// Vertical padding above the content, in network pixels.
    pub pad_h: f32,
}

/// The trained network's forward pass.
///
/// Implementations load their weights once and are immutable afterwards
/// apart from whatever the inference runtime needs internally; preprocessing
/// and proposal decoding stay in the engine.
pub trait Detector: Send {
    /// Network input (width, height) in pixels.
    fn input_size(&self) -> (u32, u32);

    /// Run the network on a preprocessed input tensor.
    fn forward(&mut self, input: &NetworkInput) -> Result<ProposalTensor, Error>;
}

/// Resize the canonical image into a zero-padded square network input,
/// preserving aspect ratio.
pub fn letterbox(
    image: &CanonicalImage<'_>,
    input_w: u32,
    input_h: u32,
) -> (NetworkInput, Letterbox) {
    let src_w = image.width();
    let src_h = image.height();

    let (new_w, new_h, pad_w, pad_h) = if src_h != src_w {
        let hw_scale = src_h as f32 / src_w as f32;
        if hw_scale > 1.0 {
            let new_h = input_h;
            let new_w = ((input_w as f32 / hw_scale) as u32).max(1);
            (new_w, new_h, (input_w - new_w) / 2, 0)
        } else {
            let new_w = input_w;
            let new_h = ((input_h as f32 * hw_scale) as u32).max(1);
            (new_w, new_h, 0, (input_h - new_h) / 2)
        }
    } else {
        (input_w, input_h, 0, 0)
    };

    let resized = imageops::resize(&image.to_rgb_image(), new_w, new_h, FilterType::Triangle);

    let mut tensor = Array4::zeros((1, 3, input_h as usize, input_w as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = (x + pad_w) as usize;
        let ty = (y + pad_h) as usize;
        let [r, g, b] = pixel.0;
        tensor[[0, 0, ty, tx]] = r as f32 / 255.0;
        tensor[[0, 1, ty, tx]] = g as f32 / 255.0;
        tensor[[0, 2, ty, tx]] = b as f32 / 255.0;
    }

    let geometry = Letterbox {
        ratio_w: src_w as f32 / new_w as f32,
        ratio_h: src_h as f32 / new_h as f32,
        pad_w: pad_w as f32,
        pad_h: pad_h as f32,
    };

    (tensor, geometry)
}
