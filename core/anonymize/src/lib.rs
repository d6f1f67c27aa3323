//! Face and license-plate redaction for images, video, and raw in-memory
//! frames.
//!
//! The engine converts six caller pixel layouts into a canonical packed
//! image, runs a detection network through the [`Detector`] seam, turns
//! proposals into final boxes via confidence filtering and non-max
//! suppression, applies the chosen redaction, and reconstructs the
//! caller's original layout honoring arbitrary row strides.
//!
//! # Example
//!
//! ```no_run
//! use anonymize::{BlurType, Engine, RecognizeType};
//!
//! let mut engine = Engine::new();
//! let handle = engine.init("/opt/models", RecognizeType::Face).unwrap();
//! engine
//!     .image_anonymization(handle, "in.jpg", "out.jpg", BlurType::Gaussian)
//!     .unwrap();
//! engine.uninit(handle).unwrap();
//! ```
//!
//! Note that [`BlurType::Outline`] only marks regions; the pixels inside
//! stay fully visible.
#![warn(missing_docs)]

mod canonical;
mod codec;
mod engine;
mod error;
mod frame;
mod logging;
mod redact;
mod session;

/// Caller layouts → canonical image.
pub mod convert;
/// Detector seam and letterbox preprocessing.
pub mod detect;
/// Proposal decoding and non-max suppression.
pub mod proposals;
/// Video collaborator seams and the frame loop.
pub mod video;
/// Canonical image → caller layouts.
pub mod writeback;

#[cfg(feature = "ffmpeg")]
/// FFmpeg-backed video source and sink.
pub mod ffmpeg_backend;
#[cfg(feature = "onnx")]
/// ONNX Runtime detector backend.
pub mod onnx_backend;

pub use canonical::CanonicalImage;
pub use codec::{load_image, save_image};
pub use detect::{Detector, Letterbox, NetworkInput, ProposalTensor};
pub use engine::{Engine, Handle};
pub use error::{error_message, Error, STATUS_OK};
pub use frame::{chroma_dims, FrameBuffer, PackedFormat, Plane, PlaneLayout};
pub use logging::LogLevel;
pub use proposals::Detection;
pub use redact::BlurType;
pub use session::{RecognizeType, Session};
pub use video::{FrameSink, FrameSource};

/// Engine version string.
pub fn version() -> &'static str {
    concat!("v", env!("CARGO_PKG_VERSION"))
}
