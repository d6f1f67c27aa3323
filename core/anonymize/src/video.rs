//! Video collaborator seams and the per-frame anonymization loop.

use crate::canonical::CanonicalImage;
use crate::error::Error;
use crate::redact::BlurType;
use crate::session::Session;

/// Frame-by-frame decoded video input.
pub trait FrameSource {
    /// Width and height of the decoded frames, in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Frames per second of the source stream.
    fn frame_rate(&self) -> f64;

    /// The next decoded frame.
    ///
    /// `Ok(None)` marks the end of the stream. An `Err` is a single
    /// frame's decode failure; the caller may skip it and keep reading.
    fn read_frame(&mut self) -> Result<Option<CanonicalImage<'static>>, Error>;
}

/// Frame-by-frame encoded video output.
pub trait FrameSink {
    /// Encode and write one frame.
    fn write_frame(&mut self, frame: &CanonicalImage<'_>) -> Result<(), Error>;

    /// Flush the encoder and finalize the container.
    fn finish(&mut self) -> Result<(), Error>;
}

/// Frames between progress log lines.
const PROGRESS_INTERVAL: u64 = 100;

/// Pump every frame of `source` through the session's pipeline into `sink`.
///
/// A per-frame decode or detection failure is logged and the frame is
/// skipped; a sink failure aborts the call. Returns the number of frames
/// written. A source yielding zero readable frames fails with
/// [`Error::LoadVideo`]; readable frames with none written fails with
/// [`Error::SaveVideo`].
pub fn anonymize_stream(
    session: &mut Session,
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    blur: BlurType,
) -> Result<u64, Error> {
    let mut read = 0u64;
    let mut written = 0u64;

    loop {
        let mut frame = match source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable frame");
                continue;
            }
        };
        read += 1;

        if let Err(e) = session.process(&mut frame, blur) {
            tracing::warn!(frame = read, error = %e, "detection failed, skipping frame");
            continue;
        }

        sink.write_frame(&frame)?;
        written += 1;

        if read % PROGRESS_INTERVAL == 0 {
            tracing::info!(frames = read, "video anonymization progress");
        }
    }

    sink.finish()?;
    tracing::info!(read, written, "video stream complete");

    if written > 0 {
        Ok(written)
    } else if read > 0 {
        Err(Error::SaveVideo(
            "frames were read but none could be written".into(),
        ))
    } else {
        Err(Error::LoadVideo("no readable frames in video source".into()))
    }
}
