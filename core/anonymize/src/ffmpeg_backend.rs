//! Video source/sink over FFmpeg.
//!
//! Requires the system FFmpeg development libraries; enabled with the
//! `ffmpeg` cargo feature.

use std::path::Path;

use ffmpeg_next as ffmpeg;

use ffmpeg::format::Pixel;
use ffmpeg::media::Type;
use ffmpeg::software::scaling;
use ffmpeg::util::frame::video::Video;

use crate::canonical::CanonicalImage;
use crate::error::Error;
use crate::video::{FrameSink, FrameSource};

/// Encoder used when the input's codec has no encoder available or cannot
/// be opened for the output container.
const FALLBACK_CODEC: ffmpeg::codec::Id = ffmpeg::codec::Id::MPEG4;

fn load_err(e: ffmpeg::Error) -> Error {
    Error::LoadVideo(e.to_string())
}

fn save_err(e: ffmpeg::Error) -> Error {
    Error::SaveVideo(e.to_string())
}

/// Demuxes and decodes the best video stream of a container, yielding
/// canonical BGR frames.
pub struct FfmpegSource {
    ictx: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    frame_rate: f64,
    codec_id: ffmpeg::codec::Id,
    finished: bool,
}

impl FfmpegSource {
    /// Open a video file for reading.
    pub fn open(path: &Path) -> Result<Self, Error> {
        ffmpeg::init().map_err(load_err)?;
        let ictx = ffmpeg::format::input(&path).map_err(load_err)?;

        let input = ictx
            .streams()
            .best(Type::Video)
            .ok_or_else(|| Error::LoadVideo(format!("{}: no video stream", path.display())))?;
        let stream_index = input.index();

        let rate = input.avg_frame_rate();
        let frame_rate = if rate.denominator() > 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            25.0
        };

        let parameters = input.parameters();
        let codec_id = parameters.id();
        let context =
            ffmpeg::codec::context::Context::from_parameters(parameters).map_err(load_err)?;
        let decoder = context.decoder().video().map_err(load_err)?;

        let (width, height) = (decoder.width(), decoder.height());
        if width == 0 || height == 0 {
            return Err(Error::LoadVideo(format!(
                "{}: invalid video dimensions {width}x{height}",
                path.display()
            )));
        }

        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            Pixel::BGR24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .map_err(load_err)?;

        tracing::info!(
            path = %path.display(),
            width,
            height,
            frame_rate,
            codec = ?codec_id,
            "opened video input"
        );

        Ok(Self {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            frame_rate,
            codec_id,
            finished: false,
        })
    }

    /// Codec of the input stream, offered to the sink first.
    pub fn codec_id(&self) -> ffmpeg::codec::Id {
        self.codec_id
    }

    fn receive_decoded(&mut self) -> Result<Option<CanonicalImage<'static>>, Error> {
        let mut decoded = Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_ok() {
            let mut bgr = Video::empty();
            self.scaler.run(&decoded, &mut bgr).map_err(load_err)?;
            return Ok(Some(bgr_frame_to_canonical(&bgr, self.width, self.height)));
        }
        Ok(None)
    }
}

enum DemuxStep {
    Packet(ffmpeg::Packet),
    OtherStream,
    EndOfStream,
}

impl FrameSource for FfmpegSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn read_frame(&mut self) -> Result<Option<CanonicalImage<'static>>, Error> {
        loop {
            if let Some(frame) = self.receive_decoded()? {
                return Ok(Some(frame));
            }
            if self.finished {
                return Ok(None);
            }

            let step = match self.ictx.packets().next() {
                Some((stream, packet)) if stream.index() == self.stream_index => {
                    DemuxStep::Packet(packet)
                }
                Some(_) => DemuxStep::OtherStream,
                None => DemuxStep::EndOfStream,
            };

            match step {
                DemuxStep::Packet(packet) => {
                    self.decoder.send_packet(&packet).map_err(load_err)?;
                }
                DemuxStep::OtherStream => {}
                DemuxStep::EndOfStream => {
                    self.finished = true;
                    let _ = self.decoder.send_eof();
                }
            }
        }
    }
}

/// Row-copy a BGR24 frame into a canonical image, honoring FFmpeg's
/// per-row alignment padding.
fn bgr_frame_to_canonical(frame: &Video, width: u32, height: u32) -> CanonicalImage<'static> {
    let stride = frame.stride(0);
    let data = frame.data(0);
    let row_bytes = width as usize * 3;

    let mut out = vec![0u8; row_bytes * height as usize];
    for row in 0..height as usize {
        out[row * row_bytes..(row + 1) * row_bytes]
            .copy_from_slice(&data[row * stride..row * stride + row_bytes]);
    }
    CanonicalImage::from_vec(width, height, out)
}

/// Encodes canonical BGR frames into a video container.
pub struct FfmpegSink {
    octx: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::video::Encoder,
    scaler: scaling::Context,
    width: u32,
    height: u32,
    time_base: ffmpeg::Rational,
    frame_index: i64,
}

impl FfmpegSink {
    /// Open a video file for writing, matched to the source's geometry.
    ///
    /// Encoding prefers the source's codec; when no encoder for it exists
    /// or it cannot be opened, the fixed default codec is used instead.
    pub fn create(path: &Path, source: &FfmpegSource) -> Result<Self, Error> {
        let (width, height) = source.dimensions();
        let fps = source.frame_rate().round().max(1.0) as i32;
        let time_base = ffmpeg::Rational::new(1, fps);

        let mut octx = ffmpeg::format::output(&path).map_err(save_err)?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let encoder = match open_encoder(source.codec_id(), width, height, fps, global_header) {
            Ok(encoder) => encoder,
            Err(first_error) => {
                if source.codec_id() == FALLBACK_CODEC {
                    return Err(first_error);
                }
                tracing::warn!(
                    codec = ?source.codec_id(),
                    fallback = ?FALLBACK_CODEC,
                    "input codec unavailable for encoding, using fallback"
                );
                open_encoder(FALLBACK_CODEC, width, height, fps, global_header)?
            }
        };

        {
            let mut ost = octx.add_stream(ffmpeg::encoder::find(encoder.id())).map_err(save_err)?;
            ost.set_parameters(&encoder);
            ost.set_time_base(time_base);
        }
        octx.write_header().map_err(save_err)?;

        let scaler = scaling::Context::get(
            Pixel::BGR24,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .map_err(save_err)?;

        tracing::info!(path = %path.display(), codec = ?encoder.id(), "opened video output");

        Ok(Self {
            octx,
            encoder,
            scaler,
            width,
            height,
            time_base,
            frame_index: 0,
        })
    }

    fn drain(&mut self) -> Result<(), Error> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            let stream_time_base = self.octx.stream(0).map(|s| s.time_base());
            if let Some(stream_time_base) = stream_time_base {
                packet.rescale_ts(self.time_base, stream_time_base);
            }
            packet.write_interleaved(&mut self.octx).map_err(save_err)?;
        }
        Ok(())
    }
}

fn open_encoder(
    codec_id: ffmpeg::codec::Id,
    width: u32,
    height: u32,
    fps: i32,
    global_header: bool,
) -> Result<ffmpeg::encoder::video::Encoder, Error> {
    let codec = ffmpeg::encoder::find(codec_id)
        .ok_or_else(|| Error::SaveVideo(format!("no encoder for codec {codec_id:?}")))?;

    let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
        .encoder()
        .video()
        .map_err(save_err)?;

    encoder.set_width(width);
    encoder.set_height(height);
    encoder.set_format(Pixel::YUV420P);
    encoder.set_time_base(ffmpeg::Rational::new(1, fps));
    encoder.set_frame_rate(Some(ffmpeg::Rational::new(fps, 1)));
    if global_header {
        encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
    }

    encoder.open_as(codec).map_err(save_err)
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &CanonicalImage<'_>) -> Result<(), Error> {
        let mut bgr = Video::new(Pixel::BGR24, self.width, self.height);
        let stride = bgr.stride(0);
        let row_bytes = self.width as usize * 3;
        {
            let data = bgr.data_mut(0);
            for row in 0..self.height as usize {
                data[row * stride..row * stride + row_bytes]
                    .copy_from_slice(&frame.data()[row * row_bytes..(row + 1) * row_bytes]);
            }
        }

        let mut yuv = Video::empty();
        self.scaler.run(&bgr, &mut yuv).map_err(save_err)?;
        yuv.set_pts(Some(self.frame_index));
        self.frame_index += 1;

        self.encoder.send_frame(&yuv).map_err(save_err)?;
        self.drain()
    }

    fn finish(&mut self) -> Result<(), Error> {
        self.encoder.send_eof().map_err(save_err)?;
        self.drain()?;
        self.octx.write_trailer().map_err(save_err)
    }
}
