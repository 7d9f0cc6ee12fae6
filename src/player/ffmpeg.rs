//! FFmpeg 后端（cargo feature `ffmpeg`）

use crate::core::{MediaType, PixelFormat, PlayerError, Rational, Result};
use crate::player::backend::{
    AudioDecoder, AudioParams, Converter, MediaBackend, MediaInput, MediaPacket, RawAudioFrame,
    RawVideoFrame, Resampler, SeekTarget, StreamInfo, VideoDecoder, VideoParams,
};
use crate::player::video_buffer::{chroma_size, copy_plane, FrameBuffer};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::{sample, Pixel, Sample};
use ffmpeg_next::{codec, format, media, software, util};
use log::{debug, info, warn};
use std::sync::Once;

static INIT: Once = Once::new();

/// 基于 ffmpeg-next 的后端
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    pub fn new() -> Self {
        Self
    }
}

impl MediaBackend for FfmpegBackend {
    type Input = FfmpegInput;

    fn initialize(&self) -> Result<()> {
        let mut result = Ok(());
        INIT.call_once(|| {
            result = ffmpeg::init().map_err(PlayerError::from);
            if result.is_ok() {
                info!("✅ FFmpeg 初始化成功");
            }
        });
        result
    }

    fn open(&self, filename: &str) -> Result<FfmpegInput> {
        let input = format::input(&filename)
            .map_err(|e| PlayerError::OpenError(format!("{}: {}", filename, e)))?;
        debug!("容器格式: {}", input.format().name());
        Ok(FfmpegInput { input })
    }
}

/// 数据包，克隆即 av_packet_ref
pub struct FfmpegPacket(ffmpeg::Packet);

impl MediaPacket for FfmpegPacket {
    fn stream_index(&self) -> usize {
        self.0.stream()
    }

    fn size(&self) -> usize {
        self.0.size()
    }

    fn try_ref(&self) -> Option<Self> {
        Some(Self(self.0.clone()))
    }
}

pub struct FfmpegInput {
    input: format::context::Input,
}

// AVFormatContext 只在拥有它的生产者线程中使用
unsafe impl Send for FfmpegInput {}

impl FfmpegInput {
    fn stream(&self, index: usize) -> Result<format::stream::Stream<'_>> {
        self.input
            .stream(index)
            .ok_or_else(|| PlayerError::StreamInfo(format!("流 {} 不存在", index)))
    }

    fn decoder_context(&self, index: usize) -> Result<codec::context::Context> {
        let stream = self.stream(index)?;
        codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| PlayerError::DecoderOpen(format!("stream {}: {}", index, e)))
    }
}

fn to_rational(value: util::rational::Rational) -> Rational {
    Rational::new(value.numerator(), value.denominator())
}

impl MediaInput for FfmpegInput {
    type Packet = FfmpegPacket;
    type AudioDecoder = FfmpegAudioDecoder;
    type VideoDecoder = FfmpegVideoDecoder;

    fn streams(&self) -> Result<Vec<StreamInfo>> {
        Ok(self
            .input
            .streams()
            .map(|stream| {
                let parameters = stream.parameters();
                StreamInfo {
                    index: stream.index(),
                    media_type: match parameters.medium() {
                        media::Type::Audio => MediaType::Audio,
                        media::Type::Video => MediaType::Video,
                        _ => MediaType::Other,
                    },
                    codec_name: parameters.id().name().to_string(),
                    time_base: to_rational(stream.time_base()),
                }
            })
            .collect())
    }

    fn duration(&self) -> f64 {
        let duration = self.input.duration();
        if duration <= 0 {
            return 0.0;
        }
        duration as f64 / ffmpeg::ffi::AV_TIME_BASE as f64
    }

    fn sample_aspect_ratio(&self, stream_index: usize) -> Option<Rational> {
        let decoder = self.decoder_context(stream_index).ok()?.decoder().video().ok()?;
        Some(to_rational(decoder.aspect_ratio()))
    }

    fn read_packet(&mut self) -> Result<Option<FfmpegPacket>> {
        let mut packet = ffmpeg::Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => Ok(Some(FfmpegPacket(packet))),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn seek(&mut self, target: SeekTarget, backward: bool) -> Result<()> {
        let (stream_index, timestamp) = match target {
            SeekTarget::Stream { index, timestamp } => (index as i32, timestamp),
            SeekTarget::Global { seconds } => {
                (-1, (seconds * ffmpeg::ffi::AV_TIME_BASE as f64) as i64)
            }
        };
        let flags = if backward {
            ffmpeg::ffi::AVSEEK_FLAG_BACKWARD as i32
        } else {
            0
        };

        // SAFETY: input 在 self 中存活，av_seek_frame 不保留指针
        let ret = unsafe {
            ffmpeg::ffi::av_seek_frame(self.input.as_mut_ptr(), stream_index, timestamp, flags)
        };
        if ret < 0 {
            return Err(PlayerError::SeekError(format!(
                "av_seek_frame(stream {}, ts {}): {}",
                stream_index,
                timestamp,
                ffmpeg::Error::from(ret)
            )));
        }
        Ok(())
    }

    fn audio_decoder(&self, stream_index: usize) -> Result<FfmpegAudioDecoder> {
        let decoder = self
            .decoder_context(stream_index)?
            .decoder()
            .audio()
            .map_err(|e| PlayerError::DecoderNotFound(format!("音频 stream {}: {}", stream_index, e)))?;

        Ok(FfmpegAudioDecoder { decoder })
    }

    fn video_decoder(&self, stream_index: usize) -> Result<FfmpegVideoDecoder> {
        let stream = self.stream(stream_index)?;
        let rate = stream.avg_frame_rate();
        let frame_delay = if rate.numerator() > 0 && rate.denominator() > 0 {
            rate.denominator() as f64 / rate.numerator() as f64
        } else {
            to_rational(stream.time_base()).to_f64()
        };

        let decoder = self
            .decoder_context(stream_index)?
            .decoder()
            .video()
            .map_err(|e| PlayerError::DecoderNotFound(format!("视频 stream {}: {}", stream_index, e)))?;

        Ok(FfmpegVideoDecoder {
            decoder,
            frame_delay,
        })
    }
}

/// send_packet / receive_frame 循环，直到 EAGAIN 或 EOF
macro_rules! receive_frames {
    ($decoder:expr, $frame:ty, $wrap:expr, $out:expr) => {
        loop {
            let mut frame = <$frame>::empty();
            match $decoder.receive_frame(&mut frame) {
                Ok(()) => $out.push($wrap(frame)),
                Err(ffmpeg::Error::Other { errno: 11 }) => break, // EAGAIN
                Err(ffmpeg::Error::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }
    };
}

pub struct FfmpegAudioFrame(util::frame::Audio);

impl RawAudioFrame for FfmpegAudioFrame {
    fn samples(&self) -> usize {
        self.0.samples()
    }

    fn best_effort_timestamp(&self) -> Option<i64> {
        self.0.timestamp()
    }
}

pub struct FfmpegAudioDecoder {
    decoder: codec::decoder::Audio,
}

impl FfmpegAudioDecoder {
    fn layout(&self) -> ChannelLayout {
        let layout = self.decoder.channel_layout();
        if layout.is_empty() {
            ChannelLayout::default(self.decoder.channels() as i32)
        } else {
            layout
        }
    }
}

impl AudioDecoder for FfmpegAudioDecoder {
    type Packet = FfmpegPacket;
    type Frame = FfmpegAudioFrame;
    type Resampler = FfmpegResampler;

    fn name(&self) -> String {
        self.decoder
            .codec()
            .map_or_else(|| "unknown".to_string(), |codec| codec.name().to_string())
    }

    fn params(&self) -> AudioParams {
        AudioParams {
            sample_rate: self.decoder.rate() as usize,
            channels: self.decoder.channels() as usize,
        }
    }

    fn decode(&mut self, packet: &FfmpegPacket, out: &mut Vec<FfmpegAudioFrame>) -> Result<()> {
        match self.decoder.send_packet(&packet.0) {
            Ok(()) => {}
            Err(ffmpeg::Error::Eof) => {
                debug!("音频解码器收到 EOF（send_packet），执行 flush 并忽略本次包");
                self.decoder.flush();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        receive_frames!(self.decoder, util::frame::Audio, FfmpegAudioFrame, out);
        Ok(())
    }

    fn drain(&mut self, out: &mut Vec<FfmpegAudioFrame>) -> Result<()> {
        self.decoder.send_eof()?;
        receive_frames!(self.decoder, util::frame::Audio, FfmpegAudioFrame, out);
        Ok(())
    }

    fn reset(&mut self) {
        self.decoder.flush();
    }

    fn resampler(&self, output_channels: usize) -> Result<FfmpegResampler> {
        let output_layout = match output_channels {
            1 => ChannelLayout::MONO,
            2 => ChannelLayout::STEREO,
            n if n == self.decoder.channels() as usize => self.layout(),
            n => ChannelLayout::default(n as i32),
        };

        debug!(
            "🔧 音频重采样器: {}Hz/{}ch {:?} → {}ch s16",
            self.decoder.rate(),
            self.decoder.channels(),
            self.decoder.format(),
            output_channels
        );

        Ok(FfmpegResampler {
            context: None,
            source: None,
            output_layout,
            output_channels,
        })
    }
}

/// 输出交错 s16、源采样率；源格式变化时重建 SwrContext
pub struct FfmpegResampler {
    context: Option<software::resampling::Context>,
    source: Option<(Sample, ChannelLayout, u32)>,
    output_layout: ChannelLayout,
    output_channels: usize,
}

// SwrContext 本身不是 Send，但我们确保只在单个线程中使用它
unsafe impl Send for FfmpegResampler {}

impl Resampler for FfmpegResampler {
    type Frame = FfmpegAudioFrame;

    fn convert(&mut self, frame: &FfmpegAudioFrame, out: &mut Vec<i16>) -> Result<()> {
        let frame = &frame.0;
        let layout = if frame.channel_layout().is_empty() {
            ChannelLayout::default(frame.channels() as i32)
        } else {
            frame.channel_layout()
        };
        let source = (frame.format(), layout, frame.rate());

        if self.source != Some(source) {
            let context = software::resampling::Context::get(
                source.0,
                source.1,
                source.2,
                Sample::I16(sample::Type::Packed),
                self.output_layout,
                source.2,
            )
            .map_err(|e| PlayerError::Resampler(e.to_string()))?;
            self.context = Some(context);
            self.source = Some(source);
        }

        let Some(context) = self.context.as_mut() else {
            return Err(PlayerError::Resampler("重采样器未初始化".to_string()));
        };

        let mut resampled = util::frame::Audio::empty();
        context.run(frame, &mut resampled)?;

        let bytes = resampled.samples() * self.output_channels * 2;
        let data = resampled.data(0);
        let data = &data[..bytes.min(data.len())];
        out.extend(
            data.chunks_exact(2)
                .map(|pair| i16::from_ne_bytes([pair[0], pair[1]])),
        );
        Ok(())
    }
}

pub struct FfmpegVideoFrame(util::frame::Video);

impl RawVideoFrame for FfmpegVideoFrame {
    fn width(&self) -> usize {
        self.0.width() as usize
    }

    fn height(&self) -> usize {
        self.0.height() as usize
    }

    fn best_effort_timestamp(&self) -> Option<i64> {
        self.0.timestamp()
    }

    fn repeat_pict(&self) -> i32 {
        self.0.repeat() as i32
    }

    fn plane(&self, index: usize) -> (&[u8], usize) {
        if index >= self.0.planes() {
            return (&[], 0);
        }
        (self.0.data(index), self.0.stride(index))
    }
}

pub struct FfmpegVideoDecoder {
    decoder: codec::decoder::Video,
    frame_delay: f64,
}

impl VideoDecoder for FfmpegVideoDecoder {
    type Packet = FfmpegPacket;
    type Frame = FfmpegVideoFrame;
    type Converter = FfmpegConverter;

    fn name(&self) -> String {
        self.decoder
            .codec()
            .map_or_else(|| "unknown".to_string(), |codec| codec.name().to_string())
    }

    fn params(&self) -> VideoParams {
        VideoParams {
            width: self.decoder.width() as usize,
            height: self.decoder.height() as usize,
            is_yuv420p: self.decoder.format() == Pixel::YUV420P,
            frame_delay: self.frame_delay,
        }
    }

    fn decode(&mut self, packet: &FfmpegPacket, out: &mut Vec<FfmpegVideoFrame>) -> Result<()> {
        match self.decoder.send_packet(&packet.0) {
            Ok(()) => {}
            Err(ffmpeg::Error::Eof) => {
                debug!("视频解码器收到 EOF（send_packet），执行 flush 并忽略本次包");
                self.decoder.flush();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        receive_frames!(self.decoder, util::frame::Video, FfmpegVideoFrame, out);
        Ok(())
    }

    fn drain(&mut self, out: &mut Vec<FfmpegVideoFrame>) -> Result<()> {
        self.decoder.send_eof()?;
        receive_frames!(self.decoder, util::frame::Video, FfmpegVideoFrame, out);
        Ok(())
    }

    fn reset(&mut self) {
        self.decoder.flush();
    }

    fn converter(&self, dst: PixelFormat) -> Result<FfmpegConverter> {
        Ok(FfmpegConverter {
            context: None,
            source: None,
            dst,
            width: self.decoder.width(),
            height: self.decoder.height(),
        })
    }
}

/// sws_scale 到帧池的格式与尺寸；源格式或尺寸变化时重建 SwsContext
pub struct FfmpegConverter {
    context: Option<software::scaling::Context>,
    source: Option<(Pixel, u32, u32)>,
    dst: PixelFormat,
    width: u32,
    height: u32,
}

// SwsContext 本身不是 Send，但我们确保只在单个线程中使用它
unsafe impl Send for FfmpegConverter {}

impl FfmpegConverter {
    fn dst_pixel(&self) -> Pixel {
        match self.dst {
            PixelFormat::Rgba => Pixel::RGBA,
            PixelFormat::Yuv420p => Pixel::YUV420P,
        }
    }
}

impl Converter for FfmpegConverter {
    type Frame = FfmpegVideoFrame;

    fn convert(&mut self, src: &FfmpegVideoFrame, dst: &mut FrameBuffer) -> Result<()> {
        let frame = &src.0;
        let source = (frame.format(), frame.width(), frame.height());

        if self.source != Some(source) {
            if self.source.is_some() {
                warn!(
                    "视频源格式变化: {:?} → {:?}，重建转换器",
                    self.source, source
                );
            }
            let context = software::scaling::Context::get(
                source.0,
                source.1,
                source.2,
                self.dst_pixel(),
                self.width,
                self.height,
                software::scaling::Flags::POINT,
            )
            .map_err(|e| PlayerError::Converter(e.to_string()))?;
            self.context = Some(context);
            self.source = Some(source);
        }

        let Some(context) = self.context.as_mut() else {
            return Err(PlayerError::Converter("转换器未初始化".to_string()));
        };

        let mut scaled = util::frame::Video::empty();
        context.run(frame, &mut scaled)?;

        let (width, height) = (self.width as usize, self.height as usize);
        let (cw, ch) = chroma_size(width, height);
        for index in 0..dst.plane_count() {
            let (row_bytes, rows) = match (self.dst, index) {
                (PixelFormat::Rgba, _) => (width * 4, height),
                (PixelFormat::Yuv420p, 0) => (width, height),
                (PixelFormat::Yuv420p, _) => (cw, ch),
            };
            let (plane, stride) = dst
                .plane_mut(index)
                .ok_or_else(|| PlayerError::Converter(format!("目标缺少平面 {}", index)))?;
            copy_plane(plane, stride, scaled.data(index), scaled.stride(index), row_bytes, rows)?;
        }

        Ok(())
    }
}
