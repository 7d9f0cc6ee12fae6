//! 内存后端
//!
//! 不依赖系统 FFmpeg 的媒体源：测试、演示与工具使用。
//! - 音频负载为交错的小端 i16，按 `frame_size` 切分为解码帧
//! - 视频负载为原始 YUV420P 或 RGBA，空负载视为解码错误
//! - Seek 落在关键帧上

use crate::core::{MediaType, PixelFormat, PlayerError, Rational, Result};
use crate::player::backend::{
    AudioDecoder, AudioParams, Converter, MediaBackend, MediaInput, MediaPacket, RawAudioFrame,
    RawVideoFrame, Resampler, SeekTarget, StreamInfo, VideoDecoder, VideoParams,
};
use crate::player::video_buffer::{chroma_size, copy_plane, FrameBuffer};
use log::debug;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// 浮点时间比较的容差（秒）
const TIME_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
enum StreamKind {
    Audio {
        sample_rate: usize,
        channels: usize,
        frame_size: usize,
    },
    Video {
        width: usize,
        height: usize,
        format: PixelFormat,
        frame_delay: f64,
        sample_aspect_ratio: Option<Rational>,
        /// 解码器延迟的帧数，输入结束后由 drain 取出
        delay: usize,
    },
    Data,
}

#[derive(Debug, Clone)]
struct MemoryStream {
    info: StreamInfo,
    kind: StreamKind,
}

/// 内存数据包，克隆即引用（负载共享）
#[derive(Debug, Clone)]
pub struct MemoryPacket {
    stream_index: usize,
    pts: Option<i64>,
    keyframe: bool,
    data: Arc<[u8]>,
}

impl MemoryPacket {
    pub fn pts(&self) -> Option<i64> {
        self.pts
    }

    pub fn is_keyframe(&self) -> bool {
        self.keyframe
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl MediaPacket for MemoryPacket {
    fn stream_index(&self) -> usize {
        self.stream_index
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn try_ref(&self) -> Option<Self> {
        Some(self.clone())
    }
}

/// 一个内存媒体源：流描述 + 按解封装顺序排列的数据包
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    streams: Vec<MemoryStream>,
    packets: Vec<MemoryPacket>,
    duration: f64,
    /// 读到该序号的包时返回读取错误
    read_error_at: Option<usize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    /// 在第 `packet_index` 个包处模拟读取错误
    pub fn with_read_error_at(mut self, packet_index: usize) -> Self {
        self.read_error_at = Some(packet_index);
        self
    }

    /// 添加音频流，时间基为 1/sample_rate
    pub fn add_audio_stream(
        &mut self,
        sample_rate: usize,
        channels: usize,
        frame_size: usize,
    ) -> usize {
        let index = self.streams.len();
        self.streams.push(MemoryStream {
            info: StreamInfo {
                index,
                media_type: MediaType::Audio,
                codec_name: "pcm_s16le".to_string(),
                time_base: Rational::new(1, sample_rate as i32),
            },
            kind: StreamKind::Audio {
                sample_rate,
                channels,
                frame_size: frame_size.max(1),
            },
        });
        index
    }

    pub fn add_video_stream(
        &mut self,
        width: usize,
        height: usize,
        format: PixelFormat,
        time_base: Rational,
        frame_delay: f64,
    ) -> usize {
        let index = self.streams.len();
        self.streams.push(MemoryStream {
            info: StreamInfo {
                index,
                media_type: MediaType::Video,
                codec_name: "rawvideo".to_string(),
                time_base,
            },
            kind: StreamKind::Video {
                width,
                height,
                format,
                frame_delay,
                sample_aspect_ratio: None,
                delay: 0,
            },
        });
        index
    }

    pub fn add_data_stream(&mut self) -> usize {
        let index = self.streams.len();
        self.streams.push(MemoryStream {
            info: StreamInfo {
                index,
                media_type: MediaType::Other,
                codec_name: "bin_data".to_string(),
                time_base: Rational::new(1, 1000),
            },
            kind: StreamKind::Data,
        });
        index
    }

    pub fn set_sample_aspect_ratio(&mut self, stream_index: usize, ratio: Rational) {
        if let Some(StreamKind::Video {
            sample_aspect_ratio, ..
        }) = self.streams.get_mut(stream_index).map(|s| &mut s.kind)
        {
            *sample_aspect_ratio = Some(ratio);
        }
    }

    pub fn set_decoder_delay(&mut self, stream_index: usize, frames: usize) {
        if let Some(StreamKind::Video { delay, .. }) =
            self.streams.get_mut(stream_index).map(|s| &mut s.kind)
        {
            *delay = frames;
        }
    }

    /// 按解封装顺序追加数据包
    pub fn push_packet(
        &mut self,
        stream_index: usize,
        pts: Option<i64>,
        keyframe: bool,
        data: Vec<u8>,
    ) {
        self.packets.push(MemoryPacket {
            stream_index,
            pts,
            keyframe,
            data: data.into(),
        });
    }

    pub fn packet_count(&self) -> usize {
        self.packets.len()
    }

    /// 按参数生成交错的音视频内容
    pub fn synthetic(spec: &SyntheticSpec) -> Self {
        let mut source = Self::new().with_duration(spec.duration());
        let mut timed: Vec<(f64, u8, MemoryPacket)> = Vec::new();

        if spec.has_video {
            let stream = source.add_video_stream(
                spec.width,
                spec.height,
                spec.video_format,
                Rational::new(1, 90000),
                1.0 / spec.frame_rate as f64,
            );
            source.set_decoder_delay(stream, spec.video_decoder_delay);
            let ticks = 90000 / spec.frame_rate.max(1) as i64;

            for n in 0..spec.video_frames {
                let data = if spec.corrupt_video_frames.contains(&n) {
                    Vec::new()
                } else {
                    spec.video_payload(n)
                };
                let pts = n as i64 * ticks;
                timed.push((
                    n as f64 / spec.frame_rate as f64,
                    1,
                    MemoryPacket {
                        stream_index: stream,
                        pts: Some(pts),
                        keyframe: n % spec.keyframe_interval.max(1) == 0,
                        data: data.into(),
                    },
                ));
            }
        }

        if spec.has_audio {
            let samples = spec.audio_samples_per_channel();
            let per_packet = spec.audio_frame_size.max(1) * spec.audio_frames_per_packet.max(1);

            for _ in 0..spec.audio_streams {
                let stream = source.add_audio_stream(
                    spec.audio_sample_rate,
                    spec.audio_channels,
                    spec.audio_frame_size,
                );

                let mut start = 0;
                while start < samples {
                    let count = per_packet.min(samples - start);
                    let data = (start * spec.audio_channels..(start + count) * spec.audio_channels)
                        .flat_map(|i| SyntheticSpec::audio_sample(i).to_le_bytes())
                        .collect::<Vec<u8>>();
                    timed.push((
                        start as f64 / spec.audio_sample_rate as f64,
                        0,
                        MemoryPacket {
                            stream_index: stream,
                            pts: Some(start as i64),
                            keyframe: true,
                            data: data.into(),
                        },
                    ));
                    start += count;
                }
            }
        }

        // 按时间交错，同一时间音频在前
        timed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        source.packets = timed.into_iter().map(|(_, _, packet)| packet).collect();

        debug!(
            "生成内存媒体源: {} 条流, {} 个包, {:.3}s",
            source.streams.len(),
            source.packets.len(),
            source.duration
        );

        source
    }

    fn packet_time(&self, packet: &MemoryPacket) -> Option<f64> {
        let stream = self.streams.get(packet.stream_index)?;
        packet
            .pts
            .map(|pts| pts as f64 * stream.info.time_base.to_f64())
    }

    /// 选出落点关键帧的时间：有视频流时只看视频关键帧
    fn keyframe_time(&self, target: f64, backward: bool) -> Option<f64> {
        let has_video = self
            .streams
            .iter()
            .any(|s| s.info.media_type == MediaType::Video);

        let keyframes = self.packets.iter().filter(|p| {
            p.keyframe
                && (!has_video
                    || self
                        .streams
                        .get(p.stream_index)
                        .is_some_and(|s| s.info.media_type == MediaType::Video))
        });
        let mut times = keyframes.filter_map(|p| self.packet_time(p));

        if backward {
            times
                .filter(|&t| t <= target + TIME_EPSILON)
                .fold(None, |best: Option<f64>, t| Some(best.map_or(t, |b| b.max(t))))
        } else {
            times.find(|&t| t + TIME_EPSILON >= target)
        }
    }
}

/// 合成内容的参数
#[derive(Debug, Clone)]
pub struct SyntheticSpec {
    pub has_audio: bool,
    pub has_video: bool,
    pub audio_streams: usize,
    pub audio_sample_rate: usize,
    pub audio_channels: usize,
    /// 每个解码帧的每声道采样数
    pub audio_frame_size: usize,
    pub audio_frames_per_packet: usize,
    /// 音频时长（秒）
    pub audio_duration: f64,
    pub video_frames: usize,
    pub frame_rate: u32,
    pub width: usize,
    pub height: usize,
    pub video_format: PixelFormat,
    pub keyframe_interval: usize,
    /// 这些帧的负载为空（解码失败）
    pub corrupt_video_frames: Vec<usize>,
    pub video_decoder_delay: usize,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            has_audio: true,
            has_video: true,
            audio_streams: 1,
            audio_sample_rate: 48000,
            audio_channels: 2,
            audio_frame_size: 1024,
            audio_frames_per_packet: 1,
            audio_duration: 0.4,
            video_frames: 10,
            frame_rate: 25,
            width: 64,
            height: 36,
            video_format: PixelFormat::Yuv420p,
            keyframe_interval: 5,
            corrupt_video_frames: Vec::new(),
            video_decoder_delay: 0,
        }
    }
}

impl SyntheticSpec {
    pub fn audio_only() -> Self {
        Self {
            has_video: false,
            ..Self::default()
        }
    }

    pub fn video_only() -> Self {
        Self {
            has_audio: false,
            ..Self::default()
        }
    }

    pub fn audio_samples_per_channel(&self) -> usize {
        (self.audio_duration * self.audio_sample_rate as f64).round() as usize
    }

    pub fn duration(&self) -> f64 {
        let video = if self.has_video {
            self.video_frames as f64 / self.frame_rate as f64
        } else {
            0.0
        };
        let audio = if self.has_audio { self.audio_duration } else { 0.0 };
        video.max(audio)
    }

    /// 第 `index` 个交错采样的值（永不为 0）
    pub fn audio_sample(index: usize) -> i16 {
        (index % 100) as i16 + 1
    }

    /// 第 `n` 帧的亮度值
    pub fn luma_for_frame(&self, n: usize) -> u8 {
        16 + (n * 20 % 200) as u8
    }

    fn video_payload(&self, n: usize) -> Vec<u8> {
        let luma = self.luma_for_frame(n);
        match self.video_format {
            PixelFormat::Yuv420p => {
                let (cw, ch) = chroma_size(self.width, self.height);
                let mut data = vec![luma; self.width * self.height];
                data.resize(data.len() + 2 * cw * ch, 128);
                data
            }
            PixelFormat::Rgba => [luma, luma, luma, 255].repeat(self.width * self.height),
        }
    }
}

/// 按名称注册内存媒体源的后端
#[derive(Clone, Default)]
pub struct MemoryBackend {
    sources: Arc<Mutex<HashMap<String, Arc<MemorySource>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, source: MemorySource) {
        self.sources.lock().insert(name.into(), Arc::new(source));
    }

    pub fn remove(&self, name: &str) -> bool {
        self.sources.lock().remove(name).is_some()
    }
}

impl MediaBackend for MemoryBackend {
    type Input = MemoryInput;

    fn open(&self, filename: &str) -> Result<MemoryInput> {
        let source = self
            .sources
            .lock()
            .get(filename)
            .cloned()
            .ok_or_else(|| PlayerError::OpenError(format!("内存源不存在: {}", filename)))?;

        Ok(MemoryInput {
            source,
            position: 0,
        })
    }
}

/// 打开的内存源，读取位置独立
pub struct MemoryInput {
    source: Arc<MemorySource>,
    position: usize,
}

impl MemoryInput {
    fn stream(&self, stream_index: usize) -> Result<&MemoryStream> {
        self.source
            .streams
            .get(stream_index)
            .ok_or_else(|| PlayerError::StreamInfo(format!("流 {} 不存在", stream_index)))
    }
}

impl MediaInput for MemoryInput {
    type Packet = MemoryPacket;
    type AudioDecoder = MemoryAudioDecoder;
    type VideoDecoder = MemoryVideoDecoder;

    fn streams(&self) -> Result<Vec<StreamInfo>> {
        Ok(self.source.streams.iter().map(|s| s.info.clone()).collect())
    }

    fn duration(&self) -> f64 {
        self.source.duration
    }

    fn sample_aspect_ratio(&self, stream_index: usize) -> Option<Rational> {
        match self.source.streams.get(stream_index)?.kind {
            StreamKind::Video {
                sample_aspect_ratio,
                ..
            } => sample_aspect_ratio,
            _ => None,
        }
    }

    fn read_packet(&mut self) -> Result<Option<MemoryPacket>> {
        if self.source.read_error_at == Some(self.position) {
            return Err(PlayerError::IoError(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("内存源在第 {} 个包处读取失败", self.position),
            )));
        }

        let packet = self.source.packets.get(self.position).cloned();
        if packet.is_some() {
            self.position += 1;
        }
        Ok(packet)
    }

    fn seek(&mut self, target: SeekTarget, backward: bool) -> Result<()> {
        let seconds = match target {
            SeekTarget::Stream { index, timestamp } => {
                timestamp as f64 * self.stream(index)?.info.time_base.to_f64()
            }
            SeekTarget::Global { seconds } => seconds,
        };

        let position = match self.source.keyframe_time(seconds, backward) {
            Some(keyframe) => self
                .source
                .packets
                .iter()
                .position(|p| {
                    self.source
                        .packet_time(p)
                        .is_some_and(|t| t + TIME_EPSILON >= keyframe)
                })
                .unwrap_or(self.source.packets.len()),
            None if backward => 0,
            None => self.source.packets.len(),
        };

        debug!(
            "内存源 seek: 目标 {:.3}s ({}) → 第 {} 个包",
            seconds,
            if backward { "向后" } else { "向前" },
            position
        );
        self.position = position;
        Ok(())
    }

    fn audio_decoder(&self, stream_index: usize) -> Result<MemoryAudioDecoder> {
        match self.stream(stream_index)?.kind {
            StreamKind::Audio {
                sample_rate,
                channels,
                frame_size,
            } => Ok(MemoryAudioDecoder {
                sample_rate,
                channels,
                frame_size,
            }),
            _ => Err(PlayerError::DecoderNotFound(format!(
                "流 {} 不是音频流",
                stream_index
            ))),
        }
    }

    fn video_decoder(&self, stream_index: usize) -> Result<MemoryVideoDecoder> {
        match self.stream(stream_index)?.kind {
            StreamKind::Video {
                width,
                height,
                format,
                frame_delay,
                delay,
                ..
            } => Ok(MemoryVideoDecoder {
                width,
                height,
                format,
                frame_delay,
                delay,
                held: VecDeque::new(),
            }),
            _ => Err(PlayerError::DecoderNotFound(format!(
                "流 {} 不是视频流",
                stream_index
            ))),
        }
    }
}

/// 解码后的交错 i16 音频
pub struct MemoryAudioFrame {
    samples: Vec<i16>,
    channels: usize,
    pts: Option<i64>,
}

impl RawAudioFrame for MemoryAudioFrame {
    fn samples(&self) -> usize {
        self.samples.len() / self.channels
    }

    fn best_effort_timestamp(&self) -> Option<i64> {
        self.pts
    }
}

pub struct MemoryAudioDecoder {
    sample_rate: usize,
    channels: usize,
    frame_size: usize,
}

impl AudioDecoder for MemoryAudioDecoder {
    type Packet = MemoryPacket;
    type Frame = MemoryAudioFrame;
    type Resampler = MemoryResampler;

    fn name(&self) -> String {
        "pcm_s16le".to_string()
    }

    fn params(&self) -> AudioParams {
        AudioParams {
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    fn decode(&mut self, packet: &MemoryPacket, out: &mut Vec<MemoryAudioFrame>) -> Result<()> {
        let data = packet.data();
        let frame_bytes = 2 * self.channels;
        if data.is_empty() || data.len() % frame_bytes != 0 {
            return Err(PlayerError::DecodeError(format!(
                "音频负载长度无效: {} 字节 ({} 声道)",
                data.len(),
                self.channels
            )));
        }

        let samples: Vec<i16> = data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();

        for (i, chunk) in samples.chunks(self.frame_size * self.channels).enumerate() {
            out.push(MemoryAudioFrame {
                samples: chunk.to_vec(),
                channels: self.channels,
                pts: packet.pts().map(|pts| pts + (i * self.frame_size) as i64),
            });
        }

        Ok(())
    }

    fn resampler(&self, output_channels: usize) -> Result<MemoryResampler> {
        if output_channels == 0 {
            return Err(PlayerError::Resampler("输出声道数为 0".to_string()));
        }
        Ok(MemoryResampler {
            input_channels: self.channels,
            output_channels,
        })
    }
}

/// 声道重映射：多声道到单声道取平均，其余按声道序号对应（不足时重复最后一个声道）
pub struct MemoryResampler {
    input_channels: usize,
    output_channels: usize,
}

impl Resampler for MemoryResampler {
    type Frame = MemoryAudioFrame;

    fn convert(&mut self, frame: &MemoryAudioFrame, out: &mut Vec<i16>) -> Result<()> {
        if frame.channels != self.input_channels {
            return Err(PlayerError::Resampler(format!(
                "声道数不匹配: 期望 {}, 实际 {}",
                self.input_channels, frame.channels
            )));
        }

        let (input, output) = (self.input_channels, self.output_channels);
        out.reserve(frame.samples() * output);

        for sample in frame.samples.chunks_exact(input) {
            if output == 1 && input > 1 {
                let sum: i32 = sample.iter().map(|&s| s as i32).sum();
                out.push((sum / input as i32) as i16);
            } else {
                out.extend((0..output).map(|c| sample[c.min(input - 1)]));
            }
        }

        Ok(())
    }
}

pub struct MemoryVideoFrame {
    width: usize,
    height: usize,
    format: PixelFormat,
    data: Arc<[u8]>,
    pts: Option<i64>,
}

impl RawVideoFrame for MemoryVideoFrame {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn best_effort_timestamp(&self) -> Option<i64> {
        self.pts
    }

    fn repeat_pict(&self) -> i32 {
        0
    }

    fn plane(&self, index: usize) -> (&[u8], usize) {
        let data: &[u8] = &self.data;
        match self.format {
            PixelFormat::Rgba => match index {
                0 => (data, self.width * 4),
                _ => (&data[..0], 0),
            },
            PixelFormat::Yuv420p => {
                let luma = self.width * self.height;
                let (cw, ch) = chroma_size(self.width, self.height);
                let chroma = cw * ch;
                match index {
                    0 => (&data[..luma], self.width),
                    1 => (&data[luma..luma + chroma], cw),
                    2 => (&data[luma + chroma..luma + 2 * chroma], cw),
                    _ => (&data[..0], 0),
                }
            }
        }
    }
}

pub struct MemoryVideoDecoder {
    width: usize,
    height: usize,
    format: PixelFormat,
    frame_delay: f64,
    delay: usize,
    held: VecDeque<MemoryVideoFrame>,
}

impl MemoryVideoDecoder {
    fn expected_size(&self) -> usize {
        match self.format {
            PixelFormat::Rgba => self.width * self.height * 4,
            PixelFormat::Yuv420p => {
                let (cw, ch) = chroma_size(self.width, self.height);
                self.width * self.height + 2 * cw * ch
            }
        }
    }
}

impl VideoDecoder for MemoryVideoDecoder {
    type Packet = MemoryPacket;
    type Frame = MemoryVideoFrame;
    type Converter = MemoryConverter;

    fn name(&self) -> String {
        "rawvideo".to_string()
    }

    fn params(&self) -> VideoParams {
        VideoParams {
            width: self.width,
            height: self.height,
            is_yuv420p: self.format == PixelFormat::Yuv420p,
            frame_delay: self.frame_delay,
        }
    }

    fn decode(&mut self, packet: &MemoryPacket, out: &mut Vec<MemoryVideoFrame>) -> Result<()> {
        if packet.size() != self.expected_size() {
            return Err(PlayerError::DecodeError(format!(
                "视频负载长度无效: {} 字节，期望 {}",
                packet.size(),
                self.expected_size()
            )));
        }

        self.held.push_back(MemoryVideoFrame {
            width: self.width,
            height: self.height,
            format: self.format,
            data: packet.data.clone(),
            pts: packet.pts(),
        });
        while self.held.len() > self.delay {
            if let Some(frame) = self.held.pop_front() {
                out.push(frame);
            }
        }

        Ok(())
    }

    fn drain(&mut self, out: &mut Vec<MemoryVideoFrame>) -> Result<()> {
        out.extend(self.held.drain(..));
        Ok(())
    }

    fn reset(&mut self) {
        self.held.clear();
    }

    fn converter(&self, dst: PixelFormat) -> Result<MemoryConverter> {
        if dst == PixelFormat::Yuv420p && self.format != PixelFormat::Yuv420p {
            return Err(PlayerError::Converter(format!(
                "不支持 {:?} → {:?}",
                self.format, dst
            )));
        }
        Ok(MemoryConverter { dst })
    }
}

/// 像素格式转换（YUV420P → RGBA 使用 BT.601 有限范围）
pub struct MemoryConverter {
    dst: PixelFormat,
}

impl Converter for MemoryConverter {
    type Frame = MemoryVideoFrame;

    fn convert(&mut self, src: &MemoryVideoFrame, dst: &mut FrameBuffer) -> Result<()> {
        if dst.format() != self.dst {
            return Err(PlayerError::Converter(format!(
                "目标格式不匹配: {:?} / {:?}",
                dst.format(),
                self.dst
            )));
        }

        let (width, height) = (src.width, src.height);
        match (src.format, self.dst) {
            (PixelFormat::Yuv420p, PixelFormat::Rgba) => {
                let (y_plane, y_stride) = src.plane(0);
                let (u_plane, u_stride) = src.plane(1);
                let (v_plane, v_stride) = src.plane(2);
                let (rgba, stride) = dst
                    .plane_mut(0)
                    .ok_or_else(|| PlayerError::Converter("目标缺少 RGBA 平面".to_string()))?;

                for row in 0..height {
                    for col in 0..width {
                        let y = y_plane[row * y_stride + col];
                        let u = u_plane[(row / 2) * u_stride + col / 2];
                        let v = v_plane[(row / 2) * v_stride + col / 2];
                        let offset = row * stride + col * 4;
                        rgba[offset..offset + 4].copy_from_slice(&yuv_to_rgba(y, u, v));
                    }
                }
            }
            (format, dst_format) if format == dst_format => {
                let (cw, ch) = chroma_size(width, height);
                for index in 0..dst.plane_count() {
                    let (row_bytes, rows) = match (format, index) {
                        (PixelFormat::Rgba, _) => (width * 4, height),
                        (_, 0) => (width, height),
                        _ => (cw, ch),
                    };
                    let (src_plane, src_stride) = src.plane(index);
                    let (dst_plane, dst_stride) = dst
                        .plane_mut(index)
                        .ok_or_else(|| PlayerError::Converter(format!("目标缺少平面 {}", index)))?;
                    copy_plane(dst_plane, dst_stride, src_plane, src_stride, row_bytes, rows)?;
                }
            }
            (format, dst_format) => {
                return Err(PlayerError::Converter(format!(
                    "不支持 {:?} → {:?}",
                    format, dst_format
                )));
            }
        }

        Ok(())
    }
}

fn yuv_to_rgba(y: u8, u: u8, v: u8) -> [u8; 4] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| x.clamp(0, 255) as u8;
    [
        clamp((298 * c + 409 * e + 128) >> 8),
        clamp((298 * c - 100 * d - 208 * e + 128) >> 8),
        clamp((298 * c + 516 * d + 128) >> 8),
        255,
    ]
}
