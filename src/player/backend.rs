use crate::core::{MediaType, PixelFormat, Rational, Result};
use crate::player::video_buffer::FrameBuffer;

/// 流信息（探测结果）
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub index: usize,
    pub media_type: MediaType,
    pub codec_name: String,
    pub time_base: Rational,
}

/// Seek 目标
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    /// 按单条流的时间基定位
    Stream { index: usize, timestamp: i64 },
    /// 按容器全局时间基定位（秒）
    Global { seconds: f64 },
}

/// 音频解码器参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioParams {
    pub sample_rate: usize,
    pub channels: usize,
}

/// 视频解码器参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoParams {
    pub width: usize,
    pub height: usize,
    /// 源格式是否为平面 YUV420P
    pub is_yuv420p: bool,
    /// 标称帧间隔（秒），时间戳缺失时用来累加
    pub frame_delay: f64,
}

/// 压缩数据包
///
/// 后端负责引用计数：`try_ref` 返回同一份数据的新引用，无法引用时返回 None。
pub trait MediaPacket: Send + Sized + 'static {
    fn stream_index(&self) -> usize;

    fn size(&self) -> usize;

    fn try_ref(&self) -> Option<Self>;
}

/// 媒体后端：负责一次性的全局初始化与打开容器
pub trait MediaBackend: Send + 'static {
    type Input: MediaInput;

    /// 进程级初始化，可以重复调用
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn open(&self, filename: &str) -> Result<Self::Input>;
}

/// 已打开的容器（解封装器）
pub trait MediaInput: Send + 'static {
    type Packet: MediaPacket;
    type AudioDecoder: AudioDecoder<Packet = Self::Packet>;
    type VideoDecoder: VideoDecoder<Packet = Self::Packet>;

    /// 探测所有流
    fn streams(&self) -> Result<Vec<StreamInfo>>;

    /// 总时长（秒），未知时为 0.0
    fn duration(&self) -> f64;

    fn sample_aspect_ratio(&self, stream_index: usize) -> Option<Rational>;

    /// 读取下一个数据包
    ///
    /// 返回：
    /// - Ok(Some(packet)): 成功读取一个包
    /// - Ok(None): 到达文件末尾
    /// - Err(e): 读取错误
    fn read_packet(&mut self) -> Result<Option<Self::Packet>>;

    /// `backward` 为 true 时落在目标之前最近的关键帧上
    fn seek(&mut self, target: SeekTarget, backward: bool) -> Result<()>;

    fn audio_decoder(&self, stream_index: usize) -> Result<Self::AudioDecoder>;

    fn video_decoder(&self, stream_index: usize) -> Result<Self::VideoDecoder>;
}

/// 解码后的原始音频帧
pub trait RawAudioFrame: Send + 'static {
    /// 每声道采样数
    fn samples(&self) -> usize;

    fn best_effort_timestamp(&self) -> Option<i64>;
}

/// 解码后的原始视频帧
pub trait RawVideoFrame: Send + 'static {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn best_effort_timestamp(&self) -> Option<i64>;

    /// 重复场数（repeat_pict）
    fn repeat_pict(&self) -> i32;

    /// 第 `index` 个平面的数据与行跨度（字节）
    fn plane(&self, index: usize) -> (&[u8], usize);
}

pub trait AudioDecoder: Send + 'static {
    type Packet: MediaPacket;
    type Frame: RawAudioFrame;
    type Resampler: Resampler<Frame = Self::Frame>;

    fn name(&self) -> String;

    fn params(&self) -> AudioParams;

    /// 解码一个数据包，一个包可能产生多帧。出错前已解出的帧保留在 `out` 中。
    fn decode(&mut self, packet: &Self::Packet, out: &mut Vec<Self::Frame>) -> Result<()>;

    /// 输入结束后取出解码器内部缓冲的帧
    fn drain(&mut self, _out: &mut Vec<Self::Frame>) -> Result<()> {
        Ok(())
    }

    /// Seek 后丢弃内部状态
    fn reset(&mut self) {}

    /// 创建重采样器：输出为交错 i16、源采样率、`output_channels` 声道
    fn resampler(&self, output_channels: usize) -> Result<Self::Resampler>;
}

pub trait Resampler: Send + 'static {
    type Frame;

    /// 把一帧转换为交错 i16 并追加到 `out`
    fn convert(&mut self, frame: &Self::Frame, out: &mut Vec<i16>) -> Result<()>;
}

pub trait VideoDecoder: Send + 'static {
    type Packet: MediaPacket;
    type Frame: RawVideoFrame;
    type Converter: Converter<Frame = Self::Frame>;

    fn name(&self) -> String;

    fn params(&self) -> VideoParams;

    fn decode(&mut self, packet: &Self::Packet, out: &mut Vec<Self::Frame>) -> Result<()>;

    fn drain(&mut self, _out: &mut Vec<Self::Frame>) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) {}

    fn converter(&self, dst: PixelFormat) -> Result<Self::Converter>;
}

/// 像素格式转换器
pub trait Converter: Send + 'static {
    type Frame;

    fn convert(&mut self, src: &Self::Frame, dst: &mut FrameBuffer) -> Result<()>;
}
