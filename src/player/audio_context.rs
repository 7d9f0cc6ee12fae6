use crate::core::{AudioOutputMode, BufferLimits, PlayerError, Result};
use crate::player::audio_buffer::{AudioSampleBuffer, AudioSegment};
use crate::player::backend::{AudioDecoder, MediaInput, RawAudioFrame, Resampler, StreamInfo};
use crate::player::packet_queue::PacketQueue;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 一次音频请求的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioRequest {
    /// 始终为 true：输出缓冲区总是被填满（数据不足时补静音）
    pub got_audio: bool,
    /// 请求前缓冲区是否有数据
    pub had_data: bool,
    /// 实际拷贝的采样数（所有声道合计）
    pub samples_read: usize,
    /// 最近一次交给消费者的片段时间（秒）
    pub time: f64,
}

/// 音频线程使用的读取句柄
///
/// 可以克隆并移动到音频回调线程，读取永不等待解码线程。
#[derive(Clone)]
pub struct AudioReader {
    buffer: Arc<AudioSampleBuffer>,
    channels: usize,
    sample_rate: usize,
    last_time: Arc<AtomicU64>,
}

impl AudioReader {
    pub fn channel_count(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> usize {
        self.sample_rate
    }

    /// 读取 `frame_count` 帧（每帧 `channels` 个采样）到 `out`
    ///
    /// `out` 比请求短时按 `out` 的长度截断。
    pub fn request_audio(&self, out: &mut [i16], frame_count: usize) -> AudioRequest {
        let wanted = (frame_count * self.channels).min(out.len());
        let read = self.buffer.read_samples(&mut out[..wanted]);

        if let Some(time) = read.time {
            self.set_time(time);
        }

        AudioRequest {
            got_audio: true,
            had_data: read.had_data,
            samples_read: read.samples_read,
            time: self.time(),
        }
    }

    pub fn time(&self) -> f64 {
        f64::from_bits(self.last_time.load(Ordering::Acquire))
    }

    fn set_time(&self, time: f64) {
        self.last_time.store(time.to_bits(), Ordering::Release);
    }

    pub fn depleted(&self) -> bool {
        self.buffer.depleted()
    }
}

/// 单条音频流的解码上下文
///
/// 数据包队列 → 解码 → 重采样为交错 i16 → 音频采样缓冲区
pub struct AudioDecodeContext<D: AudioDecoder> {
    stream_index: usize,
    packet_queue: PacketQueue<D::Packet>,
    buffer: Arc<AudioSampleBuffer>,
    decoder: D,
    resampler: D::Resampler,
    sample_rate: usize,
    source_channels: usize,
    output_channels: usize,
    time_base: f64,
    max_segment_samples: usize,
    /// 时间戳缺失时使用的推算时间
    next_time: Option<f64>,
    drained: bool,
    frames: Vec<D::Frame>,
    pcm: Vec<i16>,
    reader: AudioReader,
}

impl<D: AudioDecoder> AudioDecodeContext<D> {
    /// 打开音频解码器并配置重采样器
    pub fn initialize<I>(
        input: &I,
        stream: &StreamInfo,
        output_mode: AudioOutputMode,
        limits: &BufferLimits,
    ) -> Result<Self>
    where
        I: MediaInput<AudioDecoder = D>,
    {
        let decoder = input.audio_decoder(stream.index)?;
        let params = decoder.params();

        if params.sample_rate == 0 || params.channels == 0 {
            return Err(PlayerError::DecoderOpen(format!(
                "音频流 {} 参数无效: {} Hz, {} 声道",
                stream.index, params.sample_rate, params.channels
            )));
        }

        let output_channels = match output_mode {
            AudioOutputMode::Mono => 1,
            AudioOutputMode::Stereo => 2,
            AudioOutputMode::Native => params.channels,
        };

        let resampler = decoder.resampler(output_channels)?;

        // 片段上限按整帧对齐
        let max_segment_samples =
            (limits.max_segment_samples / output_channels).max(1) * output_channels;

        info!(
            "🔊 音频解码器: {} (stream {}), {} Hz, {} → {} 声道",
            decoder.name(),
            stream.index,
            params.sample_rate,
            params.channels,
            output_channels
        );

        let buffer = Arc::new(AudioSampleBuffer::new());
        let reader = AudioReader {
            buffer: buffer.clone(),
            channels: output_channels,
            sample_rate: params.sample_rate,
            last_time: Arc::new(AtomicU64::new(0f64.to_bits())),
        };

        Ok(Self {
            stream_index: stream.index,
            packet_queue: PacketQueue::new(limits.audio_packet_queue),
            buffer,
            decoder,
            resampler,
            sample_rate: params.sample_rate,
            source_channels: params.channels,
            output_channels,
            time_base: stream.time_base.to_f64(),
            max_segment_samples,
            next_time: None,
            drained: false,
            frames: Vec::new(),
            pcm: Vec::new(),
            reader,
        })
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    pub fn sample_rate(&self) -> usize {
        self.sample_rate
    }

    pub fn source_channel_count(&self) -> usize {
        self.source_channels
    }

    pub fn output_channel_count(&self) -> usize {
        self.output_channels
    }

    /// 最近一次交给消费者的时间（秒）
    pub fn time(&self) -> f64 {
        self.reader.time()
    }

    /// Seek 之后把呈现时间设到落点，消费者下次读取前 `time()` 即返回该值
    pub fn set_time(&self, time: f64) {
        self.reader.set_time(time);
    }

    pub fn reader(&self) -> AudioReader {
        self.reader.clone()
    }

    pub fn buffer(&self) -> &Arc<AudioSampleBuffer> {
        &self.buffer
    }

    pub fn is_queue_full(&self) -> bool {
        self.packet_queue.is_full()
    }

    pub fn queued_packets(&self) -> usize {
        self.packet_queue.len()
    }

    pub fn add_packet(&mut self, packet: &D::Packet) {
        self.packet_queue.push_back(packet);
    }

    /// 采样缓冲区为空且数据包队列为空
    pub fn depleted(&self) -> bool {
        self.buffer.depleted() && self.packet_queue.is_empty()
    }

    pub fn request_audio(&self, out: &mut [i16], frame_count: usize) -> AudioRequest {
        self.reader.request_audio(out, frame_count)
    }

    /// 解码队列中的全部数据包
    ///
    /// `end_of_input` 为 true 且队列已空时取出解码器内部缓冲的帧（只做一次）。
    pub fn fill_audio_buffer(&mut self, end_of_input: bool) {
        while let Some(packet) = self.packet_queue.front() {
            self.frames.clear();
            if let Err(e) = self.decoder.decode(packet, &mut self.frames) {
                warn!("音频解码失败 (stream {}): {}，丢弃该包", self.stream_index, e);
            }
            self.publish_frames();
            self.packet_queue.pop_front();
        }

        if end_of_input && !self.drained {
            self.drained = true;
            self.frames.clear();
            if let Err(e) = self.decoder.drain(&mut self.frames) {
                warn!("音频解码器排空失败: {}", e);
            }
            if !self.frames.is_empty() {
                debug!("音频解码器排空: {} 帧", self.frames.len());
            }
            self.publish_frames();
        }
    }

    /// Seek 时调用：丢弃所有排队与已解码的数据，呈现时间归零
    pub fn clear_buffers(&mut self) {
        self.packet_queue.clear();
        self.buffer.clear();
        self.decoder.reset();
        self.reader.set_time(0.0);
        self.next_time = None;
        self.drained = false;
    }

    /// 重采样本次解出的帧并切分为片段
    fn publish_frames(&mut self) {
        let mut frames = std::mem::take(&mut self.frames);

        for frame in frames.drain(..) {
            self.pcm.clear();
            if let Err(e) = self.resampler.convert(&frame, &mut self.pcm) {
                warn!("音频重采样失败 (stream {}): {}", self.stream_index, e);
                continue;
            }
            if self.pcm.is_empty() {
                continue;
            }

            let base_time = match frame.best_effort_timestamp() {
                Some(ts) => ts as f64 * self.time_base,
                None => self.next_time.unwrap_or(0.0),
            };

            let rate = self.sample_rate as f64;
            let channels = self.output_channels;
            for (i, chunk) in self.pcm.chunks(self.max_segment_samples).enumerate() {
                let offset = (i * self.max_segment_samples / channels) as f64 / rate;
                self.buffer
                    .add_segment(AudioSegment::new(chunk.to_vec(), base_time + offset));
            }

            self.next_time = Some(base_time + (self.pcm.len() / channels) as f64 / rate);
        }

        self.frames = frames;
    }
}
