use crate::core::{BufferLimits, OutputMode, PixelFormat, PlayerError, Result};
use crate::player::backend::{Converter, MediaInput, RawVideoFrame, StreamInfo, VideoDecoder};
use crate::player::packet_queue::PacketQueue;
use crate::player::video_buffer::{
    chroma_size, copy_plane, FrameBuffer, SharedFrame, VideoFramePool,
};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::Arc;

/// 一次视频请求的结果
#[derive(Debug, Clone)]
pub struct VideoRequest {
    /// 当前帧（没有新帧时仍返回上一帧）
    pub frame: Option<SharedFrame>,
    /// 当前帧是否发生了变化
    pub got_video: bool,
}

/// 渲染线程使用的读取句柄
#[derive(Clone)]
pub struct VideoReader {
    pool: Arc<VideoFramePool>,
}

impl VideoReader {
    /// 推进到 `time` 并返回当前帧
    pub fn request_video(&self, time: f64) -> VideoRequest {
        let promoted = self.pool.advance_to_time(time);
        let frame = self.pool.current_frame();
        VideoRequest {
            got_video: promoted > 0 && frame.is_some(),
            frame,
        }
    }

    pub fn current_frame(&self) -> Option<SharedFrame> {
        self.pool.current_frame()
    }

    pub fn width(&self) -> usize {
        self.pool.width()
    }

    pub fn height(&self) -> usize {
        self.pool.height()
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pool.format()
    }
}

/// 单条视频流的解码上下文
///
/// 数据包队列 → 解码 → 格式转换（或平面直拷）→ 帧池
pub struct VideoDecodeContext<D: VideoDecoder> {
    stream_index: usize,
    packet_queue: PacketQueue<D::Packet>,
    pool: Arc<VideoFramePool>,
    decoder: D,
    /// 直拷 YUV420P 时为 None
    converter: Option<D::Converter>,
    time_base: f64,
    frame_delay: f64,
    time: f64,
    frame_count: u64,
    /// 帧池已满时解出的帧，下次优先入池
    pending: VecDeque<D::Frame>,
    scratch: Vec<D::Frame>,
    drained: bool,
    reader: VideoReader,
}

impl<D: VideoDecoder> VideoDecodeContext<D> {
    pub fn initialize<I>(
        input: &I,
        stream: &StreamInfo,
        output_mode: OutputMode,
        limits: &BufferLimits,
    ) -> Result<Self>
    where
        I: MediaInput<VideoDecoder = D>,
    {
        let decoder = input.video_decoder(stream.index)?;
        let params = decoder.params();

        if params.width == 0 || params.height == 0 {
            return Err(PlayerError::DecoderOpen(format!(
                "视频流 {} 尺寸无效: {}x{}",
                stream.index, params.width, params.height
            )));
        }

        let passthrough = output_mode == OutputMode::PlanarYuv && params.is_yuv420p;
        let format = if passthrough {
            PixelFormat::Yuv420p
        } else {
            PixelFormat::Rgba
        };

        let pool = Arc::new(VideoFramePool::new(
            params.width,
            params.height,
            format,
            limits.video_frame_pool,
        )?);

        let converter = if passthrough {
            None
        } else {
            Some(decoder.converter(format)?)
        };

        info!(
            "🎬 视频解码器: {} (stream {}), {}x{}, 输出 {:?}{}",
            decoder.name(),
            stream.index,
            params.width,
            params.height,
            format,
            if passthrough { "（直拷）" } else { "" }
        );

        Ok(Self {
            stream_index: stream.index,
            packet_queue: PacketQueue::new(limits.video_packet_queue),
            reader: VideoReader { pool: pool.clone() },
            pool,
            decoder,
            converter,
            time_base: stream.time_base.to_f64(),
            frame_delay: params.frame_delay,
            time: 0.0,
            frame_count: 0,
            pending: VecDeque::new(),
            scratch: Vec::new(),
            drained: false,
        })
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    pub fn width(&self) -> usize {
        self.pool.width()
    }

    pub fn height(&self) -> usize {
        self.pool.height()
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pool.format()
    }

    /// 最近一帧解码后的时间（秒）
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn pool(&self) -> &Arc<VideoFramePool> {
        &self.pool
    }

    pub fn reader(&self) -> VideoReader {
        self.reader.clone()
    }

    pub fn is_queue_full(&self) -> bool {
        self.packet_queue.is_full()
    }

    pub fn queued_packets(&self) -> usize {
        self.packet_queue.len()
    }

    pub fn pending_frames(&self) -> usize {
        self.pending.len()
    }

    pub fn add_packet(&mut self, packet: &D::Packet) {
        self.packet_queue.push_back(packet);
    }

    /// 帧池无待显示帧、队列为空且没有积压的帧
    pub fn depleted(&self) -> bool {
        self.pool.depleted() && self.packet_queue.is_empty() && self.pending.is_empty()
    }

    pub fn request_video(&self, time: f64) -> VideoRequest {
        self.reader.request_video(time)
    }

    /// 帧池未满时持续解码队首数据包
    pub fn fill_video_buffer(&mut self, end_of_input: bool) {
        self.store_pending();

        while !self.pool.is_full() {
            let Some(packet) = self.packet_queue.front() else {
                break;
            };

            self.scratch.clear();
            if let Err(e) = self.decoder.decode(packet, &mut self.scratch) {
                warn!("视频解码失败 (stream {}): {}，丢弃该包", self.stream_index, e);
            }
            self.pending.extend(self.scratch.drain(..));
            self.packet_queue.pop_front();

            self.store_pending();
        }

        if end_of_input && self.packet_queue.is_empty() && !self.drained {
            self.drained = true;
            self.scratch.clear();
            if let Err(e) = self.decoder.drain(&mut self.scratch) {
                warn!("视频解码器排空失败: {}", e);
            }
            if !self.scratch.is_empty() {
                debug!("视频解码器排空: {} 帧", self.scratch.len());
            }
            self.pending.extend(self.scratch.drain(..));
            self.store_pending();
        }
    }

    /// Seek 时调用：丢弃排队数据与所有帧，帧计数与推算时间归零
    pub fn clear_buffers(&mut self) {
        self.packet_queue.clear();
        self.pending.clear();
        self.pool.clear();
        self.decoder.reset();
        self.time = 0.0;
        self.frame_count = 0;
        self.drained = false;
    }

    /// 把积压的原始帧写入空闲帧
    fn store_pending(&mut self) {
        while !self.pending.is_empty() {
            let Some(slot) = self.pool.allocate_frame() else {
                break;
            };
            let Some(raw) = self.pending.pop_front() else {
                self.pool.release_frame(slot);
                break;
            };

            match self.write_frame(&slot, &raw) {
                Ok(()) => self.pool.store_frame(slot),
                Err(e) => {
                    warn!("视频帧转换失败 (stream {}): {}", self.stream_index, e);
                    self.pool.release_frame(slot);
                }
            }
        }
    }

    fn write_frame(&mut self, slot: &SharedFrame, raw: &D::Frame) -> Result<()> {
        let mut frame = slot.write();

        match self.converter.as_mut() {
            Some(converter) => converter.convert(raw, frame.buffer_mut())?,
            None => copy_yuv420(raw, frame.buffer_mut())?,
        }

        let time = self.set_timing_for_frame(raw);
        frame.set_timing(time, self.frame_count);
        self.frame_count += 1;
        Ok(())
    }

    /// 有时间戳时按时间基换算，否则在上一帧时间上累加帧间隔
    fn set_timing_for_frame(&mut self, raw: &D::Frame) -> f64 {
        self.time = match raw.best_effort_timestamp() {
            Some(ts) => ts as f64 * self.time_base,
            None if self.frame_count == 0 => self.time,
            None => {
                let delay = self.frame_delay;
                self.time + delay + raw.repeat_pict() as f64 * delay * 0.5
            }
        };
        self.time
    }
}

/// 平面直拷：源与目标均为 YUV420P，行跨度可以不同
fn copy_yuv420<F: RawVideoFrame>(raw: &F, dst: &mut FrameBuffer) -> Result<()> {
    let (width, height) = (raw.width(), raw.height());
    let (cw, ch) = chroma_size(width, height);

    for index in 0..3 {
        let (row_bytes, rows) = if index == 0 { (width, height) } else { (cw, ch) };
        let (src, src_stride) = raw.plane(index);
        let (dst, dst_stride) = dst.plane_mut(index).ok_or_else(|| {
            PlayerError::Converter(format!("目标帧缺少第 {} 个平面", index))
        })?;
        copy_plane(dst, dst_stride, src, src_stride, row_bytes, rows)?;
    }

    Ok(())
}
