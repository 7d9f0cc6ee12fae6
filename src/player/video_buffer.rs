use crate::core::{PixelFormat, PlayerError, Result};
use log::{debug, warn};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::VecDeque;
use std::sync::Arc;

/// 帧像素数据，按像素格式区分
#[derive(Debug, Clone, PartialEq)]
pub enum FrameBuffer {
    /// 打包 RGBA8，单平面
    Rgba { data: Vec<u8>, stride: usize },
    /// 平面 YUV420：Y、U、V 三个平面
    Yuv420 {
        planes: [Vec<u8>; 3],
        strides: [usize; 3],
    },
}

impl FrameBuffer {
    /// 按格式与尺寸一次性分配（之后不再重新分配）
    pub fn new(format: PixelFormat, width: usize, height: usize) -> Self {
        match format {
            PixelFormat::Rgba => {
                let stride = width * 4;
                Self::Rgba {
                    data: vec![0; stride * height],
                    stride,
                }
            }
            PixelFormat::Yuv420p => {
                let (cw, ch) = chroma_size(width, height);
                Self::Yuv420 {
                    planes: [vec![0; width * height], vec![128; cw * ch], vec![128; cw * ch]],
                    strides: [width, cw, cw],
                }
            }
        }
    }

    pub fn format(&self) -> PixelFormat {
        match self {
            Self::Rgba { .. } => PixelFormat::Rgba,
            Self::Yuv420 { .. } => PixelFormat::Yuv420p,
        }
    }

    pub fn plane_count(&self) -> usize {
        match self {
            Self::Rgba { .. } => 1,
            Self::Yuv420 { .. } => 3,
        }
    }

    /// 第 `index` 个平面的数据与行跨度
    pub fn plane(&self, index: usize) -> Option<(&[u8], usize)> {
        match self {
            Self::Rgba { data, stride } if index == 0 => Some((data.as_slice(), *stride)),
            Self::Yuv420 { planes, strides } if index < 3 => {
                Some((planes[index].as_slice(), strides[index]))
            }
            _ => None,
        }
    }

    pub fn plane_mut(&mut self, index: usize) -> Option<(&mut [u8], usize)> {
        match self {
            Self::Rgba { data, stride } if index == 0 => Some((data.as_mut_slice(), *stride)),
            Self::Yuv420 { planes, strides } if index < 3 => {
                Some((planes[index].as_mut_slice(), strides[index]))
            }
            _ => None,
        }
    }
}

/// YUV420 色度平面尺寸
pub fn chroma_size(width: usize, height: usize) -> (usize, usize) {
    ((width + 1) / 2, (height + 1) / 2)
}

/// 逐行拷贝一个平面（源与目标行跨度可以不同）
pub fn copy_plane(
    dst: &mut [u8],
    dst_stride: usize,
    src: &[u8],
    src_stride: usize,
    row_bytes: usize,
    rows: usize,
) -> Result<()> {
    let needed = |stride: usize| if rows == 0 { 0 } else { stride * (rows - 1) + row_bytes };
    if row_bytes > dst_stride.min(src_stride)
        || src.len() < needed(src_stride)
        || dst.len() < needed(dst_stride)
    {
        return Err(PlayerError::DecodeError(format!(
            "平面尺寸不匹配: src {} 字节/跨度 {}, dst {} 字节/跨度 {}, {}x{}",
            src.len(),
            src_stride,
            dst.len(),
            dst_stride,
            row_bytes,
            rows
        )));
    }

    for y in 0..rows {
        let src_offset = y * src_stride;
        let dst_offset = y * dst_stride;
        dst[dst_offset..dst_offset + row_bytes]
            .copy_from_slice(&src[src_offset..src_offset + row_bytes]);
    }

    Ok(())
}

/// 视频帧（帧池中的一个槽位，缓冲区复用）
#[derive(Debug)]
pub struct VideoFrame {
    width: usize,
    height: usize,
    buffer: FrameBuffer,
    time: f64,
    is_first_frame: bool,
    is_valid_for_read: bool,
    frame_number: u64,
}

impl VideoFrame {
    fn new(width: usize, height: usize, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            buffer: FrameBuffer::new(format, width, height),
            time: 0.0,
            is_first_frame: false,
            is_valid_for_read: false,
            frame_number: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.buffer.format()
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut FrameBuffer {
        &mut self.buffer
    }

    /// 显示时间戳（秒）
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn is_first_frame(&self) -> bool {
        self.is_first_frame
    }

    pub fn is_valid_for_read(&self) -> bool {
        self.is_valid_for_read
    }

    /// 解码序号（每次 Seek 后从 0 重新计数）
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn set_timing(&mut self, time: f64, frame_number: u64) {
        self.time = time;
        self.frame_number = frame_number;
        self.is_first_frame = frame_number == 0;
    }
}

/// 帧池槽位：帧数据由读写锁保护
///
/// 只有生产者在 allocate 与 store 之间写入，消费者只读当前帧。
#[derive(Debug)]
pub struct FrameSlot {
    index: usize,
    frame: RwLock<VideoFrame>,
}

impl FrameSlot {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn read(&self) -> RwLockReadGuard<'_, VideoFrame> {
        self.frame.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, VideoFrame> {
        self.frame.write()
    }

    pub fn time(&self) -> f64 {
        self.frame.read().time
    }
}

pub type SharedFrame = Arc<FrameSlot>;

/// 帧池各集合的数量（用于校验守恒）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCounts {
    pub free: usize,
    pub consume: usize,
    pub current: usize,
    /// 已分配给解码器、尚未 store/release 的帧
    pub in_flight: usize,
}

impl PoolCounts {
    pub fn total(&self) -> usize {
        self.free + self.consume + self.current + self.in_flight
    }
}

struct PoolState {
    free: VecDeque<SharedFrame>,
    consume: VecDeque<SharedFrame>,
    current: Option<SharedFrame>,
    in_flight: usize,
}

/// 固定容量的视频帧池
///
/// 三个互不相交的集合：空闲列表（解码目标）、待显示列表（按时间排序）、
/// 当前帧（最近一次显示的帧）。
pub struct VideoFramePool {
    width: usize,
    height: usize,
    format: PixelFormat,
    capacity: usize,
    state: Mutex<PoolState>,
}

impl VideoFramePool {
    pub fn new(width: usize, height: usize, format: PixelFormat, capacity: usize) -> Result<Self> {
        if capacity == 0 || width == 0 || height == 0 {
            return Err(PlayerError::PoolAllocation(format!(
                "无效的帧池参数: {}x{}, 容量 {}",
                width, height, capacity
            )));
        }

        let free = (0..capacity)
            .map(|index| {
                Arc::new(FrameSlot {
                    index,
                    frame: RwLock::new(VideoFrame::new(width, height, format)),
                })
            })
            .collect();

        debug!("帧池初始化: {}x{}, {:?}, {} 帧", width, height, format, capacity);

        Ok(Self {
            width,
            height,
            format,
            capacity,
            state: Mutex::new(PoolState {
                free,
                consume: VecDeque::with_capacity(capacity),
                current: None,
                in_flight: 0,
            }),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 从空闲列表取一帧用于解码，池满时返回 None（调用前应检查 `is_full`）
    pub fn allocate_frame(&self) -> Option<SharedFrame> {
        let frame = {
            let mut state = self.state.lock();
            let frame = state.free.pop_front()?;
            state.in_flight += 1;
            frame
        };

        frame.write().is_valid_for_read = false;
        Some(frame)
    }

    /// 解码完成的帧进入待显示列表
    pub fn store_frame(&self, frame: SharedFrame) {
        frame.write().is_valid_for_read = true;

        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        state.consume.push_back(frame);
    }

    /// 未使用的帧退回空闲列表（解码或转换失败时）
    pub fn release_frame(&self, frame: SharedFrame) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        state.free.push_back(frame);
    }

    pub fn current_frame(&self) -> Option<SharedFrame> {
        self.state.lock().current.clone()
    }

    /// 下一个待显示的帧
    pub fn peek_next_frame(&self) -> Option<SharedFrame> {
        self.state.lock().consume.front().cloned()
    }

    /// 推进到指定时间：时间早于 `time`（或标记为首帧）的待显示帧依次成为当前帧，
    /// 旧的当前帧回到空闲列表。返回提升的帧数，大于 1 表示发生了跳帧。
    pub fn advance_to_time(&self, time: f64) -> usize {
        let mut state = self.state.lock();
        let mut promoted = 0;

        loop {
            let Some(front) = state.consume.front() else {
                break;
            };

            let ready = {
                let frame = front.read();
                frame.time < time || frame.is_first_frame
            };
            if !ready {
                break;
            }

            let next = state.consume.pop_front();
            if let Some(old) = std::mem::replace(&mut state.current, next) {
                state.free.push_back(old);
            }
            promoted += 1;
        }

        if promoted > 1 {
            warn!("视频跳帧: 推进到 {:.3}s 时丢弃了 {} 帧", time, promoted - 1);
        }

        promoted
    }

    /// 待显示列表为空
    pub fn depleted(&self) -> bool {
        self.state.lock().consume.is_empty()
    }

    /// 空闲列表为空（用于节流解码）
    pub fn is_full(&self) -> bool {
        self.state.lock().free.is_empty()
    }

    pub fn counts(&self) -> PoolCounts {
        let state = self.state.lock();
        PoolCounts {
            free: state.free.len(),
            consume: state.consume.len(),
            current: usize::from(state.current.is_some()),
            in_flight: state.in_flight,
        }
    }

    /// Seek 时调用：当前帧与所有待显示帧回到空闲列表
    pub fn clear(&self) {
        let mut state = self.state.lock();
        if let Some(current) = state.current.take() {
            state.free.push_back(current);
        }
        while let Some(frame) = state.consume.pop_front() {
            state.free.push_back(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_at(pool: &VideoFramePool, time: f64, frame_number: u64) {
        let frame = pool.allocate_frame().unwrap();
        frame.write().set_timing(time, frame_number);
        pool.store_frame(frame);
    }

    fn assert_conserved(pool: &VideoFramePool) {
        let counts = pool.counts();
        assert_eq!(counts.in_flight, 0);
        assert_eq!(counts.free + counts.consume + counts.current, pool.capacity());
    }

    #[test]
    fn test_frame_selection_is_deterministic() {
        let pool = VideoFramePool::new(4, 4, PixelFormat::Rgba, 4).unwrap();
        store_at(&pool, 0.00, 1);
        store_at(&pool, 0.04, 2);
        store_at(&pool, 0.08, 3);
        assert_conserved(&pool);

        assert_eq!(pool.advance_to_time(0.05), 2);
        assert_eq!(pool.current_frame().unwrap().time(), 0.04);
        assert_conserved(&pool);

        assert_eq!(pool.advance_to_time(0.09), 1);
        assert_eq!(pool.current_frame().unwrap().time(), 0.08);
        assert!(pool.depleted());
        assert_conserved(&pool);
    }

    #[test]
    fn test_first_frame_always_surfaces() {
        let pool = VideoFramePool::new(2, 2, PixelFormat::Rgba, 2).unwrap();
        store_at(&pool, 3.0, 0);
        store_at(&pool, 3.04, 1);

        assert_eq!(pool.advance_to_time(-1.0), 1);
        let current = pool.current_frame().unwrap();
        assert!(current.read().is_first_frame());
        assert!(current.read().is_valid_for_read());
        assert_eq!(current.time(), 3.0);

        // 后续帧仍然按时间推进
        assert_eq!(pool.advance_to_time(-1.0), 0);
        assert_eq!(pool.peek_next_frame().unwrap().time(), 3.04);
    }

    #[test]
    fn test_is_full_and_allocation() {
        let pool = VideoFramePool::new(2, 2, PixelFormat::Yuv420p, 2).unwrap();
        let a = pool.allocate_frame().unwrap();
        let b = pool.allocate_frame().unwrap();
        assert!(pool.is_full());
        assert!(pool.allocate_frame().is_none());
        assert_eq!(pool.counts().in_flight, 2);

        pool.release_frame(a);
        assert!(!pool.is_full());
        pool.store_frame(b);
        assert!(!pool.depleted());
        assert_conserved(&pool);
    }

    #[test]
    fn test_clear_returns_everything_to_free() {
        let pool = VideoFramePool::new(2, 2, PixelFormat::Rgba, 3).unwrap();
        store_at(&pool, 0.0, 0);
        store_at(&pool, 0.1, 1);
        store_at(&pool, 0.2, 2);
        pool.advance_to_time(0.05);
        assert!(pool.is_full());

        pool.clear();
        let counts = pool.counts();
        assert_eq!(counts.free, 3);
        assert_eq!(counts.consume, 0);
        assert_eq!(counts.current, 0);
        assert!(pool.current_frame().is_none());
        assert!(pool.depleted());
    }

    #[test]
    fn test_conservation_through_cycles() {
        let pool = VideoFramePool::new(2, 2, PixelFormat::Rgba, 3).unwrap();
        let mut time = 0.0;
        for n in 0..20u64 {
            while !pool.is_full() {
                store_at(&pool, time, n);
                time += 0.04;
                assert_conserved(&pool);
            }
            pool.advance_to_time(time - 0.05);
            assert_conserved(&pool);
        }
    }

    #[test]
    fn test_frame_buffer_layout() {
        let rgba = FrameBuffer::new(PixelFormat::Rgba, 3, 2);
        assert_eq!(rgba.plane(0).map(|(d, s)| (d.len(), s)), Some((24, 12)));
        assert!(rgba.plane(1).is_none());

        let yuv = FrameBuffer::new(PixelFormat::Yuv420p, 5, 3);
        assert_eq!(yuv.plane_count(), 3);
        assert_eq!(yuv.plane(0).map(|(d, s)| (d.len(), s)), Some((15, 5)));
        assert_eq!(yuv.plane(1).map(|(d, s)| (d.len(), s)), Some((6, 3)));
        assert_eq!(yuv.format(), PixelFormat::Yuv420p);
    }

    #[test]
    fn test_copy_plane_with_padding() {
        let src = [1u8, 2, 0, 0, 3, 4, 0, 0];
        let mut dst = [9u8; 4];
        copy_plane(&mut dst, 2, &src, 4, 2, 2).unwrap();
        assert_eq!(dst, [1, 2, 3, 4]);

        assert!(copy_plane(&mut dst, 2, &src[..3], 4, 2, 2).is_err());
    }

    #[test]
    fn test_invalid_pool_parameters() {
        assert!(VideoFramePool::new(0, 2, PixelFormat::Rgba, 2).is_err());
        assert!(VideoFramePool::new(2, 2, PixelFormat::Rgba, 0).is_err());
    }
}
