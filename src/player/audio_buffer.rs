use parking_lot::Mutex;
use std::collections::VecDeque;

/// 一段解码后的交错 i16 PCM 数据
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    samples: Vec<i16>,
    read_pos: usize,
    time: f64,
}

impl AudioSegment {
    pub fn new(samples: Vec<i16>, time: f64) -> Self {
        Self {
            samples,
            read_pos: 0,
            time,
        }
    }

    /// 显示时间戳（秒）
    pub fn time(&self) -> f64 {
        self.time
    }

    /// 采样总数（所有声道合计）
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.samples.len() - self.read_pos
    }

    fn read_into(&mut self, out: &mut [i16]) -> usize {
        let count = self.remaining().min(out.len());
        out[..count].copy_from_slice(&self.samples[self.read_pos..self.read_pos + count]);
        self.read_pos += count;
        count
    }
}

/// 一次读取的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioRead {
    /// 调用开始时缓冲区中是否有数据
    pub had_data: bool,
    /// 实际拷贝的采样数，其余部分已填充静音
    pub samples_read: usize,
    /// 最后读到的片段的时间戳
    pub time: Option<f64>,
}

/// 音频采样缓冲区
///
/// 解码线程追加片段，音频回调线程拉取数据。读取永不阻塞：
/// 数据不足时剩余部分填充静音。
#[derive(Default)]
pub struct AudioSampleBuffer {
    segments: Mutex<VecDeque<AudioSegment>>,
}

impl AudioSampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_segment(&self, segment: AudioSegment) {
        if segment.is_empty() {
            return;
        }
        self.segments.lock().push_back(segment);
    }

    /// 按顺序读取 `out.len()` 个采样，跨越多个片段，读完的片段被移除
    pub fn read_samples(&self, out: &mut [i16]) -> AudioRead {
        let mut filled = 0;
        let mut time = None;

        let had_data = {
            let mut segments = self.segments.lock();
            let had_data = !segments.is_empty();

            while filled < out.len() {
                let Some(segment) = segments.front_mut() else {
                    break;
                };

                filled += segment.read_into(&mut out[filled..]);
                time = Some(segment.time);

                if segment.remaining() == 0 {
                    segments.pop_front();
                }
            }

            had_data
        };

        // 缓冲区读空：剩余部分填充静音
        out[filled..].fill(0);

        AudioRead {
            had_data,
            samples_read: filled,
            time,
        }
    }

    pub fn depleted(&self) -> bool {
        self.segments.lock().is_empty()
    }

    /// 片段数量
    pub fn len(&self) -> usize {
        self.segments.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.depleted()
    }

    /// 尚未读取的采样数
    pub fn buffered_samples(&self) -> usize {
        self.segments.lock().iter().map(AudioSegment::remaining).sum()
    }

    /// 下一个待读片段的时间戳
    pub fn peek_time(&self) -> Option<f64> {
        self.segments.lock().front().map(AudioSegment::time)
    }

    /// 丢弃在 `time` 之前就已结束的片段（以下一片段的起始时间为界）
    pub fn discard_before(&self, time: f64) -> usize {
        let mut segments = self.segments.lock();
        let mut discarded = 0;
        while segments.len() >= 2 && segments[1].time <= time {
            segments.pop_front();
            discarded += 1;
        }
        discarded
    }

    pub fn clear(&self) {
        self.segments.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: i16, count: usize) -> Vec<i16> {
        (0..count).map(|i| start + i as i16).collect()
    }

    #[test]
    fn test_zero_fill_on_underrun() {
        let buffer = AudioSampleBuffer::new();
        let samples = ramp(1, 100);
        buffer.add_segment(AudioSegment::new(samples.clone(), 0.5));

        let mut out = vec![-1i16; 150];
        let read = buffer.read_samples(&mut out);

        assert!(read.had_data);
        assert_eq!(read.samples_read, 100);
        assert_eq!(read.time, Some(0.5));
        assert_eq!(&out[..100], &samples[..]);
        assert!(out[100..].iter().all(|&s| s == 0));
        assert!(buffer.depleted());
    }

    #[test]
    fn test_empty_buffer_reads_silence() {
        let buffer = AudioSampleBuffer::new();
        let mut out = vec![7i16; 32];
        let read = buffer.read_samples(&mut out);

        assert!(!read.had_data);
        assert_eq!(read.samples_read, 0);
        assert_eq!(read.time, None);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_read_spans_segments_and_keeps_partial() {
        let buffer = AudioSampleBuffer::new();
        buffer.add_segment(AudioSegment::new(ramp(0, 4), 0.0));
        buffer.add_segment(AudioSegment::new(ramp(10, 4), 0.1));
        buffer.add_segment(AudioSegment::new(ramp(20, 4), 0.2));

        let mut out = [0i16; 6];
        let read = buffer.read_samples(&mut out);
        assert_eq!(out, [0, 1, 2, 3, 10, 11]);
        assert_eq!(read.time, Some(0.1));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.buffered_samples(), 6);

        let read = buffer.read_samples(&mut out);
        assert_eq!(out, [12, 13, 20, 21, 22, 23]);
        assert_eq!(read.samples_read, 6);
        assert_eq!(read.time, Some(0.2));
        assert!(buffer.depleted());
    }

    #[test]
    fn test_time_is_monotonic_while_data_available() {
        let buffer = AudioSampleBuffer::new();
        for i in 0..10 {
            buffer.add_segment(AudioSegment::new(vec![1; 64], i as f64 * 0.01));
        }

        let mut last = f64::MIN;
        let mut out = [0i16; 48];
        while !buffer.depleted() {
            let read = buffer.read_samples(&mut out);
            let time = read.time.unwrap();
            assert!(time >= last);
            last = time;
        }
    }

    #[test]
    fn test_depleted_is_idempotent() {
        let buffer = AudioSampleBuffer::new();
        assert!(buffer.depleted());
        assert!(buffer.depleted());

        buffer.add_segment(AudioSegment::new(vec![1; 8], 0.0));
        assert!(!buffer.depleted());
        assert!(!buffer.depleted());
    }

    #[test]
    fn test_empty_segment_is_ignored() {
        let buffer = AudioSampleBuffer::new();
        buffer.add_segment(AudioSegment::new(Vec::new(), 0.0));
        assert!(buffer.depleted());
    }

    #[test]
    fn test_discard_before_and_clear() {
        let buffer = AudioSampleBuffer::new();
        for i in 0..5 {
            buffer.add_segment(AudioSegment::new(vec![1; 8], i as f64));
        }

        assert_eq!(buffer.discard_before(2.5), 2);
        assert_eq!(buffer.peek_time(), Some(2.0));

        assert_eq!(buffer.discard_before(100.0), 2);
        assert_eq!(buffer.peek_time(), Some(4.0));

        buffer.clear();
        assert!(buffer.depleted());
        assert_eq!(buffer.peek_time(), None);
    }
}
