use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// 播放时钟（秒）- 没有音频时钟时作为视频的呈现时间
#[derive(Clone)]
pub struct PlaybackClock {
    inner: Arc<Mutex<ClockInner>>,
}

struct ClockInner {
    base_time: f64,             // 基准时间（秒）
    base_instant: Instant,      // 基准时刻
    playback_rate: f64,         // 播放速率（1.0 = 正常）
    paused: bool,
    paused_at: f64,             // 暂停时的位置
}

impl ClockInner {
    fn now(&self) -> f64 {
        if self.paused {
            self.paused_at
        } else {
            let elapsed = self.base_instant.elapsed().as_secs_f64();
            self.base_time + elapsed * self.playback_rate
        }
    }
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ClockInner {
                base_time: 0.0,
                base_instant: Instant::now(),
                playback_rate: 1.0,
                paused: true,
                paused_at: 0.0,
            })),
        }
    }

    /// 获取当前播放时间（秒）
    pub fn now(&self) -> f64 {
        self.inner.lock().now()
    }

    /// 设置播放位置（Seek 之后调用）
    pub fn set_time(&self, time: f64) {
        let mut inner = self.inner.lock();
        inner.base_time = time;
        inner.base_instant = Instant::now();
        inner.paused_at = time;
    }

    /// 开始计时
    pub fn play(&self) {
        let mut inner = self.inner.lock();
        if inner.paused {
            inner.base_time = inner.paused_at;
            inner.base_instant = Instant::now();
            inner.paused = false;
        }
    }

    /// 暂停计时
    pub fn pause(&self) {
        let mut inner = self.inner.lock();
        if !inner.paused {
            inner.paused_at = inner.now();
            inner.paused = true;
        }
    }

    /// 设置播放速率
    pub fn set_rate(&self, rate: f64) {
        let mut inner = self.inner.lock();
        if !inner.paused {
            let current_time = inner.now();
            inner.base_time = current_time;
            inner.base_instant = Instant::now();
        }
        inner.playback_rate = rate;
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}
