use crate::core::{MediaInfo, OpenParams, PlaybackClock, PlayerError, Result};
use crate::player::audio_context::{AudioReader, AudioRequest};
use crate::player::backend::MediaBackend;
use crate::player::context::MediaContext;
use crate::player::video_context::{VideoReader, VideoRequest};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use parking_lot::{Condvar, Mutex};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

fn log_ctx() -> String {
    format!("[pid:{} tid:{:?}]", process::id(), thread::current().id())
}

/// 生产者线程命令
enum PlayerCommand {
    Seek {
        time: f64,
        nearest: bool,
        reply: Sender<Result<f64>>,
    },
    SeekToStart {
        reply: Sender<Result<()>>,
    },
    Stop,
}

/// 生产者线程与消费者共享的状态
struct Shared {
    /// 是否有待处理的唤醒
    wake: Mutex<bool>,
    tick_event: Condvar,
    presented_last_frame: AtomicBool,
}

impl Shared {
    fn signal(&self) {
        let mut wake = self.wake.lock();
        *wake = true;
        self.tick_event.notify_one();
    }

    /// 等待唤醒或超时
    fn wait(&self, timeout: Duration) {
        let mut wake = self.wake.lock();
        if !*wake {
            self.tick_event.wait_for(&mut wake, timeout);
        }
        *wake = false;
    }
}

type Ready = Result<(MediaInfo, Option<AudioReader>, Option<VideoReader>)>;

/// 带生产者线程的播放器
///
/// 生产者线程拥有 `MediaContext`：周期性地解封装、解码，并串行处理 Seek。
/// 消费者（音频回调、渲染线程）通过读取句柄直接取数据，不等待生产者。
pub struct MediaPlayer {
    thread_handle: Option<JoinHandle<()>>,
    command_tx: Sender<PlayerCommand>,
    shared: Arc<Shared>,
    info: MediaInfo,
    audio: Option<AudioReader>,
    video: Option<VideoReader>,
    clock: PlaybackClock,
}

impl MediaPlayer {
    /// 启动生产者线程并在其中打开媒体，打开失败时线程退出并返回错误
    pub fn open<B: MediaBackend>(backend: B, filename: &str, params: OpenParams) -> Result<Self> {
        let (command_tx, command_rx) = unbounded::<PlayerCommand>();
        let (ready_tx, ready_rx) = bounded::<Ready>(1);

        let shared = Arc::new(Shared {
            wake: Mutex::new(false),
            tick_event: Condvar::new(),
            presented_last_frame: AtomicBool::new(false),
        });

        let thread_shared = shared.clone();
        let thread_filename = filename.to_string();
        let thread_handle = thread::Builder::new()
            .name("myy-producer".to_string())
            .spawn(move || {
                let mut context = MediaContext::new(backend);
                if let Err(e) = context.begin(&thread_filename, &params) {
                    error!("{} ❌ 打开媒体失败: {}", log_ctx(), e);
                    let _ = ready_tx.send(Err(e));
                    return;
                }

                let ready = context
                    .media_info()
                    .map(|info| (info, context.audio_reader(), context.video_reader()));
                if ready_tx.send(ready).is_err() {
                    return;
                }

                let interval = Duration::from_millis(params.tick_interval_ms.max(1));
                Self::producer_loop(&mut context, &command_rx, &thread_shared, interval);
                context.end();
            })
            .map_err(|e| PlayerError::Thread(format!("无法启动生产者线程: {}", e)))?;

        let ready = ready_rx.recv().map_err(|_| {
            PlayerError::Thread("生产者线程在打开媒体前退出".to_string())
        });

        let (info, audio, video) = match ready.and_then(|ready| ready) {
            Ok(ready) => ready,
            Err(e) => {
                let _ = thread_handle.join();
                return Err(e);
            }
        };

        info!(
            "{} ▶️ 播放器已启动: {} ({}x{}, {} Hz)",
            log_ctx(),
            info.filename,
            info.width,
            info.height,
            info.sample_rate
        );

        Ok(Self {
            thread_handle: Some(thread_handle),
            command_tx,
            shared,
            info,
            audio,
            video,
            clock: PlaybackClock::new(),
        })
    }

    /// 生产者循环（在独立线程中运行）
    ///
    /// 每轮先处理全部命令，再执行一次 tick，然后等待唤醒或超时。
    /// 数据耗尽后停止 tick，直到 Seek 让它重新开始。
    fn producer_loop<B: MediaBackend>(
        context: &mut MediaContext<B>,
        command_rx: &Receiver<PlayerCommand>,
        shared: &Shared,
        interval: Duration,
    ) {
        info!("{} 🎬 生产者线程启动", log_ctx());
        let mut ticks: u64 = 0;

        loop {
            while let Ok(command) = command_rx.try_recv() {
                match command {
                    PlayerCommand::Seek {
                        time,
                        nearest,
                        reply,
                    } => {
                        info!("{} ⏩ 收到 Seek 命令: {:.3}s", log_ctx(), time);
                        let result = context.seek_to_time(time, nearest);
                        if let Err(e) = &result {
                            error!("{} ❌ Seek 失败: {}", log_ctx(), e);
                        }
                        shared.presented_last_frame.store(false, Ordering::Release);
                        let _ = reply.send(result);
                    }
                    PlayerCommand::SeekToStart { reply } => {
                        info!("{} ⏮️ 收到回到开头命令", log_ctx());
                        let result = context.seek_to_start();
                        shared.presented_last_frame.store(false, Ordering::Release);
                        let _ = reply.send(result);
                    }
                    PlayerCommand::Stop => {
                        info!("{} ⏹ 生产者线程收到停止命令（共 {} 次 tick）", log_ctx(), ticks);
                        return;
                    }
                }
            }

            if !shared.presented_last_frame.load(Ordering::Acquire) {
                if let Err(e) = Self::tick(context) {
                    warn!("{} tick 失败: {}", log_ctx(), e);
                }
                ticks += 1;

                if context.depleted() {
                    info!("{} 📄 媒体数据已耗尽", log_ctx());
                    shared.presented_last_frame.store(true, Ordering::Release);
                }
            }

            shared.wait(interval);
        }
    }

    fn tick<B: MediaBackend>(context: &mut MediaContext<B>) -> Result<()> {
        context.fill_buffers()?;
        context.fill_audio_buffer()?;
        context.fill_video_buffer()?;
        Ok(())
    }

    pub fn media_info(&self) -> &MediaInfo {
        &self.info
    }

    pub fn audio_reader(&self) -> Option<AudioReader> {
        self.audio.clone()
    }

    pub fn video_reader(&self) -> Option<VideoReader> {
        self.video.clone()
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    /// 唤醒生产者线程立即 tick
    pub fn signal(&self) {
        self.shared.signal();
    }

    /// 所有数据都已解码并交给消费者
    pub fn presented_last_frame(&self) -> bool {
        self.shared.presented_last_frame.load(Ordering::Acquire)
    }

    /// 读取音频（不等待生产者），没有音频流时输出静音
    pub fn request_audio(&self, out: &mut [i16], frame_count: usize) -> AudioRequest {
        let request = match &self.audio {
            Some(audio) => audio.request_audio(out, frame_count),
            None => {
                out.fill(0);
                AudioRequest {
                    got_audio: false,
                    had_data: false,
                    samples_read: 0,
                    time: 0.0,
                }
            }
        };
        self.signal();
        request
    }

    pub fn request_video(&self, time: f64) -> VideoRequest {
        let request = match &self.video {
            Some(video) => video.request_video(time),
            None => VideoRequest {
                frame: None,
                got_video: false,
            },
        };
        self.signal();
        request
    }

    /// 当前呈现时间：有音频时跟随音频，否则使用播放时钟
    pub fn present_time(&self) -> f64 {
        match &self.audio {
            Some(audio) => audio.time(),
            None => self.clock.now(),
        }
    }

    pub fn play(&self) {
        self.clock.play();
        self.signal();
    }

    pub fn pause(&self) {
        self.clock.pause();
    }

    /// 在生产者线程上执行 Seek 并等待结果，返回实际落点
    pub fn seek(&self, time: f64, nearest: bool) -> Result<f64> {
        let (reply, reply_rx) = bounded(1);
        self.send(PlayerCommand::Seek {
            time,
            nearest,
            reply,
        })?;
        let actual = reply_rx
            .recv()
            .map_err(|_| PlayerError::Thread("生产者线程未响应 Seek".to_string()))??;

        self.clock.set_time(actual);
        Ok(actual)
    }

    pub fn seek_to_start(&self) -> Result<()> {
        let (reply, reply_rx) = bounded(1);
        self.send(PlayerCommand::SeekToStart { reply })?;
        reply_rx
            .recv()
            .map_err(|_| PlayerError::Thread("生产者线程未响应回到开头".to_string()))??;

        self.clock.set_time(0.0);
        Ok(())
    }

    fn send(&self, command: PlayerCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| PlayerError::Thread(format!("发送命令失败: {}", e)))?;
        self.signal();
        Ok(())
    }

    /// 停止并等待生产者线程退出
    pub fn close(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!("{} 🛑 MediaPlayer::close() called", log_ctx());
            let _ = self.command_tx.send(PlayerCommand::Stop);
            self.signal();
            if handle.join().is_err() {
                error!("{} ❌ 生产者线程异常退出", log_ctx());
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }
}

impl Drop for MediaPlayer {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            warn!("{} ⚠ MediaPlayer 被 drop，但未调用 close()，正在停止生产者线程", log_ctx());
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::memory::{MemoryBackend, MemorySource, SyntheticSpec};
    use std::time::Instant;

    fn player(spec: &SyntheticSpec) -> MediaPlayer {
        let backend = MemoryBackend::new();
        backend.insert("clip", MemorySource::synthetic(spec));
        MediaPlayer::open(backend, "clip", OpenParams::default()).unwrap()
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_open_failure_is_reported() {
        let result = MediaPlayer::open(MemoryBackend::new(), "missing", OpenParams::default());
        assert!(matches!(result, Err(PlayerError::OpenError(_))));
    }

    #[test]
    fn test_producer_fills_buffers() {
        let mut player = player(&SyntheticSpec::default());
        assert!(player.media_info().has_audio);
        assert!(player.media_info().has_video);

        let video = player.video_reader().unwrap();
        assert!(wait_until(|| {
            player.signal();
            video.request_video(0.0).frame.is_some()
        }));

        player.close();
        assert!(!player.is_running());
    }

    #[test]
    fn test_threaded_seek_round_trip() {
        let mut player = player(&SyntheticSpec::video_only());

        let actual = player.seek(0.30, false).unwrap();
        assert!((actual - 0.32).abs() < 1e-9);
        assert!((player.clock().now() - actual).abs() < 1e-9);

        let actual = player.seek(0.30, true).unwrap();
        assert!((actual - 0.20).abs() < 1e-9);

        player.seek_to_start().unwrap();
        assert_eq!(player.clock().now(), 0.0);
        player.close();
    }

    #[test]
    fn test_reaches_last_frame() {
        let player = player(&SyntheticSpec::video_only());
        let video = player.video_reader().unwrap();

        let mut time = 0.0;
        assert!(wait_until(|| {
            video.request_video(time);
            time += 0.04;
            player.signal();
            player.presented_last_frame()
        }));
    }
}
