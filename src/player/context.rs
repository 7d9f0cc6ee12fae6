use crate::core::{MediaInfo, MediaType, OpenParams, PlayerError, Result};
use crate::player::audio_context::{AudioDecodeContext, AudioReader, AudioRequest};
use crate::player::backend::{MediaBackend, MediaInput, MediaPacket, SeekTarget, StreamInfo};
use crate::player::video_context::{VideoDecodeContext, VideoReader, VideoRequest};
use log::{debug, error, info, warn};

type AudioContextOf<I> = AudioDecodeContext<<I as MediaInput>::AudioDecoder>;
type VideoContextOf<I> = VideoDecodeContext<<I as MediaInput>::VideoDecoder>;

/// 已打开的媒体会话
///
/// 字段按声明顺序释放：解码上下文先于容器。
struct Session<I: MediaInput> {
    audio: Option<AudioContextOf<I>>,
    video: Option<VideoContextOf<I>>,
    input: I,
    filename: String,
    params: OpenParams,
    reached_eof: bool,
    duration: f64,
    sample_aspect_ratio: f64,
}

impl<I: MediaInput> Session<I> {
    fn any_queue_full(&self) -> bool {
        self.audio.as_ref().is_some_and(|a| a.is_queue_full())
            || self.video.as_ref().is_some_and(|v| v.is_queue_full())
    }

    fn route(&mut self, packet: I::Packet) {
        let index = packet.stream_index();
        if let Some(audio) = self.audio.as_mut().filter(|a| a.stream_index() == index) {
            audio.add_packet(&packet);
        } else if let Some(video) = self.video.as_mut().filter(|v| v.stream_index() == index) {
            video.add_packet(&packet);
        }
    }

    fn fill_buffers(&mut self) {
        while !self.reached_eof && !self.any_queue_full() {
            match self.input.read_packet() {
                Ok(Some(packet)) => self.route(packet),
                Ok(None) => {
                    debug!("到达文件末尾: {}", self.filename);
                    self.reached_eof = true;
                }
                Err(e) => {
                    warn!("读取数据包失败: {}，按文件结束处理", e);
                    self.reached_eof = true;
                }
            }
        }
    }

    fn fill_audio_buffer(&mut self) {
        if let Some(audio) = self.audio.as_mut() {
            audio.fill_audio_buffer(self.reached_eof);
        }
    }

    fn fill_video_buffer(&mut self) {
        if let Some(video) = self.video.as_mut() {
            video.fill_video_buffer(self.reached_eof);
        }
    }

    fn pump(&mut self) {
        self.fill_buffers();
        self.fill_audio_buffer();
        self.fill_video_buffer();
    }

    fn depleted(&self) -> bool {
        self.reached_eof
            && self.audio.as_ref().map_or(true, |a| a.depleted())
            && self.video.as_ref().map_or(true, |v| v.depleted())
    }

    fn clear_buffers(&mut self) {
        if let Some(audio) = self.audio.as_mut() {
            audio.clear_buffers();
        }
        if let Some(video) = self.video.as_mut() {
            video.clear_buffers();
        }
        self.reached_eof = false;
    }

    /// 已到文件末尾且视频这一侧没有任何待显示或待解码的数据
    fn video_exhausted(&self) -> bool {
        self.reached_eof && self.video.as_ref().map_or(true, |v| v.depleted())
    }

    /// Seek 后泵送数据，直到满足 `done` 或数据耗尽
    fn pump_until(&mut self, mut done: impl FnMut(&mut Self) -> bool) {
        let limit = self.params.max_seek_iterations;
        let mut iterations = 0;

        loop {
            self.pump();
            if done(&mut *self) || self.depleted() {
                break;
            }

            iterations += 1;
            if limit.is_some_and(|max| iterations >= max) {
                warn!("Seek 泵送达到上限 {} 轮，提前结束", iterations);
                break;
            }
        }
    }
}

/// 单个媒体文件的播放上下文
///
/// 负责解封装、把数据包分发给音视频解码上下文、以及 Seek。
/// 生命周期：`begin` → 使用 → `end`（Drop 时自动调用 `end`）。
pub struct MediaContext<B: MediaBackend> {
    backend: B,
    session: Option<Session<B::Input>>,
}

impl<B: MediaBackend> MediaContext<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            session: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_begun(&self) -> bool {
        self.session.is_some()
    }

    /// 打开文件并初始化所需的解码上下文
    ///
    /// 缺少音频或视频流不是错误；解码器初始化失败会返回错误，
    /// 已创建的部分随之释放。
    pub fn begin(&mut self, filename: &str, params: &OpenParams) -> Result<()> {
        if self.session.is_some() {
            return Err(PlayerError::AlreadyBegun);
        }

        params.limits.validate()?;
        self.backend.initialize()?;

        info!("📂 打开媒体: {}", filename);
        let input = self.backend.open(filename).map_err(|e| {
            error!("打开媒体失败: {} ({})", filename, e);
            e
        })?;

        let streams = input.streams()?;
        let (video_stream, audio_stream) = select_streams(&streams, params.desired_audio_stream);

        let video = match video_stream.filter(|_| params.enable_video) {
            Some(stream) => Some(
                VideoDecodeContext::initialize(&input, stream, params.output_mode, &params.limits)
                    .map_err(|e| {
                        error!("视频解码上下文初始化失败 (stream {}): {}", stream.index, e);
                        e
                    })?,
            ),
            None => None,
        };

        let audio = match audio_stream.filter(|_| params.enable_audio) {
            Some(stream) => Some(
                AudioDecodeContext::initialize(
                    &input,
                    stream,
                    params.audio_output_mode,
                    &params.limits,
                )
                .map_err(|e| {
                    error!("音频解码上下文初始化失败 (stream {}): {}", stream.index, e);
                    e
                })?,
            ),
            None => None,
        };

        let sample_aspect_ratio = match &video {
            Some(video) => input
                .sample_aspect_ratio(video.stream_index())
                .filter(|ratio| ratio.is_valid())
                .map_or(1.0, |ratio| ratio.to_f64()),
            None => 0.0,
        };
        let duration = input.duration();

        info!(
            "✅ 媒体已打开: {} (时长 {:.3}s, 音频: {}, 视频: {})",
            filename,
            duration,
            audio.is_some(),
            video.is_some()
        );

        self.session = Some(Session {
            audio,
            video,
            input,
            filename: filename.to_string(),
            params: params.clone(),
            reached_eof: false,
            duration,
            sample_aspect_ratio,
        });

        Ok(())
    }

    /// 释放会话（未打开时什么也不做）
    pub fn end(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("关闭媒体: {}", session.filename);
        }
    }

    fn session(&self) -> Result<&Session<B::Input>> {
        self.session.as_ref().ok_or(PlayerError::NotBegun)
    }

    fn session_mut(&mut self) -> Result<&mut Session<B::Input>> {
        self.session.as_mut().ok_or(PlayerError::NotBegun)
    }

    pub fn filename(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.filename.as_str())
    }

    pub fn has_audio_stream(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.audio.is_some())
    }

    pub fn has_video_stream(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.video.is_some())
    }

    pub fn has_reached_eof(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.reached_eof)
    }

    /// 总时长（秒）
    pub fn duration(&self) -> f64 {
        self.session.as_ref().map_or(0.0, |s| s.duration)
    }

    pub fn video_width(&self) -> usize {
        self.video().map_or(0, |v| v.width())
    }

    pub fn video_height(&self) -> usize {
        self.video().map_or(0, |v| v.height())
    }

    /// 未知时为 1.0，没有视频时为 0.0
    pub fn video_sample_aspect_ratio(&self) -> f64 {
        self.session.as_ref().map_or(0.0, |s| s.sample_aspect_ratio)
    }

    /// 音频采样率（Hz）
    pub fn audio_frame_rate(&self) -> usize {
        self.audio().map_or(0, |a| a.sample_rate())
    }

    /// 输出声道数
    pub fn audio_channel_count(&self) -> usize {
        self.audio().map_or(0, |a| a.output_channel_count())
    }

    pub fn audio_stream_index(&self) -> Option<usize> {
        self.audio().map(|a| a.stream_index())
    }

    pub fn video_stream_index(&self) -> Option<usize> {
        self.video().map(|v| v.stream_index())
    }

    fn audio(&self) -> Option<&AudioContextOf<B::Input>> {
        self.session.as_ref()?.audio.as_ref()
    }

    fn video(&self) -> Option<&VideoContextOf<B::Input>> {
        self.session.as_ref()?.video.as_ref()
    }

    /// 音频线程的读取句柄
    pub fn audio_reader(&self) -> Option<AudioReader> {
        self.audio().map(|a| a.reader())
    }

    /// 渲染线程的读取句柄
    pub fn video_reader(&self) -> Option<VideoReader> {
        self.video().map(|v| v.reader())
    }

    /// 读取 `frame_count` 帧音频；没有音频流时输出静音且 `got_audio` 为 false
    pub fn request_audio(&self, out: &mut [i16], frame_count: usize) -> Result<AudioRequest> {
        let session = self.session()?;
        match session.audio.as_ref() {
            Some(audio) => Ok(audio.request_audio(out, frame_count)),
            None => {
                out.fill(0);
                Ok(AudioRequest {
                    got_audio: false,
                    had_data: false,
                    samples_read: 0,
                    time: 0.0,
                })
            }
        }
    }

    pub fn request_video(&self, time: f64) -> Result<VideoRequest> {
        let session = self.session()?;
        Ok(match session.video.as_ref() {
            Some(video) => video.request_video(time),
            None => VideoRequest {
                frame: None,
                got_video: false,
            },
        })
    }

    /// 读取并分发数据包，直到某个队列满或到达文件末尾
    pub fn fill_buffers(&mut self) -> Result<()> {
        self.session_mut()?.fill_buffers();
        Ok(())
    }

    pub fn fill_audio_buffer(&mut self) -> Result<()> {
        self.session_mut()?.fill_audio_buffer();
        Ok(())
    }

    pub fn fill_video_buffer(&mut self) -> Result<()> {
        self.session_mut()?.fill_video_buffer();
        Ok(())
    }

    /// 到达文件末尾且所有解码上下文都已耗尽
    pub fn depleted(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.depleted())
    }

    /// 回到开头：清空缓冲，每条活动流定位到 0
    pub fn seek_to_start(&mut self) -> Result<()> {
        let session = self.session_mut()?;
        session.clear_buffers();

        let indices: Vec<usize> = session
            .audio
            .as_ref()
            .map(|a| a.stream_index())
            .into_iter()
            .chain(session.video.as_ref().map(|v| v.stream_index()))
            .collect();

        for index in indices {
            session
                .input
                .seek(SeekTarget::Stream { index, timestamp: 0 }, false)
                .map_err(|e| {
                    PlayerError::SeekError(format!("stream {} 回到开头失败: {}", index, e))
                })?;
        }

        info!("⏮️ 回到开头: {}", session.filename);
        Ok(())
    }

    /// 定位到 `time`（秒），返回实际落点
    ///
    /// - 精确模式：丢弃目标之前的帧，直到下一帧的时间不早于 `time`
    /// - 最近模式：落在目标之前最近的关键帧，缓冲到一帧即可
    ///
    /// 返回下一帧待显示视频的时间；目标超出最后一帧时返回当前帧的时间；
    /// 没有视频时返回第一段音频的时间；什么都没有时返回 0.0。
    /// 音频的呈现时间同时被设为该落点。
    pub fn seek_to_time(&mut self, time: f64, nearest: bool) -> Result<f64> {
        let session = self.session_mut()?;
        session.clear_buffers();

        session
            .input
            .seek(SeekTarget::Global { seconds: time }, true)
            .map_err(|e| PlayerError::SeekError(format!("定位到 {:.3}s 失败: {}", time, e)))?;

        if session.video.is_some() {
            session.pump_until(|s| {
                if !nearest {
                    if let Some(audio) = s.audio.as_ref() {
                        audio.buffer().discard_before(time);
                    }
                }
                let Some(video) = s.video.as_ref() else {
                    return true;
                };
                let pool = video.pool();
                if !nearest {
                    pool.advance_to_time(time);
                }
                match pool.peek_next_frame() {
                    Some(frame) => nearest || frame.time() >= time,
                    // 目标超出最后一帧
                    None => s.video_exhausted(),
                }
            });
        } else if session.audio.is_some() {
            session.pump_until(|s| {
                let Some(audio) = s.audio.as_ref() else {
                    return true;
                };
                let buffer = audio.buffer();
                if nearest {
                    return !buffer.is_empty();
                }
                buffer.discard_before(time);
                buffer.len() >= 2 || (s.reached_eof && !buffer.is_empty())
            });
        }

        let actual = match (session.video.as_ref(), session.audio.as_ref()) {
            (Some(video), _) => {
                let pool = video.pool();
                pool.peek_next_frame()
                    .or_else(|| pool.current_frame())
                    .map(|frame| frame.time())
            }
            (None, Some(audio)) => audio.buffer().peek_time(),
            (None, None) => None,
        }
        .unwrap_or(0.0);

        if let Some(audio) = session.audio.as_ref() {
            audio.set_time(actual);
        }

        info!(
            "⏩ Seek 到 {:.3}s（{}）→ 实际 {:.3}s",
            time,
            if nearest { "最近关键帧" } else { "精确" },
            actual
        );

        Ok(actual)
    }

    pub fn media_info(&self) -> Result<MediaInfo> {
        let session = self.session()?;
        let audio = session.audio.as_ref();
        let video = session.video.as_ref();

        Ok(MediaInfo {
            filename: session.filename.clone(),
            duration: session.duration,
            has_audio: audio.is_some(),
            has_video: video.is_some(),
            width: video.map_or(0, |v| v.width()),
            height: video.map_or(0, |v| v.height()),
            sample_aspect_ratio: session.sample_aspect_ratio,
            pixel_format: video.map(|v| v.pixel_format()),
            sample_rate: audio.map_or(0, |a| a.sample_rate()),
            channels: audio.map_or(0, |a| a.output_channel_count()),
        })
    }
}

impl<B: MediaBackend> Drop for MediaContext<B> {
    fn drop(&mut self) {
        self.end();
    }
}

/// 选择第一条视频流，以及第 `desired_audio` 条音频流（不存在时取第一条）
fn select_streams(
    streams: &[StreamInfo],
    desired_audio: Option<usize>,
) -> (Option<&StreamInfo>, Option<&StreamInfo>) {
    let video = streams.iter().find(|s| s.media_type == MediaType::Video);

    let audio_streams: Vec<&StreamInfo> = streams
        .iter()
        .filter(|s| s.media_type == MediaType::Audio)
        .collect();
    let nth = desired_audio.unwrap_or(0);
    let audio = match audio_streams.get(nth) {
        Some(stream) => Some(*stream),
        None => {
            if !audio_streams.is_empty() {
                warn!(
                    "音频流 #{} 不存在（共 {} 条），使用第一条",
                    nth,
                    audio_streams.len()
                );
            }
            audio_streams.first().copied()
        }
    };

    (video, audio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BufferLimits, OutputMode, PixelFormat, Rational};
    use crate::player::memory::{MemoryBackend, MemorySource, SyntheticSpec};

    fn context_with(name: &str, source: MemorySource) -> MediaContext<MemoryBackend> {
        let backend = MemoryBackend::new();
        backend.insert(name, source);
        MediaContext::new(backend)
    }

    fn stream(index: usize, media_type: MediaType) -> StreamInfo {
        StreamInfo {
            index,
            media_type,
            codec_name: String::new(),
            time_base: Rational::new(1, 1000),
        }
    }

    #[test]
    fn test_select_streams() {
        let streams = vec![
            stream(0, MediaType::Audio),
            stream(1, MediaType::Video),
            stream(2, MediaType::Audio),
            stream(3, MediaType::Video),
        ];

        let (video, audio) = select_streams(&streams, None);
        assert_eq!(video.map(|s| s.index), Some(1));
        assert_eq!(audio.map(|s| s.index), Some(0));

        let (_, audio) = select_streams(&streams, Some(1));
        assert_eq!(audio.map(|s| s.index), Some(2));

        let (_, audio) = select_streams(&streams, Some(7));
        assert_eq!(audio.map(|s| s.index), Some(0));

        let (video, audio) = select_streams(&streams[..1], Some(3));
        assert!(video.is_none());
        assert_eq!(audio.map(|s| s.index), Some(0));
    }

    #[test]
    fn test_begin_twice_and_not_begun() {
        let mut context = context_with("clip", MemorySource::synthetic(&SyntheticSpec::default()));
        assert!(matches!(context.fill_buffers(), Err(PlayerError::NotBegun)));
        assert!(matches!(context.seek_to_time(0.0, true), Err(PlayerError::NotBegun)));

        context.begin("clip", &OpenParams::default()).unwrap();
        assert!(matches!(
            context.begin("clip", &OpenParams::default()),
            Err(PlayerError::AlreadyBegun)
        ));

        context.end();
        assert!(!context.is_begun());
        context.begin("clip", &OpenParams::default()).unwrap();
    }

    #[test]
    fn test_open_failure_leaves_context_unbegun() {
        let mut context = MediaContext::new(MemoryBackend::new());
        assert!(context.begin("nope", &OpenParams::default()).is_err());
        assert!(!context.is_begun());
    }

    #[test]
    fn test_getters_reflect_streams() {
        let mut source = MemorySource::synthetic(&SyntheticSpec::default());
        source.set_sample_aspect_ratio(0, Rational::new(4, 3));
        let mut context = context_with("clip", source);

        let params = OpenParams {
            output_mode: OutputMode::PlanarYuv,
            ..OpenParams::default()
        };
        context.begin("clip", &params).unwrap();

        assert!(context.has_audio_stream());
        assert!(context.has_video_stream());
        assert_eq!(context.video_width(), 64);
        assert_eq!(context.video_height(), 36);
        assert!((context.video_sample_aspect_ratio() - 4.0 / 3.0).abs() < 1e-9);
        assert_eq!(context.audio_frame_rate(), 48000);
        assert_eq!(context.audio_channel_count(), 2);

        let info = context.media_info().unwrap();
        assert_eq!(info.pixel_format, Some(PixelFormat::Yuv420p));
        assert!((info.duration - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_sample_aspect_ratio_defaults() {
        let mut context = context_with("clip", MemorySource::synthetic(&SyntheticSpec::default()));
        context.begin("clip", &OpenParams::default()).unwrap();
        assert_eq!(context.video_sample_aspect_ratio(), 1.0);

        let mut context =
            context_with("audio", MemorySource::synthetic(&SyntheticSpec::audio_only()));
        context.begin("audio", &OpenParams::default()).unwrap();
        assert!(!context.has_video_stream());
        assert_eq!(context.video_sample_aspect_ratio(), 0.0);
    }

    #[test]
    fn test_disabled_modalities_are_skipped() {
        let mut context = context_with("clip", MemorySource::synthetic(&SyntheticSpec::default()));
        let params = OpenParams {
            enable_audio: false,
            ..OpenParams::default()
        };
        context.begin("clip", &params).unwrap();
        assert!(!context.has_audio_stream());
        assert!(context.has_video_stream());

        let mut out = vec![3i16; 16];
        let request = context.request_audio(&mut out, 8).unwrap();
        assert!(!request.got_audio);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_read_error_is_treated_as_eof() {
        let source = MemorySource::synthetic(&SyntheticSpec::video_only()).with_read_error_at(4);
        let mut context = context_with("broken", source);
        context.begin("broken", &OpenParams::default()).unwrap();

        context.fill_buffers().unwrap();
        assert!(context.has_reached_eof());
        context.fill_video_buffer().unwrap();

        let mut frames = 0;
        let mut time = 0.02;
        while !context.depleted() {
            if context.request_video(time).unwrap().got_video {
                frames += 1;
            }
            time += 0.04;
        }
        assert_eq!(frames, 4);
    }

    #[test]
    fn test_data_streams_are_ignored() {
        let mut source = MemorySource::new().with_duration(1.0);
        let data = source.add_data_stream();
        source.push_packet(data, Some(0), true, vec![1, 2, 3]);
        let mut context = context_with("data", source);

        context.begin("data", &OpenParams::default()).unwrap();
        assert!(!context.has_audio_stream());
        assert!(!context.has_video_stream());

        context.fill_buffers().unwrap();
        assert!(context.depleted());
        assert_eq!(context.seek_to_time(0.5, false).unwrap(), 0.0);
    }

    fn queued(context: &MediaContext<MemoryBackend>) -> (usize, usize) {
        let session = context.session.as_ref().unwrap();
        (
            session.audio.as_ref().map_or(0, |a| a.queued_packets()),
            session.video.as_ref().map_or(0, |v| v.queued_packets()),
        )
    }

    fn play_out(context: &mut MediaContext<MemoryBackend>) {
        while !context.has_reached_eof() {
            context.fill_buffers().unwrap();
            context.fill_audio_buffer().unwrap();
            context.fill_video_buffer().unwrap();
        }
        context.fill_audio_buffer().unwrap();
        context.fill_video_buffer().unwrap();

        if let Some(reader) = context.audio_reader() {
            let mut out = vec![0i16; 4096];
            while !reader.depleted() {
                reader.request_audio(&mut out, 2048);
            }
        }
        context.request_video(100.0).unwrap();
    }

    #[test]
    fn test_fill_buffers_stops_when_a_queue_is_full() {
        let mut context = context_with("clip", MemorySource::synthetic(&SyntheticSpec::default()));
        let params = OpenParams {
            limits: BufferLimits {
                video_packet_queue: 2,
                ..BufferLimits::default()
            },
            ..OpenParams::default()
        };
        context.begin("clip", &params).unwrap();

        context.fill_buffers().unwrap();
        let (audio, video) = queued(&context);
        assert_eq!(video, 2);
        assert!(audio >= 1);
        assert!(!context.has_reached_eof());

        // 队列未被消费时不再读取
        context.fill_buffers().unwrap();
        assert_eq!(queued(&context), (audio, video));

        context.fill_video_buffer().unwrap();
        assert_eq!(queued(&context).1, 0);
        context.fill_buffers().unwrap();
        assert_eq!(queued(&context).1, 2);
    }

    #[test]
    fn test_accurate_seek_past_end_returns() {
        let mut context = context_with("clip", MemorySource::synthetic(&SyntheticSpec::default()));
        let params = OpenParams {
            max_seek_iterations: None,
            ..OpenParams::default()
        };
        context.begin("clip", &params).unwrap();

        let actual = context.seek_to_time(1.0, false).unwrap();
        assert!((actual - 0.36).abs() < 1e-9);
        assert!(context.has_reached_eof());

        let reader = context.audio_reader().unwrap();
        assert!((reader.time() - 0.36).abs() < 1e-9);
        let request = context.request_video(2.0).unwrap();
        assert!(!request.got_video);
        assert!((request.frame.unwrap().time() - 0.36).abs() < 1e-9);
    }

    #[test]
    fn test_seek_iteration_bound_stops_pumping() {
        let limits = BufferLimits {
            video_packet_queue: 1,
            ..BufferLimits::default()
        };

        let mut bounded =
            context_with("clip", MemorySource::synthetic(&SyntheticSpec::default()));
        let params = OpenParams {
            limits: limits.clone(),
            max_seek_iterations: Some(1),
            ..OpenParams::default()
        };
        bounded.begin("clip", &params).unwrap();

        // 一轮只读一个视频包：停在关键帧 0.20 上
        let actual = bounded.seek_to_time(0.36, false).unwrap();
        assert!((actual - 0.20).abs() < 1e-9);
        assert!(!bounded.has_reached_eof());

        let mut unbounded =
            context_with("clip", MemorySource::synthetic(&SyntheticSpec::default()));
        let params = OpenParams {
            limits,
            max_seek_iterations: None,
            ..OpenParams::default()
        };
        unbounded.begin("clip", &params).unwrap();
        let actual = unbounded.seek_to_time(0.36, false).unwrap();
        assert!((actual - 0.36).abs() < 1e-9);
    }

    #[test]
    fn test_depleted_is_idempotent() {
        let mut context = context_with("clip", MemorySource::synthetic(&SyntheticSpec::default()));
        context.begin("clip", &OpenParams::default()).unwrap();
        assert!(!context.depleted());

        play_out(&mut context);
        assert!(context.depleted());
        assert!(context.depleted());

        context.fill_buffers().unwrap();
        context.fill_audio_buffer().unwrap();
        context.fill_video_buffer().unwrap();
        assert!(context.depleted());
        assert!(!context.request_video(200.0).unwrap().got_video);
        assert!(context.depleted());
    }

    #[test]
    fn test_zero_queue_limit_is_rejected() {
        let mut context = context_with("clip", MemorySource::synthetic(&SyntheticSpec::default()));
        let params = OpenParams {
            limits: BufferLimits {
                audio_packet_queue: 0,
                ..BufferLimits::default()
            },
            ..OpenParams::default()
        };
        assert!(matches!(
            context.begin("clip", &params),
            Err(PlayerError::InvalidConfig(_))
        ));
        assert!(!context.is_begun());
    }

    #[test]
    fn test_seek_restarts_untimed_frames_at_zero() {
        let spec = SyntheticSpec::video_only();
        let mut source = MemorySource::new().with_duration(0.4);
        let stream = source.add_video_stream(
            spec.width,
            spec.height,
            PixelFormat::Yuv420p,
            Rational::new(1, 25),
            0.04,
        );
        let frame_bytes = spec.width * spec.height * 3 / 2;
        for n in 0..10 {
            source.push_packet(stream, None, n == 0, vec![spec.luma_for_frame(n); frame_bytes]);
        }
        let mut context = context_with("untimed", source);
        context.begin("untimed", &OpenParams::default()).unwrap();

        play_out(&mut context);
        let last = context.request_video(100.0).unwrap().frame.unwrap();
        assert!((last.time() - 0.36).abs() < 1e-9);

        let actual = context.seek_to_time(0.0, true).unwrap();
        assert_eq!(actual, 0.0);
        let first = context.request_video(0.0).unwrap().frame.unwrap();
        assert_eq!(first.time(), 0.0);
        assert!(first.read().is_first_frame());
    }

    #[test]
    fn test_seek_to_start_resets_audio_time() {
        let mut context = context_with("clip", MemorySource::synthetic(&SyntheticSpec::default()));
        context.begin("clip", &OpenParams::default()).unwrap();
        play_out(&mut context);

        let reader = context.audio_reader().unwrap();
        assert!(reader.time() > 0.35);

        context.seek_to_start().unwrap();
        assert_eq!(reader.time(), 0.0);
        context.fill_buffers().unwrap();
        context.fill_audio_buffer().unwrap();
        context.fill_video_buffer().unwrap();

        let frame = context.request_video(reader.time()).unwrap().frame.unwrap();
        assert_eq!(frame.time(), 0.0);
    }
}
