//! 端到端播放测试：内存后端驱动 MediaContext 与 MediaPlayer。

use myy_engine::player::memory::{MemoryBackend, MemorySource, SyntheticSpec};
use myy_engine::{MediaContext, MediaPlayer, OpenParams, PixelFormat};
use std::thread;
use std::time::{Duration, Instant};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn open(spec: &SyntheticSpec) -> MediaContext<MemoryBackend> {
    init_logger();
    let backend = MemoryBackend::new();
    backend.insert("clip.mp4", MemorySource::synthetic(spec));
    let mut context = MediaContext::new(backend);
    context.begin("clip.mp4", &OpenParams::default()).unwrap();
    context
}

fn pump(context: &mut MediaContext<MemoryBackend>) {
    context.fill_buffers().unwrap();
    context.fill_audio_buffer().unwrap();
    context.fill_video_buffer().unwrap();
}

/// 依次推进到每帧之后半帧的时间，返回所有显示过的帧时间
fn play_video(context: &MediaContext<MemoryBackend>, start: f64) -> Vec<f64> {
    let mut times = Vec::new();
    let mut step = 0;
    while step < 1000 {
        let request = context.request_video(start + step as f64 * 0.04 + 0.02).unwrap();
        if request.got_video {
            if let Some(frame) = request.frame {
                times.push(frame.time());
            }
        }
        if context.depleted() {
            break;
        }
        step += 1;
    }
    times
}

#[test]
fn test_end_to_end_stereo_with_video() {
    let spec = SyntheticSpec::default();
    let mut context = open(&spec);

    assert!(context.has_audio_stream());
    assert!(context.has_video_stream());
    assert_eq!(context.audio_frame_rate(), 48000);
    assert_eq!(context.audio_channel_count(), 2);

    while !context.has_reached_eof() {
        pump(&mut context);
    }
    pump(&mut context);
    assert!(!context.depleted());

    let request = context.request_video(0.21).unwrap();
    assert!(request.got_video);
    let frame = request.frame.unwrap();
    assert!((frame.time() - 0.20).abs() < 1e-9);
    assert_eq!(frame.read().format(), PixelFormat::Rgba);

    // 精确读取全部采样：没有静音填充
    let frames = spec.audio_samples_per_channel();
    let mut out = vec![0i16; frames * 2];
    let request = context.request_audio(&mut out, frames).unwrap();
    assert!(request.got_audio);
    assert_eq!(request.samples_read, frames * 2);
    assert!(out.iter().all(|&s| s != 0));

    // 再读一次：全部为静音
    let request = context.request_audio(&mut out, frames).unwrap();
    assert!(request.got_audio);
    assert!(!request.had_data);
    assert!(out.iter().all(|&s| s == 0));

    assert!(!context.depleted());
    let request = context.request_video(10.0).unwrap();
    assert!(request.got_video);
    assert!((request.frame.unwrap().time() - 0.36).abs() < 1e-9);
    assert!(context.depleted());

    // 耗尽后再请求：帧不变
    let request = context.request_video(11.0).unwrap();
    assert!(!request.got_video);
    assert!(request.frame.is_some());
}

#[test]
fn test_accurate_seek_lands_at_or_after_target() {
    let mut context = open(&SyntheticSpec::default());
    pump(&mut context);

    let actual = context.seek_to_time(0.30, false).unwrap();
    assert!((actual - 0.32).abs() < 1e-9);

    // 目标之前的音频已丢弃，第一段覆盖目标时间
    let reader = context.audio_reader().unwrap();
    let mut out = vec![0i16; 2];
    let request = reader.request_audio(&mut out, 1);
    let segment = 1024.0 / 48000.0;
    assert!(request.time <= 0.30 && request.time > 0.30 - segment);

    let times = play_video(&context, 0.30);
    assert_eq!(times.first().copied().map(|t| (t * 100.0).round()), Some(32.0));
    assert_eq!(times.len(), 2);
}

#[test]
fn test_nearest_seek_lands_on_keyframe() {
    let mut context = open(&SyntheticSpec::default());

    let actual = context.seek_to_time(0.30, true).unwrap();
    assert!((actual - 0.20).abs() < 1e-9);

    // 首帧无论时间都会立刻显示
    let request = context.request_video(0.0).unwrap();
    let frame = request.frame.unwrap();
    assert!(frame.read().is_first_frame());
    assert!((frame.time() - 0.20).abs() < 1e-9);
}

#[test]
fn test_seek_to_start_replays_from_zero() {
    let mut context = open(&SyntheticSpec::default());
    while !context.has_reached_eof() {
        pump(&mut context);
    }
    context.request_video(10.0).unwrap();

    context.seek_to_start().unwrap();
    assert!(!context.has_reached_eof());
    pump(&mut context);

    let times = play_video(&context, 0.0);
    assert_eq!(times.len(), 10);
    assert_eq!(times[0], 0.0);

    let reader = context.audio_reader().unwrap();
    let mut out = vec![0i16; 2];
    assert_eq!(reader.request_audio(&mut out, 1).time, 0.0);
}

#[test]
fn test_corrupt_packet_is_skipped() {
    let spec = SyntheticSpec {
        corrupt_video_frames: vec![3],
        ..SyntheticSpec::video_only()
    };
    let mut context = open(&spec);
    while !context.has_reached_eof() {
        pump(&mut context);
    }
    pump(&mut context);

    let times = play_video(&context, 0.0);
    assert_eq!(times.len(), 9);
    assert!(times.iter().all(|t| (t - 0.12).abs() > 1e-9));
}

#[test]
fn test_audio_only_seek_reports_audio_time() {
    let mut context = open(&SyntheticSpec::audio_only());
    assert!(!context.has_video_stream());
    assert_eq!(context.video_sample_aspect_ratio(), 0.0);

    let actual = context.seek_to_time(0.25, false).unwrap();
    assert!(actual <= 0.25 && actual > 0.25 - 1024.0 / 48000.0);
}

#[test]
fn test_decoder_delay_is_drained_at_eof() {
    init_logger();
    let mut source = MemorySource::synthetic(&SyntheticSpec::video_only());
    source.set_decoder_delay(0, 3);
    let backend = MemoryBackend::new();
    backend.insert("delayed", source);
    let mut context = MediaContext::new(backend);
    context.begin("delayed", &OpenParams::default()).unwrap();

    while !context.has_reached_eof() {
        pump(&mut context);
    }
    pump(&mut context);

    let times = play_video(&context, 0.0);
    assert_eq!(times.len(), 10);
}

#[test]
fn test_threaded_playback_reaches_last_frame() {
    init_logger();
    let spec = SyntheticSpec::default();
    let backend = MemoryBackend::new();
    backend.insert("clip.mp4", MemorySource::synthetic(&spec));
    let mut player = MediaPlayer::open(backend, "clip.mp4", OpenParams::default()).unwrap();
    player.play();

    let mut out = vec![0i16; 1024 * 2];
    let mut samples = 0;
    let mut last_frame = None;
    let deadline = Instant::now() + Duration::from_secs(5);

    while !player.presented_last_frame() && Instant::now() < deadline {
        samples += player.request_audio(&mut out, 1024).samples_read;
        let request = player.request_video(player.present_time());
        if request.got_video {
            last_frame = request.frame.map(|frame| frame.read().frame_number());
        }
        thread::sleep(Duration::from_millis(1));
    }

    assert!(player.presented_last_frame());
    assert_eq!(samples, spec.audio_samples_per_channel() * 2);
    assert_eq!(last_frame, Some(9));

    let actual = player.seek(0.30, true).unwrap();
    assert!((actual - 0.20).abs() < 1e-9);
    assert!(!player.presented_last_frame());
    // 音频回调再次读取之前，呈现时间就是落点
    assert!((player.present_time() - 0.20).abs() < 1e-9);

    player.close();
}
