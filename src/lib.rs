//! myy_engine - 流式媒体播放核心
//!
//! 解封装、音视频解码、缓冲与 Seek。音频线程与渲染线程通过
//! [`AudioReader`] / [`VideoReader`] 拉取数据，生产者线程由 [`MediaPlayer`] 管理。

pub mod core;
pub mod player;

pub use crate::core::{
    AudioOutputMode, BufferLimits, MediaInfo, OpenParams, OutputMode, PixelFormat,
    PlaybackClock, PlayerError, Result,
};
pub use crate::player::{
    AudioReader, AudioRequest, FrameBuffer, MediaBackend, MediaContext, MediaPlayer,
    MemoryBackend, MemorySource, SyntheticSpec, VideoReader, VideoRequest,
};
#[cfg(feature = "ffmpeg")]
pub use crate::player::FfmpegBackend;
