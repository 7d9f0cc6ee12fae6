// 播放核心模块

pub mod backend;
pub mod packet_queue;
pub mod audio_buffer;
pub mod video_buffer;
pub mod audio_context;
pub mod video_context;
pub mod context;
pub mod player_thread;
pub mod memory;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub use audio_buffer::{AudioSampleBuffer, AudioSegment};
pub use audio_context::{AudioDecodeContext, AudioReader, AudioRequest};
pub use backend::{MediaBackend, MediaInput, SeekTarget, StreamInfo};
pub use context::MediaContext;
pub use memory::{MemoryBackend, MemorySource, SyntheticSpec};
pub use player_thread::MediaPlayer;
pub use video_buffer::{FrameBuffer, SharedFrame, VideoFrame, VideoFramePool};
pub use video_context::{VideoDecodeContext, VideoReader, VideoRequest};
#[cfg(feature = "ffmpeg")]
pub use self::ffmpeg::FfmpegBackend;
