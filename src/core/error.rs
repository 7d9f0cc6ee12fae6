use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[cfg(feature = "ffmpeg")]
    #[error("FFmpeg 错误: {0}")]
    FFmpegError(#[from] ffmpeg_next::Error),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("配置解析失败: {0}")]
    Config(#[from] serde_json::Error),

    #[error("配置无效: {0}")]
    InvalidConfig(String),

    #[error("无法打开文件: {0}")]
    OpenError(String),

    #[error("无法获取流信息: {0}")]
    StreamInfo(String),

    #[error("找不到解码器: {0}")]
    DecoderNotFound(String),

    #[error("无法打开解码器: {0}")]
    DecoderOpen(String),

    #[error("重采样器初始化失败: {0}")]
    Resampler(String),

    #[error("像素格式转换器初始化失败: {0}")]
    Converter(String),

    #[error("视频帧池分配失败: {0}")]
    PoolAllocation(String),

    #[error("解码错误: {0}")]
    DecodeError(String),

    #[error("Seek 失败: {0}")]
    SeekError(String),

    #[error("媒体上下文尚未 Begin")]
    NotBegun,

    #[error("媒体上下文已经 Begin，Begin/End 必须成对调用")]
    AlreadyBegun,

    #[error("播放线程错误: {0}")]
    Thread(String),

    #[error("其他错误: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
