use serde::{Deserialize, Serialize};

use super::error::{PlayerError, Result};

/// 输出像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 打包 RGBA8（每像素 4 字节）
    Rgba,
    /// 平面 YUV420（Y 全分辨率，U/V 宽高各减半）
    Yuv420p,
}

/// 视频输出模式（调用方的期望，实际格式由源格式决定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    #[default]
    Rgba,
    /// 源为 YUV420P 时直接输出平面 YUV，避免格式转换
    PlanarYuv,
}

/// 音频输出声道布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioOutputMode {
    Mono,
    #[default]
    Stereo,
    /// 保持源声道布局
    Native,
}

/// 媒体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    Video,
    Other,
}

/// 有理数（时间基、帧率、宽高比）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 分母为 0 时返回 0.0
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }

    pub fn is_valid(self) -> bool {
        self.num != 0 && self.den != 0
    }
}

/// 缓冲区上限配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferLimits {
    /// 音频数据包队列的软上限（仅用于解封装节流）
    pub audio_packet_queue: usize,
    /// 视频数据包队列的软上限
    pub video_packet_queue: usize,
    /// 视频帧池容量（预分配帧数）
    pub video_frame_pool: usize,
    /// 单个音频片段的最大采样数（交错，所有声道合计）
    pub max_segment_samples: usize,
}

impl BufferLimits {
    /// 队列上限或帧池容量为 0 时，解封装永远无法推进
    pub fn validate(&self) -> Result<()> {
        let zero = [
            ("audio_packet_queue", self.audio_packet_queue),
            ("video_packet_queue", self.video_packet_queue),
            ("video_frame_pool", self.video_frame_pool),
            ("max_segment_samples", self.max_segment_samples),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);

        match zero {
            Some((name, _)) => Err(PlayerError::InvalidConfig(format!("{} 不能为 0", name))),
            None => Ok(()),
        }
    }
}

impl Default for BufferLimits {
    fn default() -> Self {
        Self {
            audio_packet_queue: 4 * 3 * 10,
            video_packet_queue: 4 * 10,
            video_frame_pool: 16,
            max_segment_samples: 8192,
        }
    }
}

/// 打开媒体时的参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenParams {
    pub enable_audio: bool,
    pub enable_video: bool,
    /// 期望使用的音频流序号（第 N 条音频流），不存在时使用第一条
    pub desired_audio_stream: Option<usize>,
    pub audio_output_mode: AudioOutputMode,
    pub output_mode: OutputMode,
    pub limits: BufferLimits,
    /// 精确 Seek 时的最大泵送轮数，None 表示直到流结束
    pub max_seek_iterations: Option<usize>,
    /// 播放线程的轮询间隔（毫秒）
    pub tick_interval_ms: u64,
}

impl Default for OpenParams {
    fn default() -> Self {
        Self {
            enable_audio: true,
            enable_video: true,
            desired_audio_stream: None,
            audio_output_mode: AudioOutputMode::default(),
            output_mode: OutputMode::default(),
            limits: BufferLimits::default(),
            max_seek_iterations: Some(1000),
            tick_interval_ms: 10,
        }
    }
}

impl OpenParams {
    /// 从 JSON 读取参数，缺省字段使用默认值
    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.limits.validate()?;
        Ok(params)
    }
}

/// 媒体信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub filename: String,
    pub duration: f64,          // 总时长（秒）
    pub has_audio: bool,
    pub has_video: bool,
    pub width: usize,
    pub height: usize,
    pub sample_aspect_ratio: f64,
    pub pixel_format: Option<PixelFormat>,
    pub sample_rate: usize,
    pub channels: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_params_from_partial_json() {
        let params = OpenParams::from_json(
            r#"{ "enable_audio": false, "output_mode": "planar_yuv", "limits": { "video_frame_pool": 4 } }"#,
        )
        .unwrap();

        assert!(!params.enable_audio);
        assert!(params.enable_video);
        assert_eq!(params.output_mode, OutputMode::PlanarYuv);
        assert_eq!(params.limits.video_frame_pool, 4);
        assert_eq!(params.limits.audio_packet_queue, 120);
        assert_eq!(params.limits.video_packet_queue, 40);
        assert_eq!(params.tick_interval_ms, 10);
    }

    #[test]
    fn test_open_params_rejects_bad_json() {
        assert!(OpenParams::from_json("{ not json").is_err());
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        assert!(BufferLimits::default().validate().is_ok());

        let result = OpenParams::from_json(r#"{ "limits": { "video_packet_queue": 0 } }"#);
        assert!(matches!(result, Err(PlayerError::InvalidConfig(_))));

        let limits = BufferLimits {
            audio_packet_queue: 0,
            ..BufferLimits::default()
        };
        assert!(matches!(limits.validate(), Err(PlayerError::InvalidConfig(_))));
    }

    #[test]
    fn test_rational() {
        assert_eq!(Rational::new(1, 25).to_f64(), 0.04);
        assert_eq!(Rational::new(1, 0).to_f64(), 0.0);
        assert!(!Rational::new(0, 1).is_valid());
    }

    #[test]
    fn test_media_info_serializes() {
        let info = MediaInfo {
            filename: "clip.mp4".to_string(),
            has_video: true,
            width: 640,
            height: 360,
            pixel_format: Some(PixelFormat::Rgba),
            ..Default::default()
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"width\":640"));
        assert!(json.contains("\"Rgba\""));
    }
}
