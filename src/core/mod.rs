// 公共类型：配置、媒体信息、播放时钟与错误

pub mod types;
pub mod clock;
pub mod error;

pub use types::*;
pub use clock::*;
pub use error::*;
