//! 错误类型定义
//!
//! 所有操作都返回 `Result`，不依赖 panic 做控制流。分类原则：
//! - `Transport`：网络/IO 故障，原样向上传播，SDK 内部不重试
//! - `Protocol`：HTTP 非成功状态、或响应体 `Ret`/code 非零
//! - `SessionInvalidated`：终止性信号（synccheck retcode 1101、init 的登出哨兵）
//! - `MalformedResponse`：文本/JSON 响应中缺少预期的字面标记或字段

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WeChatSDKError>;

#[derive(Debug, Error)]
pub enum WeChatSDKError {
    /// 传输层错误（网络/IO），不做内部重试
    #[error("传输错误: {0}")]
    Transport(#[from] reqwest::Error),

    /// 协议错误：非成功 HTTP 状态或非零 Ret，携带错误码与服务端消息
    #[error("协议错误 [{code}]: {message}")]
    Protocol { code: i64, message: String },

    /// 会话已失效：调用方应停止轮询并执行一次登出
    #[error("会话已失效")]
    SessionInvalidated,

    /// 媒体内容嗅探未命中任何已知类别
    #[error("不支持的内容类型")]
    UnsupportedContentType,

    /// 响应中缺少预期的标记或字段
    #[error("响应格式异常: {0}")]
    MalformedResponse(String),

    /// 本地会话状态不完整或不可用（如 uin 不可解析为整数）
    #[error("会话状态无效: {0}")]
    InvalidSession(String),

    /// JSON 编解码失败
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WeChatSDKError {
    pub fn protocol(code: i64, message: impl Into<String>) -> Self {
        WeChatSDKError::Protocol {
            code,
            message: message.into(),
        }
    }

    /// 是否为终止性错误（检测到后应停止轮询）
    pub fn is_terminal(&self) -> bool {
        matches!(self, WeChatSDKError::SessionInvalidated)
    }
}
