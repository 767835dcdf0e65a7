//! WeChat SDK - 微信网页版协议客户端
//!
//! 面向微信网页版 HTTP 协议的会话客户端，包括：
//! - 🔑 扫码登录状态机：票据获取、轮询、凭据交换、会话初始化
//! - 📡 同步引擎：长轮询检查 + 增量拉取，游标整体替换
//! - 👥 联系人目录：分页拉取、群聊占位批量补水、幂等 upsert
//! - 💬 消息派发：文本与媒体发送，媒体按字节嗅探选择发送路径
//! - ⚙️ 回调机制：入站消息与联系人变更的显式注册
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use wechat_sdk::{LoginPoll, WeChatClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = WeChatClient::new()?;
//!
//!     // 获取登录票据并展示二维码
//!     client.get_uuid().await?;
//!     println!("请扫码: {}", client.qr_code_url());
//!
//!     // 轮询直到手机端确认
//!     loop {
//!         match client.poll_login().await? {
//!             LoginPoll::Confirmed => break,
//!             _ => tokio::time::sleep(std::time::Duration::from_secs(1)).await,
//!         }
//!     }
//!
//!     // 交换凭据、初始化会话、上报在线状态
//!     client.exchange_credentials().await?;
//!     client.init().await?;
//!     client.status_notify().await?;
//!
//!     // 拉取联系人目录
//!     client.fetch_contacts().await?;
//!
//!     // 发送一条文本消息后登出
//!     let owner = client.user().user_name.clone();
//!     client.send_text(&owner, "你好").await?;
//!     client.logout().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod contacts;
pub mod endpoints;
pub mod error;
pub mod login;
pub mod message;
pub mod models;
pub mod session;
pub mod sync;

pub use client::{LoginState, SyncHandler, WeChatClient};
pub use contacts::ContactDirectory;
pub use endpoints::Endpoints;
pub use error::{Result, WeChatSDKError};
pub use login::LoginPoll;
pub use message::MediaCategory;
pub use models::{Contact, MessageType, SyncMessage, SyncResponse, User};
pub use session::{BaseRequest, SessionData, SyncKey};
