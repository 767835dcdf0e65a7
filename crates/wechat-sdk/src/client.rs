//! WeChat Web 客户端 —— 会话与各组件的单一持有者
//!
//! 职责范围：
//! - 持有 HTTP 客户端（cookie 存储开启、禁用自动重定向）与端点注册表
//! - 持有会话凭据、同步游标、联系人目录、登录状态机
//! - 入站消息 / 联系人变更回调的显式注册
//! - 登出（幂等，只触发一次）
//!
//! 并发模型：单一逻辑会话、单一持有者。所有可变操作都取 `&mut self`，
//! 登录流程完整走到 `Initialized` 之后才允许开始轮询；轮询周期由外部
//! 定时任务驱动，与登录或另一个轮询周期互不并发。

use std::sync::Arc;

use reqwest::header::SET_COOKIE;
use reqwest::redirect::Policy;
use tracing::{debug, info};

use crate::contacts::ContactDirectory;
use crate::endpoints::{Endpoints, USER_AGENT};
use crate::error::{Result, WeChatSDKError};
use crate::models::{BaseResponse, StatusNotifyRequest, StatusNotifyResponse, SyncResponse, User};
use crate::session::{now_nanos, BaseRequest, SessionData, SyncKey};

/// 登录状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    /// 未认证
    Unauthenticated,
    /// 已取得登录票据
    UuidObtained,
    /// 等待扫码/确认
    QrPending,
    /// 已捕获重定向
    RedirectCaptured,
    /// 凭据已签发
    CredentialsIssued,
    /// 初始化完成，可以开始轮询
    Initialized,
}

impl std::fmt::Display for LoginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoginState::Unauthenticated => write!(f, "未认证"),
            LoginState::UuidObtained => write!(f, "已获取登录票据"),
            LoginState::QrPending => write!(f, "等待扫码"),
            LoginState::RedirectCaptured => write!(f, "已捕获重定向"),
            LoginState::CredentialsIssued => write!(f, "凭据已签发"),
            LoginState::Initialized => write!(f, "已初始化"),
        }
    }
}

/// 同步结果回调：由同步引擎的派发步骤同步调用，返回错误会向上传播
pub type SyncHandler = Arc<dyn Fn(&SyncResponse) -> Result<()> + Send + Sync>;

/// WeChat Web 协议客户端
pub struct WeChatClient {
    pub(crate) http: reqwest::Client,
    pub(crate) endpoints: Endpoints,
    pub(crate) session: SessionData,
    pub(crate) user: User,
    pub(crate) state: LoginState,
    /// 扫码阶段下发的头像预览（data URI）
    pub(crate) avatar: String,
    pub(crate) redirect_uri: String,
    pub(crate) qr_code_url: String,
    pub(crate) qr_content_url: String,
    pub(crate) contacts: ContactDirectory,
    /// 同步游标的结构化与管道分隔两种形式，始终一起整体替换
    pub(crate) sync_key: SyncKey,
    pub(crate) formatted_sync_key: String,
    pub(crate) last_sync_time: i64,
    logged_out: bool,
    pub(crate) on_message: Option<SyncHandler>,
    pub(crate) on_contact_change: Option<SyncHandler>,
}

impl WeChatClient {
    /// 以默认端点创建客户端
    pub fn new() -> Result<Self> {
        Self::with_endpoints(Endpoints::default())
    }

    /// 指定端点注册表创建客户端（地域镜像或测试夹具）
    pub fn with_endpoints(endpoints: Endpoints) -> Result<Self> {
        // 凭据交换必须亲自拿到 301，因此全局禁用自动重定向；
        // 会话连续性经 cookie 与显式参数双通道冗余携带
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(WeChatClient {
            http,
            endpoints,
            session: SessionData::default(),
            user: User::default(),
            state: LoginState::Unauthenticated,
            avatar: String::new(),
            redirect_uri: String::new(),
            qr_code_url: String::new(),
            qr_content_url: String::new(),
            contacts: ContactDirectory::new(),
            sync_key: SyncKey::default(),
            formatted_sync_key: String::new(),
            last_sync_time: 0,
            logged_out: false,
            on_message: None,
            on_contact_change: None,
        })
    }

    /// 注册入站消息回调；缺省为无操作
    pub fn on_message(&mut self, handler: SyncHandler) {
        self.on_message = Some(handler);
    }

    /// 注册联系人变更回调；缺省为无操作
    pub fn on_contact_change(&mut self, handler: SyncHandler) {
        self.on_contact_change = Some(handler);
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    pub fn session(&self) -> &SessionData {
        &self.session
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn contacts(&self) -> &ContactDirectory {
        &self.contacts
    }

    pub fn avatar(&self) -> &str {
        &self.avatar
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// 供人扫码展示的 QR 图片 URL
    pub fn qr_code_url(&self) -> &str {
        &self.qr_code_url
    }

    /// QR 码承载的登录票据 URL
    pub fn qr_content_url(&self) -> &str {
        &self.qr_content_url
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// 端点注册表可写访问（指向镜像/夹具时用）
    pub fn endpoints_mut(&mut self) -> &mut Endpoints {
        &mut self.endpoints
    }

    pub fn sync_key(&self) -> &SyncKey {
        &self.sync_key
    }

    /// 管道分隔形式的当前游标
    pub fn formatted_sync_key(&self) -> &str {
        &self.formatted_sync_key
    }

    pub fn last_sync_time(&self) -> i64 {
        self.last_sync_time
    }

    /// 整体替换同步游标：结构化与格式化形式一起更新，绝不按字段合并
    pub(crate) fn set_sync_key(&mut self, sync_key: SyncKey) {
        self.formatted_sync_key = sync_key.format();
        self.sync_key = sync_key;
    }

    /// 派生带鉴权调用的基础请求体
    pub(crate) fn base_request(&self) -> Result<BaseRequest> {
        self.session.base_request()
    }

    /// 非零 Ret 一律归类为协议错误
    pub(crate) fn ensure_ret_ok(base: &BaseResponse) -> Result<()> {
        if base.ret != 0 {
            return Err(WeChatSDKError::protocol(base.ret, base.err_msg.clone()));
        }
        Ok(())
    }

    /// 非成功 HTTP 状态归类为协议错误
    pub(crate) fn ensure_http_ok(status: reqwest::StatusCode) -> Result<()> {
        if !status.is_success() {
            return Err(WeChatSDKError::protocol(
                i64::from(status.as_u16()),
                format!("HTTP 状态异常: {}", status),
            ));
        }
        Ok(())
    }

    /// 从响应头提取指定名字的 Set-Cookie 值
    pub(crate) fn cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
        for header in response.headers().get_all(SET_COOKIE) {
            let Ok(raw) = header.to_str() else { continue };
            let (pair, _) = raw.split_once(';').unwrap_or((raw, ""));
            if let Some((cookie_name, value)) = pair.split_once('=') {
                if cookie_name.trim() == name {
                    return Some(value.trim().to_string());
                }
            }
        }
        None
    }

    /// 恢复外部持久化的会话凭据，跳过扫码直接进入待初始化状态。
    /// 凭据不全时拒绝恢复。
    pub fn restore_session(&mut self, session: SessionData) -> Result<()> {
        if !session.is_complete() {
            return Err(WeChatSDKError::InvalidSession(format!(
                "会话凭据不全: {}",
                session.missing_fields().join(", ")
            )));
        }
        self.session = session;
        self.state = LoginState::CredentialsIssued;
        Ok(())
    }

    /// 初始化完成后上报在线状态
    pub async fn status_notify(&mut self) -> Result<()> {
        let request = StatusNotifyRequest {
            base_request: self.base_request()?,
            code: 3,
            from_user_name: self.user.user_name.clone(),
            to_user_name: self.user.user_name.clone(),
            client_msg_id: now_nanos(),
        };

        let url = self.endpoints.status_notify.clone();
        let response = self
            .http
            .post(&url)
            .query(&[
                ("pass_ticket", self.session.pass_ticket.as_str()),
                ("lang", "zh_CN"),
            ])
            .json(&request)
            .send()
            .await?;
        Self::ensure_http_ok(response.status())?;

        let result: StatusNotifyResponse = response.json().await?;
        Self::ensure_ret_ok(&result.base_response)?;
        debug!("状态上报完成: msg_id={}", result.msg_id);
        Ok(())
    }

    /// 登出。幂等：第一次调用生效，之后的调用是无操作，
    /// 反复出现的失效信号不会重复触发登出。
    pub async fn logout(&mut self) -> Result<()> {
        if self.logged_out {
            debug!("已登出，忽略重复的登出请求");
            return Ok(());
        }
        self.logged_out = true;

        let url = self.endpoints.logout.clone();
        let response = self
            .http
            .post(&url)
            .query(&[
                ("redirect", "1"),
                ("type", "0"),
                ("skey", self.session.skey.as_str()),
                ("lang", "zh_CN"),
            ])
            .send()
            .await?;
        Self::ensure_http_ok(response.status())?;

        info!("已登出: {}", self.user.nick_name);
        self.session = SessionData::default();
        self.state = LoginState::Unauthenticated;
        Ok(())
    }

    /// 是否已执行过登出
    pub fn is_logged_out(&self) -> bool {
        self.logged_out
    }
}
