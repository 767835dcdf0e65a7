//! 登录流程
//!
//! 状态机：`Unauthenticated → UuidObtained → QrPending → RedirectCaptured
//! → CredentialsIssued → Initialized`。
//!
//! 登录相关响应不是 JSON，而是 JS/文本片段，这里用显式的标记提取器解析，
//! 标记缺失时返回 `MalformedResponse` 而不是越界崩溃。轮询由调用方反复
//! 驱动（协议没有推送通道），每次调用对已提取的部分进展保持幂等。

use regex::Regex;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::client::{LoginState, WeChatClient};
use crate::endpoints::{Endpoints, CLIENT_VERSION, EXTSPAM, REFERER, SYNC_CHECK_RET_LOGOUT, USER_AGENT};
use crate::error::{Result, WeChatSDKError};
use crate::models::{InitRequest, InitResponse};
use crate::session::now_nanos;

/// 轮询登录端点的一次分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPoll {
    /// 尚未扫码（window.code=408）
    Pending,
    /// 已扫码待确认，携带头像预览
    Scanned,
    /// 已确认，重定向已捕获，可进入凭据交换
    Confirmed,
}

/// 在 `marker` 之后提取到 `terminator` 为止的内容
pub(crate) fn extract_between<'a>(
    body: &'a str,
    marker: &str,
    terminator: &str,
) -> Result<&'a str> {
    let start = body
        .find(marker)
        .ok_or_else(|| WeChatSDKError::MalformedResponse(format!("缺少标记 {:?}", marker)))?
        + marker.len();
    let rest = &body[start..];
    let end = rest
        .find(terminator)
        .ok_or_else(|| WeChatSDKError::MalformedResponse(format!("标记 {:?} 后未闭合", marker)))?;
    Ok(&rest[..end])
}

/// 提取 XML 风格标签 `<tag>...</tag>` 的内容
fn xml_tag(body: &str, tag: &str) -> Option<String> {
    let re = Regex::new(&format!("<{tag}>(.*)</{tag}>")).ok()?;
    re.captures(body)
        .and_then(|captures| captures.get(1))
        .map(|matched| matched.as_str().to_string())
}

impl WeChatClient {
    /// 请求一次性登录票据（UUID）并派生两个 QR URL。
    /// 响应是 JS 文本，uuid 位于固定字面标记之后。
    pub async fn get_uuid(&mut self) -> Result<()> {
        let url = self.endpoints.js_login.clone();
        let response = self.http.post(&url).send().await?;
        Self::ensure_http_ok(response.status())?;
        let body = response.text().await?;

        let uuid = extract_between(&body, "window.QRLogin.uuid = \"", "\"")?.to_string();

        self.qr_code_url = Endpoints::qr_code_url(&uuid);
        self.qr_content_url = Endpoints::qr_content_url(&uuid);
        self.session.uuid = uuid;
        self.state = LoginState::UuidObtained;

        info!("已获取登录票据，扫码地址: {}", self.qr_code_url);
        Ok(())
    }

    /// 轮询一次登录端点，把响应体分类为 pending / scanned / confirmed 之一。
    /// 调用方需反复调用直到 `Confirmed`；每次调用彼此独立、幂等。
    pub async fn poll_login(&mut self) -> Result<LoginPoll> {
        // 防缓存 nonce：当前纳秒时间戳按位取反
        let nonce = !now_nanos();

        let url = self.endpoints.login.clone();
        let response = self
            .http
            .get(&url)
            .query(&[
                ("tip", "0"),
                ("uuid", self.session.uuid.as_str()),
                ("loginicon", "true"),
                ("r", nonce.to_string().as_str()),
            ])
            .send()
            .await?;
        Self::ensure_http_ok(response.status())?;
        let body = response.text().await?;

        self.classify_login_poll(&body)
    }

    fn classify_login_poll(&mut self, body: &str) -> Result<LoginPoll> {
        if body.contains("window.redirect_uri") {
            let redirect_uri = extract_between(body, "window.redirect_uri=\"", "\"")?.to_string();

            // 用重定向主机重新解析端点，后续调用才会落在正确的地域集群
            let host = redirect_host(&redirect_uri)?;
            self.endpoints = Endpoints::new(Some(&host));
            self.redirect_uri = redirect_uri;
            self.state = LoginState::RedirectCaptured;

            info!("登录已确认，重定向主机: {}", host);
            return Ok(LoginPoll::Confirmed);
        }

        if body.contains("window.userAvatar") {
            // 头像可能被观察到多次，重复提取无副作用
            self.avatar = extract_between(body, "window.userAvatar = '", "'")?.to_string();
            self.state = LoginState::QrPending;
            debug!("已扫码，等待手机端确认");
            return Ok(LoginPoll::Scanned);
        }

        let code = extract_between(body, "window.code=", ";")?;
        if code == "408" {
            // 408 表示长轮询超时、继续等待
            self.state = LoginState::QrPending;
            return Ok(LoginPoll::Pending);
        }

        let code: i64 = code
            .parse()
            .map_err(|_| WeChatSDKError::MalformedResponse(format!("登录状态码不可解析: {:?}", code)))?;
        Err(WeChatSDKError::protocol(code, "登录轮询失败"))
    }

    /// 凭据交换：手动（不跟随重定向）GET 捕获到的重定向地址，
    /// 带固定请求头集合；预期 301，从 XML 标签和 Set-Cookie 双通道提取凭据，
    /// cookie 值允许覆盖/补充标签值。两轮之后仍缺字段则为致命配置错误。
    pub async fn exchange_credentials(&mut self) -> Result<()> {
        let url = self.redirect_uri.clone();
        let response = self
            .http
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .header("client-version", CLIENT_VERSION)
            .header("referer", REFERER)
            .header("extspam", EXTSPAM)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::MOVED_PERMANENTLY {
            return Err(WeChatSDKError::protocol(
                i64::from(status.as_u16()),
                format!("凭据交换预期 301，实际 {}", status),
            ));
        }

        // 先读 cookie 头再消费响应体
        let cookie_data_ticket = Self::cookie_value(&response, "webwx_data_ticket");
        let cookie_uin = Self::cookie_value(&response, "wxuin");
        let cookie_sid = Self::cookie_value(&response, "wxsid");
        let cookie_pass_ticket = Self::cookie_value(&response, "pass_ticket");

        let body = response.text().await?;

        if xml_tag(&body, "ret").as_deref() == Some("0") {
            if let Some(skey) = xml_tag(&body, "skey") {
                self.session.skey = skey;
            }
            if let Some(sid) = xml_tag(&body, "wxsid") {
                self.session.sid = sid;
            }
            if let Some(uin) = xml_tag(&body, "wxuin") {
                self.session.uin = uin;
            }
            if let Some(pass_ticket) = xml_tag(&body, "pass_ticket") {
                self.session.pass_ticket = pass_ticket;
            }
        }

        if let Some(value) = cookie_data_ticket {
            self.session.data_ticket = value;
        }
        if let Some(value) = cookie_uin {
            self.session.uin = value;
        }
        if let Some(value) = cookie_sid {
            self.session.sid = value;
        }
        if let Some(value) = cookie_pass_ticket {
            self.session.pass_ticket = value;
        }

        if !self.session.is_complete() {
            return Err(WeChatSDKError::MalformedResponse(format!(
                "凭据交换后仍缺字段: {}",
                self.session.missing_fields().join(", ")
            )));
        }

        self.state = LoginState::CredentialsIssued;
        debug!("凭据交换完成");
        Ok(())
    }

    /// 初始化：采纳同步游标与当前用户身份，并用内联联系人列表播种目录。
    /// `Ret == 1101` 是"已登出"的独立终止条件。
    pub async fn init(&mut self) -> Result<()> {
        let r = now_nanos() / -1579;

        let request = InitRequest {
            base_request: self.base_request()?,
        };

        let url = self.endpoints.init.clone();
        let response = self
            .http
            .post(&url)
            .query(&[
                ("pass_ticket", self.session.pass_ticket.as_str()),
                ("r", r.to_string().as_str()),
            ])
            .json(&request)
            .send()
            .await?;
        Self::ensure_http_ok(response.status())?;

        let result: InitResponse = response.json().await?;

        if result.base_response.ret == SYNC_CHECK_RET_LOGOUT {
            warn!("初始化返回登出哨兵，会话已失效");
            return Err(WeChatSDKError::SessionInvalidated);
        }
        Self::ensure_ret_ok(&result.base_response)?;

        if !result.skey.is_empty() {
            self.session.skey = result.skey.clone();
        }

        self.set_sync_key(result.sync_key.clone());
        self.user = result.user.clone();
        self.contacts.merge(result.contact_list.iter().cloned());
        self.state = LoginState::Initialized;

        info!("✅ 登录成功: {}", self.user.nick_name);
        Ok(())
    }
}

/// 取重定向 URI 的主机名
fn redirect_host(redirect_uri: &str) -> Result<String> {
    let url = reqwest::Url::parse(redirect_uri)
        .map_err(|e| WeChatSDKError::MalformedResponse(format!("重定向地址不可解析: {}", e)))?;
    url.host_str()
        .map(str::to_string)
        .ok_or_else(|| WeChatSDKError::MalformedResponse("重定向地址缺少主机名".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_between_finds_value() {
        let body = r#"window.QRLogin.code = 200; window.QRLogin.uuid = "AbCd==";"#;
        assert_eq!(
            extract_between(body, "window.QRLogin.uuid = \"", "\"").unwrap(),
            "AbCd=="
        );
    }

    #[test]
    fn extract_between_reports_missing_marker() {
        let err = extract_between("window.code=400;", "window.QRLogin.uuid = \"", "\"").unwrap_err();
        assert!(matches!(err, WeChatSDKError::MalformedResponse(_)));
    }

    #[test]
    fn extract_between_reports_unterminated() {
        let err = extract_between("window.code=408", "window.code=", ";").unwrap_err();
        assert!(matches!(err, WeChatSDKError::MalformedResponse(_)));
    }

    #[test]
    fn xml_tag_extraction() {
        let body = "<error><ret>0</ret><skey>@crypt_abc</skey></error>";
        assert_eq!(xml_tag(body, "ret").as_deref(), Some("0"));
        assert_eq!(xml_tag(body, "skey").as_deref(), Some("@crypt_abc"));
        assert_eq!(xml_tag(body, "wxsid"), None);
    }

    #[test]
    fn classify_pending_scanned_confirmed() {
        let mut client = WeChatClient::new().unwrap();

        let poll = client.classify_login_poll("window.code=408;").unwrap();
        assert_eq!(poll, LoginPoll::Pending);
        assert_eq!(client.state(), LoginState::QrPending);

        let poll = client
            .classify_login_poll("window.code=201;window.userAvatar = 'data:img/jpg;base64,xyz';")
            .unwrap();
        assert_eq!(poll, LoginPoll::Scanned);
        assert_eq!(client.avatar(), "data:img/jpg;base64,xyz");

        // 头像可重复观察
        let poll = client
            .classify_login_poll("window.code=201;window.userAvatar = 'data:img/jpg;base64,xyz';")
            .unwrap();
        assert_eq!(poll, LoginPoll::Scanned);

        let body = "window.code=200;\nwindow.redirect_uri=\"https://wx2.qq.com/cgi-bin/mmwebwx-bin/webwxnewloginpage?ticket=t1\";";
        let poll = client.classify_login_poll(body).unwrap();
        assert_eq!(poll, LoginPoll::Confirmed);
        assert_eq!(client.state(), LoginState::RedirectCaptured);
        // 端点已按重定向主机重新解析
        assert_eq!(
            client.endpoints().login,
            "https://login.wx2.qq.com/cgi-bin/mmwebwx-bin/login"
        );
    }

    #[test]
    fn classify_unexpected_code_is_protocol_error() {
        let mut client = WeChatClient::new().unwrap();
        let err = client.classify_login_poll("window.code=400;").unwrap_err();
        assert!(matches!(err, WeChatSDKError::Protocol { code: 400, .. }));
    }

    #[test]
    fn redirect_host_parsing() {
        assert_eq!(
            redirect_host("https://wx8.qq.com/cgi-bin/mmwebwx-bin/webwxnewloginpage?ticket=x").unwrap(),
            "wx8.qq.com"
        );
        assert!(redirect_host("::not-a-url::").is_err());
    }
}
