//! 同步引擎：长轮询检查、增量拉取、游标替换、结果派发
//!
//! 引擎不做重试：传输错误原样向上传播，重试/退避/生命周期策略由外层
//! 定时任务负责。检查到的失效信号以 `SessionInvalidated` 终止性错误
//! 上抛，调用方据此停止轮询并执行一次登出。

use tracing::{debug, info, warn};

use crate::client::WeChatClient;
use crate::endpoints::SYNC_CHECK_RET_LOGOUT;
use crate::error::{Result, WeChatSDKError};
use crate::login::extract_between;
use crate::models::{SyncRequest, SyncResponse};
use crate::session::{device_id, now_millis, now_nanos};

/// 解析 synccheck 的短文本响应，返回 selector。
///
/// retcode 是独立于 selector 的权威信号：字面值 `1101` 即会话失效，
/// 无论同一响应里 selector 是什么。
pub(crate) fn parse_sync_check(body: &str) -> Result<i64> {
    let retcode = extract_between(body, "retcode:\"", "\"")?;
    if retcode == "1101" {
        return Err(WeChatSDKError::SessionInvalidated);
    }
    let retcode: i64 = retcode
        .parse()
        .map_err(|_| WeChatSDKError::MalformedResponse(format!("retcode 不可解析: {:?}", retcode)))?;
    if retcode != 0 {
        return Err(WeChatSDKError::protocol(retcode, "synccheck 返回非零 retcode"));
    }

    let selector = extract_between(body, "selector:\"", "\"")?;
    selector
        .parse()
        .map_err(|_| WeChatSDKError::MalformedResponse(format!("selector 不可解析: {:?}", selector)))
}

impl WeChatClient {
    /// 长轮询检查：携带会话标识与格式化游标，返回 selector（0 = 无变化）
    pub async fn sync_check(&mut self) -> Result<i64> {
        let url = self.endpoints.sync_check.clone();
        let response = self
            .http
            .get(&url)
            .query(&[
                ("r", now_millis().to_string().as_str()),
                ("sid", self.session.sid.as_str()),
                ("uin", self.session.uin.as_str()),
                ("skey", self.session.skey.as_str()),
                ("deviceid", device_id().as_str()),
                ("synckey", self.formatted_sync_key.as_str()),
            ])
            .send()
            .await?;
        Self::ensure_http_ok(response.status())?;
        let body = response.text().await?;

        parse_sync_check(&body)
    }

    /// 增量拉取。成功后游标必须用响应的 `SyncCheckKey`（而非 `SyncKey`）
    /// 整体替换——两者是不同字段，用错会让后续轮询全部失步。
    pub async fn sync_fetch(&mut self) -> Result<SyncResponse> {
        let request = SyncRequest {
            base_request: self.base_request()?,
            sync_key: self.sync_key.clone(),
            rr: !now_nanos(),
        };

        let url = self.endpoints.sync.clone();
        let response = self
            .http
            .post(&url)
            .query(&[
                ("sid", self.session.sid.as_str()),
                ("skey", self.session.skey.as_str()),
                ("pass_ticket", self.session.pass_ticket.as_str()),
                ("lang", "zh_CN"),
            ])
            .json(&request)
            .send()
            .await?;
        Self::ensure_http_ok(response.status())?;

        let result: SyncResponse = response.json().await?;
        if result.base_response.ret == SYNC_CHECK_RET_LOGOUT {
            warn!("webwxsync 返回登出哨兵，会话已失效");
            return Err(WeChatSDKError::SessionInvalidated);
        }
        Self::ensure_ret_ok(&result.base_response)?;

        self.apply_sync_response(&result);
        Ok(result)
    }

    /// 采纳一次拉取结果的游标（服务端怪癖：取 check-key）
    pub(crate) fn apply_sync_response(&mut self, response: &SyncResponse) {
        self.set_sync_key(response.sync_check_key.clone());
    }

    /// 一个轮询周期：检查 → selector 非零则拉取并派发。
    /// 由单一持有任务按固定间隔驱动，不得与登录流程或另一个周期并发。
    pub async fn poll_cycle(&mut self) -> Result<()> {
        let selector = self.sync_check().await?;
        if selector != 0 {
            debug!("selector={}，开始增量拉取", selector);
            let data = self.sync_fetch().await?;
            self.last_sync_time = now_nanos();
            self.dispatch(&data)?;
        }
        Ok(())
    }

    /// 派发：新消息交给消息回调；变更联系人先合并进目录再交给联系人回调。
    /// 回调缺省即无操作。
    pub(crate) fn dispatch(&mut self, data: &SyncResponse) -> Result<()> {
        if data.add_msg_count > 0 {
            info!("收到 {} 条新消息", data.add_msg_count);
            if let Some(handler) = &self.on_message {
                handler(data)?;
            }
        }

        if data.mod_contact_count > 0 {
            info!("收到 {} 条联系人变更", data.mod_contact_count);
            self.contacts.merge(data.mod_contact_list.iter().cloned());
            if let Some(handler) = &self.on_contact_change {
                handler(data)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn parse_selector() {
        assert_eq!(
            parse_sync_check(r#"window.synccheck={retcode:"0",selector:"0"}"#).unwrap(),
            0
        );
        assert_eq!(
            parse_sync_check(r#"window.synccheck={retcode:"0",selector:"2"}"#).unwrap(),
            2
        );
    }

    #[test]
    fn retcode_1101_wins_over_selector() {
        // 失效 retcode 是权威信号，selector 在场也不改变分类
        let err = parse_sync_check(r#"window.synccheck={retcode:"1101",selector:"2"}"#).unwrap_err();
        assert!(matches!(err, WeChatSDKError::SessionInvalidated));
    }

    #[test]
    fn nonzero_retcode_is_protocol_error() {
        let err = parse_sync_check(r#"window.synccheck={retcode:"1100",selector:"0"}"#).unwrap_err();
        assert!(matches!(err, WeChatSDKError::Protocol { code: 1100, .. }));
    }

    #[test]
    fn missing_markers_are_malformed() {
        assert!(matches!(
            parse_sync_check("<html>gateway timeout</html>").unwrap_err(),
            WeChatSDKError::MalformedResponse(_)
        ));
        assert!(matches!(
            parse_sync_check(r#"window.synccheck={retcode:"0"}"#).unwrap_err(),
            WeChatSDKError::MalformedResponse(_)
        ));
    }

    #[test]
    fn cursor_adopts_check_key_not_sync_key() {
        // 回归：服务端怪癖，新游标取 SyncCheckKey 字段
        let mut client = crate::client::WeChatClient::new().unwrap();
        let response: SyncResponse = serde_json::from_str(
            r#"{
                "BaseResponse": {"Ret": 0, "ErrMsg": ""},
                "SyncKey": {"Count": 1, "List": [{"Key": 1, "Val": 100}]},
                "SyncCheckKey": {"Count": 1, "List": [{"Key": 1, "Val": 101}]}
            }"#,
        )
        .unwrap();
        client.apply_sync_response(&response);
        assert_eq!(client.formatted_sync_key(), "1_101");
        assert_eq!(client.sync_key().format(), "1_101");
    }

    #[test]
    fn dispatch_invokes_registered_handlers_only() {
        let mut client = crate::client::WeChatClient::new().unwrap();

        let data: SyncResponse = serde_json::from_str(
            r#"{
                "BaseResponse": {"Ret": 0, "ErrMsg": ""},
                "AddMsgCount": 1,
                "AddMsgList": [{"MsgId": "1", "MsgType": 1, "Content": "hi",
                                "FromUserName": "@a", "ToUserName": "@b"}],
                "ModContactCount": 1,
                "ModContactList": [{"UserName": "@@room", "NickName": "群", "MemberCount": 3}]
            }"#,
        )
        .unwrap();

        // 未注册回调时派发是无操作而非错误
        client.dispatch(&data).unwrap();
        assert_eq!(client.contacts().len(), 1);

        let messages = Arc::new(AtomicUsize::new(0));
        let contacts = Arc::new(AtomicUsize::new(0));
        {
            let messages = messages.clone();
            client.on_message(Arc::new(move |data| {
                messages.fetch_add(data.add_msg_list.len(), Ordering::SeqCst);
                Ok(())
            }));
        }
        {
            let contacts = contacts.clone();
            client.on_contact_change(Arc::new(move |_| {
                contacts.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));
        }

        client.dispatch(&data).unwrap();
        assert_eq!(messages.load(Ordering::SeqCst), 1);
        assert_eq!(contacts.load(Ordering::SeqCst), 1);
        // 变更联系人按键位合并（幂等）
        assert_eq!(client.contacts().len(), 1);
        assert_eq!(
            client.contacts().get("@@room").unwrap().member_count,
            3
        );
    }

    #[test]
    fn handler_errors_propagate() {
        let mut client = crate::client::WeChatClient::new().unwrap();
        client.on_message(Arc::new(|_| {
            Err(WeChatSDKError::MalformedResponse("handler failed".into()))
        }));
        let data: SyncResponse = serde_json::from_str(
            r#"{"AddMsgCount": 1, "AddMsgList": [{"MsgId": "1", "MsgType": 1}]}"#,
        )
        .unwrap();
        assert!(client.dispatch(&data).is_err());
    }
}
