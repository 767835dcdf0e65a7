//! 会话数据与同步游标
//!
//! `SessionData` 在获取 UUID 时创建为空，由登录流程逐步填充；
//! 五个凭据字段齐备之前不得发起任何带鉴权的调用。
//! `SyncKey` 是服务端下发的有序计数器列表，每次成功拉取后整体替换，
//! 绝不按字段合并。

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WeChatSDKError};

/// 登录会话凭据
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    /// 一次性登录票据（编码进 QR 码）
    pub uuid: String,
    pub skey: String,
    pub sid: String,
    pub uin: String,
    pub pass_ticket: String,
    pub data_ticket: String,
}

impl SessionData {
    /// 五个凭据字段是否齐备
    pub fn is_complete(&self) -> bool {
        !self.skey.is_empty()
            && !self.sid.is_empty()
            && !self.uin.is_empty()
            && !self.pass_ticket.is_empty()
            && !self.data_ticket.is_empty()
    }

    /// 缺失的凭据字段名（用于报错）
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.skey.is_empty() {
            missing.push("skey");
        }
        if self.sid.is_empty() {
            missing.push("sid");
        }
        if self.uin.is_empty() {
            missing.push("uin");
        }
        if self.pass_ticket.is_empty() {
            missing.push("pass_ticket");
        }
        if self.data_ticket.is_empty() {
            missing.push("data_ticket");
        }
        missing
    }

    /// 派生带鉴权调用的基础请求体；DeviceID 每次重新生成
    pub fn base_request(&self) -> Result<BaseRequest> {
        let uin: i64 = self
            .uin
            .parse()
            .map_err(|_| WeChatSDKError::InvalidSession(format!("uin 不可解析: {:?}", self.uin)))?;
        Ok(BaseRequest {
            uin,
            sid: self.sid.clone(),
            skey: self.skey.clone(),
            device_id: device_id(),
        })
    }
}

/// 每个带鉴权调用都要携带的最小请求封皮
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseRequest {
    #[serde(rename = "Uin")]
    pub uin: i64,
    #[serde(rename = "Sid")]
    pub sid: String,
    #[serde(rename = "Skey")]
    pub skey: String,
    #[serde(rename = "DeviceID")]
    pub device_id: String,
}

/// 伪随机设备标识："e" + 15 位数字，每个请求重新生成
pub fn device_id() -> String {
    let n: u64 = rand::thread_rng().gen_range(0..1_000_000_000_000_000);
    format!("e{:015}", n)
}

/// 客户端消息 id：毫秒时间戳 × 1000，会话内分辨率足以避免碰撞
pub fn client_msg_id() -> i64 {
    Utc::now().timestamp_millis() * 1000
}

/// 当前纳秒时间戳（用于防缓存 nonce 等）
pub fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

/// 当前毫秒时间戳
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 同步游标：服务端下发的有序 (Key, Val) 计数器序列
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncKey {
    #[serde(rename = "Count", default)]
    pub count: i64,
    #[serde(rename = "List", default)]
    pub list: Vec<SyncKeyItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncKeyItem {
    #[serde(rename = "Key")]
    pub key: i64,
    #[serde(rename = "Val")]
    pub val: i64,
}

impl SyncKey {
    /// 管道分隔的字符串形式：`"k1_v1|k2_v2|..."`
    pub fn format(&self) -> String {
        self.list
            .iter()
            .map(|item| format!("{}_{}", item.key, item.val))
            .collect::<Vec<_>>()
            .join("|")
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(pairs: &[(i64, i64)]) -> SyncKey {
        SyncKey {
            count: pairs.len() as i64,
            list: pairs
                .iter()
                .map(|&(key, val)| SyncKeyItem { key, val })
                .collect(),
        }
    }

    #[test]
    fn format_sync_key() {
        assert_eq!(key(&[(1, 10), (2, 20)]).format(), "1_10|2_20");
        assert_eq!(key(&[]).format(), "");
        assert_eq!(key(&[(4, 712)]).format(), "4_712");
    }

    #[test]
    fn device_id_shape() {
        let id = device_id();
        assert_eq!(id.len(), 16);
        assert!(id.starts_with('e'));
        assert!(id[1..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn completeness_requires_all_five() {
        let mut session = SessionData {
            uuid: "u".into(),
            skey: "@skey".into(),
            sid: "sid".into(),
            uin: "123".into(),
            pass_ticket: "pt".into(),
            data_ticket: "dt".into(),
        };
        assert!(session.is_complete());
        session.data_ticket.clear();
        assert!(!session.is_complete());
        assert_eq!(session.missing_fields(), vec!["data_ticket"]);
    }

    #[test]
    fn base_request_rejects_bad_uin() {
        let session = SessionData {
            uin: "not-a-number".into(),
            ..Default::default()
        };
        assert!(matches!(
            session.base_request(),
            Err(WeChatSDKError::InvalidSession(_))
        ));
    }

    #[test]
    fn base_request_serializes_vendor_field_names() {
        let session = SessionData {
            uin: "42".into(),
            sid: "s".into(),
            skey: "k".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(session.base_request().unwrap()).unwrap();
        assert_eq!(json["Uin"], 42);
        assert!(json["DeviceID"].as_str().unwrap().starts_with('e'));
    }
}
