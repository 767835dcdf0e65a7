//! 协议线上类型
//!
//! 服务端 JSON 使用厂商式 PascalCase 字段名，这里统一用 serde rename 映射；
//! 响应字段全部挂 `default`，对缺字段的旧集群保持宽容。

use serde::{Deserialize, Serialize};

use crate::session::{BaseRequest, SyncKey};

/// 每个 JSON 响应都携带的基础状态
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BaseResponse {
    #[serde(rename = "Ret", default)]
    pub ret: i64,
    #[serde(rename = "ErrMsg", default)]
    pub err_msg: String,
}

/// 当前登录用户身份
#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    #[serde(rename = "Uin", default)]
    pub uin: i64,
    #[serde(rename = "UserName", default)]
    pub user_name: String,
    #[serde(rename = "NickName", default)]
    pub nick_name: String,
    #[serde(rename = "HeadImgUrl", default)]
    pub head_img_url: String,
    #[serde(rename = "RemarkName", default)]
    pub remark_name: String,
    #[serde(rename = "Sex", default)]
    pub sex: i32,
    #[serde(rename = "Signature", default)]
    pub signature: String,
}

/// 联系人目录条目，以不透明的 `UserName` 为键
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contact {
    #[serde(rename = "Uin", default)]
    pub uin: i64,
    #[serde(rename = "UserName", default)]
    pub user_name: String,
    #[serde(rename = "NickName", default)]
    pub nick_name: String,
    #[serde(rename = "HeadImgUrl", default)]
    pub head_img_url: String,
    #[serde(rename = "ContactFlag", default)]
    pub contact_flag: i64,
    /// 群聊成员数；0 且属群标识前缀时是待补水的占位条目
    #[serde(rename = "MemberCount", default)]
    pub member_count: i64,
    #[serde(rename = "MemberList", default)]
    pub member_list: Vec<Contact>,
    #[serde(rename = "RemarkName", default)]
    pub remark_name: String,
    #[serde(rename = "Sex", default)]
    pub sex: i32,
    #[serde(rename = "Signature", default)]
    pub signature: String,
    #[serde(rename = "VerifyFlag", default)]
    pub verify_flag: i64,
    #[serde(rename = "StarFriend", default)]
    pub star_friend: i64,
    #[serde(rename = "Province", default)]
    pub province: String,
    #[serde(rename = "City", default)]
    pub city: String,
    #[serde(rename = "Alias", default)]
    pub alias: String,
    #[serde(rename = "DisplayName", default)]
    pub display_name: String,
    #[serde(rename = "EncryChatRoomId", default)]
    pub encry_chat_room_id: String,
}

impl Contact {
    /// 群聊标识前缀为 `@@`
    pub fn is_group(&self) -> bool {
        self.user_name.starts_with("@@")
    }

    /// 未补水的群聊占位条目
    pub fn is_stub(&self) -> bool {
        self.is_group() && self.member_count == 0
    }
}

/// 消息类型标签。入站未知类型无损保留为 `Other`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum MessageType {
    Text,
    Image,
    /// 应用消息（附件走 webwxsendappmsg，内容类型 6）
    Attachment,
    Voice,
    Video,
    MicroVideo,
    Emoticon,
    Other(i32),
}

impl From<i32> for MessageType {
    fn from(value: i32) -> Self {
        match value {
            1 => MessageType::Text,
            3 => MessageType::Image,
            6 => MessageType::Attachment,
            34 => MessageType::Voice,
            43 => MessageType::Video,
            47 => MessageType::Emoticon,
            62 => MessageType::MicroVideo,
            other => MessageType::Other(other),
        }
    }
}

impl From<MessageType> for i32 {
    fn from(value: MessageType) -> i32 {
        match value {
            MessageType::Text => 1,
            MessageType::Image => 3,
            MessageType::Attachment => 6,
            MessageType::Voice => 34,
            MessageType::Video => 43,
            MessageType::Emoticon => 47,
            MessageType::MicroVideo => 62,
            MessageType::Other(other) => other,
        }
    }
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::Other(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InitRequest {
    #[serde(rename = "BaseRequest")]
    pub base_request: BaseRequest,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitResponse {
    #[serde(rename = "BaseResponse", default)]
    pub base_response: BaseResponse,
    #[serde(rename = "Count", default)]
    pub count: i64,
    #[serde(rename = "ContactList", default)]
    pub contact_list: Vec<Contact>,
    #[serde(rename = "SyncKey", default)]
    pub sync_key: SyncKey,
    #[serde(rename = "User", default)]
    pub user: User,
    #[serde(rename = "ChatSet", default)]
    pub chat_set: String,
    #[serde(rename = "SKey", default)]
    pub skey: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusNotifyRequest {
    #[serde(rename = "BaseRequest")]
    pub base_request: BaseRequest,
    #[serde(rename = "Code")]
    pub code: i32,
    #[serde(rename = "FromUserName")]
    pub from_user_name: String,
    #[serde(rename = "ToUserName")]
    pub to_user_name: String,
    #[serde(rename = "ClientMsgId")]
    pub client_msg_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusNotifyResponse {
    #[serde(rename = "BaseResponse", default)]
    pub base_response: BaseResponse,
    #[serde(rename = "MsgID", default)]
    pub msg_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetContactResponse {
    #[serde(rename = "BaseResponse", default)]
    pub base_response: BaseResponse,
    #[serde(rename = "MemberCount", default)]
    pub member_count: i64,
    #[serde(rename = "MemberList", default)]
    pub member_list: Vec<Contact>,
    /// 续传游标：>0 还有后续页，==0 为末页
    #[serde(rename = "Seq", default)]
    pub seq: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchGetContactRequest {
    #[serde(rename = "BaseRequest")]
    pub base_request: BaseRequest,
    #[serde(rename = "Count")]
    pub count: usize,
    #[serde(rename = "List")]
    pub list: Vec<BatchGetContactItem>,
}

/// 批量补水只需占位条目的键；群聊附带加密聊天室 id
#[derive(Debug, Clone, Serialize)]
pub struct BatchGetContactItem {
    #[serde(rename = "UserName")]
    pub user_name: String,
    #[serde(rename = "EncryChatRoomId")]
    pub encry_chat_room_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchGetContactResponse {
    #[serde(rename = "BaseResponse", default)]
    pub base_response: BaseResponse,
    #[serde(rename = "Count", default)]
    pub count: i64,
    #[serde(rename = "ContactList", default)]
    pub contact_list: Vec<Contact>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRequest {
    #[serde(rename = "BaseRequest")]
    pub base_request: BaseRequest,
    #[serde(rename = "SyncKey")]
    pub sync_key: SyncKey,
    #[serde(rename = "rr")]
    pub rr: i64,
}

/// 入站消息条目（webwxsync 的 AddMsgList 元素）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncMessage {
    #[serde(rename = "MsgId", default)]
    pub msg_id: String,
    #[serde(rename = "FromUserName", default)]
    pub from_user_name: String,
    #[serde(rename = "ToUserName", default)]
    pub to_user_name: String,
    #[serde(rename = "MsgType", default)]
    pub msg_type: MessageType,
    #[serde(rename = "Content", default)]
    pub content: String,
    #[serde(rename = "Status", default)]
    pub status: i64,
    #[serde(rename = "CreateTime", default)]
    pub create_time: i64,
    #[serde(rename = "FileName", default)]
    pub file_name: String,
    #[serde(rename = "FileSize", default)]
    pub file_size: String,
    /// 媒体引用 id（图片/视频/附件消息）
    #[serde(rename = "MediaId", default)]
    pub media_id: String,
    #[serde(rename = "Url", default)]
    pub url: String,
    #[serde(rename = "AppMsgType", default)]
    pub app_msg_type: i64,
    #[serde(rename = "NewMsgId", default)]
    pub new_msg_id: i64,
}

/// webwxsync 拉取结果
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncResponse {
    #[serde(rename = "BaseResponse", default)]
    pub base_response: BaseResponse,
    #[serde(rename = "AddMsgCount", default)]
    pub add_msg_count: i64,
    #[serde(rename = "AddMsgList", default)]
    pub add_msg_list: Vec<SyncMessage>,
    #[serde(rename = "ModContactCount", default)]
    pub mod_contact_count: i64,
    #[serde(rename = "ModContactList", default)]
    pub mod_contact_list: Vec<Contact>,
    #[serde(rename = "DelContactCount", default)]
    pub del_contact_count: i64,
    #[serde(rename = "DelContactList", default)]
    pub del_contact_list: Vec<Contact>,
    #[serde(rename = "ContinueFlag", default)]
    pub continue_flag: i64,
    /// 注意：新游标取 `SyncCheckKey` 而非本字段
    #[serde(rename = "SyncKey", default)]
    pub sync_key: SyncKey,
    #[serde(rename = "SKey", default)]
    pub skey: String,
    #[serde(rename = "SyncCheckKey", default)]
    pub sync_check_key: SyncKey,
}

/// 出站消息封皮
#[derive(Debug, Clone, Serialize)]
pub struct MessageEnvelope {
    #[serde(rename = "Type")]
    pub msg_type: MessageType,
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(rename = "MediaId", skip_serializing_if = "String::is_empty")]
    pub media_id: String,
    #[serde(rename = "FromUserName")]
    pub from_user_name: String,
    #[serde(rename = "ToUserName")]
    pub to_user_name: String,
    #[serde(rename = "LocalID")]
    pub local_id: i64,
    #[serde(rename = "ClientMsgId")]
    pub client_msg_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    #[serde(rename = "BaseRequest")]
    pub base_request: BaseRequest,
    #[serde(rename = "Scene")]
    pub scene: i32,
    #[serde(rename = "Msg")]
    pub msg: MessageEnvelope,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendMessageResponse {
    #[serde(rename = "BaseResponse", default)]
    pub base_response: BaseResponse,
    #[serde(rename = "MsgID", default)]
    pub msg_id: String,
    #[serde(rename = "LocalID", default)]
    pub local_id: String,
}

/// 多部分上传体里随附的 uploadmediarequest 字段
#[derive(Debug, Clone, Serialize)]
pub struct UploadMediaRequest {
    #[serde(rename = "BaseRequest")]
    pub base_request: BaseRequest,
    #[serde(rename = "ClientMediaId")]
    pub client_media_id: i64,
    #[serde(rename = "TotalLen")]
    pub total_len: u64,
    #[serde(rename = "StartPos")]
    pub start_pos: u64,
    #[serde(rename = "DataLen")]
    pub data_len: u64,
    #[serde(rename = "MediaType")]
    pub media_type: i32,
    #[serde(rename = "UploadType")]
    pub upload_type: i32,
    #[serde(rename = "FromUserName")]
    pub from_user_name: String,
    #[serde(rename = "ToUserName")]
    pub to_user_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadMediaResponse {
    #[serde(rename = "BaseResponse", default)]
    pub base_response: BaseResponse,
    #[serde(rename = "MediaId", default)]
    pub media_id: String,
    #[serde(rename = "StartPos", default)]
    pub start_pos: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_roundtrip_and_unknown() {
        assert_eq!(MessageType::from(1), MessageType::Text);
        assert_eq!(MessageType::from(43), MessageType::Video);
        assert_eq!(MessageType::from(9999), MessageType::Other(9999));
        assert_eq!(i32::from(MessageType::Other(9999)), 9999);
        assert_eq!(i32::from(MessageType::Emoticon), 47);
    }

    #[test]
    fn contact_stub_detection() {
        let mut contact = Contact {
            user_name: "@@room".into(),
            ..Default::default()
        };
        assert!(contact.is_group());
        assert!(contact.is_stub());
        contact.member_count = 12;
        assert!(!contact.is_stub());
        contact.user_name = "@friend".into();
        assert!(!contact.is_group());
    }

    #[test]
    fn sync_response_keeps_both_cursor_fields() {
        let raw = r#"{
            "BaseResponse": {"Ret": 0, "ErrMsg": ""},
            "AddMsgCount": 0,
            "SyncKey": {"Count": 1, "List": [{"Key": 1, "Val": 10}]},
            "SyncCheckKey": {"Count": 1, "List": [{"Key": 1, "Val": 11}]}
        }"#;
        let resp: SyncResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.sync_key.format(), "1_10");
        assert_eq!(resp.sync_check_key.format(), "1_11");
    }

    #[test]
    fn text_envelope_omits_media_id() {
        let envelope = MessageEnvelope {
            msg_type: MessageType::Text,
            content: "你好".into(),
            media_id: String::new(),
            from_user_name: "@me".into(),
            to_user_name: "@you".into(),
            local_id: 1,
            client_msg_id: 1,
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["Type"], 1);
        assert!(json.get("MediaId").is_none());
    }
}
