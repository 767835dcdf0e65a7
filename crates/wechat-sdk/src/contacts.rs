//! 联系人目录
//!
//! 以不透明 `UserName` 为键的映射。分页拉取的每一页、每个条目都按键
//! upsert（幂等约定）；一遍扫完后把占位群聊（群前缀且成员数为 0）
//! 一次性批量补水。

use std::collections::HashMap;

use tracing::{debug, info};

use crate::client::WeChatClient;
use crate::error::{Result, WeChatSDKError};
use crate::models::{
    BatchGetContactItem, BatchGetContactRequest, BatchGetContactResponse, Contact,
    GetContactResponse,
};
use crate::session::now_millis;

/// 分页上限，防御行为异常的服务端无限续传
const MAX_CONTACT_PAGES: usize = 64;

/// 联系人目录：`UserName → Contact`
#[derive(Debug, Default)]
pub struct ContactDirectory {
    inner: HashMap<String, Contact>,
}

impl ContactDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn get(&self, user_name: &str) -> Option<&Contact> {
        self.inner.get(user_name)
    }

    /// 按键 upsert 单个条目
    pub fn upsert(&mut self, contact: Contact) {
        self.inner.insert(contact.user_name.clone(), contact);
    }

    /// 按键 upsert 一批条目
    pub fn merge(&mut self, contacts: impl IntoIterator<Item = Contact>) {
        for contact in contacts {
            self.upsert(contact);
        }
    }

    /// 当前目录里的占位群聊条目
    pub fn stubs(&self) -> Vec<Contact> {
        self.inner.values().filter(|c| c.is_stub()).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contact> {
        self.inner.values()
    }
}

impl WeChatClient {
    /// 全量分页拉取联系人目录，随后批量补水占位群聊。
    ///
    /// 续传协议：响应 `Seq > 0` 表示还有后续页，用该值继续；`Seq == 0`
    /// 为末页。显式有界循环，不递归。
    pub async fn fetch_contacts(&mut self) -> Result<()> {
        let mut seq: i64 = 0;
        for _ in 0..MAX_CONTACT_PAGES {
            let page = self.fetch_contact_page(seq).await?;
            Self::ensure_ret_ok(&page.base_response)?;

            debug!("联系人分页: 本页 {} 条, Seq={}", page.member_list.len(), page.seq);
            self.contacts.merge(page.member_list);

            if page.seq == 0 {
                let stubs = self.contacts.stubs();
                info!(
                    "联系人目录拉取完成: {} 条, 待补水群聊 {} 个",
                    self.contacts.len(),
                    stubs.len()
                );
                return self.batch_get_contacts(&stubs).await;
            }
            seq = page.seq;
        }

        Err(WeChatSDKError::protocol(
            -1,
            format!("联系人分页超过 {} 页仍未结束", MAX_CONTACT_PAGES),
        ))
    }

    async fn fetch_contact_page(&mut self, seq: i64) -> Result<GetContactResponse> {
        let url = self.endpoints.get_contact.clone();
        let response = self
            .http
            .get(&url)
            .query(&[
                ("seq", seq.to_string().as_str()),
                ("skey", self.session.skey.as_str()),
                ("r", now_millis().to_string().as_str()),
            ])
            .send()
            .await?;
        Self::ensure_http_ok(response.status())?;
        Ok(response.json().await?)
    }

    /// 批量补水占位群聊。空列表是良性无操作：不发请求、不算错误。
    pub async fn batch_get_contacts(&mut self, stubs: &[Contact]) -> Result<()> {
        if stubs.is_empty() {
            debug!("无待补水条目，跳过批量拉取");
            return Ok(());
        }

        let request = BatchGetContactRequest {
            base_request: self.base_request()?,
            count: stubs.len(),
            list: stubs
                .iter()
                .map(|stub| BatchGetContactItem {
                    user_name: stub.user_name.clone(),
                    encry_chat_room_id: stub.encry_chat_room_id.clone(),
                })
                .collect(),
        };

        let url = self.endpoints.batch_get_contact.clone();
        let response = self
            .http
            .post(&url)
            .query(&[
                ("pass_ticket", self.session.pass_ticket.as_str()),
                ("type", "ex"),
                ("r", now_millis().to_string().as_str()),
                ("lang", "zh_CN"),
            ])
            .json(&request)
            .send()
            .await?;
        Self::ensure_http_ok(response.status())?;

        let result: BatchGetContactResponse = response.json().await?;
        Self::ensure_ret_ok(&result.base_response)?;

        info!("群聊补水完成: {} 条", result.contact_list.len());
        self.contacts.merge(result.contact_list);
        Ok(())
    }
}
