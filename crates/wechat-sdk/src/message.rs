//! 消息派发：文本与媒体的出站发送
//!
//! 媒体类别从原始字节嗅探（绝不看文件名）。图片/视频走各自的专用发送
//! 端点；音频/文档走"先上传取媒体 id、再以应用消息引用"的通用路径。
//! 嗅探不中任何已知类别时返回 `UnsupportedContentType`，不做静默丢弃。

use chrono::Utc;
use reqwest::multipart;
use tracing::{debug, info};

use crate::client::WeChatClient;
use crate::error::{Result, WeChatSDKError};
use crate::models::{
    MessageEnvelope, MessageType, SendMessageRequest, SendMessageResponse, UploadMediaRequest,
    UploadMediaResponse,
};
use crate::session::client_msg_id;

/// 媒体粗分类（上传表单的 mediatype 标签）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    Picture,
    Video,
    Audio,
    Doc,
}

impl MediaCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCategory::Picture => "pic",
            MediaCategory::Video => "video",
            MediaCategory::Audio => "audio",
            MediaCategory::Doc => "doc",
        }
    }
}

/// 媒体消息的发送路径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MediaRoute {
    /// 图片专用端点（webwxsendmsgimg）
    ImageEndpoint,
    /// 视频专用端点（webwxsendvideomsg）
    VideoEndpoint,
    /// 通用路径：上传后以应用消息引用媒体 id
    AppMessage,
}

pub(crate) fn route_for(category: MediaCategory) -> (MediaRoute, MessageType) {
    match category {
        MediaCategory::Picture => (MediaRoute::ImageEndpoint, MessageType::Image),
        MediaCategory::Video => (MediaRoute::VideoEndpoint, MessageType::Video),
        MediaCategory::Audio | MediaCategory::Doc => (MediaRoute::AppMessage, MessageType::Attachment),
    }
}

/// 从前导字节嗅探 MIME 类型与媒体类别。
/// 已知魔数之外，可打印 UTF-8 按 text/plain 归入文档类；其余内容
/// 视为不支持。
pub(crate) fn sniff_media(bytes: &[u8]) -> Result<(&'static str, MediaCategory)> {
    let mime = sniff_mime(bytes).ok_or(WeChatSDKError::UnsupportedContentType)?;
    let category = if mime.starts_with("image/") {
        MediaCategory::Picture
    } else if mime.starts_with("video/") {
        MediaCategory::Video
    } else if mime.starts_with("audio/") {
        MediaCategory::Audio
    } else {
        // text/* 与 application/* 都归入文档
        MediaCategory::Doc
    };
    Ok((mime, category))
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") {
        return match &bytes[8..12] {
            b"WEBP" => Some("image/webp"),
            b"WAVE" => Some("audio/wav"),
            b"AVI " => Some("video/x-msvideo"),
            _ => None,
        };
    }
    if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
        return Some("video/mp4");
    }
    if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some("video/webm");
    }
    if bytes.starts_with(b"ID3") || bytes.starts_with(&[0xFF, 0xFB]) || bytes.starts_with(&[0xFF, 0xF3]) {
        return Some("audio/mpeg");
    }
    if bytes.starts_with(b"OggS") {
        return Some("audio/ogg");
    }
    if bytes.starts_with(b"fLaC") {
        return Some("audio/flac");
    }
    if bytes.starts_with(b"%PDF") {
        return Some("application/pdf");
    }
    if bytes.starts_with(&[b'P', b'K', 0x03, 0x04]) {
        return Some("application/zip");
    }
    if !bytes.is_empty() && std::str::from_utf8(bytes).is_ok() {
        return Some("text/plain");
    }
    None
}

/// 应用消息（附件）的内容 XML，attachid 引用上传返回的媒体 id
fn attachment_content(name: &str, size: usize, media_id: &str, ext: &str) -> String {
    format!(
        "<appmsg appid='wxeb7ec651dd0aefa9' sdkver=''>\
         <title>{name}</title><des></des><action></action>\
         <type>6</type><content></content><url></url><lowurl></lowurl>\
         <appattach><totallen>{size}</totallen><attachid>{media_id}</attachid>\
         <fileext>{ext}</fileext></appattach><extinfo></extinfo></appmsg>"
    )
}

fn file_ext(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => "",
    }
}

impl WeChatClient {
    /// 发送文本消息，返回服务端消息 id
    pub async fn send_text(&mut self, to: &str, content: &str) -> Result<String> {
        let msg_id = client_msg_id();
        let request = SendMessageRequest {
            base_request: self.base_request()?,
            scene: 0,
            msg: MessageEnvelope {
                msg_type: MessageType::Text,
                content: content.to_string(),
                media_id: String::new(),
                from_user_name: self.user.user_name.clone(),
                to_user_name: to.to_string(),
                local_id: msg_id,
                client_msg_id: msg_id,
            },
        };

        let url = self.endpoints.send_msg.clone();
        let result = self.post_send(&url, &request).await?;
        debug!("文本消息已发送: {} -> {}", result.msg_id, to);
        Ok(result.msg_id)
    }

    /// 发送媒体消息：嗅探类别 → 上传 → 按类别选择发送路径。
    /// 返回服务端消息 id。
    pub async fn send_media(&mut self, to: &str, name: &str, bytes: &[u8]) -> Result<String> {
        let (mime, category) = sniff_media(bytes)?;
        let (route, msg_type) = route_for(category);
        info!(
            "发送媒体: {} ({}, {} 字节, 类别 {})",
            name,
            mime,
            bytes.len(),
            category.as_str()
        );

        let media_id = self.upload_media(to, name, mime, category, bytes).await?;

        let (url, content) = match route {
            MediaRoute::ImageEndpoint => (self.endpoints.send_msg_img.clone(), String::new()),
            MediaRoute::VideoEndpoint => (self.endpoints.send_video_msg.clone(), String::new()),
            MediaRoute::AppMessage => (
                self.endpoints.send_app_msg.clone(),
                attachment_content(name, bytes.len(), &media_id, file_ext(name)),
            ),
        };
        // 应用消息以 XML 内容引用 attachid，不重复携带 MediaId
        let media_id = match route {
            MediaRoute::AppMessage => String::new(),
            _ => media_id,
        };

        let msg_id = client_msg_id();
        let request = SendMessageRequest {
            base_request: self.base_request()?,
            scene: 0,
            msg: MessageEnvelope {
                msg_type,
                content,
                media_id,
                from_user_name: self.user.user_name.clone(),
                to_user_name: to.to_string(),
                local_id: msg_id,
                client_msg_id: msg_id,
            },
        };

        let result = self.post_send(&url, &request).await?;
        debug!("媒体消息已发送: {} -> {}", result.msg_id, to);
        Ok(result.msg_id)
    }

    async fn post_send(&self, url: &str, request: &SendMessageRequest) -> Result<SendMessageResponse> {
        let response = self
            .http
            .post(url)
            .query(&[
                ("fun", "async"),
                ("f", "json"),
                ("pass_ticket", self.session.pass_ticket.as_str()),
                ("lang", "zh_CN"),
            ])
            .json(request)
            .send()
            .await?;
        Self::ensure_http_ok(response.status())?;

        let result: SendMessageResponse = response.json().await?;
        Self::ensure_ret_ok(&result.base_response)?;
        Ok(result)
    }

    /// 上传媒体：元数据字段 + 原始文件部分的多部分请求，返回媒体 id
    pub async fn upload_media(
        &mut self,
        to: &str,
        name: &str,
        mime: &'static str,
        category: MediaCategory,
        bytes: &[u8],
    ) -> Result<String> {
        let upload_request = UploadMediaRequest {
            base_request: self.base_request()?,
            client_media_id: client_msg_id(),
            total_len: bytes.len() as u64,
            start_pos: 0,
            data_len: bytes.len() as u64,
            media_type: 4,
            upload_type: 2,
            from_user_name: self.user.user_name.clone(),
            to_user_name: to.to_string(),
        };
        let upload_request = serde_json::to_string(&upload_request)?;

        let last_modified = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let file_part = multipart::Part::bytes(bytes.to_vec())
            .file_name(name.to_string())
            .mime_str(mime)?;
        let form = multipart::Form::new()
            .text("name", name.to_string())
            .text("type", mime)
            .text("lastModifiedDate", last_modified)
            .text("size", bytes.len().to_string())
            .text("mediatype", category.as_str())
            .text("uploadmediarequest", upload_request)
            .text("webwx_data_ticket", self.session.data_ticket.clone())
            .text("pass_ticket", self.session.pass_ticket.clone())
            .part("filename", file_part);

        let url = self.endpoints.upload_media.clone();
        let response = self
            .http
            .post(&url)
            .query(&[("f", "json")])
            .multipart(form)
            .send()
            .await?;
        Self::ensure_http_ok(response.status())?;

        let result: UploadMediaResponse = response.json().await?;
        Self::ensure_ret_ok(&result.base_response)?;

        debug!("媒体上传完成: media_id={}", result.media_id);
        Ok(result.media_id)
    }
}
