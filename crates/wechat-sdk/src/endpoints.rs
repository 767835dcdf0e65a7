//! 端点注册表
//!
//! 由基础主机名派生登录/文件/推送兄弟服务主机，并拼出全部协议端点 URL。
//! 纯函数、无状态；登录重定向捕获后需用重定向主机重新解析一次，
//! 之后所有调用都落在正确的地域集群上。

/// 默认 Web 端主机
pub const DEFAULT_HOST: &str = "wx.qq.com";

/// 凭据交换调用要求的固定 User-Agent（协议常量，不可配置）
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/111.0.0.0 Safari/537.36";

/// 固定 client-version 头
pub const CLIENT_VERSION: &str = "2.0.0";

/// 固定 referer 头
pub const REFERER: &str = "https://wx.qq.com/?&lang=zh_CN&target=t";

/// 凭据交换要求的反自动化令牌，逐字节固定
pub const EXTSPAM: &str = "Go8FCIkFEokFCggwMDAwMDAwMRAGGvAESySibk50w5Wb3uTl2c2h64jVVrV7gNs06GFlWplHQbY/5FfiO++1yH4ykCyNPWKXmco+wfQzK5R98D3so7rJ5LmGFvBLjGceleySrc3SOf2Pc1gVehzJgODeS0lDL3/I/0S2SSE98YgKleq6Uqx6ndTy9yaL9qFxJL7eiA/R3SEfTaW1SBoSITIu+EEkXff+Pv8NHOk7N57rcGk1w0ZzRrQDkXTOXFN2iHYIzAAZPIOY45Lsh+A4slpgnDiaOvRtlQYCt97nmPLuTipOJ8Qc5pM7ZsOsAPPrCQL7nK0I7aPrFDF0q4ziUUKettzW8MrAaiVfmbD1/VkmLNVqqZVvBCtRblXb5FHmtS8FxnqCzYP4WFvz3T0TcrOqwLX1M/DQvcHaGGw0B0y4bZMs7lVScGBFxMj3vbFi2SRKbKhaitxHfYHAOAa0X7/MSS0RNAjdwoyGHeOepXOKY+h3iHeqCvgOH6LOifdHf/1aaZNwSkGotYnYScW8Yx63LnSwba7+hESrtPa/huRmB9KWvMCKbDThL/nne14hnL277EDCSocPu3rOSYjuB9gKSOdVmWsj9Dxb/iZIe+S6AiG29Esm+/eUacSba0k8wn5HhHg9d4tIcixrxveflc8vi2/wNQGVFNsGO6tB5WF0xf/plngOvQ1/ivGV/C1Qpdhzznh0ExAVJ6dwzNg7qIEBaw+BzTJTUuRcPk92Sn6QDn2Pu3mpONaEumacjW4w6ipPnPw+g2TfywJjeEcpSZaP4Q3YV5HG8D6UjWA4GSkBKculWpdCMadx0usMomsSS/74QgpYqcPkmamB4nVv1JxczYITIqItIKjD35IGKAUwAA==";

/// synccheck / init 共用的"已登出"哨兵值
pub const SYNC_CHECK_RET_LOGOUT: i64 = 1101;

/// 全部协议端点 URL。字段公开，测试/前端可指向镜像或本地夹具。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// 解析时使用的基础主机
    pub host: String,
    /// `https://<host>`
    pub origin: String,
    pub js_login: String,
    pub login: String,
    pub sync_check: String,
    pub upload_media: String,
    pub download_media: String,
    pub init: String,
    pub status_notify: String,
    pub get_contact: String,
    pub batch_get_contact: String,
    pub sync: String,
    pub send_msg: String,
    pub send_msg_img: String,
    pub send_video_msg: String,
    pub send_app_msg: String,
    pub send_emoticon: String,
    pub logout: String,
}

impl Endpoints {
    /// 从基础主机名解析出整套端点；`None` 取默认主机。
    ///
    /// 主机名按两个已知域族匹配：`*.qq.com` 用 `wx.`/`wx2.`/`wx8.` 前缀，
    /// `*.wechat.com` 用 `web.`/`web2.` 前缀；未知前缀回落到各族默认值，
    /// 其它主机保留硬编码的默认兄弟主机。
    pub fn new(host: Option<&str>) -> Self {
        let host = match host {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => DEFAULT_HOST.to_string(),
        };
        let origin = format!("https://{}", host);

        let mut login_host = "login.wx.qq.com".to_string();
        let mut file_host = "file.wx.qq.com".to_string();
        let mut push_host = "webpush.weixin.qq.com".to_string();

        if host.ends_with(".qq.com") {
            let prefix = if host.starts_with("wx2.") {
                "wx2."
            } else if host.starts_with("wx8.") {
                "wx8."
            } else {
                "wx."
            };
            login_host = format!("login.{}qq.com", prefix);
            file_host = format!("file.{}qq.com", prefix);
            push_host = format!("webpush.{}qq.com", prefix);
        } else if host.ends_with(".wechat.com") {
            let prefix = if host.starts_with("web2") { "web2." } else { "web." };
            login_host = format!("login.{}wechat.com", prefix);
            file_host = format!("file.{}wechat.com", prefix);
            push_host = format!("webpush.{}wechat.com", prefix);
        }

        let base = format!("{}/cgi-bin/mmwebwx-bin", origin);

        Endpoints {
            js_login: format!(
                "https://{}/jslogin?appid=wx782c26e4c19acffb&fun=new&lang=zh-CN&redirect_uri=https://wx.qq.com/cgi-bin/mmwebwx-bin/webwxnewloginpage?mod=desktop",
                login_host
            ),
            login: format!("https://{}/cgi-bin/mmwebwx-bin/login", login_host),
            sync_check: format!("https://{}/cgi-bin/mmwebwx-bin/synccheck", push_host),
            upload_media: format!("https://{}/cgi-bin/mmwebwx-bin/webwxuploadmedia", file_host),
            download_media: format!("https://{}/cgi-bin/mmwebwx-bin/webwxgetmedia", file_host),
            init: format!("{}/webwxinit", base),
            status_notify: format!("{}/webwxstatusnotify", base),
            get_contact: format!("{}/webwxgetcontact", base),
            batch_get_contact: format!("{}/webwxbatchgetcontact", base),
            sync: format!("{}/webwxsync", base),
            send_msg: format!("{}/webwxsendmsg", base),
            send_msg_img: format!("{}/webwxsendmsgimg", base),
            send_video_msg: format!("{}/webwxsendvideomsg", base),
            send_app_msg: format!("{}/webwxsendappmsg", base),
            send_emoticon: format!("{}/webwxsendemoticon", base),
            logout: format!("{}/webwxlogout", base),
            host,
            origin,
        }
    }

    /// 供人扫码展示的 QR 图片 URL
    pub fn qr_code_url(uuid: &str) -> String {
        format!("https://login.weixin.qq.com/qrcode/{}", uuid)
    }

    /// QR 码承载的登录票据 URL
    pub fn qr_content_url(uuid: &str) -> String {
        format!("https://login.weixin.qq.com/l/{}", uuid)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints::new(None)
    }
}
