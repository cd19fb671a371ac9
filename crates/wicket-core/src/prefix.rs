use crate::error::{CoreError, codes};
use std::fmt;
use thiserror::Error;

/// `HttpPrefix` 是监听器对外声明接收范围的 URI 前缀模型。
///
/// # 设计背景（Why）
/// - 监听器以“`scheme://host:port/path/` 前缀集合”描述自己负责的地址空间，
///   接入器据此绑定端点、路由入站请求；
/// - 前缀在进入核心之前完成一次性校验，后续所有路径都可以信赖其结构合法，
///   避免把字符串解析散落到热路径。
///
/// # 契约说明（What）
/// - `scheme`：仅支持 `http` 与 `https`；
/// - `host`：非空；`*` 与 `+` 作为通配主机保留原样；
/// - `port`：缺省时按 scheme 取 80 / 443；
/// - `path`：以 `/` 开头且以 `/` 结尾（根路径为 `"/"`）。
///
/// # 设计取舍与风险（Trade-offs）
/// - 字段以 `String` 持有，前缀数量通常是个位数，清晰度优先于零拷贝；
/// - IPv6 主机仅支持 `[...]` 括号写法，未做地址合法性深检，交由接入器在
///   绑定阶段兜底。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HttpPrefix {
    scheme: PrefixScheme,
    host: String,
    port: u16,
    path: String,
}

impl HttpPrefix {
    /// 解析并校验一条 URI 前缀。
    ///
    /// # 执行逻辑（How）
    /// 1. 按 `://` 切出 scheme，仅接受 `http` / `https`；
    /// 2. 其余部分在首个 `/` 处切出 authority 与 path，整体必须以 `/` 结尾；
    /// 3. authority 拆分主机与可选端口，IPv6 采用 `[...]` 括号写法；
    /// 4. 端口缺省时按 scheme 取默认值。
    pub fn parse(raw: &str) -> Result<Self, PrefixError> {
        let (scheme_text, rest) = raw
            .split_once("://")
            .ok_or(PrefixError::MissingScheme)?;
        let scheme = match scheme_text {
            "http" => PrefixScheme::Http,
            "https" => PrefixScheme::Https,
            other => return Err(PrefixError::UnsupportedScheme(other.to_owned())),
        };

        if !rest.ends_with('/') {
            return Err(PrefixError::MissingTrailingSlash);
        }

        let (authority, path_rest) = match rest.split_once('/') {
            Some(parts) => parts,
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(PrefixError::MissingHost);
        }

        let (host, port_text) = split_authority(authority)?;
        if host.is_empty() {
            return Err(PrefixError::MissingHost);
        }

        let port = match port_text {
            Some(text) => text
                .parse::<u16>()
                .ok()
                .filter(|port| *port != 0)
                .ok_or_else(|| PrefixError::InvalidPort(text.to_owned()))?,
            None => scheme.default_port(),
        };

        Ok(Self {
            scheme,
            host: host.to_owned(),
            port,
            path: format!("/{path_rest}"),
        })
    }

    /// 返回前缀的协议。
    pub fn scheme(&self) -> PrefixScheme {
        self.scheme
    }

    /// 返回主机部分（通配主机保留 `*` / `+` 原样）。
    pub fn host(&self) -> &str {
        &self.host
    }

    /// 返回端口。
    pub fn port(&self) -> u16 {
        self.port
    }

    /// 返回路径部分，首尾均为 `/`。
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 是否为 TLS 前缀。
    pub fn is_secure(&self) -> bool {
        self.scheme == PrefixScheme::Https
    }

    /// 主机是否为通配写法。
    pub fn is_host_wildcard(&self) -> bool {
        self.host == "*" || self.host == "+"
    }
}

impl fmt::Display for HttpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // IPv6 主机还原为括号写法，保证输出可被 `parse` 重新接受。
        if self.host.contains(':') {
            write!(
                f,
                "{}://[{}]:{}{}",
                self.scheme.as_str(),
                self.host,
                self.port,
                self.path
            )
        } else {
            write!(
                f,
                "{}://{}:{}{}",
                self.scheme.as_str(),
                self.host,
                self.port,
                self.path
            )
        }
    }
}

/// 将 authority 拆分为主机与可选端口文本。
fn split_authority(authority: &str) -> Result<(&str, Option<&str>), PrefixError> {
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| PrefixError::InvalidPort(authority.to_owned()))?;
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host, Some(port))),
            None if tail.is_empty() => Ok((host, None)),
            None => Err(PrefixError::InvalidPort(tail.to_owned())),
        };
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => Ok((host, Some(port))),
        None => Ok((authority, None)),
    }
}

/// 前缀支持的协议。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrefixScheme {
    /// 明文 HTTP。
    Http,
    /// TLS 上的 HTTP。
    Https,
}

impl PrefixScheme {
    /// 返回协议标识字符串。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// 返回协议的默认端口。
    pub fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// 前缀校验失败的具体原因。
///
/// # 契约说明（What）
/// - 每个变体对应一类用户可修复的书写错误；
/// - 通过 [`From`] 转换为 [`CoreError`]（错误码 [`codes::PREFIX_INVALID`]），
///   便于上层以 `?` 直接传播。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PrefixError {
    /// 缺少 `://` 分隔符。
    #[error("the uri prefix has no scheme separator")]
    MissingScheme,
    /// scheme 不是 `http` / `https`。
    #[error("unsupported uri prefix scheme `{0}`")]
    UnsupportedScheme(String),
    /// 缺少主机部分。
    #[error("the uri prefix has no host component")]
    MissingHost,
    /// 端口不是 1..=65535 的十进制数。
    #[error("invalid uri prefix port `{0}`")]
    InvalidPort(String),
    /// 前缀必须以 `/` 结尾。
    #[error("the uri prefix does not end with `/`")]
    MissingTrailingSlash,
}

impl From<PrefixError> for CoreError {
    fn from(error: PrefixError) -> Self {
        CoreError::new(codes::PREFIX_INVALID, error.to_string()).with_cause(error)
    }
}
