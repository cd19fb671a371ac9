use std::fmt;

/// 未配置 realm 时使用的默认质询域名。
pub const DEFAULT_REALM: &str = "SECRET AREA";

/// 返回生效的 realm：`None` 或空串回退为 [`DEFAULT_REALM`]。
pub fn effective_realm(realm: Option<&str>) -> &str {
    match realm {
        Some(realm) if !realm.is_empty() => realm,
        _ => DEFAULT_REALM,
    }
}

/// 监听器可协商的客户端认证方案。
///
/// # 设计背景（Why）
/// - 核心只负责在“默认方案 + 按请求选择器”之间裁决出生效方案，
///   具体的质询与校验算法由外部认证机构实现；
/// - `None` 同时承担“选择器失败后的兜底”角色：失败必须收敛到拒绝，
///   而不是放大为匿名放行。
///
/// # 契约说明（What）
/// - `Anonymous` 表示不质询直接放行，是未配置时的默认值；
/// - `None` 表示拒绝所有认证（无可用方案）；
/// - 其余变体与同名 HTTP 认证方案一一对应。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AuthenticationScheme {
    /// 无可用方案，拒绝认证。
    None,
    /// 不质询，直接放行。
    #[default]
    Anonymous,
    /// HTTP Basic。
    Basic,
    /// HTTP Digest。
    Digest,
    /// NTLM。
    Ntlm,
}

impl AuthenticationScheme {
    /// 返回方案在质询头中使用的名称；`None` 与 `Anonymous` 不产生质询。
    pub fn challenge_name(self) -> Option<&'static str> {
        match self {
            Self::Basic => Some("Basic"),
            Self::Digest => Some("Digest"),
            Self::Ntlm => Some("NTLM"),
            Self::None | Self::Anonymous => None,
        }
    }
}

impl fmt::Display for AuthenticationScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::None => "none",
            Self::Anonymous => "anonymous",
            Self::Basic => "basic",
            Self::Digest => "digest",
            Self::Ntlm => "ntlm",
        };
        f.write_str(text)
    }
}

/// 已通过身份解析的客户端标识，交给凭据查找器换取口令。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientIdentity {
    /// 客户端声明的用户名。
    pub name: String,
    /// 该身份所使用的认证方案。
    pub scheme: AuthenticationScheme,
}

/// 认证机构用于校验客户端的凭据。
///
/// # 契约说明（What）
/// - `domain` 仅在 NTLM 场景有意义，其余方案置 `None`；
/// - 凭据仅在内存中流转，核心不落盘、不打日志。
#[derive(Clone, PartialEq, Eq)]
pub struct NetworkCredentials {
    /// 用户名。
    pub username: String,
    /// 口令。
    pub password: String,
    /// NTLM 域（可选）。
    pub domain: Option<String>,
}

impl NetworkCredentials {
    /// 构造基础凭据。
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            domain: None,
        }
    }

    /// 附带 NTLM 域。
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

// 调试输出不暴露口令。
impl fmt::Debug for NetworkCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}

/// 按身份查找凭据的注入函数（原型：身份 → 凭据）。
///
/// 查不到凭据时返回 `None`，由认证机构决定质询还是拒绝。
pub type CredentialsFinder = dyn Fn(&ClientIdentity) -> Option<NetworkCredentials> + Send + Sync;
