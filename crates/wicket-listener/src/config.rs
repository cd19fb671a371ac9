use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use wicket_core::auth::{AuthenticationScheme, CredentialsFinder, effective_realm};
use wicket_core::error::CoreError;
use wicket_core::prefix::HttpPrefix;

/// 按请求选择认证方案的注入函数（原型：请求上下文 → 方案）。
///
/// 返回 `Err` 时监听器收敛到 [`AuthenticationScheme::None`]（失败即拒绝）。
pub type SchemeSelector<C> = dyn Fn(&C) -> Result<AuthenticationScheme, CoreError> + Send + Sync;

/// `ListenerConfig` 汇集监听器在构造期一次性消费的全部配置。
///
/// # 设计背景（Why）
/// - 前缀集合、realm、认证方案等都属于“装配期决策”，固定在构造期可以让
///   运行期路径完全无锁地读取配置；
/// - 以 Builder 风格方法逐项叠加，未设置项有与历史实现一致的默认值。
///
/// # 契约说明（What）
/// - `prefixes`：监听的 URI 前缀集合；为空时消费者入口以“未配置前缀”拒绝；
/// - `realm`：认证质询域名，未设置或为空时生效值为 `"SECRET AREA"`；
/// - `auth_scheme`：默认认证方案（缺省 `Anonymous`）；
/// - `scheme_selector`：按请求覆盖默认方案的选择器（可选）；
/// - `credentials_finder`：身份 → 凭据查找器（可选）；
/// - `ignore_write_errors`：优雅停机回写 503 失败时是否吞掉（缺省吞掉）；
/// - `reuse_address`：是否要求接入器以地址复用方式绑定；
/// - `tls`：不透明转交给接入器的 TLS 材料配置（可选）。
pub struct ListenerConfig<C> {
    prefixes: Vec<HttpPrefix>,
    realm: Option<String>,
    auth_scheme: AuthenticationScheme,
    scheme_selector: Option<Arc<SchemeSelector<C>>>,
    credentials_finder: Option<Arc<CredentialsFinder>>,
    ignore_write_errors: bool,
    reuse_address: bool,
    tls: Option<TlsSettings>,
}

impl<C> ListenerConfig<C> {
    /// 构造空配置：无前缀、匿名方案、吞掉写失败。
    pub fn new() -> Self {
        Self {
            prefixes: Vec::new(),
            realm: None,
            auth_scheme: AuthenticationScheme::Anonymous,
            scheme_selector: None,
            credentials_finder: None,
            ignore_write_errors: true,
            reuse_address: false,
            tls: None,
        }
    }

    /// 追加一条监听前缀。
    pub fn with_prefix(mut self, prefix: HttpPrefix) -> Self {
        self.prefixes.push(prefix);
        self
    }

    /// 追加多条监听前缀。
    pub fn with_prefixes(mut self, prefixes: impl IntoIterator<Item = HttpPrefix>) -> Self {
        self.prefixes.extend(prefixes);
        self
    }

    /// 设置认证质询域名。
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// 设置默认认证方案。
    pub fn with_auth_scheme(mut self, scheme: AuthenticationScheme) -> Self {
        self.auth_scheme = scheme;
        self
    }

    /// 注入按请求选择认证方案的选择器。
    pub fn with_scheme_selector(
        mut self,
        selector: impl Fn(&C) -> Result<AuthenticationScheme, CoreError> + Send + Sync + 'static,
    ) -> Self {
        self.scheme_selector = Some(Arc::new(selector));
        self
    }

    /// 注入凭据查找器。
    pub fn with_credentials_finder(
        mut self,
        finder: impl Fn(&wicket_core::auth::ClientIdentity) -> Option<wicket_core::auth::NetworkCredentials>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.credentials_finder = Some(Arc::new(finder));
        self
    }

    /// 设置优雅停机回写失败的处理策略；`false` 表示以 WARN 日志记录。
    pub fn with_ignore_write_errors(mut self, ignore: bool) -> Self {
        self.ignore_write_errors = ignore;
        self
    }

    /// 要求接入器以地址复用方式绑定。
    pub fn with_reuse_address(mut self, reuse: bool) -> Self {
        self.reuse_address = reuse;
        self
    }

    /// 附带 TLS 材料配置。
    pub fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.tls = Some(tls);
        self
    }

    /// 返回监听前缀集合。
    pub fn prefixes(&self) -> &[HttpPrefix] {
        &self.prefixes
    }

    /// 返回生效的认证质询域名（未设置或为空时回退默认值）。
    pub fn realm(&self) -> &str {
        effective_realm(self.realm.as_deref())
    }

    /// 返回默认认证方案。
    pub fn auth_scheme(&self) -> AuthenticationScheme {
        self.auth_scheme
    }

    /// 返回按请求选择器（若有）。
    pub fn scheme_selector(&self) -> Option<&Arc<SchemeSelector<C>>> {
        self.scheme_selector.as_ref()
    }

    /// 返回凭据查找器（若有）。
    pub fn credentials_finder(&self) -> Option<Arc<CredentialsFinder>> {
        self.credentials_finder.clone()
    }

    /// 优雅停机回写失败是否吞掉。
    pub fn ignore_write_errors(&self) -> bool {
        self.ignore_write_errors
    }

    /// 是否要求地址复用绑定。
    pub fn reuse_address(&self) -> bool {
        self.reuse_address
    }

    /// 返回 TLS 材料配置（若有）。
    pub fn tls(&self) -> Option<&TlsSettings> {
        self.tls.as_ref()
    }
}

impl<C> Default for ListenerConfig<C> {
    fn default() -> Self {
        Self::new()
    }
}

// 手写 Debug：选择器与查找器是闭包，仅输出是否存在。
impl<C> fmt::Debug for ListenerConfig<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerConfig")
            .field("prefixes", &self.prefixes)
            .field("realm", &self.realm)
            .field("auth_scheme", &self.auth_scheme)
            .field("scheme_selector", &self.scheme_selector.is_some())
            .field("credentials_finder", &self.credentials_finder.is_some())
            .field("ignore_write_errors", &self.ignore_write_errors)
            .field("reuse_address", &self.reuse_address)
            .field("tls", &self.tls)
            .finish()
    }
}

/// 不透明转交给接入器的 TLS 材料配置。
///
/// # 契约说明（What）
/// - `certificate_dir`：按端口存放证书与私钥文件的目录；
/// - `require_client_certificate`：是否要求客户端证书。
///
/// TLS 协商本身不在核心职责内，本结构只负责把材料位置交到接入器手上。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlsSettings {
    certificate_dir: Option<PathBuf>,
    require_client_certificate: bool,
}

impl TlsSettings {
    /// 构造空 TLS 配置。
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置证书目录。
    pub fn with_certificate_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.certificate_dir = Some(dir.into());
        self
    }

    /// 要求客户端证书。
    pub fn with_require_client_certificate(mut self, required: bool) -> Self {
        self.require_client_certificate = required;
        self
    }

    /// 返回证书目录（若有）。
    pub fn certificate_dir(&self) -> Option<&PathBuf> {
        self.certificate_dir.as_ref()
    }

    /// 是否要求客户端证书。
    pub fn require_client_certificate(&self) -> bool {
        self.require_client_certificate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wicket_core::auth::DEFAULT_REALM;
    use wicket_core::test_stubs::RecordingContext;

    /// 空配置的默认值与历史实现一致。
    #[test]
    fn defaults_match_legacy_behavior() {
        let config: ListenerConfig<RecordingContext> = ListenerConfig::new();

        assert!(config.prefixes().is_empty());
        assert_eq!(config.realm(), DEFAULT_REALM);
        assert_eq!(config.auth_scheme(), AuthenticationScheme::Anonymous);
        assert!(config.scheme_selector().is_none());
        assert!(config.credentials_finder().is_none());
        assert!(config.ignore_write_errors());
        assert!(!config.reuse_address());
        assert!(config.tls().is_none());
    }

    /// 空 realm 同样回退默认值。
    #[test]
    fn empty_realm_falls_back_to_default() {
        let config: ListenerConfig<RecordingContext> = ListenerConfig::new().with_realm("");

        assert_eq!(config.realm(), DEFAULT_REALM);
        assert_eq!(
            ListenerConfig::<RecordingContext>::new()
                .with_realm("ops")
                .realm(),
            "ops"
        );
    }

    /// Builder 逐项叠加配置。
    #[test]
    fn builder_accumulates_settings() {
        let prefix = HttpPrefix::parse("http://localhost:8080/").expect("valid prefix");
        let tls = TlsSettings::new()
            .with_certificate_dir("/etc/wicket/certs")
            .with_require_client_certificate(true);
        let config: ListenerConfig<RecordingContext> = ListenerConfig::new()
            .with_prefix(prefix.clone())
            .with_auth_scheme(AuthenticationScheme::Basic)
            .with_scheme_selector(|_| Ok(AuthenticationScheme::Digest))
            .with_ignore_write_errors(false)
            .with_reuse_address(true)
            .with_tls(tls.clone());

        assert_eq!(config.prefixes(), &[prefix]);
        assert_eq!(config.auth_scheme(), AuthenticationScheme::Basic);
        assert!(config.scheme_selector().is_some());
        assert!(!config.ignore_write_errors());
        assert!(config.reuse_address());
        assert_eq!(config.tls(), Some(&tls));
    }
}
