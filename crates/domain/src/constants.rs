//! Wire-level constants shared by every layer.
//!
//! Endpoint paths, header names, storage keys and the user-facing messages
//! the error normalizer falls back to.

// API endpoints
pub const LOGIN_PATH: &str = "/api/v1/user/login";
pub const REGISTER_PATH: &str = "/api/v1/user/register";
pub const LOGOUT_PATH: &str = "/api/v1/user/logout";
pub const REFRESH_PATH: &str = "/api/v1/user/token/refresh";

// Headers and cookies
pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const CSRF_HEADER: &str = "x-csrf-token";
pub const CSRF_COOKIE: &str = "csrf_token";
pub const RETRY_AFTER_HEADER: &str = "retry-after";
pub const BEARER_PREFIX: &str = "Bearer ";

// Session storage keys
pub const ACCESS_TOKEN_KEY: &str = "auth.token";
pub const REFRESH_TOKEN_KEY: &str = "auth.refreshToken";
pub const EXPIRES_AT_KEY: &str = "auth.expiresAt";
pub const CSRF_TOKEN_KEY: &str = "auth.csrfToken";

// Transport defaults
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 8_000;
pub const DEFAULT_USER_AGENT: &str = concat!("authwire/", env!("CARGO_PKG_VERSION"));

// Response cache
pub const CACHE_KEY_PREFIX: &str = "cache:";
pub const DEFAULT_CACHE_TTL_MS: u64 = 300_000;
pub const DEFAULT_CACHE_CAPACITY: u64 = 1_024;

// User-facing messages
pub const DEFAULT_FALLBACK_MESSAGE: &str = "请求失败，请稍后重试。";
pub const NETWORK_ERROR_MESSAGE: &str = "网络连接异常，请检查网络后重试。";
pub const REQUEST_CANCELLED_MESSAGE: &str = "请求已取消";
pub const LOGIN_CREDENTIALS_MESSAGE: &str = "用户名或密码错误，请重试。";
pub const REFRESH_FAILED_MESSAGE: &str = "刷新登录状态失败，请重新登录。";
pub const MISSING_REFRESH_TOKEN_MESSAGE: &str = "缺少刷新令牌，请重新登录。";
pub const REFRESH_ABORTED_MESSAGE: &str = "刷新令牌失败";
pub const LOGIN_FAILED_MESSAGE: &str = "登录失败，请检查账号信息。";
pub const REGISTER_FAILED_MESSAGE: &str = "注册失败，请稍后再试。";
pub const LOGOUT_FAILED_MESSAGE: &str = "退出登录失败，请稍后再试。";
