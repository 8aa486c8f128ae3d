use serde::Deserialize;

/// Content security policy sent when none is configured
pub const DEFAULT_CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self' 'unsafe-inline'; \
     style-src 'self' 'unsafe-inline'; img-src 'self' data: https:; connect-src 'self' https://api.anthropic.com";

/// Hardening headers added to every response that does not already carry them
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityHeadersConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Value of `content-security-policy`
    #[serde(default = "default_content_security_policy")]
    pub content_security_policy: String,
    /// Value of `x-frame-options`
    #[serde(default = "default_frame_options")]
    pub frame_options: String,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            content_security_policy: default_content_security_policy(),
            frame_options: default_frame_options(),
        }
    }
}

const fn default_enabled() -> bool {
    true
}

fn default_content_security_policy() -> String {
    DEFAULT_CONTENT_SECURITY_POLICY.to_owned()
}

fn default_frame_options() -> String {
    "SAMEORIGIN".to_owned()
}
