use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushErrorCode {
    CapabilityUnsupported,
    PermissionDenied,
    ProviderUnavailable,
    TokenAcquisitionFailed,
    GatewayUnreachable,
    GatewayRejected,
    StorageUnavailable,
    InvalidArgument,
}

impl PushErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushErrorCode::CapabilityUnsupported => "push/capability-unsupported",
            PushErrorCode::PermissionDenied => "push/permission-denied",
            PushErrorCode::ProviderUnavailable => "push/provider-unavailable",
            PushErrorCode::TokenAcquisitionFailed => "push/token-acquisition-failed",
            PushErrorCode::GatewayUnreachable => "push/gateway-unreachable",
            PushErrorCode::GatewayRejected => "push/gateway-rejected",
            PushErrorCode::StorageUnavailable => "push/storage-unavailable",
            PushErrorCode::InvalidArgument => "push/invalid-argument",
        }
    }
}

#[derive(Clone, Debug)]
pub struct PushError {
    pub code: PushErrorCode,
    message: String,
}

impl PushError {
    pub fn new(code: PushErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl Display for PushError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for PushError {}

pub type PushResult<T> = Result<T, PushError>;

pub fn capability_unsupported(message: impl Into<String>) -> PushError {
    PushError::new(PushErrorCode::CapabilityUnsupported, message)
}

pub fn permission_denied(message: impl Into<String>) -> PushError {
    PushError::new(PushErrorCode::PermissionDenied, message)
}

pub fn provider_unavailable(message: impl Into<String>) -> PushError {
    PushError::new(PushErrorCode::ProviderUnavailable, message)
}

pub fn token_acquisition_failed(message: impl Into<String>) -> PushError {
    PushError::new(PushErrorCode::TokenAcquisitionFailed, message)
}

pub fn gateway_unreachable(message: impl Into<String>) -> PushError {
    PushError::new(PushErrorCode::GatewayUnreachable, message)
}

pub fn gateway_rejected(message: impl Into<String>) -> PushError {
    PushError::new(PushErrorCode::GatewayRejected, message)
}

pub fn storage_unavailable(message: impl Into<String>) -> PushError {
    PushError::new(PushErrorCode::StorageUnavailable, message)
}

pub fn invalid_argument(message: impl Into<String>) -> PushError {
    PushError::new(PushErrorCode::InvalidArgument, message)
}
