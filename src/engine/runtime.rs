use core::fmt;
use std::sync::Arc;

use crate::xdm::ExpandedName;

/// Namespace URI used for W3C-defined XPath/XQuery error codes (xqt-errors).
pub const ERR_NS: &str = "http://www.w3.org/2005/xqt-errors";

/// The error codes this core emits. Deliberately small: everything else in
/// the XPath error universe belongs to the surrounding system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Effective boolean value undefined for the sequence (cardinality rule).
    FORG0006,
    /// General dynamic type error (set operation over non-nodes, bad cast).
    XPTY0004,
    /// A path step's result mixes nodes and non-nodes.
    XPTY0018,
    /// A path step was applied to a non-node context item.
    XPTY0019,
    /// Generic failure (adapter-originated causes without a better code).
    FOER0000,
    Unknown,
}

impl ErrorCode {
    /// QName for this code under the xqt-errors namespace.
    pub fn qname(&self) -> ExpandedName {
        let local = match self {
            ErrorCode::FORG0006 => "FORG0006",
            ErrorCode::XPTY0004 => "XPTY0004",
            ErrorCode::XPTY0018 => "XPTY0018",
            ErrorCode::XPTY0019 => "XPTY0019",
            ErrorCode::FOER0000 => "FOER0000",
            ErrorCode::Unknown => "UNKNOWN",
        };
        ExpandedName::new(Some(ERR_NS.to_string()), local)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub struct Error {
    pub code: ExpandedName,
    pub message: String,
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new_qname(code: ExpandedName, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            source: None,
        }
    }

    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::new_qname(code.qname(), msg)
    }

    pub fn code_enum(&self) -> ErrorCode {
        if self.code.ns_uri.as_deref() != Some(ERR_NS) {
            return ErrorCode::Unknown;
        }
        match self.code.local.as_str() {
            "FORG0006" => ErrorCode::FORG0006,
            "XPTY0004" => ErrorCode::XPTY0004,
            "XPTY0018" => ErrorCode::XPTY0018,
            "XPTY0019" => ErrorCode::XPTY0019,
            "FOER0000" => ErrorCode::FOER0000,
            _ => ErrorCode::Unknown,
        }
    }

    /// Human-readable code string (`err:LOCAL` or `Q{ns}local`).
    pub fn format_code(&self) -> String {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            format!("err:{}", self.code.local)
        } else if let Some(ns) = &self.code.ns_uri {
            format!("Q{{{}}}{}", ns, self.code.local)
        } else {
            self.code.local.clone()
        }
    }

    pub fn with_source(
        mut self,
        source: impl Into<Option<Arc<dyn std::error::Error + Send + Sync>>>,
    ) -> Self {
        self.source = source.into();
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {} ({})", self.message, self.format_code())
    }
}
