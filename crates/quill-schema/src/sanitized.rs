//! Sanitized-content message types.
//!
//! A fixed family of wrapper messages carries pre-sanitized strings. Fields
//! of these types are not exposed as messages: readers see the wrapped text
//! tagged with its content kind, and writers convert a sanitized value back
//! into the wrapper.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Package holding the built-in wrapper messages.
pub const SANITIZED_PACKAGE: &str = "webutil.html.types";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanitizedKind {
    Html,
    Script,
    Style,
    StyleSheet,
    Url,
    TrustedResourceUrl,
}

struct KindInfo {
    kind: SanitizedKind,
    message: &'static str,
    stem: &'static str,
}

const KINDS: [KindInfo; 6] = [
    KindInfo {
        kind: SanitizedKind::Html,
        message: "SafeHtmlProto",
        stem: "safe_html",
    },
    KindInfo {
        kind: SanitizedKind::Script,
        message: "SafeScriptProto",
        stem: "safe_script",
    },
    KindInfo {
        kind: SanitizedKind::Style,
        message: "SafeStyleProto",
        stem: "safe_style",
    },
    KindInfo {
        kind: SanitizedKind::StyleSheet,
        message: "SafeStyleSheetProto",
        stem: "safe_style_sheet",
    },
    KindInfo {
        kind: SanitizedKind::Url,
        message: "SafeUrlProto",
        stem: "safe_url",
    },
    KindInfo {
        kind: SanitizedKind::TrustedResourceUrl,
        message: "TrustedResourceUrlProto",
        stem: "trusted_resource_url",
    },
];

static BY_MESSAGE: LazyLock<HashMap<String, SanitizedKind>> = LazyLock::new(|| {
    KINDS
        .iter()
        .map(|info| (format!("{}.{}", SANITIZED_PACKAGE, info.message), info.kind))
        .collect()
});

impl SanitizedKind {
    pub const ALL: [SanitizedKind; 6] = [
        SanitizedKind::Html,
        SanitizedKind::Script,
        SanitizedKind::Style,
        SanitizedKind::StyleSheet,
        SanitizedKind::Url,
        SanitizedKind::TrustedResourceUrl,
    ];

    fn info(self) -> &'static KindInfo {
        &KINDS[self.ordinal() as usize]
    }

    /// Stable small integer identifying the kind at runtime.
    pub fn ordinal(self) -> i32 {
        match self {
            SanitizedKind::Html => 0,
            SanitizedKind::Script => 1,
            SanitizedKind::Style => 2,
            SanitizedKind::StyleSheet => 3,
            SanitizedKind::Url => 4,
            SanitizedKind::TrustedResourceUrl => 5,
        }
    }

    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    /// Kind of the wrapper message with this full name, if it is one.
    pub fn from_message(full_name: &str) -> Option<Self> {
        BY_MESSAGE.get(full_name).copied()
    }

    /// Full name of the wrapper message.
    pub fn message_name(self) -> String {
        format!("{}.{}", SANITIZED_PACKAGE, self.info().message)
    }

    /// The single field holding the wrapped text.
    pub fn wrapped_field(self) -> String {
        format!("private_do_not_access_or_else_{}_wrapped_value", self.info().stem)
    }

    /// Conversion from a sanitized host value to the wrapper message.
    pub fn to_proto_method(self) -> String {
        format!("to_{}_proto", self.info().stem)
    }
}

impl fmt::Display for SanitizedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SanitizedKind::Html => "html",
            SanitizedKind::Script => "js",
            SanitizedKind::Style => "css",
            SanitizedKind::StyleSheet => "css_sheet",
            SanitizedKind::Url => "uri",
            SanitizedKind::TrustedResourceUrl => "trusted_resource_uri",
        };
        write!(f, "{}", name)
    }
}
