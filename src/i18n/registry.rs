//! Language registry: single source of truth for the known languages.
//!
//! The registry plays the role of the host system's language manager: it
//! supplies the finite set of language codes an operator may pick from.
//! It uses a singleton pattern with `OnceLock` for thread-safe lazy
//! initialization.

use crate::i18n::LanguageCode;
use std::sync::OnceLock;

/// Configuration for a known language.
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// ISO 639-1 language code (e.g., "en", "fr")
    pub code: &'static str,

    /// English name of the language (e.g., "French")
    pub name: &'static str,

    /// Native name of the language (e.g., "Français")
    pub native_name: &'static str,

    /// Whether this language is offered for bulk translation
    pub enabled: bool,
}

/// Global language registry.
///
/// Initialized once on first access and immutable thereafter. The
/// bulk-translation core never consults it; only the front ends do, to
/// reject codes an operator could not have picked from the catalog.
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    /// Get the global registry instance.
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry {
            languages: default_languages(),
        })
    }

    /// Look up a language by its code.
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// All enabled languages, in catalog order.
    pub fn list_enabled(&self) -> Vec<&LanguageConfig> {
        self.languages.iter().filter(|lang| lang.enabled).collect()
    }

    /// All languages, including disabled ones.
    pub fn list_all(&self) -> Vec<&LanguageConfig> {
        self.languages.iter().collect()
    }

    /// Whether a code names a known, enabled language.
    pub fn is_enabled(&self, code: &LanguageCode) -> bool {
        self.get_by_code(code.as_str())
            .map(|lang| lang.enabled)
            .unwrap_or(false)
    }
}

/// Default language catalog.
///
/// A deployment that needs a different set edits this list; nothing else
/// in the crate hard-codes language codes.
fn default_languages() -> Vec<LanguageConfig> {
    vec![
        LanguageConfig {
            code: "en",
            name: "English",
            native_name: "English",
            enabled: true,
        },
        LanguageConfig {
            code: "fr",
            name: "French",
            native_name: "Français",
            enabled: true,
        },
        LanguageConfig {
            code: "de",
            name: "German",
            native_name: "Deutsch",
            enabled: true,
        },
        LanguageConfig {
            code: "es",
            name: "Spanish",
            native_name: "Español",
            enabled: true,
        },
        LanguageConfig {
            code: "it",
            name: "Italian",
            native_name: "Italiano",
            enabled: false,
        },
    ]
}
