//! Localized CLI strings.
//!
//! English is the default; Spanish is available via `--lang es`,
//! `MBOXCONTACTS_LANG`, or the system locale.

use std::sync::OnceLock;

static CURRENT_LANG: OnceLock<Lang> = OnceLock::new();

/// Supported languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    En,
    Es,
}

impl Lang {
    /// Parse a locale-ish code (`en`, `es_ES`, `es-MX`).
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.to_lowercase();
        match code.split(['_', '-', '.']).next().unwrap_or_default() {
            "en" => Some(Self::En),
            "es" => Some(Self::Es),
            _ => None,
        }
    }

    /// ISO 639-1 code.
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
        }
    }
}

/// Set the process language. Only the first call has any effect.
pub fn set_lang(lang: Lang) {
    let _ = CURRENT_LANG.set(lang);
}

/// The current language (English until set).
pub fn lang() -> Lang {
    CURRENT_LANG.get().copied().unwrap_or(Lang::En)
}

/// Language from `MBOXCONTACTS_LANG`, then `LC_MESSAGES`, then `LANG`.
pub fn detect_system_lang() -> Lang {
    ["MBOXCONTACTS_LANG", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|v| Lang::from_code(&v))
        .unwrap_or(Lang::En)
}

/// Defines a function returning the string for the current language.
macro_rules! msg {
    ($name:ident, $en:expr, $es:expr) => {
        pub fn $name() -> &'static str {
            match lang() {
                Lang::En => $en,
                Lang::Es => $es,
            }
        }
    };
}

// ── General ──────────────────────────────────────────────────────

msg!(
    app_about,
    "mboxcontacts \u{2014} Extract a deduplicated contact list from MBOX archives of any size.",
    "mboxcontacts \u{2014} Extrae una lista de contactos sin duplicados de archivos MBOX de cualquier tama\u{f1}o."
);
msg!(
    app_long_about,
    "mboxcontacts \u{2014} Extract a deduplicated contact list from MBOX archives.\nStreams the file one message at a time, counts who you write to and who\nwrites to you, and mines signature blocks for phones, titles and companies.",
    "mboxcontacts \u{2014} Extrae una lista de contactos sin duplicados de archivos MBOX.\nLee el fichero mensaje a mensaje, cuenta a qui\u{e9}n escribes y qui\u{e9}n te escribe,\ny extrae tel\u{e9}fonos, cargos y empresas de las firmas."
);

// ── CLI help strings ─────────────────────────────────────────────

msg!(
    help_cmd_extract,
    "Extract contacts from an MBOX file into a JSON report",
    "Extraer contactos de un fichero MBOX a un informe JSON"
);
msg!(
    help_cmd_count,
    "Count messages and unusable records without aggregating",
    "Contar mensajes y registros inservibles sin agregar"
);
msg!(
    help_cmd_defaults,
    "Print the built-in deny-list and signature patterns",
    "Mostrar la lista de exclusi\u{f3}n y los patrones de firma integrados"
);
msg!(
    help_cmd_completions,
    "Generate shell completions",
    "Generar completions para tu shell"
);
msg!(
    help_cmd_manpage,
    "Generate a man page",
    "Generar p\u{e1}gina de manual"
);

// ── Progress / output ────────────────────────────────────────────

msg!(msg_extracting, "Extracting", "Extrayendo");
msg!(msg_counting, "Counting", "Contando");
msg!(msg_file, "File", "Fichero");
msg!(msg_file_size, "File size", "Tama\u{f1}o del fichero");
msg!(msg_output, "Report", "Informe");
msg!(msg_message_count, "Messages", "Mensajes");
msg!(msg_records, "Usable records", "Registros v\u{e1}lidos");
msg!(msg_skipped, "Skipped", "Descartados");
msg!(msg_too_short, "too short", "demasiado cortos");
msg!(msg_missing_from, "no From", "sin From");
msg!(msg_bad_from, "bad From", "From inv\u{e1}lido");
msg!(msg_denied, "Denied addresses", "Direcciones excluidas");
msg!(msg_truncated, "Truncated messages", "Mensajes truncados");
msg!(msg_preamble, "Preamble lines", "L\u{ed}neas de pre\u{e1}mbulo");
msg!(msg_unique_contacts, "Unique contacts", "Contactos \u{fa}nicos");
msg!(msg_elapsed, "Elapsed", "Tiempo");
msg!(msg_coverage, "Coverage", "Cobertura");
msg!(msg_with_name, "With name", "Con nombre");
msg!(msg_with_phone, "With phone", "Con tel\u{e9}fono");
msg!(msg_with_address, "With address", "Con direcci\u{f3}n");
msg!(msg_with_title, "With title", "Con cargo");
msg!(msg_with_company, "With company", "Con empresa");
msg!(msg_top_contacts, "Top contacts", "Principales contactos");
msg!(
    msg_default_deny_list,
    "Built-in deny-list (case-insensitive substrings)",
    "Lista de exclusi\u{f3}n integrada (subcadenas, sin distinguir may\u{fa}sculas)"
);
msg!(
    msg_default_patterns,
    "Built-in signature pattern table",
    "Tabla de patrones de firma integrada"
);

// ── Errors ───────────────────────────────────────────────────────

msg!(err_file_not_found, "File not found", "Fichero no encontrado");
msg!(
    err_report_write,
    "Could not write the report to",
    "No se pudo escribir el informe en"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lang_from_code() {
        assert_eq!(Lang::from_code("en"), Some(Lang::En));
        assert_eq!(Lang::from_code("es_ES"), Some(Lang::Es));
        assert_eq!(Lang::from_code("es-MX"), Some(Lang::Es));
        assert_eq!(Lang::from_code("fr"), None);
    }

    #[test]
    fn test_lang_code() {
        assert_eq!(Lang::En.code(), "en");
        assert_eq!(Lang::Es.code(), "es");
    }

    #[test]
    fn test_messages_return_strings() {
        assert!(!app_about().is_empty());
        assert!(!msg_unique_contacts().is_empty());
        assert!(!err_report_write().is_empty());
    }
}
