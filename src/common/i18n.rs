// src/common/i18n.rs

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;

pub const DEFAULT_LANG: &str = "pt";

// Catálogos embutidos no binário
const CATALOGS: &[(&str, &str)] = &[
    ("pt", include_str!("../../locales/pt.json")),
    ("en", include_str!("../../locales/en.json")),
];

#[derive(Clone, Debug)]
pub struct I18nStore {
    messages: Arc<HashMap<String, HashMap<String, String>>>,
}

impl I18nStore {
    pub fn new() -> anyhow::Result<Self> {
        let mut messages = HashMap::new();
        for (lang, raw) in CATALOGS {
            let catalog: HashMap<String, String> = serde_json::from_str(raw)
                .with_context(|| format!("catálogo de mensagens inválido: {lang}"))?;
            messages.insert(lang.to_string(), catalog);
        }
        Ok(Self {
            messages: Arc::new(messages),
        })
    }

    /// Procura a mensagem no idioma pedido, cai para o padrão e por último devolve a própria chave.
    pub fn translate(&self, lang: &str, key: &str) -> String {
        self.lookup(lang, key)
            .or_else(|| self.lookup(DEFAULT_LANG, key))
            .unwrap_or(key)
            .to_string()
    }

    fn lookup(&self, lang: &str, key: &str) -> Option<&str> {
        self.messages
            .get(lang)
            .and_then(|catalog| catalog.get(key))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_language_falls_back_to_portuguese() {
        let store = I18nStore::new().unwrap();
        assert_eq!(
            store.translate("de", "USER_NOT_FOUND"),
            "Usuário não encontrado."
        );
    }

    #[test]
    fn unknown_key_is_returned_as_is() {
        let store = I18nStore::new().unwrap();
        assert_eq!(store.translate("en", "SOMETHING_ELSE"), "SOMETHING_ELSE");
    }

    #[test]
    fn catalogs_share_the_same_keys() {
        let store = I18nStore::new().unwrap();
        let pt = store.messages.get("pt").unwrap();
        let en = store.messages.get("en").unwrap();
        let mut pt_keys: Vec<_> = pt.keys().collect();
        let mut en_keys: Vec<_> = en.keys().collect();
        pt_keys.sort();
        en_keys.sort();
        assert_eq!(pt_keys, en_keys);
    }
}
