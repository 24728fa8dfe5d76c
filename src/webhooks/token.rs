// src/webhooks/token.rs

use subtle::ConstantTimeEq;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCheck {
    /// Nenhum segredo configurado para o provedor
    NotConfigured,
    Valid,
    Missing,
    Invalid,
}

impl TokenCheck {
    pub fn is_accepted(self) -> bool {
        matches!(self, TokenCheck::NotConfigured | TokenCheck::Valid)
    }
}

/// Compara o token recebido (cabeçalho primeiro, depois corpo) com o segredo configurado.
pub fn verify(expected: Option<&str>, header: Option<&str>, body: Option<&str>) -> TokenCheck {
    let Some(expected) = expected.filter(|e| !e.is_empty()) else {
        return TokenCheck::NotConfigured;
    };

    // Cabeçalho em branco não esconde o token do corpo
    fn present(token: Option<&str>) -> Option<&str> {
        token.map(str::trim).filter(|t| !t.is_empty())
    }
    let Some(provided) = present(header).or_else(|| present(body)) else {
        return TokenCheck::Missing;
    };

    // Tamanho diferente já recusa; o conteúdo é comparado em tempo constante
    if provided.len() == expected.len() && bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        TokenCheck::Valid
    } else {
        TokenCheck::Invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_header() {
        assert_eq!(verify(Some("abc123"), Some("abc123"), None), TokenCheck::Valid);
    }

    #[test]
    fn header_takes_precedence_over_body() {
        assert_eq!(
            verify(Some("abc123"), Some("wrong!"), Some("abc123")),
            TokenCheck::Invalid
        );
        assert_eq!(verify(Some("abc123"), None, Some("abc123")), TokenCheck::Valid);
    }

    #[test]
    fn blank_header_falls_back_to_body_token() {
        assert_eq!(verify(Some("abc123"), Some(""), Some("abc123")), TokenCheck::Valid);
        assert_eq!(verify(Some("abc123"), Some("   "), Some("abc123")), TokenCheck::Valid);
        assert_eq!(verify(Some("abc123"), Some(""), Some("errado")), TokenCheck::Invalid);
    }

    #[test]
    fn missing_and_blank_tokens_are_rejected() {
        assert_eq!(verify(Some("abc123"), None, None), TokenCheck::Missing);
        assert_eq!(verify(Some("abc123"), Some("  "), None), TokenCheck::Missing);
        assert!(!TokenCheck::Missing.is_accepted());
    }

    #[test]
    fn unconfigured_secret_skips_the_check() {
        let check = verify(None, None, None);
        assert_eq!(check, TokenCheck::NotConfigured);
        assert!(check.is_accepted());
        assert_eq!(verify(Some(""), Some("x"), None), TokenCheck::NotConfigured);
    }

    #[test]
    fn different_lengths_are_invalid() {
        assert_eq!(verify(Some("abc123"), Some("abc1234"), None), TokenCheck::Invalid);
    }
}
