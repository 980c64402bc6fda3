//! Static tariff catalogue.

use serde::Serialize;

/// Code used when none is given.
pub const DEFAULT_TARIFF: &str = "standard";

/// A ticket price category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tariff {
    pub code: &'static str,
    pub label: &'static str,
    pub price_cents: i64,
}

const TARIFFS: [Tariff; 4] = [
    Tariff { code: "standard", label: "Plein tarif", price_cents: 1200 },
    Tariff { code: "student", label: "Etudiant", price_cents: 900 },
    Tariff { code: "under16", label: "Moins de 16 ans", price_cents: 700 },
    Tariff { code: "unemployed", label: "Demandeur d'emploi", price_cents: 800 },
];

/// Error returned for a code outside the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid tariff '{code}'. Allowed values: {}.", available_codes().collect::<Vec<_>>().join(", "))]
pub struct UnknownTariff {
    pub code: String,
}

/// Returns every tariff, in catalogue order.
#[must_use]
pub const fn all() -> &'static [Tariff] {
    &TARIFFS
}

/// Returns the accepted codes.
pub fn available_codes() -> impl Iterator<Item = &'static str> {
    TARIFFS.iter().map(|tariff| tariff.code)
}

/// Resolves a tariff code, trimming and lower-casing it first.
///
/// A missing code resolves to [`DEFAULT_TARIFF`].
///
/// # Errors
///
/// Returns `UnknownTariff` if the code is not in the catalogue.
///
/// # Example
///
/// ```
/// use boxoffice::tariff;
///
/// assert_eq!(tariff::lookup(Some(" Student ")).unwrap().price_cents, 900);
/// assert_eq!(tariff::lookup(None).unwrap().code, "standard");
/// assert!(tariff::lookup(Some("vip")).is_err());
/// ```
pub fn lookup(code: Option<&str>) -> Result<Tariff, UnknownTariff> {
    let normalized = code.unwrap_or(DEFAULT_TARIFF).trim().to_lowercase();
    TARIFFS
        .iter()
        .find(|tariff| tariff.code == normalized)
        .copied()
        .ok_or_else(|| UnknownTariff { code: code.unwrap_or_default().to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_prices() {
        let prices: Vec<_> = all().iter().map(|t| (t.code, t.price_cents)).collect();
        assert_eq!(
            prices,
            [("standard", 1200), ("student", 900), ("under16", 700), ("unemployed", 800)]
        );
    }

    #[test]
    fn test_lookup_normalizes() {
        assert_eq!(lookup(Some("UNDER16")).unwrap().code, "under16");
        assert_eq!(lookup(Some("  unemployed\n")).unwrap().price_cents, 800);
    }

    #[test]
    fn test_missing_code_is_default() {
        assert_eq!(lookup(None).unwrap().code, DEFAULT_TARIFF);
    }

    #[test]
    fn test_unknown_code_lists_allowed() {
        let err = lookup(Some("vip")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid tariff 'vip'. Allowed values: standard, student, under16, unemployed."
        );
    }

    #[test]
    fn test_serializes_fields() {
        let json = serde_json::to_value(lookup(Some("student")).unwrap()).unwrap();
        assert_eq!(json["label"], "Etudiant");
        assert_eq!(json["price_cents"], 900);
    }
}
