//! Contract rows and the eligibility rule shared by entity and target sets.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ChainError, Result};

/// A contract as delivered by the open-data source.
///
/// Numeric fields are kept as text until [`EligibilityRule::apply`] parses
/// them; the source sends them as strings, numbers, or not at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawContract {
    #[serde(rename = "uid", default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(rename = "nombre_de_la_entidad", default, deserialize_with = "null_as_empty")]
    pub entity_name: String,
    #[serde(
        rename = "nom_raz_social_contratista",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub counterparty: String,
    #[serde(rename = "nom_raz_soc_stand", default, skip_serializing_if = "Option::is_none")]
    pub counterparty_key: Option<String>,
    #[serde(
        rename = "detalle_del_objeto_a_contratar",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub description: String,
    #[serde(rename = "anno_firma_del_contrato", default, deserialize_with = "number_as_text")]
    pub year: Option<String>,
    #[serde(rename = "cuantia_proceso", default, deserialize_with = "number_as_text")]
    pub amount: Option<String>,
    #[serde(rename = "estado_del_proceso", default, deserialize_with = "null_as_empty")]
    pub status: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn number_as_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

/// A contract that passed eligibility, with typed numeric fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractRecord {
    pub id: String,
    pub entity_name: String,
    pub counterparty: String,
    pub counterparty_key: Option<String>,
    pub description: String,
    pub year: Option<i32>,
    pub amount: Option<f64>,
    pub status: String,
}

impl TryFrom<RawContract> for ContractRecord {
    type Error = ChainError;

    fn try_from(raw: RawContract) -> Result<Self> {
        Ok(Self {
            year: parse_year(raw.year.as_deref())?,
            amount: parse_amount(raw.amount.as_deref())?,
            id: raw.id,
            entity_name: raw.entity_name,
            counterparty: raw.counterparty,
            counterparty_key: raw.counterparty_key,
            description: raw.description,
            status: raw.status,
        })
    }
}

fn parse_amount(text: Option<&str>) -> Result<Option<f64>> {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    text.parse::<f64>()
        .map(Some)
        .map_err(|_| ChainError::MalformedNumeric {
            field: "cuantia_proceso",
            value: text.to_string(),
        })
}

#[allow(clippy::cast_possible_truncation)]
fn parse_year(text: Option<&str>) -> Result<Option<i32>> {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    if let Ok(year) = text.parse::<i32>() {
        return Ok(Some(year));
    }
    let malformed = || ChainError::MalformedNumeric {
        field: "anno_firma_del_contrato",
        value: text.to_string(),
    };
    let value = text.parse::<f64>().map_err(|_| malformed())?;
    if value.is_nan() {
        return Ok(None);
    }
    if value.fract() != 0.0 || value.abs() > f64::from(i32::MAX) {
        return Err(malformed());
    }
    Ok(Some(value as i32))
}

fn default_statuses() -> Vec<String> {
    [
        "Liquidado",
        "Terminado Sin Liquidar",
        "Celebrado",
        "Adjudicado",
        "Convocado",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Which contracts take part in matching at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityRule {
    pub allowed_statuses: Vec<String>,
    pub min_amount: f64,
    pub min_year: i32,
}

impl Default for EligibilityRule {
    fn default() -> Self {
        Self {
            allowed_statuses: default_statuses(),
            min_amount: 0.0,
            min_year: 2012,
        }
    }
}

impl EligibilityRule {
    #[must_use]
    pub fn admits_status(&self, status: &str) -> bool {
        self.allowed_statuses.iter().any(|allowed| allowed == status)
    }

    /// Amount and year checks. Missing values never pass.
    #[must_use]
    pub fn retains(&self, record: &ContractRecord) -> bool {
        record.amount.is_some_and(|amount| amount >= self.min_amount)
            && record.year.is_some_and(|year| year >= self.min_year)
    }

    /// Filter a row-set: status first, then parse numbers, then amount and
    /// year. The surviving rows keep their relative order.
    ///
    /// # Errors
    /// [`ChainError::MalformedNumeric`] if any row with an admitted status has
    /// a non-numeric amount or year. The whole row-set is rejected.
    pub fn apply(&self, rows: Vec<RawContract>) -> Result<Vec<ContractRecord>> {
        let parsed = rows
            .into_iter()
            .filter(|row| self.admits_status(&row.status))
            .map(ContractRecord::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(parsed
            .into_iter()
            .filter(|record| self.retains(record))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(status: &str, year: Option<&str>, amount: Option<&str>) -> RawContract {
        RawContract {
            id: "c".into(),
            description: "OBRA".into(),
            status: status.into(),
            year: year.map(String::from),
            amount: amount.map(String::from),
            ..RawContract::default()
        }
    }

    #[test]
    fn keeps_allowed_recent_non_negative() {
        let rule = EligibilityRule::default();
        let rows = vec![
            raw("Celebrado", Some("2015"), Some("100")),
            raw("Borrador", Some("2015"), Some("100")),
            raw("Liquidado", Some("2011"), Some("100")),
            raw("Adjudicado", Some("2013"), Some("-1")),
            raw("Convocado", Some("2012"), Some("0")),
        ];
        let kept = rule.apply(rows).unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].year, Some(2015));
        assert_eq!(kept[1].status, "Convocado");
        assert_eq!(kept[1].amount, Some(0.0));
    }

    #[test]
    fn missing_numbers_are_dropped_not_errors() {
        let rule = EligibilityRule::default();
        let rows = vec![
            raw("Celebrado", None, Some("10")),
            raw("Celebrado", Some("2014"), None),
            raw("Celebrado", Some(" "), Some("10")),
        ];
        assert!(rule.apply(rows).unwrap().is_empty());
    }

    #[test]
    fn malformed_numbers_fail_the_row_set() {
        let rule = EligibilityRule::default();
        let rows = vec![
            raw("Celebrado", Some("2015"), Some("100")),
            raw("Celebrado", Some("dos mil"), Some("100")),
        ];
        assert!(matches!(
            rule.apply(rows),
            Err(ChainError::MalformedNumeric { field: "anno_firma_del_contrato", .. })
        ));
    }

    #[test]
    fn malformed_numbers_in_rejected_statuses_are_ignored() {
        let rule = EligibilityRule::default();
        let rows = vec![
            raw("Borrador", Some("2015"), Some("n/a")),
            raw("Celebrado", Some("2015"), Some("100")),
        ];
        assert_eq!(rule.apply(rows).unwrap().len(), 1);
    }

    #[test]
    fn float_years_are_accepted_when_integral() {
        assert_eq!(parse_year(Some("2016.0")).unwrap(), Some(2016));
        assert!(parse_year(Some("2016.5")).is_err());
    }

    #[test]
    fn deserializes_source_rows() {
        let json = r#"{
            "uid": "17-1-1",
            "nombre_de_la_entidad": "HUILA - ALCALDÍA MUNICIPIO DE NEIVA",
            "nom_raz_social_contratista": "CONSTRUCTORA S.A.S",
            "detalle_del_objeto_a_contratar": "Construcción de vía",
            "anno_firma_del_contrato": 2017,
            "cuantia_proceso": "1500000",
            "estado_del_proceso": "Celebrado"
        }"#;
        let row: RawContract = serde_json::from_str(json).unwrap();
        assert_eq!(row.year.as_deref(), Some("2017"));
        assert_eq!(row.amount.as_deref(), Some("1500000"));
        assert_eq!(row.counterparty_key, None);

        let record = ContractRecord::try_from(row).unwrap();
        assert_eq!(record.year, Some(2017));
        assert_eq!(record.amount, Some(1_500_000.0));
    }

    #[test]
    fn tolerates_null_and_missing_fields() {
        let json = r#"{"detalle_del_objeto_a_contratar": null, "anno_firma_del_contrato": null}"#;
        let row: RawContract = serde_json::from_str(json).unwrap();
        assert_eq!(row.description, "");
        assert_eq!(row.year, None);
        assert_eq!(row.amount, None);
    }
}
