//! Tabular export of a [`ChainTable`].
//!
//! One row per chain record: the key, the entity contract's columns, the
//! target contract's columns suffixed with `_mun`, then `score` and `valid`.

use std::io::Write;
use std::path::Path;

use crate::chain::{ChainRecord, ChainTable};
use crate::contract::ContractRecord;
use crate::error::Result;

const CONTRACT_COLUMNS: [&str; 8] = [
    "uid",
    "nombre_de_la_entidad",
    "nom_raz_social_contratista",
    "nom_raz_soc_stand",
    "detalle_del_objeto_a_contratar",
    "anno_firma_del_contrato",
    "cuantia_proceso",
    "estado_del_proceso",
];

const TARGET_SUFFIX: &str = "_mun";

#[must_use]
pub fn header() -> Vec<String> {
    std::iter::once("key".to_string())
        .chain(CONTRACT_COLUMNS.iter().map(|c| (*c).to_string()))
        .chain(CONTRACT_COLUMNS.iter().map(|c| format!("{c}{TARGET_SUFFIX}")))
        .chain(["score".to_string(), "valid".to_string()])
        .collect()
}

fn contract_fields(contract: &ContractRecord) -> [String; 8] {
    [
        contract.id.clone(),
        contract.entity_name.clone(),
        contract.counterparty.clone(),
        contract.counterparty_key.clone().unwrap_or_default(),
        contract.description.clone(),
        contract.year.map(|y| y.to_string()).unwrap_or_default(),
        contract.amount.map(|a| a.to_string()).unwrap_or_default(),
        contract.status.clone(),
    ]
}

fn row(record: &ChainRecord) -> Vec<String> {
    let mut fields = Vec::with_capacity(CONTRACT_COLUMNS.len() * 2 + 3);
    fields.push(record.key.to_string());
    fields.extend(contract_fields(&record.entity));
    fields.extend(contract_fields(&record.target));
    fields.push(record.score.to_string());
    fields.push(record.valid.to_string());
    fields
}

/// Write `table` as CSV, header first.
///
/// # Errors
/// [`crate::ChainError::Csv`] on write failures.
pub fn write_csv<W: Write>(table: &ChainTable, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(header())?;
    for record in table.iter() {
        csv.write_record(row(record))?;
    }
    csv.flush()?;
    Ok(())
}

/// Write `table` as CSV to `path`, replacing any existing file.
///
/// # Errors
/// As for [`write_csv`], plus file creation failures.
pub fn write_csv_file(table: &ChainTable, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv(table, std::io::BufWriter::new(file))?;
    log::info!("Wrote {} chain records to {}", table.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainLink;

    fn contract(id: &str, key: Option<&str>) -> ContractRecord {
        ContractRecord {
            id: id.into(),
            entity_name: "INVIAS".into(),
            counterparty: "MUNICIPIO DE NEIVA".into(),
            counterparty_key: key.map(String::from),
            description: "VIA, RURAL".into(),
            year: Some(2016),
            amount: Some(2500.5),
            status: "Celebrado".into(),
        }
    }

    #[test]
    fn header_has_suffixed_target_columns() {
        let header = header();
        assert_eq!(header.len(), 19);
        assert_eq!(header[0], "key");
        assert_eq!(header[1], "uid");
        assert_eq!(header[9], "uid_mun");
        assert_eq!(header[16], "estado_del_proceso_mun");
        assert_eq!(header[17..], ["score", "valid"]);
    }

    #[test]
    fn writes_one_row_per_record() {
        let mut table = ChainTable::new();
        table.push(
            ChainLink {
                entity: contract("E1", Some("HUILA - ALCALDIA MUNICIPIO DE NEIVA")),
                target: contract("T1", None),
                score: 0.9,
            },
            0.8,
        );

        let mut out = Vec::new();
        write_csv(&table, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("key,uid,nombre_de_la_entidad"));
        assert!(lines[1].starts_with("0,E1,INVIAS"));
        assert!(lines[1].contains("\"VIA, RURAL\""));
        assert!(lines[1].ends_with(",0.9,true"));
    }

    #[test]
    fn writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.csv");
        write_csv_file(&ChainTable::new(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
