//! Snapshot codec for the ledger.
//!
//! The snapshot is a CSV file with the fixed column set
//! `url,provenance,added_at,downloaded,is_404,is_corrupted,artifact_name`.
//! An empty `artifact_name` field decodes to `None`; boolean columns
//! missing from older snapshots decode to `false`, which keeps the schema
//! additive and backward-compatible.

use super::error::LedgerError;
use super::record::UrlRecord;
use super::Ledger;

/// Encodes a ledger into snapshot bytes.
///
/// Records are written in ledger iteration order (ascending URL), so
/// identical ledgers always produce identical snapshots.
///
/// # Errors
///
/// Returns [`LedgerError::Snapshot`] when serialization fails.
pub fn encode(ledger: &Ledger) -> Result<Vec<u8>, LedgerError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in ledger.records() {
        writer
            .serialize(record)
            .map_err(|e| LedgerError::snapshot(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| LedgerError::snapshot(e.to_string()))
}

/// Decodes snapshot bytes into a ledger.
///
/// # Errors
///
/// Returns [`LedgerError::Snapshot`] on malformed rows and
/// [`LedgerError::DuplicateUrl`] when the same URL appears twice.
pub fn decode(bytes: &[u8]) -> Result<Ledger, LedgerError> {
    let mut reader = csv::Reader::from_reader(bytes);
    let mut ledger = Ledger::new();
    for row in reader.deserialize::<UrlRecord>() {
        let record = row.map_err(|e| LedgerError::snapshot(e.to_string()))?;
        if ledger.get(&record.url).is_some() {
            return Err(LedgerError::DuplicateUrl { url: record.url });
        }
        ledger.insert(record);
    }
    Ok(ledger)
}
