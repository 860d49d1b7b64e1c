use std::path::Path;

use tracing::{info, warn};

use crate::error::DataError;
use crate::models::{Campaign, SalesRecord};

fn read_rows<T>(path: &Path) -> Result<Vec<T>, DataError>
where
    T: serde::de::DeserializeOwned,
{
    let mut reader = csv::Reader::from_path(path).map_err(|source| DataError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut rows = Vec::new();
    for (index, result) in reader.deserialize::<T>().enumerate() {
        // Header is line 1.
        let row = result.map_err(|source| DataError::Row {
            path: path.to_path_buf(),
            row: index + 2,
            source,
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Loads sales transactions; columns the engine does not use are ignored.
pub fn load_sales(path: &Path) -> Result<Vec<SalesRecord>, DataError> {
    let records: Vec<SalesRecord> = read_rows(path)?;

    for (index, record) in records.iter().enumerate() {
        let reason = if record.hour > 23 {
            Some(format!("hour {} is outside 0-23", record.hour))
        } else if record.quantity == 0 {
            Some("quantity must be positive".to_string())
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(DataError::InvalidRecord {
                path: path.to_path_buf(),
                row: index + 2,
                reason,
            });
        }
    }

    info!(path = %path.display(), records = records.len(), "loaded sales");
    Ok(records)
}

/// Loads campaigns. A missing or unreadable file means no active campaigns.
pub fn load_campaigns(path: &Path) -> Result<Vec<Campaign>, DataError> {
    match read_rows(path) {
        Ok(campaigns) => {
            info!(path = %path.display(), campaigns = campaigns.len(), "loaded campaigns");
            Ok(campaigns)
        }
        Err(DataError::Open { path, source }) => {
            warn!(
                path = %path.display(),
                error = %source,
                "campaign data unavailable; continuing without campaigns"
            );
            Ok(Vec::new())
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_sales_ignoring_extra_columns() {
        let file = write_csv(
            "transaction_id,branch_id,branch_name,date,hour,age_group,category,medicine_name,quantity,amount\n\
             TXN0000001,B001,Guardian Ang Mo Kio,2024-01-03,9,26-35,Cold & Flu,Paracetamol 500mg,2,17.0\n\
             TXN0000002,B002,Guardian Bedok,2024-01-03,14,51+,Chronic,Diabetes Med,1,65.0\n",
        );

        let sales = load_sales(file.path()).unwrap();
        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0].transaction_id.as_deref(), Some("TXN0000001"));
        assert_eq!(sales[0].medicine_name, "Paracetamol 500mg");
        assert_eq!(sales[1].hour, 14);
    }

    #[test]
    fn rejects_out_of_range_hours() {
        let file = write_csv(
            "branch_name,date,hour,age_group,category,medicine_name,quantity\n\
             Guardian Bedok,2024-01-03,25,51+,Chronic,Diabetes Med,1\n",
        );

        let err = load_sales(file.path()).unwrap_err();
        assert!(matches!(err, DataError::InvalidRecord { row: 2, .. }));
    }

    #[test]
    fn missing_campaign_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let campaigns = load_campaigns(&dir.path().join("campaigns.csv")).unwrap();
        assert!(campaigns.is_empty());
    }

    #[test]
    fn loads_campaigns_with_integer_discounts() {
        let file = write_csv(
            "campaign_id,campaign_name,start_date,end_date,target_segment,category,discount_pct,budget,branches,status\n\
             CAMP001,Flu Season Prep,2024-02-15,2024-02-22,All Customers,Cold & Flu,15,5000,All,Completed\n",
        );

        let campaigns = load_campaigns(file.path()).unwrap();
        assert_eq!(campaigns.len(), 1);
        assert_eq!(campaigns[0].discount_pct, 15.0);
        assert_eq!(campaigns[0].category, "Cold & Flu");
    }
}
