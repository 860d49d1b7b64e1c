use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};

use crate::models::{Period, PeriodType, SalesRecord};

/// Bucket key; ordering by start date is applied after aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PeriodKey {
    IsoWeek { year: i32, week: u32 },
    Month { year: i32, month: u32 },
}

impl PeriodKey {
    fn for_date(date: NaiveDate, period_type: PeriodType) -> Self {
        match period_type {
            PeriodType::Weekly => {
                let iso = date.iso_week();
                Self::IsoWeek {
                    year: iso.year(),
                    week: iso.week(),
                }
            }
            PeriodType::Monthly => Self::Month {
                year: date.year(),
                month: date.month(),
            },
        }
    }

    fn label(self) -> String {
        match self {
            Self::IsoWeek { year, week } => format!("{year}-W{week:02}"),
            Self::Month { year, month } => format!("{year}-{month:02}"),
        }
    }
}

/// Records for a single medicine, in input order.
pub fn medicine_history<'a>(sales: &'a [SalesRecord], medicine: &str) -> Vec<&'a SalesRecord> {
    sales.iter().filter(|record| record.medicine_name == medicine).collect()
}

/// Groups a medicine's sales into calendar periods sorted by start date.
///
/// Returns `None` when the medicine has no sales at all.
pub fn aggregate(
    sales: &[SalesRecord],
    medicine: &str,
    period_type: PeriodType,
) -> Option<Vec<Period>> {
    let history = medicine_history(sales, medicine);
    if history.is_empty() {
        return None;
    }
    Some(aggregate_history(&history, period_type))
}

pub(crate) fn aggregate_history(history: &[&SalesRecord], period_type: PeriodType) -> Vec<Period> {
    let mut buckets: HashMap<PeriodKey, (u64, NaiveDate, NaiveDate)> = HashMap::new();

    for record in history {
        let key = PeriodKey::for_date(record.date, period_type);
        let entry = buckets.entry(key).or_insert((0, record.date, record.date));
        entry.0 += u64::from(record.quantity);
        entry.1 = entry.1.min(record.date);
        entry.2 = entry.2.max(record.date);
    }

    let mut periods: Vec<Period> = buckets
        .into_iter()
        .map(|(key, (total_quantity, start_date, end_date))| Period {
            key: key.label(),
            total_quantity,
            start_date,
            end_date,
            span_days: (end_date - start_date).num_days() + 1,
        })
        .collect();

    periods.sort_by(|a, b| a.start_date.cmp(&b.start_date));
    periods
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(medicine: &str, date: &str, quantity: u32) -> SalesRecord {
        SalesRecord {
            transaction_id: None,
            medicine_name: medicine.to_string(),
            category: "Pain Relief".to_string(),
            branch_name: "Guardian Bedok".to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            hour: 10,
            age_group: "26-35".to_string(),
            quantity,
        }
    }

    #[test]
    fn unknown_medicine_has_no_periods() {
        let sales = vec![sale("Aspirin", "2024-03-04", 2)];
        assert!(aggregate(&sales, "Nonexistent Medicine", PeriodType::Weekly).is_none());
    }

    #[test]
    fn weekly_buckets_use_iso_year_and_week() {
        // 2024-12-30 falls in ISO week 1 of 2025.
        let sales = vec![
            sale("Aspirin", "2024-12-27", 3),
            sale("Aspirin", "2024-12-30", 4),
            sale("Aspirin", "2025-01-02", 1),
        ];

        let periods = aggregate(&sales, "Aspirin", PeriodType::Weekly).unwrap();
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].key, "2024-W52");
        assert_eq!(periods[0].total_quantity, 3);
        assert_eq!(periods[1].key, "2025-W01");
        assert_eq!(periods[1].total_quantity, 5);
        assert_eq!(periods[1].span_days, 4);
    }

    #[test]
    fn monthly_buckets_track_first_and_last_sale() {
        let sales = vec![
            sale("Aspirin", "2024-02-20", 1),
            sale("Aspirin", "2024-01-05", 2),
            sale("Aspirin", "2024-01-28", 2),
            sale("Vitamin C", "2024-01-10", 9),
        ];

        let periods = aggregate(&sales, "Aspirin", PeriodType::Monthly).unwrap();
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].key, "2024-01");
        assert_eq!(periods[0].total_quantity, 4);
        assert_eq!(periods[0].span_days, 24);
        assert!(periods[0].is_valid(PeriodType::Monthly));
        assert_eq!(periods[1].key, "2024-02");
        assert!(!periods[1].is_valid(PeriodType::Monthly));
    }
}
