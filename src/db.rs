use std::path::Path;

use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::data;
use crate::models::{Campaign, SalesRecord};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn import_sales_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let records = data::load_sales(csv_path)?;
    let mut inserted = 0usize;

    for record in records {
        let transaction_key = record
            .transaction_id
            .clone()
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO outbreak_monitor.sales
            (id, transaction_key, medicine_name, category, branch_name, sale_date, sale_hour, age_group, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (transaction_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&transaction_key)
        .bind(&record.medicine_name)
        .bind(&record.category)
        .bind(&record.branch_name)
        .bind(record.date)
        .bind(i16::from(record.hour))
        .bind(&record.age_group)
        .bind(i32::try_from(record.quantity)?)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    info!(path = %csv_path.display(), inserted, "imported sales");
    Ok(inserted)
}

pub async fn import_campaigns_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let campaigns = data::load_campaigns(csv_path)?;
    let mut inserted = 0usize;

    for campaign in campaigns {
        let result = sqlx::query(
            r#"
            INSERT INTO outbreak_monitor.campaigns
            (id, campaign_name, category, discount_pct, budget, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (campaign_name, start_date) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&campaign.campaign_name)
        .bind(&campaign.category)
        .bind(campaign.discount_pct)
        .bind(campaign.budget)
        .bind(campaign.start_date)
        .bind(campaign.end_date)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    info!(path = %csv_path.display(), inserted, "imported campaigns");
    Ok(inserted)
}

pub async fn fetch_sales(
    pool: &PgPool,
    since_date: Option<NaiveDate>,
) -> anyhow::Result<Vec<SalesRecord>> {
    let mut query = String::from(
        "SELECT transaction_key, medicine_name, category, branch_name, sale_date, sale_hour, \
         age_group, quantity \
         FROM outbreak_monitor.sales",
    );
    if since_date.is_some() {
        query.push_str(" WHERE sale_date >= $1");
    }
    query.push_str(" ORDER BY sale_date, sale_hour, transaction_key");

    let mut rows = sqlx::query(&query);
    if let Some(value) = since_date {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut sales = Vec::with_capacity(records.len());

    for row in records {
        let hour: i16 = row.get("sale_hour");
        let quantity: i32 = row.get("quantity");
        sales.push(SalesRecord {
            transaction_id: Some(row.get("transaction_key")),
            medicine_name: row.get("medicine_name"),
            category: row.get("category"),
            branch_name: row.get("branch_name"),
            date: row.get("sale_date"),
            hour: u8::try_from(hour)?,
            age_group: row.get("age_group"),
            quantity: u32::try_from(quantity)?,
        });
    }

    Ok(sales)
}

pub async fn fetch_campaigns(pool: &PgPool) -> anyhow::Result<Vec<Campaign>> {
    let records = sqlx::query(
        "SELECT campaign_name, category, discount_pct, budget, start_date, end_date \
         FROM outbreak_monitor.campaigns ORDER BY start_date, campaign_name",
    )
    .fetch_all(pool)
    .await?;

    Ok(records
        .into_iter()
        .map(|row| Campaign {
            campaign_name: row.get("campaign_name"),
            category: row.get("category"),
            discount_pct: row.get("discount_pct"),
            budget: row.get("budget"),
            start_date: row.get("start_date"),
            end_date: row.get("end_date"),
        })
        .collect())
}
