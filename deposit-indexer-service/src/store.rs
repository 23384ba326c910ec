use crate::datadog;
use crate::deposit::DepositRecord;
use crate::error::PersistenceError;
use crate::sql_stmt::{DB_BACKEND, HISTORY_NEWEST_FIRST, HISTORY_OLDEST_FIRST};
use async_trait::async_trait;
use deposit_db_entity::db::beacon_deposit;
use sea_orm::{sea_query::OnConflict, DatabaseConnection, EntityTrait, Statement};
use std::time::SystemTime;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertSummary {
    /// Rows actually written; keys already stored are skipped.
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

#[async_trait]
pub trait DepositStore: Send + Sync {
    async fn insert_many(&self, records: &[DepositRecord])
        -> Result<InsertSummary, PersistenceError>;

    async fn query(&self, start: u64, size: u64) -> Result<Vec<DepositRecord>, PersistenceError>;
}

pub struct SeaOrmDepositStore {
    db: DatabaseConnection,
    order: HistoryOrder,
    datadog_client: Option<datadog_apm::Client>,
}

impl SeaOrmDepositStore {
    pub fn new(
        db: DatabaseConnection,
        order: HistoryOrder,
        datadog_client: Option<datadog_apm::Client>,
    ) -> Self {
        Self {
            db,
            order,
            datadog_client,
        }
    }
}

#[async_trait]
impl DepositStore for SeaOrmDepositStore {
    async fn insert_many(
        &self,
        records: &[DepositRecord],
    ) -> Result<InsertSummary, PersistenceError> {
        if records.is_empty() {
            return Ok(InsertSummary { count: 0 });
        }
        let system_time_start = SystemTime::now();
        let models = records
            .iter()
            .cloned()
            .map(DepositRecord::into_active_model);
        let result = beacon_deposit::Entity::insert_many(models)
            .on_conflict(
                OnConflict::column(beacon_deposit::Column::NaturalKey)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await;

        match result {
            Ok(count) => {
                info!("Inserted {} of {} deposits", count, records.len());
                datadog::send_sql_trace(
                    self.datadog_client.as_ref(),
                    "beacon_deposit.insert_many",
                    "INSERT INTO beacon_deposit ON CONFLICT DO NOTHING",
                    count,
                    system_time_start,
                    None,
                );
                Ok(InsertSummary { count })
            }
            Err(db_error) => {
                warn!(
                    "Could not insert {} deposits starting at {:?}: {:?}",
                    records.len(),
                    records.first().map(|r| &r.natural_key),
                    db_error.to_string()
                );
                datadog::send_sql_trace(
                    self.datadog_client.as_ref(),
                    "beacon_deposit.insert_many",
                    "INSERT INTO beacon_deposit ON CONFLICT DO NOTHING",
                    0,
                    system_time_start,
                    Some(db_error.to_string()),
                );
                Err(PersistenceError::from(db_error))
            }
        }
    }

    async fn query(&self, start: u64, size: u64) -> Result<Vec<DepositRecord>, PersistenceError> {
        let system_time_start = SystemTime::now();
        let sql = match self.order {
            HistoryOrder::OldestFirst => HISTORY_OLDEST_FIRST,
            HistoryOrder::NewestFirst => HISTORY_NEWEST_FIRST,
        };
        let result = beacon_deposit::Entity::find()
            .from_raw_sql(Statement::from_sql_and_values(
                DB_BACKEND,
                sql,
                vec![(start as i64).into(), (size as i64).into()],
            ))
            .all(&self.db)
            .await;

        match result {
            Ok(models) => {
                datadog::send_sql_trace(
                    self.datadog_client.as_ref(),
                    "beacon_deposit.history",
                    sql,
                    models.len() as u64,
                    system_time_start,
                    None,
                );
                Ok(models.into_iter().map(DepositRecord::from).collect())
            }
            Err(db_error) => {
                warn!("Error fetching deposit history: {:?}", db_error);
                datadog::send_sql_trace(
                    self.datadog_client.as_ref(),
                    "beacon_deposit.history",
                    sql,
                    0,
                    system_time_start,
                    Some(db_error.to_string()),
                );
                Err(PersistenceError::from(db_error))
            }
        }
    }
}
