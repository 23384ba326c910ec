use datadog_apm::{ErrorInfo, Span, SqlInfo, Trace};
use std::{
    collections::HashMap,
    time::{Duration, SystemTime},
};
use tracing::warn;

pub const DB_NAME: &str = "beacon_deposit";

pub fn send_sql_trace(
    datadog_client: Option<&datadog_apm::Client>,
    name: &str,
    query: &str,
    rows: u64,
    system_time_start: SystemTime,
    error: Option<String>,
) {
    let datadog_client = match datadog_client {
        Some(client) => client,
        None => return,
    };
    let duration = match SystemTime::now().duration_since(system_time_start) {
        Ok(d) => d,
        Err(error) => {
            warn!("Failed calculating duration: {}", error);
            Duration::from_millis(0)
        }
    };

    let span = Span {
        id: 1,
        parent_id: None,
        name: name.to_owned(),
        resource: name.to_owned(),
        // web, db, cache, custom
        r#type: "db".to_owned(),
        start: system_time_start,
        duration,
        http: None,
        error: error.map(|msg| ErrorInfo {
            r#type: "PersistenceError".to_owned(),
            msg,
            stack: "".to_owned(),
        }),
        sql: Some(SqlInfo {
            query: query.to_owned(),
            rows: rows.to_string(),
            db: DB_NAME.to_owned(),
        }),
        tags: HashMap::new(),
    };

    let trace = Trace {
        id: 1,
        priority: 1,
        spans: vec![span],
    };

    datadog_client.clone().send_trace(trace);
}
