use sea_orm::DbBackend;

pub const DB_BACKEND: DbBackend = DbBackend::Postgres;

pub const HISTORY_OLDEST_FIRST: &str = r#"SELECT * FROM beacon_deposit
	ORDER BY block_number ASC, log_index ASC NULLS FIRST, natural_key ASC
	OFFSET $1 ROWS LIMIT $2"#;

pub const HISTORY_NEWEST_FIRST: &str = r#"SELECT * FROM beacon_deposit
	ORDER BY block_number DESC, log_index DESC NULLS LAST, natural_key DESC
	OFFSET $1 ROWS LIMIT $2"#;
