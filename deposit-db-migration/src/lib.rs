pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_table;
mod m20240301_000002_create_index;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_table::Migration),
            Box::new(m20240301_000002_create_index::Migration),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_ordered() {
        let names: Vec<String> = Migrator::migrations()
            .iter()
            .map(|m| m.name().to_owned())
            .collect();

        assert_eq!(
            names,
            vec![
                "m20240301_000001_create_table",
                "m20240301_000002_create_index"
            ]
        );
    }
}
