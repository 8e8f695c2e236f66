use sea_query::{ColumnDef, Index, SqliteQueryBuilder, Table};

use crate::schema::QueueEntries;

/// CREATE TABLE IF NOT EXISTS queue_entries (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     queue_name TEXT NOT NULL,
///     reference TEXT NOT NULL,
///     data TEXT NOT NULL,
///     queue_call_id INTEGER,
///     status TEXT NOT NULL,
///     message TEXT,
///     created_at TEXT NOT NULL,
///     updated_at TEXT NOT NULL
/// )
pub fn create_queue_entries_table() -> String {
    Table::create()
        .table(QueueEntries::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(QueueEntries::Id)
                .integer()
                .primary_key()
                .auto_increment(),
        )
        .col(ColumnDef::new(QueueEntries::QueueName).string().not_null())
        .col(ColumnDef::new(QueueEntries::Reference).string().not_null())
        .col(ColumnDef::new(QueueEntries::Data).string().not_null())
        .col(ColumnDef::new(QueueEntries::QueueCallId).big_integer().null())
        .col(ColumnDef::new(QueueEntries::Status).string().not_null())
        .col(ColumnDef::new(QueueEntries::Message).string().null())
        .col(ColumnDef::new(QueueEntries::CreatedAt).string().not_null())
        .col(ColumnDef::new(QueueEntries::UpdatedAt).string().not_null())
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_queue_entries_queue_status ON queue_entries(queue_name, status)
pub fn create_queue_status_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_queue_entries_queue_status")
        .table(QueueEntries::Table)
        .col(QueueEntries::QueueName)
        .col(QueueEntries::Status)
        .to_string(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ddl_mentions_all_columns() {
        let sql = create_queue_entries_table();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"queue_entries\""));
        for col in ["queue_name", "reference", "data", "queue_call_id", "status", "message"] {
            assert!(sql.contains(&format!("\"{}\"", col)), "missing {} in {}", col, sql);
        }
    }

    #[test]
    fn test_index_ddl() {
        let sql = create_queue_status_index();
        assert!(sql.contains("idx_queue_entries_queue_status"));
    }
}
