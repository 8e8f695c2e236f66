use sea_query::{Expr, Order, Query, SqliteQueryBuilder};

use crate::schema::QueueEntries;

const ENTRY_COLUMNS: [QueueEntries; 9] = [
    QueueEntries::Id,
    QueueEntries::QueueName,
    QueueEntries::Reference,
    QueueEntries::Data,
    QueueEntries::QueueCallId,
    QueueEntries::Status,
    QueueEntries::Message,
    QueueEntries::CreatedAt,
    QueueEntries::UpdatedAt,
];

/// INSERT INTO queue_entries (queue_name, reference, data, queue_call_id, status, created_at, updated_at)
/// VALUES (?, ?, ?, ?, ?, ?, ?)
pub fn insert(
    queue_name: &str,
    reference: &str,
    data: &str,
    queue_call_id: Option<i64>,
    status: &str,
    now: &str,
) -> String {
    Query::insert()
        .into_table(QueueEntries::Table)
        .columns([
            QueueEntries::QueueName,
            QueueEntries::Reference,
            QueueEntries::Data,
            QueueEntries::QueueCallId,
            QueueEntries::Status,
            QueueEntries::CreatedAt,
            QueueEntries::UpdatedAt,
        ])
        .values_panic([
            queue_name.into(),
            reference.into(),
            data.into(),
            queue_call_id.into(),
            status.into(),
            now.into(),
            now.into(),
        ])
        .to_string(SqliteQueryBuilder)
}

/// SELECT ... FROM queue_entries WHERE queue_name = ? AND status = ? ORDER BY id
pub fn select_by_status(queue_name: &str, status: &str) -> String {
    Query::select()
        .columns(ENTRY_COLUMNS)
        .from(QueueEntries::Table)
        .and_where(Expr::col(QueueEntries::QueueName).eq(queue_name))
        .and_where(Expr::col(QueueEntries::Status).eq(status))
        .order_by(QueueEntries::Id, Order::Asc)
        .to_string(SqliteQueryBuilder)
}

/// SELECT ... FROM queue_entries WHERE queue_name = ? ORDER BY id
pub fn select_all(queue_name: &str) -> String {
    Query::select()
        .columns(ENTRY_COLUMNS)
        .from(QueueEntries::Table)
        .and_where(Expr::col(QueueEntries::QueueName).eq(queue_name))
        .order_by(QueueEntries::Id, Order::Asc)
        .to_string(SqliteQueryBuilder)
}

/// SELECT ... FROM queue_entries WHERE id = ?
pub fn select_by_id(id: i64) -> String {
    Query::select()
        .columns(ENTRY_COLUMNS)
        .from(QueueEntries::Table)
        .and_where(Expr::col(QueueEntries::Id).eq(id))
        .to_string(SqliteQueryBuilder)
}

/// UPDATE queue_entries SET status = ?, message = ?, updated_at = ? WHERE id = ?
pub fn update_status(id: i64, status: &str, message: Option<&str>, now: &str) -> String {
    Query::update()
        .table(QueueEntries::Table)
        .value(QueueEntries::Status, status)
        .value(QueueEntries::Message, message.map(str::to_string))
        .value(QueueEntries::UpdatedAt, now)
        .and_where(Expr::col(QueueEntries::Id).eq(id))
        .to_string(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_inlines_values() {
        let sql = insert("Q", "101", "f_101.mp3", Some(101), "PENDING", "t");
        assert!(sql.contains("'f_101.mp3'"));
        assert!(sql.contains("101"));
        assert!(sql.contains("'PENDING'"));
    }

    #[test]
    fn test_insert_without_structured_id() {
        let sql = insert("Q", "abc", "x.mp3", None, "PENDING", "t");
        assert!(sql.contains("NULL"));
    }

    #[test]
    fn test_select_escapes_quotes() {
        let sql = select_by_status("O'Brien", "DONE");
        assert!(sql.contains("'O''Brien'") || sql.contains("'O\\'Brien'"));
    }
}
