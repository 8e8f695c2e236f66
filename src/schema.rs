use sea_query::Iden;

/// Queue entries table - one row per attempted recording transfer
#[derive(Iden)]
pub enum QueueEntries {
    Table,
    Id,
    QueueName,
    Reference,
    Data,
    QueueCallId,
    Status,
    Message,
    CreatedAt,
    UpdatedAt,
}
