use sea_orm::DbErr;
use temps_table::TableError;

/// Database failures surface as backend errors of the table engine
pub(crate) fn db_error(err: DbErr) -> TableError {
    match err {
        DbErr::RecordNotFound(msg) => TableError::backend(format!("record not found: {}", msg)),
        other => TableError::backend(other.to_string()),
    }
}
