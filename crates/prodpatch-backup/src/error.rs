use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackupError {
    /// `id` is `None` when the newest backup was requested and none exist.
    #[error("{}", not_found_message(.package, .id.as_deref()))]
    NotFound { package: String, id: Option<String> },

    #[error("backup {name} for {package} would not sort after existing backup {newest}")]
    OutOfOrder {
        package: String,
        name: String,
        newest: String,
    },
}

fn not_found_message(package: &str, id: Option<&str>) -> String {
    match id {
        Some(id) => format!("backup {id} not found for {package}"),
        None => format!("no backups found for {package}"),
    }
}
