use std::path::PathBuf;

use sqlx::{ConnectOptions, SqliteConnection, sqlite::SqliteConnectOptions};
use tracing::instrument;

use crate::model::apperror::{ApplicationError, ErrorType};

/**
 * Locates and opens the per-year accident stores written by the import.
 */
#[derive(Debug, Clone)]
pub struct AccidentStore {
    /**
     * Directory holding one database file per year.
     */
    directory: PathBuf,
    /**
     * File name prefix, the year and `.db` follow it.
     */
    file_prefix: String,
}

impl AccidentStore {
    /**
     * Creates a new instance of `AccidentStore`.
     *
     * # Arguments
     * `directory`: Directory holding the yearly database files.
     * `file_prefix`: File name prefix, e.g. `accidents_` for `accidents_2023.db`.
     */
    pub fn new(directory: PathBuf, file_prefix: String) -> Self {
        AccidentStore { directory, file_prefix }
    }

    /**
     * Path of the database file of a year.
     */
    pub fn path(&self, year: i32) -> PathBuf {
        self.directory.join(format!("{}{year}.db", self.file_prefix))
    }

    /**
     * Opens the store of a year read-only. A missing file is never created.
     *
     * # Arguments
     * `year`: The report year.
     *
     * # Returns
     * A Result containing the open connection or a `StoreUnreachable` error.
     */
    #[instrument(skip(self))]
    pub async fn open(&self, year: i32) -> Result<SqliteConnection, ApplicationError> {
        let path = self.path(year);
        tracing::debug!("Opening accident store {}", path.display());
        SqliteConnectOptions::new()
            .filename(&path)
            .read_only(true)
            .create_if_missing(false)
            .connect()
            .await
            .map_err(|err| ApplicationError::new(ErrorType::StoreUnreachable, format!("No accident data available for {year}: {err}")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_path() {
        let store = AccidentStore::new(PathBuf::from("/data"), "accidents_".to_string());
        assert_eq!(store.path(2023), PathBuf::from("/data/accidents_2023.db"));
    }

    #[tokio::test]
    async fn test_open_missing_year() {
        let directory = tempfile::tempdir().unwrap();
        let store = AccidentStore::new(directory.path().to_path_buf(), "accidents_".to_string());
        let result = store.open(1999).await;
        assert_eq!(result.unwrap_err().error_type, ErrorType::StoreUnreachable);
        assert!(!store.path(1999).exists());
    }
}
