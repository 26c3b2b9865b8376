use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Host data directory. Every engine path is resolved against it so the
    /// whole data set can be moved as a unit.
    pub data_dir: PathBuf,
    /// Engine database directory, relative to `data_dir`.
    pub database_dir: PathBuf,
    pub database_name: String,
    /// Host server encoding name, e.g. "UTF8".
    pub encoding: String,

    // Embedded engine
    pub response_chunk_size: usize,             // Bytes per streamed response chunk

    // Take the index lock in shared mode around scan commands
    pub lock_scans: bool,

    // Generic index cost estimation
    pub random_page_cost: f64,
    pub cpu_index_tuple_cost: f64,
    pub cpu_operator_cost: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("./data"),
            database_dir: PathBuf::from("base/1"),
            database_name: "grn".to_string(),
            encoding: "UTF8".to_string(),

            response_chunk_size: 64 * 1024,            // 64KB per chunk

            lock_scans: false,

            random_page_cost: 4.0,
            cpu_index_tuple_cost: 0.005,
            cpu_operator_cost: 0.0025,
        }
    }
}

impl Config {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Config {
            data_dir: data_dir.into(),
            ..Config::default()
        }
    }

    /// Path of the engine database, relative to `data_dir`.
    pub fn database_path(&self) -> PathBuf {
        self.database_dir.join(&self.database_name)
    }
}
