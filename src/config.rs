use chrono::{DateTime, Utc};

/// Knobs for a single image build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// System identifier written to the PVD (a-characters, 32 max)
    pub system_id: String,
    /// Application identifier written to the PVD (128 max)
    pub application_id: String,
    /// Publisher identifier (128 max)
    pub publisher_id: String,
    /// Data preparer identifier (128 max)
    pub data_preparer_id: String,
    /// Fixed timestamp for the volume descriptor dates. `None` = wall clock at build start.
    pub build_time: Option<DateTime<Utc>>,
    /// Sectors copied per read when streaming file content
    pub copy_chunk_sectors: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            system_id: String::new(),
            application_id: "ISOCREATOR-RS".to_string(),
            publisher_id: String::new(),
            data_preparer_id: String::new(),
            build_time: None,
            copy_chunk_sectors: 32, // 64 KiB per read
        }
    }
}

impl BuildOptions {
    /// Pin the descriptor dates, making repeated builds byte-identical.
    pub fn with_build_time(mut self, time: DateTime<Utc>) -> Self {
        self.build_time = Some(time);
        self
    }

    pub(crate) fn resolve_build_time(&self) -> DateTime<Utc> {
        self.build_time.unwrap_or_else(Utc::now)
    }
}
