use crate::error::Result;
use crate::product::ProductRecord;
use std::path::PathBuf;
use tracing::info;

/// Receives the final batch of a run.
pub trait OutputSink {
    fn push(&mut self, records: &[ProductRecord]) -> Result<()>;
}

/// Writes the batch as a pretty-printed JSON array, replacing the file.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileSink { path: path.into() }
    }
}

impl OutputSink for JsonFileSink {
    fn push(&mut self, records: &[ProductRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        std::fs::write(&self.path, json)?;
        info!("Wrote {} products to {}", records.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    pub batches: Vec<Vec<ProductRecord>>,
}

#[cfg(test)]
impl OutputSink for MemorySink {
    fn push(&mut self, records: &[ProductRecord]) -> Result<()> {
        self.batches.push(records.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_file_sink() {
        let path = std::env::temp_dir().join(format!("jula-sink-{}.json", std::process::id()));
        let mut sink = JsonFileSink::new(&path);
        let record = ProductRecord::empty("https://www.jula.no/catalog/a/b-1/");
        sink.push(&[record.clone()]).unwrap();

        let written: Vec<ProductRecord> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, vec![record]);
        std::fs::remove_file(&path).unwrap();
    }
}
