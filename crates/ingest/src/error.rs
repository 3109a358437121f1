use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("Workbook read failed: {0}")]
    Workbook(String),
    #[error("Workbook has no sheets")]
    NoSheets,
    #[error("CSV read failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<calamine::Error> for NormalizeError {
    fn from(e: calamine::Error) -> Self {
        NormalizeError::Workbook(e.to_string())
    }
}
