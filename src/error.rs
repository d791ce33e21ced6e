use std::path::PathBuf;
use thiserror::Error;

/// A page specification the user typed could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid page specification: {0:?}")]
    InvalidFormat(String),

    #[error("Page specification selects more than {limit} pages")]
    TooManyPages { limit: usize },
}

/// A requested page does not exist in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Page {page} is out of range (1-{total})")]
pub struct ValidationError {
    pub page: u32,
    pub total: u32,
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Converter {program:?} is not available: {source}")]
    Unavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Conversion failed: {0}")]
    Failed(String),

    #[error("Converter produced no output at {}", .0.display())]
    MissingOutput(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Corrupt source document: {0}")]
    CorruptSource(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<lopdf::Error> for ExtractionError {
    fn from(e: lopdf::Error) -> Self {
        ExtractionError::CorruptSource(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum PrintError {
    #[error("No default printer is available")]
    NoDevice,

    #[error("Invalid printer name: {0:?}")]
    InvalidDevice(String),

    #[error("Printer failure: {0}")]
    DeviceFailure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Everything that can end a single print request.
#[derive(Debug, Error)]
pub enum PrintRequestError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Print(#[from] PrintError),

    #[error("The page specification selects no pages")]
    NothingToPrint,
}

impl PrintRequestError {
    /// Text shown to the person who asked for the print.
    pub fn user_message(&self) -> String {
        match self {
            PrintRequestError::Parse(ParseError::InvalidFormat(token)) => format!(
                "Page range error: {:?} is not a page number or range. \
                 Use something like '1-5', '1,3,5' or 'all'.",
                token
            ),
            PrintRequestError::Parse(e) => format!("Page range error: {}", e),
            PrintRequestError::Validation(e) => format!(
                "Invalid page range: page {} does not exist. The document has {} page(s).",
                e.page, e.total
            ),
            PrintRequestError::NothingToPrint => {
                "The page range selects no pages. Write ranges as 'start-end' with start <= end."
                    .to_string()
            }
            PrintRequestError::Conversion(_) => {
                "Could not convert the document to PDF. The file may be damaged.".to_string()
            }
            PrintRequestError::Extraction(_) => {
                "Error while processing the file. It may be damaged or not a valid document."
                    .to_string()
            }
            PrintRequestError::Print(PrintError::NoDevice) => {
                "The default printer is not available.".to_string()
            }
            PrintRequestError::Print(e) => format!("Printing failed: {}", e),
        }
    }
}
