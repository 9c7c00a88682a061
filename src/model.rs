/// Values of the reading list's `Status` select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingStatus {
    ToRead,
    Reading,
    Read,
}

impl ReadingStatus {
    pub const ALL: [ReadingStatus; 3] = [
        ReadingStatus::ToRead,
        ReadingStatus::Reading,
        ReadingStatus::Read,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::ToRead => "To Read",
            ReadingStatus::Reading => "Reading",
            ReadingStatus::Read => "Read",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            ReadingStatus::ToRead => "red",
            ReadingStatus::Reading => "yellow",
            ReadingStatus::Read => "green",
        }
    }
}

/// One block or file that could not be processed. Recorded, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub subject: String,
    pub detail: String,
}

impl ItemFailure {
    pub fn new(subject: impl Into<String>, err: &anyhow::Error) -> Self {
        Self {
            subject: subject.into(),
            detail: format!("{:#}", err),
        }
    }
}
