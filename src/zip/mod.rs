mod directory;
mod records;
mod unzipper;

pub use directory::CentralDirectory;
pub use records::{CompressionLevel, CompressionMethod, EndOfCentralDirectory, FileEntry};
pub use unzipper::{StreamProgress, Unzipper};
