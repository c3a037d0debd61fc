//! Concrete pipeline stages.

mod export_po;
mod extract;
mod import_po;
mod read;
mod scan;
mod translate;
mod update;

pub use export_po::ExportPo;
pub use extract::ExtractKeys;
pub use import_po::ImportPo;
pub use read::ReadSource;
pub use scan::ScanCode;
pub use translate::MachineTranslate;
pub use update::UpdateCatalogs;
