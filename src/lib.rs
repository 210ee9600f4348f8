//! Import SIEMENS advanced physiological logging data (>=R013, >=VD13A).
//!
//! A recording is expected either as a set of individual log files
//! (`*_ECG.log`, `*_RESP.log`, `*_PULS.log`, `*_EXT.log`, `*_Info.log`)
//! written by >=R013 sequences, or as a single encoded payload inside a
//! "_PHYSIO" DICOM file written by >=R015 sequences. Sparse logged samples
//! are expanded into per-tick traces (2.5 ms per tick) covering the whole
//! scan, together with the per-slice/volume/echo acquisition timing map
//! and an acquisition-active mask.

mod lines;
mod parser;
mod reader;
mod source;
pub mod types;

use std::path::Path;

// Re-export types
pub use source::{ContainerReader, PHYSIO_PRIVATE_CREATOR, PHYSIO_TAG};
pub use types::*;

/// Log file format version this crate understands.
pub const EXPECTED_VERSION: &str = "EJA_1";

/// Loads a recording from sibling log files and returns a struct
/// representation.
///
/// `base` is the shared basename of the log files, i.e. the full path
/// without the `_ECG.log` / `_Info.log` suffix. The `_Info.log` timing
/// file must exist; at least one of the four signal files must exist.
/// Physio data embedded in a DICOM file is handled by [`load_embedded`]
/// instead.
///
/// # Examples
///
/// ```no_run
/// use physio_importer::load;
///
/// let result = load("path/to/Physio_20200428_142451_007e910e");
/// match result {
///     Ok(physio) => println!("Scan duration: {:.2} s", physio.duration()),
///     Err(e) => println!("Error loading physio data: {}", e),
/// }
/// ```
pub fn load<P: AsRef<Path>>(base: P) -> Result<PhysioRecording, PhysioError> {
    let base = base.as_ref();
    if base.is_file() {
        return Err(PhysioError::Other(format!(
            "{} is a single file; embedded physio data must be read with load_embedded and a container reader",
            base.display()
        )));
    }
    reader::load_logfiles(base)
}

/// Loads a recording embedded in an imaging container file.
///
/// The container format itself is not parsed here; `container` supplies
/// the handful of fields the decoder needs (see [`ContainerReader`]). The
/// private-tag payload is split into the same logical log files the
/// sibling-file layout would provide and decoded identically.
pub fn load_embedded<P: AsRef<Path>, C: ContainerReader>(
    path: P,
    container: &C,
) -> Result<PhysioRecording, PhysioError> {
    reader::load_embedded(path.as_ref(), container)
}
