use byteorder::{LittleEndian, ReadBytesExt};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{LogKind, PhysioError};

/// Private tag (group, element) that carries the encoded log files inside
/// a physio container.
pub const PHYSIO_TAG: (u16, u16) = (0x7fe1, 0x1010);

/// Private creator that owns [`PHYSIO_TAG`].
pub const PHYSIO_PRIVATE_CREATOR: &str = "SIEMENS CSA NON-IMAGE";

// Image type a physio container must declare, and the manufacturer the
// format is produced by
const EXPECTED_IMAGE_TYPE: [&str; 4] = ["ORIGINAL", "PRIMARY", "RAWDATA", "PHYSIO"];
const EXPECTED_MANUFACTURER: &str = "SIEMENS";

// Each embedded chunk is rows*1024 bytes; the first 1024 bytes are the
// header row (two LE u32 lengths plus the filename, rest reserved) and the
// log text starts at offset 1024
const CHUNK_COLUMN: usize = 1024;

/// Access to the imaging-container fields the physio decoder needs.
///
/// Parsing the container format itself is outside this crate; callers plug
/// in whatever DICOM reader they already use and implement these four
/// lookups against it.
pub trait ContainerReader {
    /// Value of the Manufacturer field.
    fn manufacturer(&self, path: &Path) -> Result<String, PhysioError>;

    /// Value of the ImageType field.
    fn image_type(&self, path: &Path) -> Result<Vec<String>, PhysioError>;

    /// Value of the AcquisitionNumber field.
    fn acquisition_number(&self, path: &Path) -> Result<usize, PhysioError>;

    /// Private creator and raw byte value of the given private tag.
    fn private_blob(
        &self,
        path: &Path,
        group: u16,
        element: u16,
    ) -> Result<(String, Vec<u8>), PhysioError>;
}

/// Raw text of one logical log file, tagged with its kind.
#[derive(Debug, Clone)]
pub(crate) struct LogBuffer {
    pub kind: LogKind,
    pub text: String,
}

/// The set of logical files located for one recording: the mandatory
/// timing file plus at least one signal file.
#[derive(Debug)]
pub(crate) struct Sources {
    pub info: LogBuffer,
    pub channels: Vec<LogBuffer>,
}

const CHANNEL_KINDS: [LogKind; 4] = [LogKind::Ecg, LogKind::Resp, LogKind::Puls, LogKind::Ext];

/// Resolves sibling `<base>_*.log` files next to the given base path.
///
/// The `_Info.log` file must exist; the four signal files are individually
/// optional, but at least one of them must be present.
pub(crate) fn locate_logfiles(base: &Path) -> Result<Sources, PhysioError> {
    let info_path = sibling_path(base, LogKind::Info);
    if !info_path.is_file() {
        return Err(PhysioError::SourceNotFound(format!(
            "{} not found",
            info_path.display()
        )));
    }
    info!("Reading: {}", info_path.display());
    let info = LogBuffer {
        kind: LogKind::Info,
        text: fs::read_to_string(&info_path)?,
    };

    let mut channels = Vec::new();
    for kind in CHANNEL_KINDS {
        let path = sibling_path(base, kind);
        if path.is_file() {
            info!("Reading: {}", path.display());
            channels.push(LogBuffer {
                kind,
                text: fs::read_to_string(&path)?,
            });
        }
    }

    require_channels(&channels)?;
    Ok(Sources { info, channels })
}

/// Splits the private-tag payload of an imaging container into the named
/// log files it embeds.
pub(crate) fn locate_embedded(
    path: &Path,
    container: &dyn ContainerReader,
) -> Result<Sources, PhysioError> {
    info!("Attempting to read embedded physio data from: {}", path.display());

    let manufacturer = container.manufacturer(path)?;
    if manufacturer != EXPECTED_MANUFACTURER {
        warn!(
            "Unsupported manufacturer: {}, this function is designed for {} advanced physiological logging data",
            manufacturer, EXPECTED_MANUFACTURER
        );
    }

    let image_type = container.image_type(path)?;
    if image_type != EXPECTED_IMAGE_TYPE {
        return Err(PhysioError::MalformedContainer(format!(
            "unexpected image type {:?}",
            image_type
        )));
    }

    let (creator, payload) = container.private_blob(path, PHYSIO_TAG.0, PHYSIO_TAG.1)?;
    if creator != PHYSIO_PRIVATE_CREATOR {
        return Err(PhysioError::MalformedContainer(format!(
            "unexpected private creator [{}]",
            creator
        )));
    }

    let rows = container.acquisition_number(path)?;
    split_embedded(&payload, rows)
}

/// Splits an embedded payload of `rows * 1024 * nrfiles` bytes into its
/// per-file chunks and routes each to its log kind by filename suffix.
fn split_embedded(payload: &[u8], rows: usize) -> Result<Sources, PhysioError> {
    if rows == 0 || payload.len() % rows != 0 {
        return Err(PhysioError::MalformedContainer(format!(
            "invalid image size: [rows x columns] = [{} x {}]",
            rows,
            payload.len() as f64 / rows.max(1) as f64
        )));
    }
    let columns = payload.len() / rows;
    if columns % CHUNK_COLUMN != 0 {
        return Err(PhysioError::MalformedContainer(format!(
            "invalid image size: [rows x columns] = [{} x {}]",
            rows, columns
        )));
    }
    let nrfiles = columns / CHUNK_COLUMN;
    let chunk_len = rows * CHUNK_COLUMN;

    let mut info = None;
    let mut slots: [Option<String>; 4] = [None, None, None, None];
    for idx in 0..nrfiles {
        let chunk = &payload[idx * chunk_len..(idx + 1) * chunk_len];
        let (filename, text) = decode_chunk(chunk)?;
        info!("Decoded: {}", filename);
        if filename.ends_with(LogKind::Info.file_suffix()) {
            info = Some(LogBuffer {
                kind: LogKind::Info,
                text,
            });
        } else if let Some(pos) = CHANNEL_KINDS
            .iter()
            .position(|kind| filename.ends_with(kind.file_suffix()))
        {
            slots[pos] = Some(text);
        }
    }

    let info = info.ok_or_else(|| {
        PhysioError::SourceNotFound("No Info log found in embedded physio data".to_string())
    })?;
    let mut channels = Vec::new();
    for (slot, kind) in slots.into_iter().zip(CHANNEL_KINDS) {
        if let Some(text) = slot {
            channels.push(LogBuffer { kind, text });
        }
    }
    require_channels(&channels)?;
    Ok(Sources { info, channels })
}

/// Decodes one chunk: LE u32 data length, LE u32 filename length, the
/// filename, then the log text at the fixed 1024-byte offset.
fn decode_chunk(chunk: &[u8]) -> Result<(String, String), PhysioError> {
    let mut header = &chunk[..8];
    let data_len = header.read_u32::<LittleEndian>()? as usize;
    let filename_len = header.read_u32::<LittleEndian>()? as usize;

    if 8 + filename_len > CHUNK_COLUMN {
        return Err(PhysioError::MalformedContainer(format!(
            "filename length {} overruns the chunk header",
            filename_len
        )));
    }
    let filename = std::str::from_utf8(&chunk[8..8 + filename_len])
        .map_err(|_| {
            PhysioError::MalformedContainer("embedded filename is not valid UTF-8".to_string())
        })?
        .to_string();

    if CHUNK_COLUMN + data_len > chunk.len() {
        return Err(PhysioError::MalformedContainer(format!(
            "data length {} overruns its chunk for {}",
            data_len, filename
        )));
    }
    let text = String::from_utf8(chunk[CHUNK_COLUMN..CHUNK_COLUMN + data_len].to_vec())
        .map_err(|_| {
            PhysioError::MalformedContainer(format!("log data of {} is not valid UTF-8", filename))
        })?;

    Ok((filename, text))
}

fn require_channels(channels: &[LogBuffer]) -> Result<(), PhysioError> {
    if channels.is_empty() {
        return Err(PhysioError::SourceNotFound(
            "No data files (ECG/RESP/PULS/EXT) found".to_string(),
        ));
    }
    Ok(())
}

fn sibling_path(base: &Path, kind: LogKind) -> PathBuf {
    // The suffix is appended to the final path component, not added as an
    // extension, so dots in the basename survive
    let mut name = base
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(kind.file_suffix());
    base.with_file_name(name)
}
