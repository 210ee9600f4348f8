use ndarray::{Array1, Array4};
use std::error::Error;
use std::fmt;
use std::io;

/// Duration of one physiological clock tick in seconds (2.5 ms).
pub const TICK_SECONDS: f64 = 0.0025;

/// Logical kind of one physiological log file.
///
/// A recording consists of one `Info` timing file plus any combination of
/// the four signal files. The kind decides which metadata keys are legal
/// and how data rows are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// Acquisition timing information (`*_Info.log`)
    Info,
    /// Electrocardiogram, up to four electrodes (`*_ECG.log`)
    Ecg,
    /// Respiration belt (`*_RESP.log`)
    Resp,
    /// Pulse oximeter (`*_PULS.log`)
    Puls,
    /// External trigger inputs (`*_EXT.log`)
    Ext,
}

impl LogKind {
    /// The `LogDataType` literal this kind must declare.
    pub fn data_type(self) -> &'static str {
        match self {
            LogKind::Info => "ACQUISITION_INFO",
            LogKind::Ecg => "ECG",
            LogKind::Resp => "RESP",
            LogKind::Puls => "PULS",
            LogKind::Ext => "EXT",
        }
    }

    /// Filename suffix used by both the sibling-file and embedded layouts.
    pub fn file_suffix(self) -> &'static str {
        match self {
            LogKind::Info => "_Info.log",
            LogKind::Ecg => "_ECG.log",
            LogKind::Resp => "_RESP.log",
            LogKind::Puls => "_PULS.log",
            LogKind::Ext => "_EXT.log",
        }
    }

    /// Number of signal lanes carried by this file kind.
    pub fn lanes(self) -> usize {
        match self {
            LogKind::Info => 0,
            LogKind::Ecg => 4,
            LogKind::Resp | LogKind::Puls => 1,
            LogKind::Ext => 2,
        }
    }

    /// Maps a channel token from a data row to its lane index.
    ///
    /// ECG and EXT rows name their lane explicitly; RESP and PULS carry a
    /// single lane and the token is not checked.
    pub fn lane_index(self, token: &str) -> Option<usize> {
        match self {
            LogKind::Ecg => ["ECG1", "ECG2", "ECG3", "ECG4"]
                .iter()
                .position(|&name| name == token),
            LogKind::Ext => ["EXT", "EXT2"].iter().position(|&name| name == token),
            LogKind::Resp | LogKind::Puls => Some(0),
            LogKind::Info => None,
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.data_type())
    }
}

/// Scan-level metadata from the `*_Info.log` timing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanInfo {
    /// Number of slices per volume
    pub slices: usize,
    /// Number of volumes in the scan
    pub volumes: usize,
    /// Number of echoes per slice/volume (1 for data predating multi-echo support)
    pub echoes: usize,
    /// First timestamp of the scan, in ticks
    pub first_time: i64,
    /// Last timestamp of the scan, in ticks
    pub last_time: i64,
}

impl ScanInfo {
    /// Number of ticks actually covered by the scan.
    pub fn actual_samples(&self) -> usize {
        (self.last_time - self.first_time + 1) as usize
    }

    /// Length of every reconstructed trace: the actual tick count plus a
    /// fixed tail so a hold interval starting on the last tick still fits.
    pub fn expected_samples(&self) -> usize {
        self.actual_samples() + 8
    }
}

/// Decoded physiological recording for one scan.
///
/// This is the top-level struct returned by the `load` functions. Traces
/// are per-tick arrays of length [`ScanInfo::expected_samples`]; a signal
/// field is `Some` only if its log file was found and the lane registered
/// at least one nonzero sample.
///
/// # Examples
///
/// ```no_run
/// use physio_importer::load;
///
/// let physio = load("path/to/Physio_20200428_142451_007e910e").unwrap();
/// println!("Scan duration: {:.2} seconds", physio.duration());
/// if let Some(resp) = &physio.resp {
///     println!("First RESP sample: {}", resp[0]);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct PhysioRecording {
    /// Unique identifier shared by all log files of one measurement
    pub uuid: String,
    /// Scan geometry and timestamp range
    pub info: ScanInfo,
    /// Start/finish tick of each acquisition window
    /// - Shape: [2, volumes, slices, echoes], index 0 = start, 1 = finish
    /// - Normalized so the scan starts at tick 0
    pub slice_map: Array4<i64>,
    /// Whether any slice/volume/echo was being acquired at each tick
    pub acq: Array1<bool>,
    /// ECG signal, electrode 1
    pub ecg1: Option<Array1<i64>>,
    /// ECG signal, electrode 2
    pub ecg2: Option<Array1<i64>>,
    /// ECG signal, electrode 3
    pub ecg3: Option<Array1<i64>>,
    /// ECG signal, electrode 4
    pub ecg4: Option<Array1<i64>>,
    /// Respiration signal
    pub resp: Option<Array1<i64>>,
    /// Pulse oximetry signal
    pub puls: Option<Array1<i64>>,
    /// First external trigger channel (nonzero while a signal is detected)
    pub ext: Option<Array1<i64>>,
    /// Second external trigger channel
    pub ext2: Option<Array1<i64>>,
}

impl PhysioRecording {
    /// Returns the scan duration in seconds (ticks are 2.5 ms).
    pub fn duration(&self) -> f64 {
        self.info.actual_samples() as f64 * TICK_SECONDS
    }

    /// Returns the length of the reconstructed traces in ticks.
    pub fn num_samples(&self) -> usize {
        self.acq.len()
    }

    /// Names and traces of the signals that were active in this recording.
    pub fn active_signals(&self) -> Vec<(&'static str, &Array1<i64>)> {
        let mut signals = Vec::new();
        for (name, trace) in [
            ("ECG1", &self.ecg1),
            ("ECG2", &self.ecg2),
            ("ECG3", &self.ecg3),
            ("ECG4", &self.ecg4),
            ("RESP", &self.resp),
            ("PULS", &self.puls),
            ("EXT", &self.ext),
            ("EXT2", &self.ext2),
        ] {
            if let Some(trace) = trace {
                signals.push((name, trace));
            }
        }
        signals
    }
}

/// Custom error types for the physio importer.
///
/// Every variant aborts the whole load; the only recovered condition is a
/// duplicate timing row with a defaulted echo index, which is logged as a
/// warning instead.
#[derive(Debug)]
pub enum PhysioError {
    /// The log file declares a format version other than the supported one
    FormatVersionMismatch(String),
    /// A log file carries data of a different kind than its name promises
    DataTypeMismatch {
        /// Kind the file was read as
        expected: &'static str,
        /// `LogDataType` the file actually declared
        found: String,
    },
    /// A metadata key required for this file kind never appeared
    MissingRequiredField {
        /// Name of the absent key
        field: &'static str,
        /// Kind of file it was required in
        kind: &'static str,
    },
    /// A metadata key appeared in a file kind it does not belong to
    MisplacedField {
        /// Name of the offending key
        field: &'static str,
        /// Kind of file it appeared in
        kind: &'static str,
    },
    /// The embedded container failed a structural check
    MalformedContainer(String),
    /// Two timing rows with explicit echo indices target the same cell
    DuplicateTimingEntry {
        /// Volume index of the cell
        volume: usize,
        /// Slice index of the cell
        slice: usize,
        /// Echo index of the cell
        echo: usize,
    },
    /// A data row names a signal lane this file kind does not have
    InvalidChannelToken {
        /// Kind of file the row appeared in
        kind: &'static str,
        /// The unrecognized channel token
        token: String,
    },
    /// A signal file belongs to a different measurement than the Info file
    UuidMismatch(&'static str),
    /// The declared last timestamp does not lie after the first
    TimestampOrder {
        /// Declared first timestamp, in ticks
        first: i64,
        /// Declared last timestamp, in ticks
        last: i64,
    },
    /// The mandatory Info file, or all four signal files, were missing
    SourceNotFound(String),
    /// A field that must be an integer could not be parsed as one
    InvalidValue {
        /// What the field represents
        what: &'static str,
        /// The text that failed to parse
        value: String,
    },
    /// An I/O error occurred while reading log files
    IoError(io::Error),
    /// A general error with a custom message
    Other(String),
}

impl fmt::Display for PhysioError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PhysioError::FormatVersionMismatch(found) => write!(
                f,
                "File format [{}] not supported (expected [{}])",
                found,
                crate::EXPECTED_VERSION
            ),
            PhysioError::DataTypeMismatch { expected, found } => write!(
                f,
                "Expected [{}] data, found [{}]? Check filenames?",
                expected, found
            ),
            PhysioError::MissingRequiredField { field, kind } => {
                write!(f, "Missing required [{}] parameter in {} data", field, kind)
            }
            PhysioError::MisplacedField { field, kind } => {
                write!(f, "Invalid [{}] parameter found in {} data", field, kind)
            }
            PhysioError::MalformedContainer(msg) => write!(f, "Invalid physio container: {}", msg),
            PhysioError::DuplicateTimingEntry {
                volume,
                slice,
                echo,
            } => write!(
                f,
                "Received duplicate timing data for vol{} slc{} eco{}",
                volume, slice, echo
            ),
            PhysioError::InvalidChannelToken { kind, token } => {
                write!(f, "Invalid {} channel ID [{}]", kind, token)
            }
            PhysioError::UuidMismatch(kind) => {
                write!(f, "UUID mismatch between Info and {} files", kind)
            }
            PhysioError::TimestampOrder { first, last } => write!(
                f,
                "Last timestamp {} is not greater than first timestamp {}",
                last, first
            ),
            PhysioError::SourceNotFound(msg) => write!(f, "{}", msg),
            PhysioError::InvalidValue { what, value } => {
                write!(f, "Invalid numeric value [{}] for {}", value, what)
            }
            PhysioError::IoError(e) => write!(f, "IO error: {}", e),
            PhysioError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error for PhysioError {}

impl From<io::Error> for PhysioError {
    fn from(error: io::Error) -> Self {
        PhysioError::IoError(error)
    }
}
