use log::{info, warn};
use ndarray::{Array2, Array4};

use crate::lines::{self, DataRow, LineEvent};
use crate::source::LogBuffer;
use crate::types::{LogKind, PhysioError, ScanInfo};

/// Fixed preamble length of timing files from the era that mis-reported
/// the volume count (R016a and earlier diffusion data).
const LEGACY_HEADER_LINES: usize = 11;

/// Metadata assignments accumulated while scanning a log buffer.
///
/// Values stay optional until the whole buffer has been scanned and the
/// kind's required set is enforced; a key showing up in the wrong file
/// kind fails immediately.
#[derive(Debug, Default)]
struct Metadata {
    uuid: Option<String>,
    sample_time: Option<i64>,
    slices: Option<i64>,
    volumes: Option<i64>,
    echoes: Option<i64>,
    first_time: Option<i64>,
    last_time: Option<i64>,
    version_seen: bool,
    datatype_seen: bool,
}

impl Metadata {
    fn assign(&mut self, kind: LogKind, key: &str, value: &str) -> Result<(), PhysioError> {
        match key {
            "UUID" => self.uuid = Some(value.to_string()),
            "LogVersion" => {
                if value != crate::EXPECTED_VERSION {
                    return Err(PhysioError::FormatVersionMismatch(value.to_string()));
                }
                self.version_seen = true;
            }
            "LogDataType" => {
                if value != kind.data_type() {
                    return Err(PhysioError::DataTypeMismatch {
                        expected: kind.data_type(),
                        found: value.to_string(),
                    });
                }
                self.datatype_seen = true;
            }
            "SampleTime" => {
                check_placement(kind, "SampleTime", false)?;
                self.sample_time = Some(parse_int(value, "SampleTime")?);
            }
            "NumSlices" => {
                check_placement(kind, "NumSlices", true)?;
                self.slices = Some(parse_int(value, "NumSlices")?);
            }
            "NumVolumes" => {
                check_placement(kind, "NumVolumes", true)?;
                self.volumes = Some(parse_int(value, "NumVolumes")?);
            }
            "NumEchoes" => {
                check_placement(kind, "NumEchoes", true)?;
                self.echoes = Some(parse_int(value, "NumEchoes")?);
            }
            "FirstTime" => {
                check_placement(kind, "FirstTime", true)?;
                self.first_time = Some(parse_int(value, "FirstTime")?);
            }
            "LastTime" => {
                check_placement(kind, "LastTime", true)?;
                self.last_time = Some(parse_int(value, "LastTime")?);
            }
            // Unknown assignments (e.g. AcqTime annotations) are ignored
            _ => {}
        }
        Ok(())
    }
}

fn check_placement(kind: LogKind, field: &'static str, info_only: bool) -> Result<(), PhysioError> {
    let misplaced = if info_only {
        kind != LogKind::Info
    } else {
        kind == LogKind::Info
    };
    if misplaced {
        return Err(PhysioError::MisplacedField {
            field,
            kind: kind.data_type(),
        });
    }
    Ok(())
}

fn parse_int(value: &str, what: &'static str) -> Result<i64, PhysioError> {
    value.parse::<i64>().map_err(|_| PhysioError::InvalidValue {
        what,
        value: value.to_string(),
    })
}

fn require(value: Option<i64>, field: &'static str, kind: &'static str) -> Result<i64, PhysioError> {
    value.ok_or(PhysioError::MissingRequiredField { field, kind })
}

/// Decoded contents of the `*_Info.log` timing file.
#[derive(Debug, Clone)]
pub(crate) struct AcquisitionInfo {
    /// Start/finish ticks per [2, volume, slice, echo] cell, normalized to
    /// a zero-based timeline
    pub slice_map: Array4<i64>,
    pub uuid: String,
    pub scan: ScanInfo,
}

/// Parses the acquisition timing file into the slice map and scan metadata.
///
/// The buffer is scanned in two stages so the result does not depend on
/// where assignments sit relative to the data block: all assignments are
/// collected first, then the map is allocated at its full size and filled
/// from the data rows.
pub(crate) fn parse_acquisition_info(buffer: &LogBuffer) -> Result<AcquisitionInfo, PhysioError> {
    let kind = LogKind::Info.data_type();
    info!("Parsing {} data...", kind);

    let total_lines = buffer.text.lines().count();
    let events: Vec<LineEvent> = lines::events(&buffer.text).collect();

    let mut meta = Metadata::default();
    for event in &events {
        if let LineEvent::Assignment { key, value } = event {
            meta.assign(LogKind::Info, key, value)?;
        }
    }
    let scan = finish_header(&meta, total_lines)?;
    let uuid = meta.uuid.ok_or(PhysioError::MissingRequiredField {
        field: "UUID",
        kind,
    })?;

    let mut slice_map = Array4::zeros((2, scan.volumes, scan.slices, scan.echoes));
    let mut rows_seen = false;
    for event in &events {
        if let LineEvent::Data(row) = event {
            rows_seen = true;
            apply_timing_row(&mut slice_map, &scan, row)?;
        }
    }
    if !rows_seen {
        return Err(PhysioError::Other(
            "No acquisition timing rows found".to_string(),
        ));
    }

    // Normalize to a zero-based timeline
    slice_map.mapv_inplace(|tick| tick - scan.first_time);

    Ok(AcquisitionInfo {
        slice_map,
        uuid,
        scan,
    })
}

/// Validates the accumulated timing-file header and resolves the scan
/// geometry, applying the legacy volume-count correction where needed.
fn finish_header(meta: &Metadata, total_lines: usize) -> Result<ScanInfo, PhysioError> {
    let kind = LogKind::Info.data_type();
    if meta.uuid.is_none() {
        return Err(PhysioError::MissingRequiredField {
            field: "UUID",
            kind,
        });
    }
    if !meta.version_seen {
        return Err(PhysioError::MissingRequiredField {
            field: "LogVersion",
            kind,
        });
    }
    if !meta.datatype_seen {
        return Err(PhysioError::MissingRequiredField {
            field: "LogDataType",
            kind,
        });
    }
    let slices = require(meta.slices, "NumSlices", kind)?;
    let volumes = require(meta.volumes, "NumVolumes", kind)?;
    // The echoes parameter was not added until R015a, so default it for
    // compatibility with older data
    let echoes = meta.echoes.unwrap_or(1);
    let first_time = require(meta.first_time, "FirstTime", kind)?;
    let last_time = require(meta.last_time, "LastTime", kind)?;
    if slices < 1 || volumes < 1 || echoes < 1 {
        return Err(PhysioError::Other(
            "Failed reading acquisition header".to_string(),
        ));
    }

    let (slices, mut volumes, echoes) = (slices as usize, volumes as usize, echoes as usize);
    if volumes == 1 {
        // R016a and earlier diffusion data mis-report NumVolumes as 1; that
        // era's preamble is a fixed 11 lines, so the true count follows
        // from the file's total line count
        let cells = (slices * echoes) as i64;
        let data_lines = total_lines as i64 - LEGACY_HEADER_LINES as i64;
        if data_lines < cells || data_lines % cells != 0 {
            return Err(PhysioError::Other(format!(
                "Failed to correct the volume count from {} lines over {} slice/echo cells",
                total_lines, cells
            )));
        }
        volumes = (data_lines / cells) as usize;
        warn!(
            "Found NumVolumes = 1; correcting to {} for R016a and earlier diffusion data",
            volumes
        );
    }

    Ok(ScanInfo {
        slices,
        volumes,
        echoes,
        first_time,
        last_time,
    })
}

fn apply_timing_row(
    map: &mut Array4<i64>,
    scan: &ScanInfo,
    row: &DataRow,
) -> Result<(), PhysioError> {
    let volume = cell_index(row, 0, "volume", scan.volumes)?;
    let slice = cell_index(row, 1, "slice", scan.slices)?;
    let start = row.int_field(2, "start time")?;
    let finish = row.int_field(3, "finish time")?;

    // A physically present fifth field is an explicit echo index; a padded
    // row defaults to echo 0
    let explicit = row.present >= 5;
    let echo = if explicit {
        cell_index(row, 4, "echo", scan.echoes)?
    } else {
        0
    };

    let written = map[[0, volume, slice, echo]] != 0 || map[[1, volume, slice, echo]] != 0;
    if written {
        if explicit {
            return Err(PhysioError::DuplicateTimingEntry {
                volume,
                slice,
                echo,
            });
        }
        warn!(
            "Received duplicate timing data for vol{} slc{} (ignore for pre-R015a multi-echo data)",
            volume, slice
        );
    }
    map[[0, volume, slice, echo]] = start;
    map[[1, volume, slice, echo]] = finish;
    Ok(())
}

fn cell_index(
    row: &DataRow,
    index: usize,
    what: &'static str,
    bound: usize,
) -> Result<usize, PhysioError> {
    let value = row.int_field(index, what)?;
    if value < 0 || value as usize >= bound {
        return Err(PhysioError::Other(format!(
            "Timing entry {} {} lies outside the declared scan geometry",
            what, value
        )));
    }
    Ok(value as usize)
}

/// Reconstructed per-tick traces of one signal file.
#[derive(Debug, Clone)]
pub(crate) struct ChannelTrace {
    /// Shape: [expected_samples, lanes]
    pub traces: Array2<i64>,
    pub uuid: String,
}

/// Reconstructs the per-tick traces of one signal file by sample-and-hold
/// expansion of its sparse rows.
///
/// Staged like the timing parser: assignments first, then the trace array
/// is allocated at its final shape and filled.
pub(crate) fn parse_channel(
    buffer: &LogBuffer,
    first_time: i64,
    expected_samples: usize,
) -> Result<ChannelTrace, PhysioError> {
    let kind = buffer.kind.data_type();
    info!("Parsing {} data...", kind);

    let events: Vec<LineEvent> = lines::events(&buffer.text).collect();

    let mut meta = Metadata::default();
    for event in &events {
        if let LineEvent::Assignment { key, value } = event {
            meta.assign(buffer.kind, key, value)?;
        }
    }
    if !meta.version_seen {
        return Err(PhysioError::MissingRequiredField {
            field: "LogVersion",
            kind,
        });
    }
    if !meta.datatype_seen {
        return Err(PhysioError::MissingRequiredField {
            field: "LogDataType",
            kind,
        });
    }
    let sample_time = meta.sample_time.ok_or(PhysioError::MissingRequiredField {
        field: "SampleTime",
        kind,
    })?;
    let uuid = meta.uuid.ok_or(PhysioError::MissingRequiredField {
        field: "UUID",
        kind,
    })?;

    let mut traces = Array2::<i64>::zeros((expected_samples, buffer.kind.lanes()));
    for event in &events {
        if let LineEvent::Data(row) = event {
            let timestamp = row.int_field(0, "timestamp")?;
            let token = row.fields[1];
            let value = row.int_field(2, "value")?;
            let lane =
                buffer
                    .kind
                    .lane_index(token)
                    .ok_or_else(|| PhysioError::InvalidChannelToken {
                        kind,
                        token: token.to_string(),
                    })?;

            // Sample-and-hold: the reported value persists for
            // sample_time ticks; later rows overwrite on overlap
            let start = timestamp - first_time;
            let lo = start.max(0);
            let hi = (start + sample_time).min(expected_samples as i64);
            for tick in lo..hi {
                traces[[tick as usize, lane]] = value;
            }
        }
    }

    Ok(ChannelTrace { traces, uuid })
}
