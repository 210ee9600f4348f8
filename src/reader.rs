use log::info;
use ndarray::{Array1, Array2, Array4};
use std::path::Path;

use crate::parser::{parse_acquisition_info, parse_channel};
use crate::source::{self, ContainerReader, Sources};
use crate::types::{LogKind, PhysioError, PhysioRecording, TICK_SECONDS};

/// Loads a recording from sibling `<base>_*.log` files.
pub(crate) fn load_logfiles(base: &Path) -> Result<PhysioRecording, PhysioError> {
    assemble(source::locate_logfiles(base)?)
}

/// Loads a recording embedded in an imaging container file.
pub(crate) fn load_embedded(
    path: &Path,
    container: &dyn ContainerReader,
) -> Result<PhysioRecording, PhysioError> {
    assemble(source::locate_embedded(path, container)?)
}

/// Parses the located buffers, cross-validates them, and assembles the
/// final recording.
fn assemble(sources: Sources) -> Result<PhysioRecording, PhysioError> {
    let acq_info = parse_acquisition_info(&sources.info)?;
    let scan = acq_info.scan;
    if scan.last_time <= scan.first_time {
        return Err(PhysioError::TimestampOrder {
            first: scan.first_time,
            last: scan.last_time,
        });
    }
    let expected_samples = scan.expected_samples();

    info!("Slices in scan:      {}", scan.slices);
    info!("Volumes in scan:     {}", scan.volumes);
    info!("Echoes per slc/vol:  {}", scan.echoes);
    info!("First timestamp:     {}", scan.first_time);
    info!("Last timestamp:      {}", scan.last_time);
    info!(
        "Total scan duration: {} ticks = {:.4} s",
        scan.actual_samples(),
        scan.actual_samples() as f64 * TICK_SECONDS
    );

    // Every signal file must belong to the same measurement as the
    // timing file
    let mut ecg = None;
    let mut resp = None;
    let mut puls = None;
    let mut ext = None;
    for buffer in &sources.channels {
        let channel = parse_channel(buffer, scan.first_time, expected_samples)?;
        if channel.uuid != acq_info.uuid {
            return Err(PhysioError::UuidMismatch(buffer.kind.data_type()));
        }
        match buffer.kind {
            LogKind::Ecg => ecg = Some(channel.traces),
            LogKind::Resp => resp = Some(channel.traces),
            LogKind::Puls => puls = Some(channel.traces),
            LogKind::Ext => ext = Some(channel.traces),
            LogKind::Info => {}
        }
    }

    info!("Formatting ACQ data...");
    let acq = acquisition_mask(&acq_info.slice_map, expected_samples);

    let mut physio = PhysioRecording {
        uuid: acq_info.uuid,
        info: scan,
        slice_map: acq_info.slice_map,
        acq,
        ecg1: None,
        ecg2: None,
        ecg3: None,
        ecg4: None,
        resp: None,
        puls: None,
        ext: None,
        ext2: None,
    };
    if let Some(traces) = ecg {
        physio.ecg1 = active_lane(&traces, 0);
        physio.ecg2 = active_lane(&traces, 1);
        physio.ecg3 = active_lane(&traces, 2);
        physio.ecg4 = active_lane(&traces, 3);
    }
    if let Some(traces) = resp {
        physio.resp = active_lane(&traces, 0);
    }
    if let Some(traces) = puls {
        physio.puls = active_lane(&traces, 0);
    }
    if let Some(traces) = ext {
        physio.ext = active_lane(&traces, 0);
        physio.ext2 = active_lane(&traces, 1);
    }
    Ok(physio)
}

/// Marks every tick inside a slice/volume/echo acquisition window,
/// start and finish inclusive.
fn acquisition_mask(slice_map: &Array4<i64>, expected_samples: usize) -> Array1<bool> {
    let mut acq = Array1::from_elem(expected_samples, false);
    let shape = slice_map.shape();
    for volume in 0..shape[1] {
        for slice in 0..shape[2] {
            for echo in 0..shape[3] {
                let start = slice_map[[0, volume, slice, echo]].max(0);
                let finish = slice_map[[1, volume, slice, echo]].min(expected_samples as i64 - 1);
                for tick in start..=finish {
                    acq[tick as usize] = true;
                }
            }
        }
    }
    acq
}

/// Extracts one lane, dropping it when it never left zero (a channel that
/// was wired up but never triggered).
fn active_lane(traces: &Array2<i64>, lane: usize) -> Option<Array1<i64>> {
    let column = traces.column(lane);
    if column.iter().any(|&value| value != 0) {
        Some(column.to_owned())
    } else {
        None
    }
}
