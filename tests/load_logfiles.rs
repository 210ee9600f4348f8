use physio_importer::{
    load, load_embedded, ContainerReader, PhysioError, PHYSIO_PRIVATE_CREATOR, PHYSIO_TAG,
};
use std::fs;
use std::path::{Path, PathBuf};

const UUID: &str = "007e910e-02d9-4d7a-8fdb-8e3568be8322";

// Exactly 12 lines, so the legacy correction of NumVolumes = 1 resolves to
// (12 - 11) / (1 * 1) = 1 volume
fn info_text() -> String {
    let text = format!(
        "UUID = {}\n\
         LogVersion = EJA_1\n\
         LogDataType = ACQUISITION_INFO\n\
         NumSlices = 1\n\
         NumVolumes = 1\n\
         NumEchoes = 1\n\
         FirstTime = 100\n\
         LastTime = 109\n\
         \n\
         VOLUME   SLICE   ACQ_START_TICS   ACQ_FINISH_TICS   ECHO\n\
         0 0 100 105\n\
         \n",
        UUID
    );
    assert_eq!(text.lines().count(), 12);
    text
}

fn ecg_text(uuid: &str) -> String {
    format!(
        "UUID = {}\n\
         LogVersion = EJA_1\n\
         LogDataType = ECG\n\
         SampleTime = 1\n\
         ACQ_TIME_TICS  CHANNEL  VALUE  SIGNAL\n\
         100 ECG1 1000\n\
         102 ECG2 1024\n",
        uuid
    )
}

fn ext_zeros_text() -> String {
    format!(
        "UUID = {}\n\
         LogVersion = EJA_1\n\
         LogDataType = EXT\n\
         SampleTime = 1\n\
         105 EXT 0\n\
         107 EXT2 0\n",
        UUID
    )
}

fn write_logs(dir: &Path, files: &[(&str, String)]) -> PathBuf {
    for (suffix, text) in files {
        fs::write(dir.join(format!("Physio_test{}", suffix)), text).unwrap();
    }
    dir.join("Physio_test")
}

#[test]
fn end_to_end_recording_matches_the_timing_file() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_logs(
        dir.path(),
        &[("_Info.log", info_text()), ("_ECG.log", ecg_text(UUID))],
    );

    let physio = load(&base).unwrap();
    assert_eq!(physio.uuid, UUID);
    assert_eq!(physio.num_samples(), 18);
    assert_eq!(physio.info.volumes, 1);
    assert!((physio.duration() - 0.025).abs() < 1e-9);

    // The single acquisition window covers ticks 0..=5
    for tick in 0..18 {
        assert_eq!(physio.acq[tick], tick <= 5, "tick {}", tick);
    }
    assert_eq!(physio.slice_map[[0, 0, 0, 0]], 0);
    assert_eq!(physio.slice_map[[1, 0, 0, 0]], 5);

    let ecg1 = physio.ecg1.as_ref().unwrap();
    let ecg2 = physio.ecg2.as_ref().unwrap();
    assert_eq!(ecg1[0], 1000);
    assert_eq!(ecg1[1], 0);
    assert_eq!(ecg2[2], 1024);
    assert!(physio.ecg3.is_none());
    assert!(physio.ecg4.is_none());
    assert!(physio.resp.is_none());
}

#[test]
fn uuid_mismatch_between_info_and_signal_files_fails() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_logs(
        dir.path(),
        &[
            ("_Info.log", info_text()),
            ("_ECG.log", ecg_text("some-other-measurement")),
        ],
    );
    match load(&base) {
        Err(PhysioError::UuidMismatch("ECG")) => {}
        other => panic!("expected UuidMismatch, got {:?}", other),
    }
}

#[test]
fn ext_file_with_only_zero_values_is_omitted_from_the_result() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_logs(
        dir.path(),
        &[("_Info.log", info_text()), ("_EXT.log", ext_zeros_text())],
    );
    let physio = load(&base).unwrap();
    assert!(physio.ext.is_none());
    assert!(physio.ext2.is_none());
    assert!(physio.active_signals().is_empty());
}

#[test]
fn missing_info_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_logs(dir.path(), &[("_ECG.log", ecg_text(UUID))]);
    match load(&base) {
        Err(PhysioError::SourceNotFound(msg)) => assert!(msg.contains("_Info.log")),
        other => panic!("expected SourceNotFound, got {:?}", other),
    }
}

#[test]
fn info_without_any_signal_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_logs(dir.path(), &[("_Info.log", info_text())]);
    match load(&base) {
        Err(PhysioError::SourceNotFound(msg)) => assert!(msg.contains("ECG/RESP/PULS/EXT")),
        other => panic!("expected SourceNotFound, got {:?}", other),
    }
}

#[test]
fn last_timestamp_must_lie_after_the_first() {
    let text = "UUID = t\n\
                LogVersion = EJA_1\n\
                LogDataType = ACQUISITION_INFO\n\
                NumSlices = 1\n\
                NumVolumes = 2\n\
                FirstTime = 100\n\
                LastTime = 100\n\
                0 0 100 100\n\
                1 0 100 100\n";
    let puls = "UUID = t\n\
                LogVersion = EJA_1\n\
                LogDataType = PULS\n\
                SampleTime = 1\n\
                100 PULS 900\n";
    let dir = tempfile::tempdir().unwrap();
    let base = write_logs(
        dir.path(),
        &[
            ("_Info.log", text.to_string()),
            ("_PULS.log", puls.to_string()),
        ],
    );
    match load(&base) {
        Err(PhysioError::TimestampOrder {
            first: 100,
            last: 100,
        }) => {}
        other => panic!("expected TimestampOrder, got {:?}", other),
    }
}

#[test]
fn load_refuses_a_plain_file_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("physio.dcm");
    fs::write(&path, b"not a log set").unwrap();
    match load(&path) {
        Err(PhysioError::Other(msg)) => assert!(msg.contains("load_embedded")),
        other => panic!("expected Other, got {:?}", other),
    }
}

// In-memory stand-in for a DICOM reader, serving a hand-built payload
struct MockContainer {
    rows: usize,
    payload: Vec<u8>,
    image_type: Vec<String>,
    creator: String,
}

impl MockContainer {
    fn new(files: &[(&str, String)]) -> Self {
        let rows = 2;
        let mut payload = Vec::new();
        for (suffix, text) in files {
            let filename = format!("Physio_test{}", suffix);
            let mut chunk = vec![0u8; rows * 1024];
            chunk[0..4].copy_from_slice(&(text.len() as u32).to_le_bytes());
            chunk[4..8].copy_from_slice(&(filename.len() as u32).to_le_bytes());
            chunk[8..8 + filename.len()].copy_from_slice(filename.as_bytes());
            chunk[1024..1024 + text.len()].copy_from_slice(text.as_bytes());
            payload.extend(chunk);
        }
        MockContainer {
            rows,
            payload,
            image_type: ["ORIGINAL", "PRIMARY", "RAWDATA", "PHYSIO"]
                .iter()
                .map(|part| part.to_string())
                .collect(),
            creator: PHYSIO_PRIVATE_CREATOR.to_string(),
        }
    }
}

impl ContainerReader for MockContainer {
    fn manufacturer(&self, _path: &Path) -> Result<String, PhysioError> {
        Ok("SIEMENS".to_string())
    }

    fn image_type(&self, _path: &Path) -> Result<Vec<String>, PhysioError> {
        Ok(self.image_type.clone())
    }

    fn acquisition_number(&self, _path: &Path) -> Result<usize, PhysioError> {
        Ok(self.rows)
    }

    fn private_blob(
        &self,
        _path: &Path,
        group: u16,
        element: u16,
    ) -> Result<(String, Vec<u8>), PhysioError> {
        assert_eq!((group, element), PHYSIO_TAG);
        Ok((self.creator.clone(), self.payload.clone()))
    }
}

#[test]
fn embedded_payload_decodes_like_sibling_files() {
    let container = MockContainer::new(&[("_Info.log", info_text()), ("_ECG.log", ecg_text(UUID))]);
    let physio = load_embedded("physio.dcm", &container).unwrap();
    assert_eq!(physio.uuid, UUID);
    assert_eq!(physio.num_samples(), 18);
    assert_eq!(physio.ecg1.as_ref().unwrap()[0], 1000);
    assert_eq!(physio.slice_map[[1, 0, 0, 0]], 5);
}

#[test]
fn embedded_payload_with_wrong_image_type_fails() {
    let mut container =
        MockContainer::new(&[("_Info.log", info_text()), ("_ECG.log", ecg_text(UUID))]);
    container.image_type = vec!["ORIGINAL".to_string(), "PRIMARY".to_string()];
    match load_embedded("physio.dcm", &container) {
        Err(PhysioError::MalformedContainer(msg)) => assert!(msg.contains("image type")),
        other => panic!("expected MalformedContainer, got {:?}", other),
    }
}

#[test]
fn embedded_payload_with_wrong_private_creator_fails() {
    let mut container =
        MockContainer::new(&[("_Info.log", info_text()), ("_ECG.log", ecg_text(UUID))]);
    container.creator = "SOMEONE ELSE".to_string();
    match load_embedded("physio.dcm", &container) {
        Err(PhysioError::MalformedContainer(msg)) => assert!(msg.contains("private creator")),
        other => panic!("expected MalformedContainer, got {:?}", other),
    }
}
