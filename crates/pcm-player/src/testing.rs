//! Scripted in-memory device for unit tests.

use std::collections::VecDeque;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::error::PcmError;
use crate::header::{WAVE_HEADER_LEN, WaveHeader};
use crate::pcm::{
    Access, HwConfig, HwConstraints, HwParams, PcmBackend, PcmDevice, PcmState, SampleFormat,
    SwParams,
};

pub(crate) fn mock_constraints() -> HwConstraints {
    HwConstraints {
        formats: vec![SampleFormat::U8, SampleFormat::S16Le, SampleFormat::S24Le],
        access: vec![Access::RwInterleaved],
        channels: (1, 8),
        rate: (8_000, 192_000),
        can_resample: true,
        buffer_frames: (64, 4096),
        period_frames: (32, 2048),
        min_periods: 2,
    }
}

/// Everything a mock device saw, shared with the test after the device is moved away.
#[derive(Clone, Debug, Default)]
pub(crate) struct DeviceLog {
    pub opened: Vec<String>,
    pub dropped: usize,
    pub hw: Option<HwConfig>,
    pub hw_commits: usize,
    pub sw: Option<SwParams>,
    pub write_calls: usize,
    pub written: Vec<u8>,
    pub prepares: usize,
    pub resumes: usize,
    pub drains: usize,
}

/// Scripted outcome of one `writei` call.
#[derive(Clone, Debug)]
pub(crate) enum WriteStep {
    Fail(PcmError),
    /// Accept at most this many frames.
    Short(usize),
}

pub(crate) struct MockDevice {
    name: String,
    constraints: HwConstraints,
    state: PcmState,
    hw: Option<HwConfig>,
    sw: Option<SwParams>,
    writes: VecDeque<WriteStep>,
    resumes: VecDeque<Result<(), PcmError>>,
    prepares: VecDeque<Result<(), PcmError>>,
    hw_commit_error: Option<PcmError>,
    write_delay: Duration,
    log: Arc<Mutex<DeviceLog>>,
}

impl MockDevice {
    pub(crate) fn new(name: &str) -> Self {
        Self::with_constraints(name, mock_constraints())
    }

    pub(crate) fn with_constraints(name: &str, constraints: HwConstraints) -> Self {
        Self::with_log(name, constraints, Arc::new(Mutex::new(DeviceLog::default())))
    }

    fn with_log(name: &str, constraints: HwConstraints, log: Arc<Mutex<DeviceLog>>) -> Self {
        Self {
            name: name.to_string(),
            constraints,
            state: PcmState::Open,
            hw: None,
            sw: None,
            writes: VecDeque::new(),
            resumes: VecDeque::new(),
            prepares: VecDeque::new(),
            hw_commit_error: None,
            write_delay: Duration::ZERO,
            log,
        }
    }

    pub(crate) fn log(&self) -> DeviceLog {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn script_writes(&mut self, steps: impl IntoIterator<Item = WriteStep>) {
        self.writes.extend(steps);
    }

    pub(crate) fn script_resumes(&mut self, results: impl IntoIterator<Item = Result<(), PcmError>>) {
        self.resumes.extend(results);
    }

    pub(crate) fn script_prepares(&mut self, results: impl IntoIterator<Item = Result<(), PcmError>>) {
        self.prepares.extend(results);
    }

    pub(crate) fn fail_hw_commit(&mut self, err: PcmError) {
        self.hw_commit_error = Some(err);
    }

    pub(crate) fn set_write_delay(&mut self, delay: Duration) {
        self.write_delay = delay;
    }

    /// Force the device into `state`, as if a fault had already happened.
    pub(crate) fn force_state(&mut self, state: PcmState) {
        self.state = state;
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        if let Ok(mut log) = self.log.lock() {
            log.dropped += 1;
        }
    }
}

impl PcmDevice for MockDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> PcmState {
        self.state
    }

    fn hw_params_any(&mut self) -> Result<HwParams, PcmError> {
        Ok(HwParams::any(self.constraints.clone()))
    }

    fn hw_params_commit(&mut self, params: &HwParams) -> Result<(), PcmError> {
        if let Some(err) = self.hw_commit_error.clone() {
            return Err(err);
        }
        let hw = params.finish()?;
        self.hw = Some(hw);
        self.sw = Some(SwParams::new(hw.buffer_frames, hw.period_frames));
        self.state = PcmState::Prepared;
        let mut log = self.log.lock().unwrap();
        log.hw = Some(hw);
        log.hw_commits += 1;
        Ok(())
    }

    fn sw_params_current(&self) -> Result<SwParams, PcmError> {
        self.sw.ok_or(PcmError::BadState(self.state))
    }

    fn sw_params_commit(&mut self, params: &SwParams) -> Result<(), PcmError> {
        if self.hw.is_none() {
            return Err(PcmError::BadState(self.state));
        }
        self.sw = Some(*params);
        self.log.lock().unwrap().sw = Some(*params);
        Ok(())
    }

    fn writei(&mut self, buf: &[u8]) -> Result<usize, PcmError> {
        let hw = self.hw.ok_or(PcmError::BadState(self.state))?;
        match self.state {
            PcmState::Prepared | PcmState::Running => {}
            PcmState::Xrun => return Err(PcmError::Xrun),
            PcmState::Suspended => return Err(PcmError::Suspended),
            other => return Err(PcmError::BadState(other)),
        }
        self.log.lock().unwrap().write_calls += 1;
        if !self.write_delay.is_zero() {
            thread::sleep(self.write_delay);
        }

        let frame = hw.frame_bytes();
        let mut frames = buf.len() / frame;
        match self.writes.pop_front() {
            Some(WriteStep::Fail(err)) => {
                match err {
                    PcmError::Xrun => self.state = PcmState::Xrun,
                    PcmError::Suspended => self.state = PcmState::Suspended,
                    _ => {}
                }
                return Err(err);
            }
            Some(WriteStep::Short(max)) => frames = frames.min(max),
            None => {}
        }
        self.state = PcmState::Running;
        self.log
            .lock()
            .unwrap()
            .written
            .extend_from_slice(&buf[..frames * frame]);
        Ok(frames)
    }

    fn prepare(&mut self) -> Result<(), PcmError> {
        self.log.lock().unwrap().prepares += 1;
        if self.hw.is_none() {
            return Err(PcmError::BadState(self.state));
        }
        self.prepares.pop_front().unwrap_or(Ok(()))?;
        self.state = PcmState::Prepared;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), PcmError> {
        self.log.lock().unwrap().resumes += 1;
        self.resumes.pop_front().unwrap_or(Ok(()))?;
        self.state = PcmState::Prepared;
        Ok(())
    }

    fn drain(&mut self) -> Result<(), PcmError> {
        self.log.lock().unwrap().drains += 1;
        self.state = PcmState::Setup;
        Ok(())
    }
}

type DeviceSetup = Box<dyn Fn(&mut MockDevice) + Send + Sync>;

/// Backend handing out [`MockDevice`]s that all report into one shared log.
pub(crate) struct MockBackend {
    pub log: Arc<Mutex<DeviceLog>>,
    open_error: Option<PcmError>,
    setup: Option<DeviceSetup>,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(DeviceLog::default())),
            open_error: None,
            setup: None,
        }
    }

    pub(crate) fn failing(err: PcmError) -> Self {
        Self {
            open_error: Some(err),
            ..Self::new()
        }
    }

    /// Run `setup` on every device this backend opens.
    pub(crate) fn with_setup(setup: impl Fn(&mut MockDevice) + Send + Sync + 'static) -> Self {
        Self {
            setup: Some(Box::new(setup)),
            ..Self::new()
        }
    }

    pub(crate) fn log(&self) -> DeviceLog {
        self.log.lock().unwrap().clone()
    }
}

impl PcmBackend for MockBackend {
    type Device = MockDevice;

    fn open(&self, name: &str) -> Result<MockDevice, PcmError> {
        if let Some(err) = self.open_error.clone() {
            return Err(err);
        }
        self.log.lock().unwrap().opened.push(name.to_string());
        let mut dev = MockDevice::with_log(name, mock_constraints(), self.log.clone());
        if let Some(setup) = &self.setup {
            setup(&mut dev);
        }
        Ok(dev)
    }
}

/// Canonical header followed by `payload`.
pub(crate) fn wave_file(header: WaveHeader, payload: &[u8]) -> Vec<u8> {
    let mut bytes = header.to_bytes().to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

/// A seekable wave source that never ends: header, then silence forever.
pub(crate) struct EndlessWave {
    header: [u8; WAVE_HEADER_LEN],
    pos: u64,
}

impl EndlessWave {
    pub(crate) fn new(header: WaveHeader) -> Self {
        Self {
            header: header.to_bytes(),
            pos: 0,
        }
    }
}

impl Read for EndlessWave {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = self.pos as usize;
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.header.get(start + i).copied().unwrap_or(0);
        }
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }
}

impl Seek for EndlessWave {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Start(p) => self.pos = p,
            _ => return Err(io::Error::from(io::ErrorKind::Unsupported)),
        }
        Ok(self.pos)
    }
}
