use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use changeblind_color::hsv_to_rgb;
use changeblind_core::{
    AttributeValue, CueKind, CueSink, PersistError, ResultSink, StimulusSink, TrialResult,
};
use tracing::{debug, trace};

/// Appends one JSON object per trial. The file is opened on first write so
/// an unwritable path surfaces as a retryable error.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl JsonLinesSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: None,
        }
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, PersistError> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.writer = Some(BufWriter::new(file));
        }
        self.writer
            .as_mut()
            .ok_or_else(|| PersistError::Unavailable(self.path.display().to_string()))
    }
}

impl ResultSink for JsonLinesSink {
    fn record_trial_result(&mut self, result: &TrialResult) -> Result<(), PersistError> {
        let line = serde_json::to_string(result).map_err(|e| PersistError::Encode {
            trial_id: result.trial_id,
            reason: e.to_string(),
        })?;
        let writer = self.writer()?;
        let written = writeln!(writer, "{line}").and_then(|_| writer.flush());
        if let Err(err) = written {
            // reopen on the next attempt
            self.writer = None;
            return Err(err.into());
        }
        Ok(())
    }

    fn finalize(&mut self, results: &[TrialResult]) -> Result<(), PersistError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        debug!(results = results.len(), path = %self.path.display(), "result file closed");
        Ok(())
    }
}

/// Holds what a renderer would show, without drawing anything.
#[derive(Debug)]
pub struct HeadlessStimuli {
    saturation: f64,
    value: f64,
    pub values: Vec<Option<AttributeValue>>,
    pub visible: Vec<bool>,
    pub ring: [f32; 3],
    pub renders: usize,
}

impl HeadlessStimuli {
    pub fn new(spheres: usize, saturation: f64, value: f64) -> Self {
        Self {
            saturation,
            value,
            values: vec![None; spheres],
            visible: vec![false; spheres],
            ring: [0.0; 3],
            renders: 0,
        }
    }
}

impl StimulusSink for HeadlessStimuli {
    fn has_stimulus(&self, sphere: usize) -> bool {
        sphere < self.values.len()
    }

    fn render_stimulus(&mut self, sphere: usize, value: AttributeValue) {
        let Some(slot) = self.values.get_mut(sphere) else {
            return;
        };
        *slot = Some(value);
        self.renders += 1;
        if let AttributeValue::Hue(h) = value {
            let rgb = hsv_to_rgb(h, self.saturation, self.value).to_u8();
            trace!(sphere, ?rgb, "hue");
        }
    }

    fn set_stimulus_visible(&mut self, sphere: usize, visible: bool) {
        if let Some(v) = self.visible.get_mut(sphere) {
            *v = visible;
        }
    }

    fn place_ring(&mut self, position: [f32; 3]) {
        self.ring = position;
    }
}

#[derive(Debug, Default)]
pub struct CueCounter {
    pub low: usize,
    pub high: usize,
}

impl CueSink for CueCounter {
    fn play_cue(&mut self, cue: CueKind) {
        match cue {
            CueKind::Low => self.low += 1,
            CueKind::High => self.high += 1,
        }
    }
}
