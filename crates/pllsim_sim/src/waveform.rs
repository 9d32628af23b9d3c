//! Waveform output.
//!
//! The kernel reports every committed change to an optional
//! [`WaveformRecorder`]. [`VcdRecorder`] writes IEEE 1364 Value Change Dump
//! text that GTKWave or Surfer can open.

use std::collections::HashMap;
use std::io::Write;

use pllsim_common::FS_PER_NS;

use crate::error::SimError;
use crate::signal::SignalId;

/// Sink for signal declarations and committed value changes.
pub trait WaveformRecorder {
    /// Declares a signal inside the currently open scope.
    fn register_signal(&mut self, id: SignalId, name: &str, width: u32) -> Result<(), SimError>;

    /// Opens a hierarchy level.
    fn begin_scope(&mut self, name: &str) -> Result<(), SimError>;

    /// Closes the innermost hierarchy level.
    fn end_scope(&mut self) -> Result<(), SimError>;

    /// Records a committed value at `time_fs`.
    fn record_change(&mut self, time_fs: u64, id: SignalId, value: u64) -> Result<(), SimError>;

    /// Flushes buffered output.
    fn finalize(&mut self) -> Result<(), SimError>;
}

/// Where the VCD writer is in the file layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    /// Nothing written yet.
    Empty,
    /// Header written, `$var` declarations may follow.
    Declarations,
    /// `$enddefinitions` written; holds the last timestamp emitted.
    Changes(Option<u64>),
}

/// A VCD writer over any `io::Write`.
///
/// Timestamps are divided by the timescale, so changes that fall between two
/// timescale ticks share the earlier tick.
pub struct VcdRecorder<W: Write> {
    writer: W,
    timescale_fs: u64,
    codes: HashMap<SignalId, (String, u32)>,
    section: Section,
}

impl<W: Write> VcdRecorder<W> {
    /// A recorder with a 1 fs timescale.
    pub fn new(writer: W) -> Self {
        Self::with_timescale(writer, 1)
    }

    /// A recorder whose timestamps count `timescale_fs` femtoseconds each.
    ///
    /// A zero timescale is treated as 1 fs.
    pub fn with_timescale(writer: W, timescale_fs: u64) -> Self {
        Self {
            writer,
            timescale_fs: timescale_fs.max(1),
            codes: HashMap::new(),
            section: Section::Empty,
        }
    }

    /// Consumes the recorder and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn timescale_label(&self) -> String {
        const LABELS: [(u64, &str); 6] = [
            (1_000_000_000_000_000, "s"),
            (1_000_000_000_000, "ms"),
            (1_000_000_000, "us"),
            (FS_PER_NS, "ns"),
            (1_000, "ps"),
            (1, "fs"),
        ];
        LABELS
            .iter()
            .find(|(scale, _)| self.timescale_fs.is_multiple_of(*scale))
            .map(|(scale, unit)| format!("{}{unit}", self.timescale_fs / scale))
            .unwrap_or_else(|| format!("{}fs", self.timescale_fs))
    }

    fn ensure_header(&mut self) -> Result<(), SimError> {
        if self.section == Section::Empty {
            writeln!(self.writer, "$version pllsim $end")?;
            writeln!(self.writer, "$timescale {} $end", self.timescale_label())?;
            self.section = Section::Declarations;
        }
        Ok(())
    }

    fn close_declarations(&mut self) -> Result<(), SimError> {
        self.ensure_header()?;
        if self.section == Section::Declarations {
            writeln!(self.writer, "$enddefinitions $end")?;
            self.section = Section::Changes(None);
        }
        Ok(())
    }

    /// Short identifier for the `index`-th declared signal, drawn from the
    /// printable range `!`..=`~`.
    fn id_code(index: usize) -> String {
        const RADIX: usize = 94;
        let mut code = String::new();
        let mut rest = index;
        loop {
            code.push(char::from(b'!' + (rest % RADIX) as u8));
            rest /= RADIX;
            if rest == 0 {
                return code;
            }
            rest -= 1;
        }
    }
}

impl<W: Write> WaveformRecorder for VcdRecorder<W> {
    fn register_signal(&mut self, id: SignalId, name: &str, width: u32) -> Result<(), SimError> {
        self.ensure_header()?;
        let code = Self::id_code(self.codes.len());
        writeln!(self.writer, "$var wire {width} {code} {name} $end")?;
        self.codes.insert(id, (code, width));
        Ok(())
    }

    fn begin_scope(&mut self, name: &str) -> Result<(), SimError> {
        self.ensure_header()?;
        writeln!(self.writer, "$scope module {name} $end")?;
        Ok(())
    }

    fn end_scope(&mut self) -> Result<(), SimError> {
        writeln!(self.writer, "$upscope $end")?;
        Ok(())
    }

    fn record_change(&mut self, time_fs: u64, id: SignalId, value: u64) -> Result<(), SimError> {
        self.close_declarations()?;
        let tick = time_fs / self.timescale_fs;
        if self.section != Section::Changes(Some(tick)) {
            writeln!(self.writer, "#{tick}")?;
            self.section = Section::Changes(Some(tick));
        }

        let (code, width) = self
            .codes
            .get(&id)
            .ok_or_else(|| SimError::InvalidSignalRef {
                reason: format!("signal {} was never declared to the waveform", id.as_raw()),
            })?;
        if *width == 1 {
            writeln!(self.writer, "{}{code}", value & 1)?;
        } else {
            writeln!(self.writer, "b{value:b} {code}")?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SimError> {
        self.close_declarations()?;
        self.writer.flush()?;
        Ok(())
    }
}
