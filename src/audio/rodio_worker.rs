//! rodio backend: `Decoder` + `Sink` driven from a dedicated thread.
//!
//! The thread opens the default output stream on the first load and keeps
//! it for its lifetime. Seeking rebuilds the sink and skips into the file.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use rodio::{ChannelCount, Decoder, OutputStream, OutputStreamBuilder, SampleRate, Sink, Source};
use tracing::{debug, error};

use crate::error::DriverError;
use crate::library::probe_duration;

use super::spectrum::SpectrumAnalyzer;
use super::types::{DriverEvent, WorkerCmd, WorkerLink, WorkerMsg, WorkerTuning};

pub(super) fn spawn(tuning: WorkerTuning) -> WorkerLink {
    let (cmd_tx, cmd_rx) = mpsc::channel::<WorkerCmd>();
    let (msg_tx, msg_rx) = mpsc::channel::<WorkerMsg>();

    let join = thread::spawn(move || RodioWorker::new(msg_tx, tuning).run(cmd_rx));

    WorkerLink {
        tx: cmd_tx,
        rx: msg_rx,
        join: Some(join),
    }
}

struct Loaded {
    path: PathBuf,
    duration: Duration,
    sink: Sink,
}

struct RodioWorker {
    tx: Sender<WorkerMsg>,
    tuning: WorkerTuning,
    stream: Option<OutputStream>,
    generation: u64,
    current: Option<Loaded>,
    volume: f32,
    paused: bool,
    // Elapsed time is `accumulated` plus the time since `started_at`.
    started_at: Option<Instant>,
    accumulated: Duration,
    last_position_report: Instant,
}

impl RodioWorker {
    fn new(tx: Sender<WorkerMsg>, tuning: WorkerTuning) -> Self {
        Self {
            tx,
            tuning,
            stream: None,
            generation: 0,
            current: None,
            volume: 1.0,
            paused: true,
            started_at: None,
            accumulated: Duration::ZERO,
            last_position_report: Instant::now(),
        }
    }

    fn run(mut self, rx: Receiver<WorkerCmd>) {
        loop {
            match rx.recv_timeout(self.tuning.position_interval) {
                Ok(WorkerCmd::Shutdown) => break,
                Ok(cmd) => self.handle(cmd),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.tick();
        }

        if let Some(loaded) = self.current.take() {
            loaded.sink.stop();
        }
        debug!("rodio worker exiting");
    }

    fn handle(&mut self, cmd: WorkerCmd) {
        match cmd {
            WorkerCmd::Load {
                generation,
                path,
                duration_hint,
            } => {
                self.generation = generation;
                self.unload();
                match self.open(&path, duration_hint) {
                    Ok(loaded) => {
                        let duration = loaded.duration.as_secs_f64();
                        self.current = Some(loaded);
                        self.emit(DriverEvent::Ready { duration });
                    }
                    Err(err) => self.emit(DriverEvent::Error(err.to_string())),
                }
            }
            WorkerCmd::Play => {
                let Some(loaded) = self.current.as_ref() else {
                    return;
                };
                if loaded.sink.empty() {
                    // Played to the end already; start over.
                    if let Err(err) = self.rebuild_at(Duration::ZERO, true) {
                        self.emit(DriverEvent::Error(err.to_string()));
                        return;
                    }
                } else if self.paused {
                    loaded.sink.play();
                    self.paused = false;
                    self.started_at = Some(Instant::now());
                }
                self.emit(DriverEvent::Playing);
            }
            WorkerCmd::Pause => {
                let Some(loaded) = self.current.as_ref() else {
                    return;
                };
                if !self.paused {
                    loaded.sink.pause();
                    self.paused = true;
                    if let Some(st) = self.started_at.take() {
                        self.accumulated += st.elapsed();
                    }
                }
                self.emit(DriverEvent::Paused);
            }
            WorkerCmd::Stop => {
                if self.current.is_none() {
                    return;
                }
                // A stopped rodio sink cannot be restarted; rebuild it at the top.
                match self.rebuild_at(Duration::ZERO, false) {
                    Ok(()) => self.emit(DriverEvent::Stopped),
                    Err(err) => self.emit(DriverEvent::Error(err.to_string())),
                }
            }
            WorkerCmd::Seek(pos) => {
                if self.current.is_none() {
                    return;
                }
                let resume = !self.paused;
                match self.rebuild_at(pos, resume) {
                    Ok(()) => self.emit(DriverEvent::Position(pos.as_secs_f64())),
                    Err(err) => self.emit(DriverEvent::Error(err.to_string())),
                }
            }
            WorkerCmd::SetVolume(v) => {
                self.volume = v;
                if let Some(loaded) = self.current.as_ref() {
                    loaded.sink.set_volume(v);
                }
            }
            WorkerCmd::Shutdown => {}
        }
    }

    /// Periodic position report and end-of-media detection.
    fn tick(&mut self) {
        let Some(loaded) = self.current.as_ref() else {
            return;
        };
        if self.paused {
            return;
        }

        if loaded.sink.empty() {
            self.paused = true;
            self.started_at = None;
            self.accumulated = loaded.duration;
            self.emit(DriverEvent::EndOfMedia);
            return;
        }

        if self.last_position_report.elapsed() >= self.tuning.position_interval {
            self.last_position_report = Instant::now();
            let elapsed = self.elapsed().min(loaded.duration);
            self.emit(DriverEvent::Position(elapsed.as_secs_f64()));
        }
    }

    fn elapsed(&self) -> Duration {
        self.accumulated + self.started_at.map_or(Duration::ZERO, |st| st.elapsed())
    }

    fn unload(&mut self) {
        if let Some(loaded) = self.current.take() {
            loaded.sink.stop();
        }
        self.paused = true;
        self.started_at = None;
        self.accumulated = Duration::ZERO;
    }

    fn open(&mut self, path: &Path, hint: Option<Duration>) -> Result<Loaded, DriverError> {
        let file = File::open(path).map_err(|source| DriverError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let decoder = Decoder::new(BufReader::new(file)).map_err(|e| DriverError::Probe {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let duration = decoder
            .total_duration()
            .or(hint)
            .or_else(|| probe_duration(path))
            .unwrap_or(Duration::ZERO);

        let sink = self.new_sink(decoder, Duration::ZERO)?;
        debug!(path = %path.display(), ?duration, "rodio media opened");

        Ok(Loaded {
            path: path.to_path_buf(),
            duration,
            sink,
        })
    }

    /// Replace the current sink with one starting at `start_at`.
    fn rebuild_at(&mut self, start_at: Duration, resume: bool) -> Result<(), DriverError> {
        let Some(path) = self.current.as_ref().map(|l| l.path.clone()) else {
            return Ok(());
        };
        if let Some(loaded) = self.current.as_ref() {
            loaded.sink.stop();
        }

        let file = File::open(&path).map_err(|source| DriverError::Open {
            path: path.clone(),
            source,
        })?;
        let decoder = Decoder::new(BufReader::new(file)).map_err(|e| DriverError::Probe {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let sink = self.new_sink(decoder, start_at)?;

        if resume {
            sink.play();
            self.paused = false;
            self.started_at = Some(Instant::now());
        } else {
            self.paused = true;
            self.started_at = None;
        }
        self.accumulated = start_at;

        if let Some(loaded) = self.current.as_mut() {
            loaded.sink = sink;
        }
        Ok(())
    }

    /// A paused sink playing `source` from `start_at`.
    fn new_sink<S>(&mut self, source: S, start_at: Duration) -> Result<Sink, DriverError>
    where
        S: Source + Send + 'static,
    {
        let tap = SpectrumTap::new(
            // `skip_duration` is the seeking primitive; Duration::ZERO is fine.
            source.skip_duration(start_at),
            self.tx.clone(),
            self.generation,
            self.tuning,
        );

        let stream = self.stream()?;
        let sink = Sink::connect_new(stream.mixer());
        sink.set_volume(self.volume);
        sink.append(tap);
        sink.pause();
        Ok(sink)
    }

    fn stream(&mut self) -> Result<&OutputStream, DriverError> {
        if self.stream.is_none() {
            let mut stream = OutputStreamBuilder::open_default_stream().map_err(|e| {
                error!("no audio output device: {e}");
                DriverError::Output(e.to_string())
            })?;
            // rodio logs to stderr when the stream is dropped.
            stream.log_on_drop(false);
            self.stream = Some(stream);
        }
        self.stream
            .as_ref()
            .ok_or_else(|| DriverError::Output("output stream unavailable".to_string()))
    }

    fn emit(&self, event: DriverEvent) {
        let _ = self.tx.send(WorkerMsg {
            generation: self.generation,
            event,
        });
    }
}

/// Pass-through source that publishes band spectra of what it plays.
struct SpectrumTap<S> {
    inner: S,
    analyzer: SpectrumAnalyzer,
    tx: Sender<WorkerMsg>,
    generation: u64,
    frame: Vec<f32>,
    channels: usize,
}

impl<S: Source> SpectrumTap<S> {
    fn new(inner: S, tx: Sender<WorkerMsg>, generation: u64, tuning: WorkerTuning) -> Self {
        let channels = inner.channels().max(1) as usize;
        let analyzer = SpectrumAnalyzer::new(
            tuning.spectrum_bands,
            inner.sample_rate(),
            tuning.spectrum_interval,
        );
        Self {
            inner,
            analyzer,
            tx,
            generation,
            frame: Vec::with_capacity(channels),
            channels,
        }
    }
}

impl<S: Source> Iterator for SpectrumTap<S> {
    type Item = rodio::Sample;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.inner.next()?;
        self.frame.push(sample);
        if self.frame.len() == self.channels {
            if let Some(bands) = self.analyzer.push_interleaved(&self.frame, self.channels) {
                let _ = self.tx.send(WorkerMsg {
                    generation: self.generation,
                    event: DriverEvent::Spectrum(bands),
                });
            }
            self.frame.clear();
        }
        Some(sample)
    }
}

impl<S: Source> Source for SpectrumTap<S> {
    fn current_span_len(&self) -> Option<usize> {
        self.inner.current_span_len()
    }

    fn channels(&self) -> ChannelCount {
        self.inner.channels()
    }

    fn sample_rate(&self) -> SampleRate {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }

    fn try_seek(&mut self, pos: Duration) -> Result<(), rodio::source::SeekError> {
        self.frame.clear();
        self.inner.try_seek(pos)
    }
}
