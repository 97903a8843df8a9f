//! symphonia backend: demux/decode on a dedicated thread, output through cpal.
//!
//! The worker keeps roughly half a second of decoded, resampled audio in a
//! queue shared with the cpal data callback. The callback only pops samples
//! and counts frames; all bookkeeping and event emission stay on the worker.

use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tracing::{debug, error, warn};

use crate::error::DriverError;
use crate::library::probe_duration;

use super::formats::extension_of;
use super::spectrum::SpectrumAnalyzer;
use super::types::{DriverEvent, WorkerCmd, WorkerLink, WorkerMsg, WorkerTuning};

/// Poll interval while audio is playing, so the queue never runs dry.
const FILL_INTERVAL: Duration = Duration::from_millis(20);

pub(super) fn spawn(tuning: WorkerTuning) -> WorkerLink {
    let (cmd_tx, cmd_rx) = mpsc::channel::<WorkerCmd>();
    let (msg_tx, msg_rx) = mpsc::channel::<WorkerMsg>();

    let join = thread::spawn(move || SymphoniaWorker::new(msg_tx, tuning).run(cmd_rx));

    WorkerLink {
        tx: cmd_tx,
        rx: msg_rx,
        join: Some(join),
    }
}

/// State shared with the cpal data callback.
struct Shared {
    queue: Mutex<VecDeque<f32>>,
    volume: AtomicU32,
    playing: AtomicBool,
    frames_played: AtomicU64,
}

impl Shared {
    fn clear(&self) {
        if let Ok(mut q) = self.queue.lock() {
            q.clear();
        }
        self.frames_played.store(0, Ordering::Relaxed);
    }

    fn queued(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }
}

struct Output {
    // Held for its lifetime; dropping it closes the device.
    _stream: cpal::Stream,
    shared: Arc<Shared>,
    sample_rate: u32,
    channels: usize,
}

struct Media {
    path: PathBuf,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: usize,
    time_base: Option<TimeBase>,
    out_rate: u32,
    duration: Duration,
    eof: bool,
    resampler: LinearResampler,
}

struct SymphoniaWorker {
    tx: Sender<WorkerMsg>,
    tuning: WorkerTuning,
    output: Option<Output>,
    generation: u64,
    media: Option<Media>,
    volume: f32,
    playing: bool,
    /// Media time at which `frames_played` was last reset.
    base: Duration,
    analyzer: Option<SpectrumAnalyzer>,
    last_position_report: Instant,
}

impl SymphoniaWorker {
    fn new(tx: Sender<WorkerMsg>, tuning: WorkerTuning) -> Self {
        Self {
            tx,
            tuning,
            output: None,
            generation: 0,
            media: None,
            volume: 1.0,
            playing: false,
            base: Duration::ZERO,
            analyzer: None,
            last_position_report: Instant::now(),
        }
    }

    fn run(mut self, rx: Receiver<WorkerCmd>) {
        loop {
            let wait = if self.playing {
                FILL_INTERVAL
            } else {
                self.tuning.position_interval
            };
            match rx.recv_timeout(wait) {
                Ok(WorkerCmd::Shutdown) => break,
                Ok(cmd) => self.handle(cmd),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.tick();
        }

        self.set_output_playing(false);
        debug!("symphonia worker exiting");
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
                match self.load(&path, duration_hint) {
                    Ok(duration) => self.emit(DriverEvent::Ready {
                        duration: duration.as_secs_f64(),
                    }),
                    Err(err) => {
                        self.media = None;
                        self.emit(DriverEvent::Error(err.to_string()));
                    }
                }
            }
            WorkerCmd::Play => {
                let Some(media) = self.media.as_ref() else {
                    return;
                };
                if media.eof && self.queued() == 0 {
                    // Played to the end already; start over.
                    if let Err(err) = self.restart() {
                        self.fail(err);
                        return;
                    }
                }
                self.playing = true;
                self.fill();
                self.set_output_playing(true);
                self.emit(DriverEvent::Playing);
            }
            WorkerCmd::Pause => {
                if self.media.is_none() {
                    return;
                }
                self.playing = false;
                self.set_output_playing(false);
                self.emit(DriverEvent::Paused);
            }
            WorkerCmd::Stop => {
                if self.media.is_none() {
                    return;
                }
                self.playing = false;
                self.set_output_playing(false);
                match self.restart() {
                    Ok(()) => self.emit(DriverEvent::Stopped),
                    Err(err) => self.fail(err),
                }
            }
            WorkerCmd::Seek(pos) => match self.seek(pos) {
                Ok(Some(landed)) => self.emit(DriverEvent::Position(landed.as_secs_f64())),
                Ok(None) => {}
                Err(err) => self.fail(err),
            },
            WorkerCmd::SetVolume(v) => {
                self.volume = v;
                if let Some(out) = self.output.as_ref() {
                    out.shared.volume.store(v.to_bits(), Ordering::Relaxed);
                }
            }
            WorkerCmd::Shutdown => {}
        }
    }

    fn tick(&mut self) {
        if !self.playing {
            return;
        }
        self.fill();

        let drained = self.media.as_ref().is_some_and(|m| m.eof) && self.queued() == 0;
        if drained {
            self.playing = false;
            self.set_output_playing(false);
            self.base = self.media.as_ref().map_or(Duration::ZERO, |m| m.duration);
            self.emit(DriverEvent::EndOfMedia);
            return;
        }

        if self.last_position_report.elapsed() >= self.tuning.position_interval {
            self.last_position_report = Instant::now();
            let pos = self.position();
            self.emit(DriverEvent::Position(pos.as_secs_f64()));
        }
    }

    fn position(&self) -> Duration {
        let Some(out) = self.output.as_ref() else {
            return self.base;
        };
        let frames = out.shared.frames_played.load(Ordering::Relaxed);
        let played = Duration::from_secs_f64(frames as f64 / out.sample_rate.max(1) as f64);
        let pos = self.base + played;
        match self.media.as_ref() {
            Some(m) if m.duration > Duration::ZERO => pos.min(m.duration),
            _ => pos,
        }
    }

    fn unload(&mut self) {
        self.playing = false;
        self.set_output_playing(false);
        if let Some(out) = self.output.as_ref() {
            out.shared.clear();
        }
        self.media = None;
        self.base = Duration::ZERO;
    }

    fn load(&mut self, path: &Path, hint: Option<Duration>) -> Result<Duration, DriverError> {
        let (rate, channels) = {
            let out = self.output()?;
            (out.sample_rate, out.channels)
        };
        let media = open_media(path, hint, rate, channels)?;
        let duration = media.duration;
        self.analyzer = Some(SpectrumAnalyzer::new(
            self.tuning.spectrum_bands,
            rate,
            self.tuning.spectrum_interval,
        ));
        debug!(path = %path.display(), ?duration, "symphonia media opened");
        self.media = Some(media);
        Ok(duration)
    }

    /// Reopen the current media at the beginning, paused.
    fn restart(&mut self) -> Result<(), DriverError> {
        let Some((path, duration)) = self.media.as_ref().map(|m| (m.path.clone(), m.duration))
        else {
            return Ok(());
        };
        let (rate, channels) = {
            let out = self.output()?;
            out.shared.clear();
            (out.sample_rate, out.channels)
        };
        let media = open_media(&path, Some(duration), rate, channels)?;
        self.media = Some(media);
        self.base = Duration::ZERO;
        Ok(())
    }

    /// Coarse seek; returns where decoding actually resumes.
    fn seek(&mut self, pos: Duration) -> Result<Option<Duration>, DriverError> {
        let Some(media) = self.media.as_mut() else {
            return Ok(None);
        };
        let seeked = media
            .format
            .seek(
                SeekMode::Coarse,
                SeekTo::Time {
                    time: Time::from(pos.as_secs_f64()),
                    track_id: Some(media.track_id),
                },
            )
            .map_err(|e| DriverError::Seek(e.to_string()))?;
        media.decoder.reset();
        media.resampler.reset();
        media.eof = false;

        if let Some(out) = self.output.as_ref() {
            out.shared.clear();
        }
        let landed = ts_to_duration(media.time_base, seeked.actual_ts).unwrap_or(pos);
        self.base = landed;
        if self.playing {
            self.fill();
        }
        Ok(Some(landed))
    }

    /// Top the shared queue up to its target length.
    fn fill(&mut self) {
        let Some(out) = self.output.as_ref() else {
            return;
        };
        let shared = Arc::clone(&out.shared);
        let out_channels = out.channels;
        let target = (out.sample_rate as usize / 2) * out_channels;

        while shared.queued() < target {
            let Some(media) = self.media.as_mut() else {
                return;
            };
            if media.eof {
                return;
            }
            match decode_next(media, out_channels) {
                Ok(Some(samples)) => {
                    if let Some(bands) = self
                        .analyzer
                        .as_mut()
                        .and_then(|a| a.push_interleaved(&samples, out_channels))
                    {
                        self.emit(DriverEvent::Spectrum(bands));
                    }
                    if let Ok(mut q) = shared.queue.lock() {
                        q.extend(samples);
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    self.fail(err);
                    return;
                }
            }
        }
    }

    fn output(&mut self) -> Result<&Output, DriverError> {
        if self.output.is_none() {
            let out = open_output(self.volume)?;
            self.output = Some(out);
        }
        self.output
            .as_ref()
            .ok_or_else(|| DriverError::Output("output stream unavailable".to_string()))
    }

    fn queued(&self) -> usize {
        self.output.as_ref().map_or(0, |o| o.shared.queued())
    }

    fn set_output_playing(&self, playing: bool) {
        if let Some(out) = self.output.as_ref() {
            out.shared.playing.store(playing, Ordering::Relaxed);
        }
    }

    fn fail(&mut self, err: DriverError) {
        warn!("symphonia playback fault: {err}");
        self.playing = false;
        self.set_output_playing(false);
        self.emit(DriverEvent::Error(err.to_string()));
    }

    fn emit(&self, event: DriverEvent) {
        let _ = self.tx.send(WorkerMsg {
            generation: self.generation,
            event,
        });
    }
}

fn open_output(volume: f32) -> Result<Output, DriverError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| DriverError::Output("no default output device".to_string()))?;
    let supported = device
        .default_output_config()
        .map_err(|e| DriverError::Output(e.to_string()))?;
    let sample_rate = supported.sample_rate();
    let config = supported.config();
    let channels = config.channels.max(1) as usize;

    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::new()),
        volume: AtomicU32::new(volume.to_bits()),
        playing: AtomicBool::new(false),
        frames_played: AtomicU64::new(0),
    });

    let cb_shared = Arc::clone(&shared);
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                write_output(data, &cb_shared, channels);
            },
            |err| error!("output stream error: {err}"),
            None,
        )
        .map_err(|e| {
            error!("cannot build output stream: {e}");
            DriverError::Output(e.to_string())
        })?;
    stream
        .play()
        .map_err(|e| DriverError::Output(e.to_string()))?;

    debug!(sample_rate, channels, "cpal output opened");
    Ok(Output {
        _stream: stream,
        shared,
        sample_rate,
        channels,
    })
}

/// cpal data callback body.
fn write_output(data: &mut [f32], shared: &Shared, channels: usize) {
    if !shared.playing.load(Ordering::Relaxed) {
        data.fill(0.0);
        return;
    }
    let Ok(mut queue) = shared.queue.lock() else {
        data.fill(0.0);
        return;
    };

    let gain = f32::from_bits(shared.volume.load(Ordering::Relaxed)).clamp(0.0, 1.0);
    let mut written = 0usize;
    for slot in data.iter_mut() {
        match queue.pop_front() {
            Some(s) => {
                *slot = s * gain;
                written += 1;
            }
            None => *slot = 0.0,
        }
    }
    drop(queue);

    shared
        .frames_played
        .fetch_add((written / channels.max(1)) as u64, Ordering::Relaxed);
}

fn open_media(
    path: &Path,
    hint: Option<Duration>,
    out_rate: u32,
    out_channels: usize,
) -> Result<Media, DriverError> {
    let file = File::open(path).map_err(|source| DriverError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut probe_hint = Hint::new();
    let ext = extension_of(path);
    if !ext.is_empty() {
        probe_hint.with_extension(&ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &probe_hint,
            mss,
            &FormatOptions {
                enable_gapless: true,
                ..Default::default()
            },
            &MetadataOptions::default(),
        )
        .map_err(|e| DriverError::Probe {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let format = probed.format;

    let track = format.default_track().ok_or_else(|| DriverError::Probe {
        path: path.to_path_buf(),
        reason: "no audio track".to_string(),
    })?;
    let params = &track.codec_params;
    let in_rate = params.sample_rate.unwrap_or(44_100);
    let channels = params.channels.map(|c| c.count()).unwrap_or(2).max(1);
    let track_id = track.id;
    let time_base = params.time_base.or_else(|| Some(TimeBase::new(1, in_rate.max(1))));

    let duration = params
        .n_frames
        .map(|frames| Duration::from_secs_f64(frames as f64 / in_rate as f64))
        .or(hint)
        .or_else(|| probe_duration(path))
        .unwrap_or(Duration::ZERO);

    let decoder = symphonia::default::get_codecs()
        .make(params, &DecoderOptions::default())
        .map_err(|e| DriverError::Probe {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    Ok(Media {
        path: path.to_path_buf(),
        format,
        decoder,
        track_id,
        channels,
        time_base,
        out_rate,
        duration,
        eof: false,
        resampler: LinearResampler::new(in_rate, out_rate, out_channels),
    })
}

/// Decode one packet into interleaved output-rate samples.
///
/// `Ok(None)` means the packet produced nothing (other track, skipped frame,
/// or end of stream, which also sets `media.eof`).
fn decode_next(media: &mut Media, out_channels: usize) -> Result<Option<Vec<f32>>, DriverError> {
    let packet = match media.format.next_packet() {
        Ok(packet) => packet,
        Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            media.eof = true;
            return Ok(None);
        }
        // Chained streams (Ogg) start a new logical track here.
        Err(SymphoniaError::ResetRequired) => {
            reset_decoder(media, out_channels)?;
            return Ok(None);
        }
        Err(e) => return Err(DriverError::Decode(e.to_string())),
    };

    if packet.track_id() != media.track_id {
        return Ok(None);
    }

    let decoded = match media.decoder.decode(&packet) {
        Ok(decoded) => decoded,
        // Corrupt frames are skipped.
        Err(SymphoniaError::DecodeError(e)) => {
            debug!("skipping undecodable packet: {e}");
            return Ok(None);
        }
        Err(e) => return Err(DriverError::Decode(e.to_string())),
    };

    let spec = *decoded.spec();
    let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
    buf.copy_interleaved_ref(decoded);

    let mapped = remap_channels(buf.samples(), media.channels, out_channels);
    let mut out = Vec::with_capacity(mapped.len());
    media.resampler.process(&mapped, &mut out);
    Ok(Some(out))
}

/// Rebuild the decoder for the reader's current default track.
fn reset_decoder(media: &mut Media, out_channels: usize) -> Result<(), DriverError> {
    let track = media
        .format
        .default_track()
        .ok_or_else(|| DriverError::Decode("no audio track after stream reset".to_string()))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| DriverError::Decode(e.to_string()))?;
    let in_rate = params.sample_rate.unwrap_or(media.out_rate).max(1);

    debug!(track_id, in_rate, "decoder rebuilt after stream reset");
    media.decoder = decoder;
    media.track_id = track_id;
    media.channels = params.channels.map_or(media.channels, |c| c.count().max(1));
    media.time_base = params.time_base.or_else(|| Some(TimeBase::new(1, in_rate)));
    media.resampler = LinearResampler::new(in_rate, media.out_rate, out_channels);
    Ok(())
}

/// Media time of timestamp `ts`.
fn ts_to_duration(time_base: Option<TimeBase>, ts: u64) -> Option<Duration> {
    let time = time_base?.calc_time(ts);
    Some(Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac))
}

/// Map interleaved frames from `in_ch` to `out_ch` channels.
///
/// Mono is duplicated, a mono output averages all inputs, otherwise extra
/// input channels are dropped and missing ones repeat the input layout.
fn remap_channels(input: &[f32], in_ch: usize, out_ch: usize) -> Vec<f32> {
    let in_ch = in_ch.max(1);
    let out_ch = out_ch.max(1);
    if in_ch == out_ch {
        return input.to_vec();
    }

    let frames = input.len() / in_ch;
    let mut out = Vec::with_capacity(frames * out_ch);
    for frame in input.chunks_exact(in_ch) {
        if out_ch == 1 {
            out.push(frame.iter().sum::<f32>() / in_ch as f32);
            continue;
        }
        for c in 0..out_ch {
            out.push(frame[c % in_ch]);
        }
    }
    out
}

/// Streaming linear-interpolation resampler over interleaved frames.
struct LinearResampler {
    channels: usize,
    /// Input frames advanced per output frame.
    step: f64,
    /// Read position; `0.0` is `prev`, `1.0` the first frame of the next chunk.
    pos: f64,
    prev: Vec<f32>,
}

impl LinearResampler {
    fn new(in_rate: u32, out_rate: u32, channels: usize) -> Self {
        let channels = channels.max(1);
        Self {
            channels,
            step: in_rate.max(1) as f64 / out_rate.max(1) as f64,
            pos: 1.0,
            prev: vec![0.0; channels],
        }
    }

    fn reset(&mut self) {
        self.pos = 1.0;
        self.prev.iter_mut().for_each(|s| *s = 0.0);
    }

    fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
        let ch = self.channels;
        let frames = input.len() / ch;
        if frames == 0 {
            return;
        }

        while self.pos < frames as f64 {
            let i = self.pos.floor() as usize;
            let t = (self.pos - i as f64) as f32;
            for c in 0..ch {
                let a = if i == 0 {
                    self.prev[c]
                } else {
                    input[(i - 1) * ch + c]
                };
                let b = input[i * ch + c];
                out.push(a + (b - a) * t);
            }
            self.pos += self.step;
        }

        self.pos -= frames as f64;
        self.prev
            .copy_from_slice(&input[(frames - 1) * ch..frames * ch]);
    }
}
